//! Host+service to endpoint-list resolution (`AsioResolver` in the
//! original). Grounded on `include/asio/AsioResolver.h`: a resolver holds a
//! cached endpoint list populated by `scan()`/`Scan()`, and `endpoints(rescan)`
//! either returns the cache or forces a rescan first.

use std::net::SocketAddr;

use parking_lot::Mutex;

use crate::error::{Result, TransitError};

/// Resolves `(host, service)` into an ordered list of [`SocketAddr`]s,
/// filtered to IPv4 (no IPv6 address-family negotiation
/// beyond selecting a v4 endpoint).
pub struct Resolver {
    host: Option<String>,
    service: String,
    endpoints: Mutex<Vec<SocketAddr>>,
}

impl Resolver {
    #[must_use]
    pub fn new(host: Option<String>, service: impl Into<String>) -> Self {
        Self {
            host,
            service: service.into(),
            endpoints: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    fn query_string(&self) -> Result<String> {
        let host = self.host.as_deref().unwrap_or("");
        if host.is_empty() {
            return Err(TransitError::configuration("resolver host must not be empty"));
        }
        if self.service.is_empty() {
            return Err(TransitError::configuration("resolver service must not be empty"));
        }
        Ok(format!("{host}:{}", self.service))
    }

    /// Repopulates the cached endpoint list. Clears the cache on failure,
    /// matching `Scan()`'s `BOOST_NOEXCEPT` "clear and move on" behavior.
    pub async fn scan(&self) {
        let resolved = match self.query_string() {
            Ok(query) => compio::net::ToSocketAddrsAsync::to_socket_addrs_async(&query)
                .await
                .ok(),
            Err(_) => None,
        };

        let mut endpoints = self.endpoints.lock();
        endpoints.clear();
        if let Some(iter) = resolved {
            endpoints.extend(iter.filter(SocketAddr::is_ipv4));
        }
    }

    /// Copy of the cached endpoint list; rescans first if `rescan` is set.
    pub async fn endpoints(&self, rescan: bool) -> Vec<SocketAddr> {
        if rescan {
            self.scan().await;
        }
        self.endpoints.lock().clone()
    }

    /// `not endpoints.is_empty()`, rescanning first if requested.
    pub async fn is_valid(&self, rescan: bool) -> bool {
        !self.endpoints(rescan).await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_host_is_never_valid() {
        let rt = compio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let resolver = Resolver::new(None, "8080");
            assert!(!resolver.is_valid(true).await);
        });
    }

    #[test]
    fn resolves_localhost_to_a_v4_endpoint() {
        let rt = compio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let resolver = Resolver::new(Some("localhost".into()), "0");
            let endpoints = resolver.endpoints(true).await;
            assert!(endpoints.iter().all(SocketAddr::is_ipv4));
        });
    }
}
