//! Builder-style configuration for the top-level objects (`TcpServer`,
//! `UdpServer`, `Connector`, `DuplexServer`). No file format, CLI, or env
//! vars — purely programmatic, `with_*` methods mirroring the `SocketOptions`
//! builder pattern.

use crate::channel::{ChannelCallback, DEFAULT_BUFFER_SIZE};
use crate::types::TransferType;

/// Half of a typical OS listen backlog (`SOMAXCONN` is commonly 128); the
/// default `sockets_limit`.
pub const DEFAULT_SOCKETS_LIMIT: i32 = 64;

/// Listen/connect attempt budget default.
pub const DEFAULT_TIMEOUT_MS: i64 = 3000;

/// Per-session inactivity deadline default.
pub const DEFAULT_SOCKET_DEADLINE_MS: i64 = 10_000;

/// Shared per-endpoint configuration used by `TcpServer`, `UdpServer`, and
/// `Connector`. Built with `with_*` methods; never constructed with struct
/// literal syntax by callers outside this module.
#[derive(Clone)]
pub struct EndpointConfig {
    pub(crate) port: u16,
    pub(crate) transfer_type: TransferType,
    pub(crate) socket_deadline_ms: i64,
    pub(crate) timeout_ms: i64,
    pub(crate) sockets_limit: i32,
    pub(crate) buffer_size: usize,
    pub(crate) input_callback: Option<ChannelCallback>,
    pub(crate) output_callback: Option<ChannelCallback>,
}

impl EndpointConfig {
    #[must_use]
    pub fn new(port: u16, transfer_type: TransferType) -> Self {
        Self {
            port,
            transfer_type,
            socket_deadline_ms: DEFAULT_SOCKET_DEADLINE_MS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            sockets_limit: DEFAULT_SOCKETS_LIMIT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            input_callback: None,
            output_callback: None,
        }
    }

    #[must_use]
    pub fn with_socket_deadline_ms(mut self, deadline_ms: i64) -> Self {
        self.socket_deadline_ms = deadline_ms.max(0);
        self
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: i64) -> Self {
        self.timeout_ms = timeout_ms.max(0);
        self
    }

    #[must_use]
    pub fn with_sockets_limit(mut self, sockets_limit: i32) -> Self {
        self.sockets_limit = sockets_limit.max(0);
        self
    }

    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    #[must_use]
    pub fn with_input_callback(
        mut self,
        callback: impl Fn(&crate::buffer::ByteBuffer) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.input_callback = Some(std::sync::Arc::new(callback));
        self
    }

    #[must_use]
    pub fn with_output_callback(
        mut self,
        callback: impl Fn(&crate::buffer::ByteBuffer) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.output_callback = Some(std::sync::Arc::new(callback));
        self
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn transfer_type(&self) -> TransferType {
        self.transfer_type
    }

    #[must_use]
    pub fn sockets_limit(&self) -> i32 {
        self.sockets_limit
    }

    #[must_use]
    pub fn timeout_ms(&self) -> i64 {
        self.timeout_ms
    }
}

/// `EndpointConfig` plus the client-side `(host, keep_alive)` fields a
/// `Connector` needs beyond what an accepting server does.
#[derive(Clone)]
pub struct ConnectorConfig {
    pub(crate) endpoint: EndpointConfig,
    pub(crate) host: Option<String>,
    pub(crate) keep_alive: bool,
}

impl ConnectorConfig {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, transfer_type: TransferType) -> Self {
        Self {
            endpoint: EndpointConfig::new(port, transfer_type),
            host: Some(host.into()),
            keep_alive: false,
        }
    }

    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    #[must_use]
    pub fn with_socket_deadline_ms(mut self, deadline_ms: i64) -> Self {
        self.endpoint = self.endpoint.with_socket_deadline_ms(deadline_ms);
        self
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: i64) -> Self {
        self.endpoint = self.endpoint.with_timeout_ms(timeout_ms);
        self
    }

    #[must_use]
    pub fn with_sockets_limit(mut self, sockets_limit: i32) -> Self {
        self.endpoint = self.endpoint.with_sockets_limit(sockets_limit);
        self
    }

    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.endpoint = self.endpoint.with_buffer_size(buffer_size);
        self
    }

    #[must_use]
    pub fn with_input_callback(
        mut self,
        callback: impl Fn(&crate::buffer::ByteBuffer) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.endpoint = self.endpoint.with_input_callback(callback);
        self
    }

    #[must_use]
    pub fn with_output_callback(
        mut self,
        callback: impl Fn(&crate::buffer::ByteBuffer) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.endpoint = self.endpoint.with_output_callback(callback);
        self
    }
}

/// `service_timeout_ms` — the runtime-wide close budget, kept separate from
/// any single endpoint's `timeout_ms`.
#[derive(Clone, Copy, Debug)]
pub struct ServiceTimeout {
    pub service_timeout_ms: i64,
}

impl Default for ServiceTimeout {
    fn default() -> Self {
        Self {
            service_timeout_ms: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_defaults_match_spec() {
        let cfg = EndpointConfig::new(9000, TransferType::SimplexIn);
        assert_eq!(cfg.socket_deadline_ms, DEFAULT_SOCKET_DEADLINE_MS);
        assert_eq!(cfg.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(cfg.sockets_limit, DEFAULT_SOCKETS_LIMIT);
        assert_eq!(cfg.buffer_size, DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn negative_overrides_clamp_to_zero() {
        let cfg = EndpointConfig::new(9000, TransferType::SimplexIn)
            .with_socket_deadline_ms(-5)
            .with_timeout_ms(-5)
            .with_sockets_limit(-5);
        assert_eq!(cfg.socket_deadline_ms, 0);
        assert_eq!(cfg.timeout_ms, 0);
        assert_eq!(cfg.sockets_limit, 0);
    }

    #[test]
    fn connector_config_defaults_keep_alive_false() {
        let cfg = ConnectorConfig::new("localhost", 9000, TransferType::SimplexOut);
        assert!(!cfg.keep_alive);
        assert_eq!(cfg.host.as_deref(), Some("localhost"));
    }
}
