//! Datagram listener: one bind, one [`Session`], no re-listen after close
//! (`AsioUdpServer` in the original; its commented-out auto-restart code was
//! never enabled, so this mirrors what actually ships, not what was
//! sketched).

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::EndpointConfig;
use crate::error::{Result, TransitError};
use crate::runtime::{HookKind, Runtime};
use crate::session::{Session, SessionSocket};
use crate::types::RuntimeState;

/// Owns the bound datagram socket lifecycle and registers its hook on the
/// process-wide [`Runtime`].
struct UdpListener {
    config: EndpointConfig,
    sockets_count: AtomicI32,
    listening: AtomicBool,
    runtime: &'static Runtime,
}

impl UdpListener {
    fn new(config: EndpointConfig, runtime: &'static Runtime) -> Arc<Self> {
        Arc::new(Self {
            config,
            sockets_count: AtomicI32::new(0),
            listening: AtomicBool::new(false),
            runtime,
        })
    }

    fn register_hooks(self: &Arc<Self>, runtime: &'static Runtime) {
        let start_target = Arc::clone(self);
        runtime.add_hook(HookKind::BeforeStart, move || {
            let listener = Arc::clone(&start_target);
            compio::runtime::spawn(async move { listener.listen().await }).detach();
        });
    }

    async fn bind(&self) -> Result<compio::net::UdpSocket> {
        let addr = format!("0.0.0.0:{}", self.config.port());
        compio::net::UdpSocket::bind(&addr)
            .await
            .map_err(TransitError::Io)
    }

    /// A single bind-and-session cycle: no restart once the session closes.
    async fn listen(self: Arc<Self>) {
        if self.sockets_count.load(Ordering::SeqCst) >= self.config.sockets_limit() {
            warn!("udp listener at sockets_limit, not binding");
            self.runtime.set_state(RuntimeState::ErrSocketCount);
            return;
        }

        let socket = match self.bind().await {
            Ok(socket) => socket,
            Err(err) => {
                warn!(%err, "udp listener failed to bind");
                self.runtime.set_state(RuntimeState::ErrPortCount);
                return;
            }
        };

        info!(port = self.config.port(), "udp listener bound");
        self.sockets_count.fetch_add(1, Ordering::SeqCst);
        self.listening.store(true, Ordering::SeqCst);

        let session = Session::new(
            SessionSocket::Udp { socket, peer: None },
            self.config.transfer_type(),
            &self.config,
            self.config.socket_deadline_ms,
        );
        let listener = Arc::clone(&self);
        session.set_after_stop(move || {
            listener.sockets_count.fetch_sub(1, Ordering::SeqCst);
            listener.listening.store(false, Ordering::SeqCst);
        });

        if session.prepare().await.is_ok() {
            let _ = session.start().await;
        }
    }
}

/// Public datagram-server facade.
pub struct UdpServer {
    listener: Arc<UdpListener>,
}

impl UdpServer {
    /// Binds its hook to the process-wide [`Runtime::instance`] singleton.
    #[must_use]
    pub fn new(config: EndpointConfig) -> Self {
        Self::with_runtime(config, Runtime::instance())
    }

    /// Binds its hook to an explicit runtime instead of the singleton — for
    /// running isolated scenarios side by side, e.g. in tests.
    #[must_use]
    pub fn with_runtime(config: EndpointConfig, runtime: &'static Runtime) -> Self {
        let listener = UdpListener::new(config, runtime);
        listener.register_hooks(runtime);
        Self { listener }
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.listener.config.port()
    }

    #[must_use]
    pub fn sockets_count(&self) -> i32 {
        self.listener.sockets_count.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.listener.listening.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransferType;

    #[test]
    fn new_udp_server_starts_with_zero_sockets() {
        let server = UdpServer::with_runtime(
            EndpointConfig::new(0, TransferType::SimplexIn),
            Runtime::standalone(1_000),
        );
        assert_eq!(server.sockets_count(), 0);
        assert!(!server.is_listening());
    }
}
