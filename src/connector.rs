//! Outbound connect plus optional keep-alive reconnection (`AsioClient` in
//! the original).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::config::ConnectorConfig;
use crate::resolver::Resolver;
use crate::runtime::{HookKind, Runtime};
use crate::session::{Session, SessionSocket};
use crate::types::RuntimeState;

const RECONNECT_SWEEP_DELAY: Duration = Duration::from_millis(200);

/// The client-side counterpart to [`TcpServer`](crate::acceptor::TcpServer):
/// resolves a host+service, connects, and hands the socket off to a
/// [`Session`]. With `keep_alive = false` it makes exactly one endpoint
/// sweep; with `keep_alive = true` it restarts the sweep after each
/// session close.
pub struct Connector {
    config: ConnectorConfig,
    resolver: Resolver,
    sockets_count: AtomicI32,
    runtime: &'static Runtime,
}

impl Connector {
    /// Binds its `BeforeStart` hook to the process-wide [`Runtime::instance`]
    /// singleton.
    #[must_use]
    pub fn new(config: ConnectorConfig) -> Arc<Self> {
        Self::with_runtime(config, Runtime::instance())
    }

    /// Binds its hook to an explicit runtime instead of the singleton — for
    /// running isolated scenarios side by side, e.g. in tests.
    #[must_use]
    pub fn with_runtime(config: ConnectorConfig, runtime: &'static Runtime) -> Arc<Self> {
        let resolver = Resolver::new(config.host.clone(), config.endpoint.port().to_string());
        let connector = Arc::new(Self {
            config,
            resolver,
            sockets_count: AtomicI32::new(0),
            runtime,
        });

        let start_target = Arc::clone(&connector);
        runtime.add_hook(HookKind::BeforeStart, move || {
            let connector = Arc::clone(&start_target);
            compio::runtime::spawn(async move {
                if connector.try_connect().await.is_err() {
                    connector.runtime.stop();
                }
            })
            .detach();
        });

        connector
    }

    #[must_use]
    pub fn sockets_count(&self) -> i32 {
        self.sockets_count.load(Ordering::SeqCst)
    }

    async fn try_connect(self: &Arc<Self>) -> crate::error::Result<()> {
        if self.sockets_count.load(Ordering::SeqCst) >= self.config.endpoint.sockets_limit() {
            self.runtime.set_state(RuntimeState::ErrSocketCount);
            return Ok(());
        }

        let endpoints = self.resolver.endpoints(true).await;
        if endpoints.is_empty() {
            return Err(crate::error::TransitError::NoEndpoints(format!(
                "{:?}:{}",
                self.resolver.host(),
                self.resolver.service()
            )));
        }

        let connector = Arc::clone(self);
        compio::runtime::spawn(async move { connector.connect_loop(endpoints).await }).detach();
        Ok(())
    }

    async fn connect_loop(self: Arc<Self>, endpoints: Vec<SocketAddr>) {
        loop {
            let mut connected = false;

            for addr in &endpoints {
                let budget = Duration::from_millis(self.config.endpoint.timeout_ms().max(0) as u64);
                let attempt = compio::time::timeout(budget, compio::net::TcpStream::connect(addr)).await;

                match attempt {
                    Ok(Ok(stream)) => {
                        self.sockets_count.fetch_add(1, Ordering::SeqCst);

                        let session = Session::new(
                            SessionSocket::Tcp(stream),
                            self.config.endpoint.transfer_type(),
                            &self.config.endpoint,
                            self.config.endpoint.socket_deadline_ms,
                        );

                        let wait_closed = if self.config.keep_alive {
                            let (tx, rx) = flume::bounded::<()>(1);
                            let connector = Arc::clone(&self);
                            session.set_after_stop(move || {
                                connector.sockets_count.fetch_sub(1, Ordering::SeqCst);
                                let _ = tx.send(());
                            });
                            Some(rx)
                        } else {
                            None
                        };

                        compio::runtime::spawn(async move {
                            if session.prepare().await.is_ok() {
                                let _ = session.start().await;
                            }
                        })
                        .detach();

                        connected = true;
                        if let Some(rx) = wait_closed {
                            let _ = rx.recv_async().await;
                        }
                        break;
                    }
                    Ok(Err(err)) => {
                        warn!(%err, %addr, "connect attempt failed");
                        self.runtime.set_state(RuntimeState::ErrConnection);
                    }
                    Err(_elapsed) => {
                        warn!(%addr, "connect attempt timed out");
                        self.runtime.set_state(RuntimeState::ErrConnection);
                    }
                }
            }

            if !self.config.keep_alive {
                return;
            }
            if !connected {
                compio::time::sleep(RECONNECT_SWEEP_DELAY).await;
            }
        }
    }
}
