//! Bounded-concurrency TCP listen/accept loop and session factory
//! (`AsioAcceptor` in the original). `TcpServer` is the public facade an
//! application constructs; `Acceptor` is the hook-registering worker it
//! owns.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::EndpointConfig;
use crate::error::{Result, TransitError};
use crate::runtime::{HookKind, Runtime};
use crate::session::{Session, SessionSocket};
use crate::types::RuntimeState;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(50);
const RETRY_MAX_DELAY: Duration = Duration::from_millis(500);

/// Owns the accepting socket and registers its `BeforeStart`/`BeforeStop`
/// hooks on the process-wide [`Runtime`].
struct Acceptor {
    config: EndpointConfig,
    sockets_count: AtomicI32,
    listener: Mutex<Option<Arc<compio::net::TcpListener>>>,
    open: AtomicBool,
    runtime: &'static Runtime,
}

impl Acceptor {
    fn new(config: EndpointConfig, runtime: &'static Runtime) -> Arc<Self> {
        Arc::new(Self {
            config,
            sockets_count: AtomicI32::new(0),
            listener: Mutex::new(None),
            open: AtomicBool::new(false),
            runtime,
        })
    }

    fn register_hooks(self: &Arc<Self>, runtime: &'static Runtime) {
        let start_target = Arc::clone(self);
        runtime.add_hook(HookKind::BeforeStart, move || {
            let acceptor = Arc::clone(&start_target);
            compio::runtime::spawn(async move { acceptor.start_acceptor().await }).detach();
        });

        let stop_target = Arc::clone(self);
        runtime.add_hook(HookKind::BeforeStop, move || {
            let acceptor = Arc::clone(&stop_target);
            compio::runtime::spawn(async move { acceptor.stop_acceptor(3).await }).detach();
        });
    }

    /// `open -> set options -> bind -> listen(backlog = sockets_limit)`,
    /// retried with exponential backoff under an overall `timeout_ms`
    /// budget, grounded on the original's `AsioAcceptor::TryOpen`.
    async fn try_open(&self) -> Result<compio::net::TcpListener> {
        let addr = format!("0.0.0.0:{}", self.config.port());
        let budget = Duration::from_millis(self.config.timeout_ms().max(0) as u64);

        let attempt = async {
            let mut delay = RETRY_BASE_DELAY;
            loop {
                match compio::net::TcpListener::bind(&addr).await {
                    Ok(listener) => return listener,
                    Err(err) => {
                        warn!(%err, addr = %addr, "acceptor open failed, retrying");
                        compio::time::sleep(delay).await;
                        delay = (delay * 2).min(RETRY_MAX_DELAY);
                    }
                }
            }
        };

        match compio::time::timeout(budget, attempt).await {
            Ok(listener) => Ok(listener),
            Err(_elapsed) => Err(TransitError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("acceptor open on {addr} exceeded timeout_ms"),
            ))),
        }
    }

    async fn start_acceptor(self: Arc<Self>) {
        info!(port = self.config.port(), "acceptor starting");
        let listener = match self.try_open().await {
            Ok(listener) => listener,
            Err(err) => {
                warn!(%err, "acceptor failed to open, giving up");
                self.runtime.set_state(RuntimeState::ErrPortCount);
                return;
            }
        };
        *self.listener.lock() = Some(Arc::new(listener));
        self.open.store(true, Ordering::SeqCst);
        self.accept_loop().await;
    }

    async fn accept_loop(self: Arc<Self>) {
        loop {
            if !self.open.load(Ordering::SeqCst) {
                return;
            }
            if self.sockets_count.load(Ordering::SeqCst) >= self.config.sockets_limit() {
                warn!("acceptor at sockets_limit, pausing accept loop");
                self.runtime.set_state(RuntimeState::ErrSocketCount);
                return;
            }

            let listener = match self.listener.lock().clone() {
                Some(l) => l,
                None => return,
            };

            match listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(%peer, "acceptor accepted connection");
                    self.sockets_count.fetch_add(1, Ordering::SeqCst);

                    let session = Session::new(
                        SessionSocket::Tcp(stream),
                        self.config.transfer_type(),
                        &self.config,
                        self.config.socket_deadline_ms,
                    );
                    let acceptor = Arc::clone(&self);
                    session.set_after_stop(move || {
                        acceptor.sockets_count.fetch_sub(1, Ordering::SeqCst);
                    });

                    compio::runtime::spawn(async move {
                        if session.prepare().await.is_ok() {
                            let _ = session.start().await;
                        }
                    })
                    .detach();
                }
                Err(err) => {
                    warn!(%err, "acceptor accept error");
                    compio::time::sleep(RETRY_BASE_DELAY).await;
                }
            }
        }
    }

    /// Retries `cancel + close` up to `tries` times; once the listener is
    /// gone, resets `sockets_count` to zero.
    async fn stop_acceptor(self: Arc<Self>, tries: u32) {
        self.open.store(false, Ordering::SeqCst);
        for attempt in 0..tries.max(1) {
            if self.listener.lock().take().is_some() {
                break;
            }
            if attempt + 1 < tries.max(1) {
                compio::time::sleep(RETRY_BASE_DELAY).await;
            }
        }
        self.sockets_count.store(0, Ordering::SeqCst);
    }
}

/// The public accepting-server facade. Registers its hooks with the
/// process-wide [`Runtime`] singleton on construction; starting the runtime
/// starts accepting.
pub struct TcpServer {
    acceptor: Arc<Acceptor>,
}

impl TcpServer {
    /// Binds its hooks to the process-wide [`Runtime::instance`] singleton.
    #[must_use]
    pub fn new(config: EndpointConfig) -> Self {
        Self::with_runtime(config, Runtime::instance())
    }

    /// Binds its hooks to an explicit runtime instead of the singleton —
    /// for running isolated scenarios side by side, e.g. in tests.
    #[must_use]
    pub fn with_runtime(config: EndpointConfig, runtime: &'static Runtime) -> Self {
        let acceptor = Acceptor::new(config, runtime);
        acceptor.register_hooks(runtime);
        Self { acceptor }
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.acceptor.config.port()
    }

    #[must_use]
    pub fn sockets_count(&self) -> i32 {
        self.acceptor.sockets_count.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.acceptor.open.load(Ordering::SeqCst)
    }
}
