//! The per-socket state machine (`AsioSocketSession` in the original):
//! Receive / Send / HalfDuplex-IN / HalfDuplex-OUT plus a concurrent
//! deadline supervisor. A session owns exactly one socket and exactly two
//! [`IoChannel`]s (`Input`, `Output`).

#![allow(unsafe_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use compio::buf::BufResult;
use compio::io::AsyncWriteExt;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::channel::IoChannel;
use crate::config::EndpointConfig;
use crate::error::{ErrorCode, Result, TransitError};
use crate::timeout::{read_with_timeout, write_with_timeout};
use crate::timer::DeadlineTimer;
use crate::types::TransferType;

/// Idle backoff when `Send` has nothing to write this round — keeps a
/// `SimplexOut`/`HalfDuplex*` session that never yields real I/O from
/// spinning the runtime's single worker thread.
const SEND_IDLE_DELAY: Duration = Duration::from_millis(20);

/// Socket-option parity with the original's `SetSocketOptions`:
/// `TCP_NODELAY`, non-blocking, `SO_REUSEADDR`, enable-connection-aborted.
/// `compio::net` already opens sockets non-blocking; the remaining options
/// go through `socket2` the same way `tcp.rs::enable_tcp_nodelay` does.
pub fn apply_tcp_options(stream: &compio::net::TcpStream) -> io::Result<()> {
    crate::tcp::enable_tcp_nodelay(stream)?;
    with_socket2(stream, |sock| sock.set_reuse_address(true))
}

/// Socket-option parity for UDP: non-blocking (already on), broadcast,
/// `SO_REUSEADDR`.
pub fn apply_udp_options(socket: &compio::net::UdpSocket) -> io::Result<()> {
    with_socket2_udp(socket, |sock| {
        sock.set_broadcast(true)?;
        sock.set_reuse_address(true)?;
        Ok(())
    })
}

#[cfg(unix)]
fn with_socket2(
    stream: &compio::net::TcpStream,
    f: impl FnOnce(&socket2::Socket) -> io::Result<()>,
) -> io::Result<()> {
    use std::os::unix::io::{AsRawFd, FromRawFd};
    let sock = unsafe { socket2::Socket::from_raw_fd(stream.as_raw_fd()) };
    let result = f(&sock);
    std::mem::forget(sock);
    result
}

#[cfg(not(unix))]
fn with_socket2(
    _stream: &compio::net::TcpStream,
    _f: impl FnOnce(&socket2::Socket) -> io::Result<()>,
) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn with_socket2_udp(
    socket: &compio::net::UdpSocket,
    f: impl FnOnce(&socket2::Socket) -> io::Result<()>,
) -> io::Result<()> {
    use std::os::unix::io::{AsRawFd, FromRawFd};
    let sock = unsafe { socket2::Socket::from_raw_fd(socket.as_raw_fd()) };
    let result = f(&sock);
    std::mem::forget(sock);
    result
}

#[cfg(not(unix))]
fn with_socket2_udp(
    _socket: &compio::net::UdpSocket,
    _f: impl FnOnce(&socket2::Socket) -> io::Result<()>,
) -> io::Result<()> {
    Ok(())
}

/// The socket a session drives. TCP is a byte stream; UDP tracks the last
/// peer address so `Send` knows where to `send_to` after a `Receive` filled
/// it in.
pub enum SessionSocket {
    Tcp(compio::net::TcpStream),
    Udp {
        socket: compio::net::UdpSocket,
        peer: Option<SocketAddr>,
    },
}

impl SessionSocket {
    fn apply_options(&self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => apply_tcp_options(stream),
            Self::Udp { socket, .. } => apply_udp_options(socket),
        }
    }

    async fn shutdown(&mut self) {
        if let Self::Tcp(stream) = self {
            let _ = stream.shutdown().await;
        }
    }
}

/// Outcome of one `Receive`/`Send` attempt: bytes transferred and whether
/// an error occurred (distinct from "zero bytes, no error", which simplex
/// `Receive` uses to mean "nothing to read yet").
struct Transfer {
    bytes: usize,
    error: Option<ErrorCode>,
}

/// Per-socket state machine. Shared (`Arc`) across its own coroutines
/// (`Receive`/`Send`/`CheckTimeout`) for the duration of their execution;
/// dropped once the last one completes and the socket is closed.
pub struct Session {
    socket: Mutex<Option<SessionSocket>>,
    input: IoChannel,
    output: IoChannel,
    timer: Mutex<DeadlineTimer>,
    transfer_type: TransferType,
    transferred: AtomicU64,
    stopped: AtomicBool,
    after_transfer: Mutex<Option<Arc<dyn Fn(u64) + Send + Sync>>>,
    after_stop: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Session {
    #[must_use]
    pub fn new(
        socket: SessionSocket,
        transfer_type: TransferType,
        config: &EndpointConfig,
        socket_deadline_ms: i64,
    ) -> Arc<Self> {
        let mut input = IoChannel::new(config.buffer_size);
        if let Some(cb) = config.input_callback.clone() {
            input.set_callback(move |buf| cb(buf));
        }
        let mut output = IoChannel::new(config.buffer_size);
        if let Some(cb) = config.output_callback.clone() {
            output.set_callback(move |buf| cb(buf));
        }

        Arc::new(Self {
            socket: Mutex::new(Some(socket)),
            input,
            output,
            timer: Mutex::new(DeadlineTimer::new(socket_deadline_ms)),
            transfer_type,
            transferred: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            after_transfer: Mutex::new(None),
            after_stop: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn input(&self) -> &IoChannel {
        &self.input
    }

    #[must_use]
    pub fn output(&self) -> &IoChannel {
        &self.output
    }

    #[must_use]
    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }

    /// Installed before `start()`; fires asynchronously after a successful
    /// transfer.
    pub fn set_after_transfer(&self, hook: impl Fn(u64) + Send + Sync + 'static) {
        *self.after_transfer.lock() = Some(Arc::new(hook));
    }

    /// Installed before `start()`; guaranteed to run exactly once.
    pub fn set_after_stop(&self, hook: impl FnOnce() + Send + 'static) {
        *self.after_stop.lock() = Some(Box::new(hook));
    }

    /// Applies socket options. A pre-start step; failure stops the session
    /// immediately.
    pub async fn prepare(self: &Arc<Self>) -> Result<()> {
        let options_result = {
            let guard = self.socket.lock();
            guard.as_ref().map(SessionSocket::apply_options)
        };
        match options_result {
            Some(Ok(())) => Ok(()),
            Some(Err(err)) => {
                self.stop().await;
                Err(TransitError::Io(err))
            }
            None => Err(TransitError::SocketClosed),
        }
    }

    /// Dispatches the session's coroutine composition per `TransferType`
    /// and runs it to completion (i.e. until the session stops).
    pub async fn start(self: Arc<Self>) -> Result<()> {
        if self.transfer_type == TransferType::FullDuplex {
            return Err(TransitError::configuration(
                "FullDuplex is not a valid Session-level transfer type; pair two simplex sessions via DuplexServer",
            ));
        }

        let checker = compio::runtime::spawn({
            let session = Arc::clone(&self);
            async move { session.check_timeout().await }
        });

        match self.transfer_type {
            TransferType::SimplexIn => {
                while self.is_open() {
                    self.receive().await;
                }
            }
            TransferType::SimplexOut => {
                while self.is_open() {
                    self.send().await;
                }
            }
            TransferType::HalfDuplexIn => {
                while self.is_open() {
                    let recv = self.receive().await;
                    if recv.error.is_none() && self.transferred() > 0 {
                        self.send().await;
                    } else if recv.error.is_some() {
                        self.stop().await;
                    }
                }
            }
            TransferType::HalfDuplexOut => {
                while self.is_open() {
                    let sent = self.send().await;
                    if sent.error.is_none() && self.transferred() > 0 {
                        self.receive().await;
                    } else if sent.error.is_some() {
                        self.stop().await;
                    }
                }
            }
            TransferType::FullDuplex => unreachable!("handled above"),
        }

        drop(checker);
        Ok(())
    }

    /// Receive contract: a read of zero bytes with no error means "nothing
    /// available yet", not an error; `HalfDuplex*` callers
    /// use the combination of `transferred() > 0` and `error.is_none()` to
    /// decide whether to run the paired leg.
    async fn receive(self: &Arc<Self>) -> Transfer {
        if !self.is_open() {
            return Transfer { bytes: 0, error: None };
        }
        let mut sock = match self.socket.lock().take() {
            Some(s) => s,
            None => return Transfer { bytes: 0, error: None },
        };

        let staging = vec![0u8; self.input.buffer_size().max(1)];
        self.timer.lock().start();
        let is_tcp = matches!(sock, SessionSocket::Tcp(_));
        let budget = self.deadline_budget();

        let outcome: io::Result<(usize, Vec<u8>)> = match &mut sock {
            SessionSocket::Tcp(stream) => match read_with_timeout(stream, staging, budget).await {
                Ok(BufResult(Ok(n), buf)) => Ok((n, buf)),
                Ok(BufResult(Err(err), _)) | Err(err) => Err(err),
            },
            SessionSocket::Udp { socket, peer } => {
                let recv = socket.recv_from(staging);
                let result = match budget {
                    Some(d) => match compio::time::timeout(d, recv).await {
                        Ok(result) => result,
                        Err(_elapsed) => {
                            BufResult(Err(io::Error::new(io::ErrorKind::TimedOut, "udp receive timed out")), Vec::new())
                        }
                    },
                    None => recv.await,
                };
                match result {
                    BufResult(Ok((n, from)), buf) => {
                        *peer = Some(from);
                        Ok((n, buf))
                    }
                    BufResult(Err(err), _buf) => Err(err),
                }
            }
        };

        *self.socket.lock() = Some(sock);

        match outcome {
            Ok((0, _)) if is_tcp => {
                debug!("session peer closed the connection");
                self.stop().await;
                Transfer { bytes: 0, error: None }
            }
            Ok((0, _)) => {
                self.timer.lock().stop();
                Transfer { bytes: 0, error: None }
            }
            Ok((n, buf)) => {
                self.transferred.fetch_add(n as u64, Ordering::SeqCst);
                self.timer.lock().stop();
                if self.input.callback_exists() {
                    self.input.buffer().append(&buf[..n]);
                    self.input.execute();
                    self.input.clear();
                }
                if let Some(hook) = self.after_transfer.lock().clone() {
                    compio::runtime::spawn(async move { hook(n as u64) }).detach();
                }
                trace!(bytes = n, "session received");
                Transfer { bytes: n, error: None }
            }
            Err(err) => {
                warn!(%err, "session receive error");
                let code = ErrorCode::from_io_error(&err);
                self.stop().await;
                Transfer { bytes: 0, error: Some(code) }
            }
        }
    }

    /// Send contract: the Output callback refills the buffer; an empty
    /// buffer after the callback means "nothing to send this round", not an
    /// error.
    async fn send(self: &Arc<Self>) -> Transfer {
        if !self.is_open() || !self.output.callback_exists() {
            compio::time::sleep(SEND_IDLE_DELAY).await;
            return Transfer { bytes: 0, error: None };
        }
        self.output.clear();
        self.output.execute();
        if self.output.buffer().is_empty() {
            // Nothing to send this round: yield rather than spin, since
            // `SimplexOut`/`HalfDuplex*` call `send` again immediately and
            // this path never reaches an I/O suspension point on its own.
            compio::time::sleep(SEND_IDLE_DELAY).await;
            return Transfer { bytes: 0, error: None };
        }

        let mut sock = match self.socket.lock().take() {
            Some(s) => s,
            None => return Transfer { bytes: 0, error: None },
        };
        let payload = self.output.buffer().to_vec();
        self.timer.lock().start();
        let budget = self.deadline_budget();

        let outcome: io::Result<usize> = match &mut sock {
            SessionSocket::Tcp(stream) => match write_with_timeout(stream, payload, budget).await {
                Ok(BufResult(res, _)) => res,
                Err(err) => Err(err),
            },
            SessionSocket::Udp { socket, peer } => match *peer {
                Some(addr) => {
                    let send = socket.send_to(payload, addr);
                    match budget {
                        Some(d) => match compio::time::timeout(d, send).await {
                            Ok(BufResult(res, _)) => res,
                            Err(_elapsed) => {
                                Err(io::Error::new(io::ErrorKind::TimedOut, "udp send timed out"))
                            }
                        },
                        None => {
                            let BufResult(res, _) = send.await;
                            res
                        }
                    }
                }
                None => Ok(0),
            },
        };

        *self.socket.lock() = Some(sock);

        match outcome {
            Ok(n) => {
                self.transferred.fetch_add(n as u64, Ordering::SeqCst);
                self.timer.lock().stop();
                trace!(bytes = n, "session sent");
                Transfer { bytes: n, error: None }
            }
            Err(err) => {
                warn!(%err, "session send error");
                let code = ErrorCode::from_io_error(&err);
                self.stop().await;
                Transfer { bytes: 0, error: Some(code) }
            }
        }
    }

    /// `Some(deadline)` in milliseconds if the session has a nonzero
    /// `socket_deadline_ms` — the budget `Receive`/`Send` race their I/O
    /// against, since the socket is owned by the in-flight read/write
    /// future and a concurrent `stop()` has no handle on it to cancel from
    /// the outside: I/O and timeout share one path instead of racing two
    /// independent tasks for the same socket.
    fn deadline_budget(&self) -> Option<Duration> {
        let deadline_ms = self.timer.lock().deadline_ms();
        (deadline_ms > 0).then(|| Duration::from_millis(deadline_ms as u64))
    }

    /// Supervisor coroutine: a secondary watchdog over the deadline timer's
    /// own bookkeeping, for sessions that never reach an I/O suspension
    /// point to race a timeout against (e.g. a `Send` whose Output callback
    /// never produces anything, so the timer is never armed). Runs
    /// concurrently with `Receive`/`Send` on the same cooperative loop; a
    /// timer that was never armed or was explicitly stopped never triggers
    /// a stop here.
    async fn check_timeout(self: Arc<Self>) {
        const POLL_INTERVAL: Duration = Duration::from_millis(20);
        while self.is_open() {
            let (active, remaining) = {
                let timer = self.timer.lock();
                (timer.is_active(), timer.remaining())
            };
            if !active {
                compio::time::sleep(POLL_INTERVAL).await;
                continue;
            }
            if remaining.is_zero() {
                if self.timer.lock().is_expired(None) {
                    debug!("session deadline expired");
                    self.stop().await;
                    return;
                }
            }
            compio::time::sleep(remaining.min(POLL_INTERVAL)).await;
        }
    }

    /// `stop()` contract: stop the timer, shut down and close the socket if
    /// open, then run `after_stop` exactly once, fire-and-forget.
    pub async fn stop(self: &Arc<Self>) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.timer.lock().stop();
        if let Some(mut sock) = self.socket.lock().take() {
            sock.shutdown().await;
        }
        if let Some(hook) = self.after_stop.lock().take() {
            compio::runtime::spawn(async move { hook() }).detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;
    use std::sync::atomic::AtomicUsize;

    fn loopback_config() -> EndpointConfig {
        EndpointConfig::new(0, TransferType::SimplexIn)
    }

    #[test]
    fn full_duplex_is_a_configuration_error_at_session_level() {
        let rt = compio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let listener = compio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let connect = compio::net::TcpStream::connect(addr);
            let (accepted, connected) = futures::join!(listener.accept(), connect);
            let (stream, _) = accepted.unwrap();
            drop(connected.unwrap());

            let session = Session::new(
                SessionSocket::Tcp(stream),
                TransferType::FullDuplex,
                &loopback_config(),
                1000,
            );
            let result = session.start().await;
            assert!(result.is_err());
        });
    }

    #[test]
    fn after_stop_runs_exactly_once() {
        let rt = compio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let listener = compio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let connect = compio::net::TcpStream::connect(addr);
            let (accepted, connected) = futures::join!(listener.accept(), connect);
            let (stream, _) = accepted.unwrap();
            drop(connected.unwrap());

            let session = Session::new(
                SessionSocket::Tcp(stream),
                TransferType::SimplexIn,
                &loopback_config(),
                50,
            );
            let calls = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&calls);
            session.set_after_stop(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });

            session.stop().await;
            session.stop().await;
            compio::time::sleep(Duration::from_millis(20)).await;
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        });
    }

    #[test]
    fn half_duplex_in_skips_send_when_nothing_received() {
        let rt = compio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let listener = compio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let connect = compio::net::TcpStream::connect(addr);
            let (accepted, connected) = futures::join!(listener.accept(), connect);
            let (stream, _) = accepted.unwrap();
            let _peer = connected.unwrap(); // kept alive, never writes anything

            let output_invocations = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&output_invocations);
            let config = EndpointConfig::new(0, TransferType::HalfDuplexIn).with_output_callback(move |_buf| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            });

            let session = Session::new(SessionSocket::Tcp(stream), TransferType::HalfDuplexIn, &config, 80);
            // The peer never writes, so Receive's read races the 80ms
            // deadline and loses; per P7 that must not invoke Send.
            session.start().await.expect("half-duplex session does not itself error out");

            assert_eq!(output_invocations.load(Ordering::SeqCst), 0);
        });
    }
}
