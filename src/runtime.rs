//! The single process-wide I/O dispatcher (`AsioService` in the original).
//!
//! One cooperative `compio` event loop runs on a dedicated OS thread;
//! `BeforeStart`/`BeforeStop`/`AfterStop` hook lists let components bind
//! their own lifecycle (acceptor open/close, connector dial, session
//! bookkeeping) to the runtime's `start()`/`stop()` without the runtime
//! knowing anything about sessions, acceptors, or connectors. Hooks call
//! `compio::runtime::spawn` to schedule their own coroutines, so they must
//! run from inside the worker thread's `compio` runtime context — not on
//! the caller's thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::ErrorCode;
use crate::error_registry::ErrorRegistry;
use crate::types::RuntimeState;

const DEFAULT_CLOSE_TIMEOUT_MS: i64 = 10_000;
const STOP_POLL_INTERVAL_MS: u64 = 5;
/// Window left for `BeforeStop`-spawned detached coroutines (e.g.
/// `Acceptor::stop_acceptor`'s retries) to run before the worker thread's
/// `compio` runtime exits.
const STOP_DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Which of the three lifecycle points a hook is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    BeforeStart,
    BeforeStop,
    AfterStop,
}

type Hook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct HookLists {
    before_start: Vec<Hook>,
    before_stop: Vec<Hook>,
    after_stop: Vec<Hook>,
}

impl HookLists {
    fn push(&mut self, kind: HookKind, hook: Hook) {
        match kind {
            HookKind::BeforeStart => self.before_start.push(hook),
            HookKind::BeforeStop => self.before_stop.push(hook),
            HookKind::AfterStop => self.after_stop.push(hook),
        }
    }

    /// Hooks of one kind run in reverse insertion order (LIFO): the
    /// component registered last tears down first.
    fn run(&self, kind: HookKind) {
        let list = match kind {
            HookKind::BeforeStart => &self.before_start,
            HookKind::BeforeStop => &self.before_stop,
            HookKind::AfterStop => &self.after_stop,
        };
        for hook in list.iter().rev() {
            hook();
        }
    }
}

/// The process-wide cooperative event loop.
pub struct Runtime {
    hooks: Mutex<HookLists>,
    state: Mutex<RuntimeState>,
    error_registry: ErrorRegistry,
    active: AtomicBool,
    close_timeout_ms: i64,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: Mutex<Option<flume::Sender<()>>>,
}

static INSTANCE: OnceCell<Runtime> = OnceCell::new();

impl Runtime {
    fn new(close_timeout_ms: i64) -> Self {
        let runtime = Self {
            hooks: Mutex::new(HookLists::default()),
            state: Mutex::new(RuntimeState::Unknown),
            error_registry: ErrorRegistry::new(),
            active: AtomicBool::new(false),
            close_timeout_ms: close_timeout_ms.max(0),
            worker: Mutex::new(None),
            shutdown_tx: Mutex::new(None),
        };
        runtime.install_default_error_callback();
        runtime
    }

    fn install_default_error_callback(&self) {
        // Default `OwnerDead` policy: stop the runtime. Registered once per
        // process, matching `AsioService::SetDefaultErrorCallbacks`.
        self.error_registry.on(ErrorCode::OwnerDead, |_code| {
            Runtime::instance().stop();
        });
    }

    /// Lazily-initialized process-wide singleton.
    pub fn instance() -> &'static Runtime {
        INSTANCE.get_or_init(|| Runtime::new(DEFAULT_CLOSE_TIMEOUT_MS))
    }

    /// Builds a standalone runtime instance, bypassing the process-wide
    /// singleton. Production code should construct one graph of
    /// `TcpServer`/`Connector`/etc. against `instance()`; this exists so a
    /// test binary can run several independent scenarios, each with its own
    /// isolated hook lists, in one process without one test's hooks firing
    /// during another's.
    #[must_use]
    pub fn standalone(close_timeout_ms: i64) -> &'static Runtime {
        Box::leak(Box::new(Self::new(close_timeout_ms)))
    }

    /// Registers a hook under `kind`. Hooks of the same kind run LIFO.
    pub fn add_hook(&self, kind: HookKind, hook: impl Fn() + Send + Sync + 'static) {
        self.hooks.lock().push(kind, Arc::new(hook));
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn close_timeout_ms(&self) -> i64 {
        self.close_timeout_ms
    }

    pub fn set_state(&self, state: RuntimeState) {
        *self.state.lock() = state;
    }

    #[must_use]
    pub fn state(&self) -> RuntimeState {
        *self.state.lock()
    }

    #[must_use]
    pub fn is_state_valid(&self) -> bool {
        self.state() == RuntimeState::Ok
    }

    pub fn reset_state(&self) {
        self.set_state(RuntimeState::Unknown);
    }

    pub fn set_error(&self, code: ErrorCode) {
        self.error_registry.set_code(code);
    }

    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        self.error_registry.current_code()
    }

    #[must_use]
    pub fn error_registry(&self) -> &ErrorRegistry {
        &self.error_registry
    }

    /// Marks the runtime `Exception`/`OwnerDead`, firing the default
    /// `OwnerDead` callback (stop, unless overridden).
    pub fn report_exception(&self) {
        self.set_state(RuntimeState::Exception);
        self.set_error(ErrorCode::OwnerDead);
    }

    /// Idempotent: returns `true` immediately if already active. Otherwise
    /// spawns the dedicated worker thread, runs `BeforeStart` hooks from
    /// inside that thread's `compio` runtime (so the hooks' own
    /// `compio::runtime::spawn` calls land in a live context), and returns
    /// `true` once the worker is launched.
    pub fn start(&'static self) -> bool {
        if self.active.swap(true, Ordering::SeqCst) {
            return true;
        }
        info!("runtime starting");

        let (tx, rx) = flume::bounded::<()>(1);
        *self.shutdown_tx.lock() = Some(tx);

        let handle = std::thread::Builder::new()
            .name("transit-runtime".into())
            .spawn(move || {
                let rt = match compio::runtime::Runtime::new() {
                    Ok(rt) => rt,
                    Err(err) => {
                        warn!(%err, "failed to start compio runtime");
                        self.report_exception();
                        return;
                    }
                };
                rt.block_on(async move {
                    self.hooks.lock().run(HookKind::BeforeStart);
                    let _ = rx.recv_async().await;
                    // Run teardown hooks from inside this thread's `compio`
                    // context, not the caller's: the acceptor's/connector's
                    // `BeforeStop` hooks call `compio::runtime::spawn`, which
                    // panics outside one. The sleep gives their detached
                    // teardown coroutines (e.g. `stop_acceptor`'s retries) a
                    // window to run before this block_on — and the runtime
                    // it's driving — exits.
                    self.hooks.lock().run(HookKind::BeforeStop);
                    compio::time::sleep(STOP_DRAIN_GRACE).await;
                    self.hooks.lock().run(HookKind::AfterStop);
                });
            })
            .expect("failed to spawn transit runtime worker thread");

        *self.worker.lock() = Some(handle);
        self.set_state(RuntimeState::Ok);
        true
    }

    /// Signals the worker to run its teardown hooks and drain, then waits
    /// up to `close_timeout_ms` for it to finish (a timed-out wait still
    /// returns — the loop may still be terminating).
    pub fn stop(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("runtime stopping");

        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.worker.lock().take() {
            let deadline = Instant::now() + Duration::from_millis(self.close_timeout_ms as u64);
            while !handle.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(STOP_POLL_INTERVAL_MS));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                warn!(timeout_ms = self.close_timeout_ms, "runtime stop wait timed out");
            }
        }
    }

    /// Runs `BeforeStart` hooks, lets spawned coroutines take one
    /// non-blocking scheduling pass, then runs `AfterStop` hooks — a
    /// single-shot alternative to `start()`'s background worker, for tests
    /// and embedders that drive `compio` themselves. Both hook kinds run
    /// inside the same `block_on`, so hooks that call `compio::runtime::spawn`
    /// work here too.
    pub fn poll(&'static self) {
        debug!("runtime poll");
        let rt = compio::runtime::Runtime::new().expect("compio runtime");
        rt.block_on(async {
            self.hooks.lock().run(HookKind::BeforeStart);
            compio::time::sleep(Duration::from_millis(0)).await;
            self.hooks.lock().run(HookKind::AfterStop);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn hooks_of_one_kind_run_lifo() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut lists = HookLists::default();
        for i in 0..3 {
            let order = Arc::clone(&order);
            lists.push(HookKind::AfterStop, Arc::new(move || order.lock().push(i)));
        }
        lists.run(HookKind::AfterStop);
        assert_eq!(*order.lock(), vec![2, 1, 0]);
    }

    #[test]
    fn owner_dead_default_callback_is_registered() {
        let registry = ErrorRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&fired);
        registry.on(ErrorCode::OwnerDead, move |_| {
            flag.fetch_add(1, Ordering::SeqCst);
        });
        registry.set_code_sync(ErrorCode::OwnerDead);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn state_transitions_are_observable() {
        let runtime = Runtime::new(10_000);
        assert_eq!(runtime.state(), RuntimeState::Unknown);
        runtime.set_state(RuntimeState::Ok);
        assert!(runtime.is_state_valid());
        runtime.reset_state();
        assert_eq!(runtime.state(), RuntimeState::Unknown);
    }
}
