//! Per-object current-error-code-plus-callback-map, decoupling "what
//! failed" from "what to do about it" (`AsioError` in the original).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::ErrorCode;

type ErrorCallback = Arc<dyn Fn(ErrorCode) + Send + Sync>;

/// Holds the last-seen [`ErrorCode`] for its owner plus a table of
/// callbacks keyed by code. `set_code` looks the code up in the table and,
/// by default, fires the matching callback on a detached thread so the
/// caller never blocks on it — mirroring the original's
/// `std::async(std::launch::async, ...)` with a zero-wait check.
#[derive(Default)]
pub struct ErrorRegistry {
    current: Mutex<ErrorCode>,
    callbacks: Mutex<HashMap<ErrorCodeKey, ErrorCallback>>,
}

/// `ErrorCode::Other` carries an `io::ErrorKind`, which is `Eq`/`Hash`, so
/// the map key can just be `ErrorCode` itself — kept as a type alias for
/// readability at call sites.
type ErrorCodeKey = ErrorCode;

impl std::fmt::Debug for ErrorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorRegistry")
            .field("current", &*self.current.lock())
            .finish_non_exhaustive()
    }
}

impl ErrorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: Mutex::new(ErrorCode::Success),
            callbacks: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn current_code(&self) -> ErrorCode {
        *self.current.lock()
    }

    /// Registers (or replaces) the callback fired when `set_code` is
    /// called with `code`.
    pub fn on(&self, code: ErrorCode, callback: impl Fn(ErrorCode) + Send + Sync + 'static) {
        self.callbacks.lock().insert(code, Arc::new(callback));
    }

    /// Sets the current code and, if non-`Success`, dumps it and dispatches
    /// the matching callback (async fire-and-forget by default).
    pub fn set_code(&self, code: ErrorCode) {
        *self.current.lock() = code;
        if code.is_success() {
            return;
        }
        debug!(%code, "error registry: code set");
        self.dispatch(code, false);
    }

    /// Like [`ErrorRegistry::set_code`] but runs the matching callback on
    /// the calling thread/task instead of detaching it.
    pub fn set_code_sync(&self, code: ErrorCode) {
        *self.current.lock() = code;
        if code.is_success() {
            return;
        }
        self.dispatch(code, true);
    }

    fn dispatch(&self, code: ErrorCode, sync: bool) {
        let Some(callback) = self.callbacks.lock().get(&code).cloned() else {
            return;
        };
        if sync {
            callback(code);
        } else {
            let callback = Arc::clone(&callback);
            let outcome = std::thread::Builder::new()
                .name("transit-error-callback".into())
                .spawn(move || callback(code));
            if let Err(err) = outcome {
                warn!(%err, "failed to spawn error registry callback thread");
            }
        }
    }

    /// `is_error(code) = set_code(code); current_code() != Success`.
    pub fn is_error(&self, code: ErrorCode) -> bool {
        self.set_code(code);
        !self.current_code().is_success()
    }

    /// Copies callbacks and current code from `other`, matching the
    /// original's copy-assignment-from-`ErrorRegistry` semantics.
    pub fn assign_from(&self, other: &Self) {
        *self.current.lock() = other.current_code();
        *self.callbacks.lock() = other.callbacks.lock().clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn success_does_not_dispatch() {
        let registry = ErrorRegistry::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        registry.on(ErrorCode::Success, move |_| flag.store(true, Ordering::SeqCst));
        registry.set_code(ErrorCode::Success);
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn sync_dispatch_runs_inline() {
        let registry = ErrorRegistry::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        registry.on(ErrorCode::OwnerDead, move |_| flag.store(true, Ordering::SeqCst));
        registry.set_code_sync(ErrorCode::OwnerDead);
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn async_dispatch_eventually_runs() {
        let registry = ErrorRegistry::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        registry.on(ErrorCode::OwnerDead, move |_| flag.store(true, Ordering::SeqCst));
        registry.set_code(ErrorCode::OwnerDead);
        std::thread::sleep(Duration::from_millis(50));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn is_error_reports_non_success() {
        let registry = ErrorRegistry::new();
        assert!(registry.is_error(ErrorCode::TimedOut));
        assert!(!registry.is_error(ErrorCode::Success));
    }
}
