//! Development helper: initialize a tracing subscriber when `RUST_LOG` is
//! set. Integration tests call `transit::dev_tracing::init_tracing()` to get
//! structured logs out of the runtime/session/acceptor spans while
//! debugging a flaky scenario; it is a no-op otherwise.

pub fn init_tracing() {
    use std::env;

    if env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}
