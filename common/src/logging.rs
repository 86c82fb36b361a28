use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs a global `tracing` subscriber and bridges the `log` facade into
/// it, so crates that log via `log::{info,warn,error}!` (as every other
/// Ember crate does, using a per-module `LOG_TARGET` constant) are captured
/// by the same sink as crates that use `tracing` directly.
///
/// Call once, early in `main`. Safe to call more than once in tests; later
/// calls are ignored.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
    let _ = tracing_log::LogTracer::init();
}
