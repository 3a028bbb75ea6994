use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for the worker process.
///
/// Honors `RUST_LOG`; defaults to debug for this workspace's crates.
/// Calling it twice panics (the subscriber can only be set once), so the
/// binary entry point owns the single call.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "polytrack=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Tracing initialized");
}
