// Tracing initialization with a log level that can be switched after config load.
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

pub fn init_tracing() {
    init_tracing_with_level("info");
}

pub fn init_tracing_with_level(level: &str) {
    // RUST_LOG wins over the configured level when it parses
    let base_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let (reload_layer, handle) = reload::Layer::new(base_filter);
    let _ = LOG_RELOAD_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Switch the active filter to `level`.
///
/// Returns `false` when tracing was not initialized through this module or
/// the level does not parse. An explicit `RUST_LOG` is left in place.
pub fn apply_logging_level(level: &str) -> bool {
    if std::env::var_os("RUST_LOG").is_some() {
        return false;
    }
    let Some(handle) = LOG_RELOAD_HANDLE.get() else {
        return false;
    };
    let Ok(filter) = EnvFilter::try_new(level) else {
        tracing::warn!(level, "Ignoring unparsable logging level");
        return false;
    };
    handle.modify(|f| *f = filter).is_ok()
}

pub fn shutdown_tracing() {
    tracing::info!("marquee shutting down");
}
