//! Tracing initialization with a runtime-reloadable log level.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

/// Initializes the global tracing subscriber, reading `RUST_LOG` and
/// falling back to `"info"`.
pub fn init_tracing() {
    init_tracing_with_level("info");
}

pub fn init_tracing_with_level(level: &str) {
    let base_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let (reload_layer, handle) = reload::Layer::new(base_filter);
    let _ = LOG_RELOAD_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer())
        .try_init();
}

/// Applies a new logging level at runtime, if the reload handle has been
/// set up by [`init_tracing`].
pub fn apply_logging_level(level: &str) {
    if let Some(handle) = LOG_RELOAD_HANDLE.get() {
        let _ = handle.modify(|f| *f = EnvFilter::new(level));
    }
}

pub fn shutdown_tracing() {
    // No exporter is wired up; nothing to flush.
}
