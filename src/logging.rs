//! Structured logging setup.
//!
//! Grounded on `init_tracing()` in
//! `examples/cooprefr-bettersys/rust-backend/src/main.rs`: a
//! `tracing_subscriber::registry()` with an `EnvFilter` and an `fmt`
//! layer, with the filter additionally wrapped in a `reload::Handle` so
//! the `l+`/`l-` console commands can adjust verbosity at runtime
//! without restarting.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{reload, EnvFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogConfig;

pub type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// Installs the global subscriber and returns a handle for runtime
/// level changes. Must be called exactly once, before any other
/// component logs.
pub fn init(config: &LogConfig) -> ReloadHandle {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    handle
}

/// Steps the filter one level more verbose (`l+`). Clamped at `TRACE`.
pub fn level_up(handle: &ReloadHandle) {
    step(handle, 1);
}

/// Steps the filter one level less verbose (`l-`). Clamped at `ERROR`.
pub fn level_down(handle: &ReloadHandle) {
    step(handle, -1);
}

const LEVELS: [LevelFilter; 5] = [
    LevelFilter::ERROR,
    LevelFilter::WARN,
    LevelFilter::INFO,
    LevelFilter::DEBUG,
    LevelFilter::TRACE,
];

fn step(handle: &ReloadHandle, delta: i32) {
    let _ = handle.modify(|filter| {
        let current = LEVELS
            .iter()
            .position(|lvl| filter.to_string() == lvl.to_string())
            .unwrap_or(2);
        let next = (current as i32 + delta).clamp(0, LEVELS.len() as i32 - 1) as usize;
        *filter = EnvFilter::new(LEVELS[next].to_string());
    });
}
