//! Structured logging initialization
//!
//! One line of JSON-ish structured output per event, filtered by the
//! `LOG_LEVEL` environment key (trace|debug|info|warn|error). `RUST_LOG`
//! still wins when set, for per-target filtering during development.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init_tracing() {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .unwrap_or_else(|| "info".to_string());

    let env_filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}
