//! Tracing initialization for the pipeline's triggers.
//!
//! # Usage
//!
//! ```no_run
//! use tts_pipeline_common::tracing::init_tracing;
//!
//! init_tracing();
//! tracing::info!("Trigger started");
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls the log level and filtering. Examples:
//!   - `RUST_LOG=debug` - Enable debug logging for all modules
//!   - `RUST_LOG=tts_pipeline_synth=debug` - Enable debug for the synthesis trigger
//!   - `RUST_LOG=warn,tts_pipeline_common=debug` - Warn by default, debug for common

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn subscriber(
    default_level: &str,
) -> impl tracing::Subscriber + Send + Sync + 'static {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(fmt_layer)
}

/// Initialize the tracing subscriber with `RUST_LOG` filtering (default `info`).
///
/// # Panics
///
/// Panics if a global subscriber is already set.
pub fn init_tracing() {
    init_tracing_with_default("info");
}

/// Initialize tracing with a custom default level used when `RUST_LOG` is unset.
///
/// # Panics
///
/// Panics if a global subscriber is already set.
pub fn init_tracing_with_default(default_level: &str) {
    subscriber(default_level).init();
}

/// Try to initialize tracing, returning an error if already initialized.
///
/// Useful in tests, where several cases may race to install the subscriber.
pub fn try_init_tracing() -> Result<(), ()> {
    subscriber("info").try_init().map_err(|_| ())
}
