//! Logging initialization for the cleaner binaries.
//!
//! Structured logging via `tracing`. Binaries call [`init_logging`] once at
//! startup; the level comes from the `GCRCLEANER_LOG` environment variable
//! (mapped through [`directive_for`]) unless `RUST_LOG` overrides it.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (server mode).
    Json,
    /// Pretty-printed logs (interactive use).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Safe to call multiple times; subsequent calls are no-ops. `RUST_LOG`
/// takes precedence over `default_directive` when set.
pub fn init_logging(format: LogFormat, default_directive: &str) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer())
                    .init();
            }
        }
    });
}

/// Maps a `GCRCLEANER_LOG` value (`DEBUG|INFO|WARNING|ERROR`, any case) to a
/// filter directive. Unknown or empty values fall back to `info`.
#[must_use]
pub fn directive_for(level: &str) -> &'static str {
    match level.trim().to_ascii_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" | "WARN" => "warn",
        "ERROR" => "error",
        _ => "info",
    }
}
