//! Logging setup.
use crate::config::LoggingConfig;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter. Output goes to
/// stderr so tool responses on stdout stay machine readable. Calling this
/// more than once is harmless.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi)
        .with_target(true)
        .try_init();
}
