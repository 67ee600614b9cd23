//! Logging and tracing initialization.
//!
//! Logs go to stderr (or the configured file) so command output on stdout
//! stays machine readable.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured level. Calling this twice is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file = config.file.as_ref().and_then(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| eprintln!("Failed to open log file {}: {e}", path.display()))
            .ok()
    });

    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    let installed = match (file, config.json) {
        (Some(file), true) => tracing::subscriber::set_global_default(
            builder.json().with_writer(std::sync::Mutex::new(file)).finish(),
        ),
        (Some(file), false) => tracing::subscriber::set_global_default(
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .finish(),
        ),
        (None, true) => tracing::subscriber::set_global_default(
            builder.json().with_writer(std::io::stderr).finish(),
        ),
        (None, false) => tracing::subscriber::set_global_default(
            builder.with_writer(std::io::stderr).finish(),
        ),
    };
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
