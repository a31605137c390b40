//! Logging utilities for the Courtside crates.
//!
//! All crates log through `tracing`. Binaries call [`init`] (or one of its
//! variants) once at startup; libraries never install a subscriber.

use std::path::Path;

use tracing::{error, info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crate targets that get the requested level when `RUST_LOG` is not set.
const COURTSIDE_TARGETS: &[&str] = &[
    "courtside_common",
    "courtside_config",
    "courtside_push",
    "courtside_device",
];

/// Initialize the tracing subscriber at INFO.
///
/// # Examples
///
/// ```
/// use courtside_common::logging;
///
/// logging::init();
/// // A second call is a no-op
/// logging::init_with_level(tracing::Level::DEBUG);
/// ```
pub fn init() {
    init_with_level(Level::INFO);
}

/// Initialize the tracing subscriber with a specific log level.
///
/// `RUST_LOG` takes precedence when it is set. Uses `try_init`, so calling
/// this after a global subscriber exists does nothing.
pub fn init_with_level(level: Level) {
    let result = tracing_subscriber::registry()
        .with(console_layer())
        .with(filter_for(level))
        .try_init();

    if result.is_ok() {
        info!("Logging initialized at level: {}", level);
    }
}

/// Initialize console logging plus a daily rolling file in `directory`.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for the lifetime of the process.
pub fn init_with_file(level: Level, directory: impl AsRef<Path>) -> WorkerGuard {
    let appender = tracing_appender::rolling::daily(directory.as_ref(), "courtside.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let result = tracing_subscriber::registry()
        .with(console_layer())
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(filter_for(level))
        .try_init();

    if result.is_ok() {
        info!(
            "Logging initialized at level: {} (file output in {})",
            level,
            directory.as_ref().display()
        );
    }
    guard
}

/// Parses a level name from configuration, falling back to INFO.
pub fn parse_level(name: &str) -> Level {
    name.trim().parse().unwrap_or(Level::INFO)
}

fn console_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_thread_names(true)
}

fn filter_for(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives = COURTSIDE_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect::<Vec<_>>()
            .join(",");
        EnvFilter::new(directives)
    })
}

/// Log an error with context at the ERROR level.
pub fn log_error<E: std::fmt::Display>(error: E, context: &str) {
    error!("{}: {}", context, error);
}

/// Log a result, with different messages for success and error cases.
///
/// Returns the original result so it can be used in a chain.
pub fn log_result<T, E: std::fmt::Display>(
    result: Result<T, E>,
    success_message: &str,
    error_context: &str,
) -> Result<T, E> {
    match &result {
        Ok(_) => info!("{}", success_message),
        Err(e) => error!("{}: {}", error_context, e),
    }
    result
}
