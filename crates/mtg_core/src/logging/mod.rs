//! Logging infrastructure for Meeting Analyzer.
//!
//! This module provides:
//! - Per-run loggers with file + callback dual output
//! - Compact mode with item-progress filtering
//! - Tail buffer of external tool output for failure diagnosis
//! - Integration with the `tracing` ecosystem
//!
//! # Example
//!
//! ```no_run
//! use mtg_core::logging::{LogConfig, RunLogger};
//!
//! let logger = RunLogger::new("Roadmap Sync", "output/logs", LogConfig::default(), None).unwrap();
//!
//! logger.phase("Extracting video frames");
//! logger.command("ffmpeg -i meeting.mp4 ...");
//! logger.progress("Analyzing frames", 3, 10);
//! logger.success("Run completed");
//! ```

mod run_logger;
mod types;

pub use run_logger::{sanitize_filename, RunLogger, RunLoggerBuilder};
pub use types::{LineKind, LogConfig, LogLevel, LogLineCallback};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// This sets up a subscriber that:
/// - Respects RUST_LOG environment variable
/// - Falls back to the provided default level
/// - Outputs to stderr
///
/// Should be called once at application startup; later calls are ignored.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .try_init();
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_to_filter_works() {
        assert_eq!(LogLevel::Debug.as_filter_str(), "debug");
        assert_eq!(LogLevel::Info.as_filter_str(), "info");
    }

    #[test]
    fn init_tracing_twice_is_harmless() {
        init_test_tracing();
        init_tracing(LogLevel::Warn);
    }
}
