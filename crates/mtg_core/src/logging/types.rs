//! Log levels, run logger configuration, and line markers.

use serde::{Deserialize, Serialize};

/// Minimum severity written to the run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Filter directive understood by `EnvFilter`.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Run logger behavior, usually built from
/// [`LoggingSettings::to_log_config`](crate::config::LoggingSettings::to_log_config).
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Log item progress only at `progress_step` percent boundaries and keep
    /// tool output out of the log body.
    pub compact: bool,
    pub progress_step: u32,
    /// Tool output lines kept for the failure tail.
    pub error_tail: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            compact: true,
            progress_step: 20,
            error_tail: 20,
        }
    }
}

/// Callback receiving each formatted log line.
pub type LogLineCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Kind of run log line, rendered with its marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// `$ ffprobe ...`
    Command,
    /// `=== Step 2/6: Transcribing audio ===`
    Stage,
    /// `--- Summary ---`
    Section,
    Success,
    Degraded,
    Warning,
    Error,
}

impl LineKind {
    fn markers(self) -> (&'static str, &'static str) {
        match self {
            LineKind::Command => ("$ ", ""),
            LineKind::Stage => ("=== ", " ==="),
            LineKind::Section => ("--- ", " ---"),
            LineKind::Success => ("[SUCCESS] ", ""),
            LineKind::Degraded => ("[DEGRADED] ", ""),
            LineKind::Warning => ("[WARNING] ", ""),
            LineKind::Error => ("[ERROR] ", ""),
        }
    }

    pub fn format(self, message: &str) -> String {
        let (open, close) = self.markers();
        format!("{open}{message}{close}")
    }
}
