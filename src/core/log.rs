//! Logging module
//!
//! Structured logging built on `tracing`.
//!
//! # Features
//!
//! - Structured fields: key-value pairs alongside the message
//! - Console output, with optional daily-rolling file output
//! - Log levels: trace, debug, info, warn, error
//!
//! # Example
//!
//! ```no_run
//! use toast_render::core::config::LogLevel;
//! use toast_render::core::log;
//!
//! // Console only
//! log::init_logger(LogLevel::Info, false, None);
//!
//! tracing::info!("Renderer started");
//! tracing::info!(width = 800, height = 600, "Window created");
//! ```

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use std::path::Path;

use super::config::LogLevel;

/// Initialize the logging system
///
/// Must be called exactly once at startup.
///
/// # Arguments
///
/// * `level` - minimum log level
/// * `file_output` - whether to also write to a file
/// * `log_file_path` - log file path (defaults to "toast_render.log")
///
/// # Example
///
/// ```no_run
/// use toast_render::core::config::LogLevel;
/// use toast_render::core::log;
///
/// // Console and file output
/// log::init_logger(LogLevel::Debug, true, Some("logs/toast.log"));
/// ```
pub fn init_logger(level: LogLevel, file_output: bool, log_file_path: Option<&str>) {
    let filter = match level {
        LogLevel::Trace => EnvFilter::new("trace"),
        LogLevel::Debug => EnvFilter::new("debug"),
        LogLevel::Info => EnvFilter::new("info"),
        LogLevel::Warn => EnvFilter::new("warn"),
        LogLevel::Error => EnvFilter::new("error"),
    };

    if file_output {
        // Split the configured path into directory and file name
        let log_path = log_file_path.unwrap_or("toast_render.log");
        let path = Path::new(log_path);
        let directory = path.parent().unwrap_or(Path::new("."));
        let filename = path.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("toast_render.log");

        let file_appender = RollingFileAppender::new(
            Rotation::DAILY,
            directory,
            filename
        );

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_ansi(true);

        let file_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_ansi(false)  // no ANSI colors in files
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .with(file_layer)
            .init();
    } else {
        // Console only
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

/// Initialize console-only logging at the default Info level
#[allow(dead_code)]
pub fn init_simple() {
    init_logger(LogLevel::Info, false, None);
}

/// Log level conversion
impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(Level::from(LogLevel::Info), Level::INFO);
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
    }
}
