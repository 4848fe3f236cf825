//! Structured Logger
//!
//! Wraps `tracing` to provide console output (plain or JSON), optional daily
//! rolling NDJSON files, and environment-based level control.

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, fmt, fmt::writer::BoxMakeWriter, layer::SubscriberExt, util::SubscriberInitExt,
};

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit console lines as JSON instead of human-readable text.
    pub json: bool,
    /// Directory for `pagegraph.log.YYYY-MM-DD` files; no file output when unset.
    pub log_dir: Option<PathBuf>,
    /// Write console lines to stderr, leaving stdout for command output.
    pub stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            log_dir: None,
            stderr: false,
        }
    }
}

/// Initialize the global structured logger. Later calls are no-ops.
pub fn init_logger(config: &LogConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let console_writer = || {
        if config.stderr {
            BoxMakeWriter::new(std::io::stderr)
        } else {
            BoxMakeWriter::new(std::io::stdout)
        }
    };

    let console_json = config.json.then(|| {
        fmt::layer()
            .json()
            .with_writer(console_writer())
            .with_target(false)
    });
    let console_plain = (!config.json).then(|| {
        fmt::layer()
            .with_writer(console_writer())
            .with_target(false)
            .with_ansi(!config.stderr)
    });

    let file_layer = config.log_dir.as_ref().map(|dir| {
        let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, "pagegraph.log");
        fmt::layer()
            .json()
            .with_writer(file_appender)
            .with_ansi(false)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_json)
        .with(console_plain)
        .with(file_layer)
        .try_init();
}
