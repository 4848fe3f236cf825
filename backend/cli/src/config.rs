use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use logging::LogConfig;
use pagegraph_source::{HttpSourceConfig, DEFAULT_MAX_BODY_BYTES, DEFAULT_USER_AGENT};

/// pagegraph runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server bind address
    pub bind_address: String,
    /// HTTP server port
    pub port: u16,
    /// Log level
    pub log_level: String,
    /// Emit JSON log lines on the console
    pub log_json: bool,
    /// Directory for rolling log files
    pub log_dir: Option<PathBuf>,
    /// Per-request deadline, fetches included
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_body_bytes: usize,
    /// Pretty-print JSON responses
    pub pretty: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_json: false,
            log_dir: None,
            request_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            pretty: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |key: &str| lookup(key).and_then(|v| parse_bool(&v));

        Self {
            bind_address: lookup("PAGEGRAPH_BIND").unwrap_or(defaults.bind_address),
            port: parsed(&lookup, "PAGEGRAPH_PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_json: flag("PAGEGRAPH_LOG_JSON").unwrap_or(defaults.log_json),
            log_dir: lookup("PAGEGRAPH_LOG_DIR")
                .filter(|d| !d.is_empty())
                .map(PathBuf::from),
            request_timeout_secs: parsed::<u64>(&lookup, "PAGEGRAPH_REQUEST_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.request_timeout_secs),
            user_agent: lookup("PAGEGRAPH_USER_AGENT").unwrap_or(defaults.user_agent),
            max_body_bytes: parsed(&lookup, "PAGEGRAPH_MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            pretty: flag("PAGEGRAPH_PRETTY").unwrap_or(defaults.pretty),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `stderr` keeps stdout clean for commands that print results.
    pub fn log_config(&self, stderr: bool) -> LogConfig {
        LogConfig {
            level: self.log_level.clone(),
            json: self.log_json,
            log_dir: self.log_dir.clone(),
            stderr,
        }
    }

    pub fn source_config(&self) -> HttpSourceConfig {
        HttpSourceConfig {
            user_agent: self.user_agent.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
