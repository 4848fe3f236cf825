//! Telemetry and structured logging for pagegraph.
//!
//! Handles subscriber setup (console + rolling NDJSON file), URL redaction and
//! structured query event logging.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{QueryEvent, QueryEventEntry, QueryEventLogger};
pub use logger::{LogConfig, init_logger};
pub use redact::redact_url;
