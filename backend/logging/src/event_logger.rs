//! Query Event Logger
//!
//! One structured event per executed query, emitted on the `query_events`
//! target so it can be routed separately from diagnostic logs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_url;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum QueryEvent {
    Executed {
        request_id: String,
        operation: Option<String>,
        duration_ms: u64,
        errors: Vec<String>,
    },
    TimedOut {
        request_id: String,
        timeout_ms: u64,
    },
}

impl QueryEvent {
    /// Error messages quote the URLs that failed; scrub them.
    fn redacted(mut self) -> Self {
        if let QueryEvent::Executed { errors, .. } = &mut self {
            for message in errors.iter_mut() {
                *message = redact_url(message);
            }
        }
        self
    }
}

#[derive(Debug, Serialize)]
pub struct QueryEventEntry {
    pub timestamp: DateTime<Utc>,
    pub event: QueryEvent,
}

pub struct QueryEventLogger;

impl QueryEventLogger {
    pub fn entry(event: QueryEvent) -> QueryEventEntry {
        QueryEventEntry {
            timestamp: Utc::now(),
            event: event.redacted(),
        }
    }

    pub fn log_event(event: QueryEvent) {
        let entry = Self::entry(event);
        match serde_json::to_string(&entry) {
            Ok(json) => info!(target: "query_events", event = %json, "Query event"),
            Err(e) => info!(target: "query_events", event = ?entry, error = %e, "Query event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_redacts_error_messages() {
        let entry = QueryEventLogger::entry(QueryEvent::Executed {
            request_id: "r1".into(),
            operation: None,
            duration_ms: 12,
            errors: vec!["failed to fetch https://u:p@host.test/?token=abc: status 500".into()],
        });
        match entry.event {
            QueryEvent::Executed { errors, .. } => assert_eq!(
                errors[0],
                "failed to fetch https://[REDACTED]@host.test/?token=[REDACTED]: status 500"
            ),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(QueryEvent::TimedOut {
            request_id: "r2".into(),
            timeout_ms: 30_000,
        })
        .unwrap();
        assert_eq!(json["type"], "TimedOut");
        assert_eq!(json["timeout_ms"], 30_000);
    }
}
