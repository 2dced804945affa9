//! CloudWatch Logs Data Types
//!
//! Discovery snapshots (groups, streams), log events, and the page shapes
//! returned by the three paginated API calls the merge engine relies on.

#![warn(clippy::all, rust_2018_idioms)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::time_window::from_wire_millis;

/// A log group. Identity is the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogGroup {
    pub name: String,
}

impl LogGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A log stream inside a group.
///
/// The group is embedded by name; groups are immutable discovery snapshots so
/// a copy of the identifying name is all a stream needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStream {
    pub group_name: String,
    pub name: String,
    /// Latest activity reported by the service. `None` when the service
    /// reported no timestamps at all (treated as active).
    pub last_activity: Option<DateTime<Utc>>,
}

impl LogStream {
    pub fn new(
        group_name: impl Into<String>,
        name: impl Into<String>,
        last_activity: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            group_name: group_name.into(),
            name: name.into(),
            last_activity,
        }
    }

    /// `group/stream`, used in log lines
    pub fn display_name(&self) -> String {
        format!("{}/{}", self.group_name, self.name)
    }
}

/// A single log event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Event time
    pub timestamp: DateTime<Utc>,
    /// Time the service received the event
    pub ingestion_time: DateTime<Utc>,
    /// Log message content
    pub message: String,
}

impl LogEvent {
    pub fn new(timestamp: DateTime<Utc>, ingestion_time: DateTime<Utc>, message: String) -> Self {
        Self {
            timestamp,
            ingestion_time,
            message,
        }
    }

    /// Build an event from wire milliseconds. Out-of-range values clamp to the epoch.
    pub fn from_wire(timestamp_ms: i64, ingestion_time_ms: i64, message: String) -> Self {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        Self {
            timestamp: from_wire_millis(timestamp_ms).unwrap_or(epoch),
            ingestion_time: from_wire_millis(ingestion_time_ms).unwrap_or(epoch),
            message,
        }
    }
}

/// Parameters of one `GetLogEvents` page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetEventsRequest {
    pub log_group_name: String,
    pub log_stream_name: String,
    pub start_from_head: bool,
    /// Start time (Unix timestamp in milliseconds)
    pub start_time: Option<i64>,
    /// End time (Unix timestamp in milliseconds)
    pub end_time: Option<i64>,
    /// Maximum number of events to return in one page
    pub limit: Option<i32>,
    /// Forward token from the previous page
    pub next_token: Option<String>,
}

impl GetEventsRequest {
    pub fn new(log_group_name: impl Into<String>, log_stream_name: impl Into<String>) -> Self {
        Self {
            log_group_name: log_group_name.into(),
            log_stream_name: log_stream_name.into(),
            start_from_head: true,
            start_time: None,
            end_time: None,
            limit: None,
            next_token: None,
        }
    }

    pub fn with_start_time(mut self, start_time: Option<i64>) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn with_end_time(mut self, end_time: Option<i64>) -> Self {
        self.end_time = end_time;
        self
    }

    pub fn with_limit(mut self, limit: Option<i32>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_next_token(mut self, next_token: Option<String>) -> Self {
        self.next_token = next_token;
        self
    }
}

/// One page of `DescribeLogGroups`
#[derive(Debug, Clone, Default)]
pub struct LogGroupPage {
    pub groups: Vec<LogGroup>,
    pub next_token: Option<String>,
}

/// One page of `DescribeLogStreams`
#[derive(Debug, Clone, Default)]
pub struct LogStreamPage {
    pub streams: Vec<LogStream>,
    pub next_token: Option<String>,
}

/// One page of `GetLogEvents`
#[derive(Debug, Clone, Default)]
pub struct LogEventPage {
    pub events: Vec<LogEvent>,
    /// The service returns the token that was sent once the stream is drained
    pub next_forward_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_get_events_request_builder() {
        let request = GetEventsRequest::new("/app/prod", "web-1")
            .with_start_time(Some(1_000))
            .with_end_time(Some(11_000))
            .with_limit(Some(500))
            .with_next_token(Some("f/123".to_string()));

        assert!(request.start_from_head);
        assert_eq!(request.start_time, Some(1_000));
        assert_eq!(request.end_time, Some(11_000));
        assert_eq!(request.limit, Some(500));
        assert_eq!(request.next_token.as_deref(), Some("f/123"));
    }

    #[test]
    fn test_log_event_from_wire() {
        let event = LogEvent::from_wire(1_234_567_890_123, 1_234_567_890_456, "hello".to_string());

        assert_eq!(event.timestamp.timestamp_millis(), 1_234_567_890_123);
        assert_eq!(event.ingestion_time.timestamp_millis(), 1_234_567_890_456);
        assert_eq!(event.message, "hello");
    }

    #[test]
    fn test_stream_display_name() {
        let stream = LogStream::new(
            "/app/prod",
            "web-1",
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        );
        assert_eq!(stream.display_name(), "/app/prod/web-1");
    }

    #[test]
    fn test_log_event_serialization() {
        let event = LogEvent::from_wire(1000, 2000, "msg1".to_string());

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("msg1"));

        let deserialized: LogEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }
}
