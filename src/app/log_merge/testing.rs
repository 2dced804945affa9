//! In-memory `LogsApi` used by the engine's unit tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::app::data_plane::cloudwatch_logs::{
    GetEventsRequest, LogEvent, LogEventPage, LogGroup, LogGroupPage, LogStream, LogStreamPage,
    LogsApi,
};

/// Paginated fake of CloudWatch Logs.
///
/// Events are served `page_size` at a time using `f/<offset>` forward tokens.
/// Once a stream is drained the token that was sent comes back unchanged, the
/// same way the service signals the end of a stream.
#[derive(Default)]
pub struct FakeLogsApi {
    pub group_pages: Vec<Vec<LogGroup>>,
    pub stream_pages: HashMap<String, Vec<Vec<LogStream>>>,
    events: Mutex<HashMap<(String, String), Vec<LogEvent>>>,
    failing_streams: Vec<(String, String)>,
    pub page_size: usize,
    pub requests: Mutex<Vec<GetEventsRequest>>,
    pub group_calls: Mutex<usize>,
}

impl FakeLogsApi {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    pub fn with_group_page(mut self, names: &[&str]) -> Self {
        self.group_pages
            .push(names.iter().map(|name| LogGroup::new(*name)).collect());
        self
    }

    pub fn with_stream_page(mut self, group: &str, streams: Vec<LogStream>) -> Self {
        self.stream_pages
            .entry(group.to_string())
            .or_default()
            .push(streams);
        self
    }

    /// Register events for a stream given as `(timestamp_ms, message)` pairs.
    pub fn with_events(self, group: &str, stream: &str, events: &[(i64, &str)]) -> Self {
        self.append_events(group, stream, events);
        self
    }

    pub fn with_failing_stream(mut self, group: &str, stream: &str) -> Self {
        self.failing_streams
            .push((group.to_string(), stream.to_string()));
        self
    }

    /// Simulate new data arriving in a stream.
    pub fn append_events(&self, group: &str, stream: &str, events: &[(i64, &str)]) {
        let mut all = self.events.lock().unwrap();
        let entry = all
            .entry((group.to_string(), stream.to_string()))
            .or_default();
        for (timestamp, message) in events {
            entry.push(LogEvent::from_wire(*timestamp, *timestamp + 1, message.to_string()));
        }
    }

    pub fn event_requests(&self) -> Vec<GetEventsRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn event_requests_for(&self, stream: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.log_stream_name == stream)
            .count()
    }
}

fn parse_token(token: Option<&str>) -> Result<usize> {
    match token {
        None => Ok(0),
        Some(token) => token
            .strip_prefix("f/")
            .and_then(|offset| offset.parse().ok())
            .ok_or_else(|| anyhow!("bad token {}", token)),
    }
}

fn paged<T: Clone>(pages: &[Vec<T>], next_token: Option<String>) -> Result<(Vec<T>, Option<String>)> {
    let index = parse_token(next_token.as_deref())?;
    let page = pages.get(index).cloned().unwrap_or_default();
    let next = (index + 1 < pages.len()).then(|| format!("f/{}", index + 1));
    Ok((page, next))
}

#[async_trait]
impl LogsApi for FakeLogsApi {
    async fn describe_log_groups(&self, next_token: Option<String>) -> Result<LogGroupPage> {
        *self.group_calls.lock().unwrap() += 1;
        let (groups, next_token) = paged(&self.group_pages, next_token)?;
        Ok(LogGroupPage { groups, next_token })
    }

    async fn describe_log_streams(
        &self,
        log_group_name: &str,
        next_token: Option<String>,
    ) -> Result<LogStreamPage> {
        let pages = self
            .stream_pages
            .get(log_group_name)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let (streams, next_token) = paged(pages, next_token)?;
        Ok(LogStreamPage {
            streams,
            next_token,
        })
    }

    async fn get_log_events(&self, request: &GetEventsRequest) -> Result<LogEventPage> {
        self.requests.lock().unwrap().push(request.clone());

        let key = (
            request.log_group_name.clone(),
            request.log_stream_name.clone(),
        );
        if self.failing_streams.contains(&key) {
            return Err(anyhow!("ServiceUnavailableException for {}", key.1));
        }

        let all = self.events.lock().unwrap();
        let in_range: Vec<&LogEvent> = all
            .get(&key)
            .map(|events| {
                events
                    .iter()
                    .filter(|event| {
                        let millis = event.timestamp.timestamp_millis();
                        request.start_time.map_or(true, |start| millis >= start)
                            && request.end_time.map_or(true, |end| millis < end)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let offset = parse_token(request.next_token.as_deref())?;
        let limit = request
            .limit
            .map(|limit| limit as usize)
            .unwrap_or(self.page_size)
            .min(self.page_size);
        let events: Vec<LogEvent> = in_range
            .iter()
            .skip(offset)
            .take(limit)
            .map(|event| (*event).clone())
            .collect();

        let next_forward_token = if events.is_empty() {
            request
                .next_token
                .clone()
                .or_else(|| Some(format!("f/{}", offset)))
        } else {
            Some(format!("f/{}", offset + events.len()))
        };

        Ok(LogEventPage {
            events,
            next_forward_token,
        })
    }
}
