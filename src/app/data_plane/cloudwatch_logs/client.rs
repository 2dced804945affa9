//! CloudWatch Logs Client Wrapper
//!
//! [`LogsApi`] is the page-level view of the three CloudWatch Logs calls the
//! merge engine needs. [`CloudWatchLogsClient`] implements it on top of the
//! AWS SDK; tests implement it in memory.

#![warn(clippy::all, rust_2018_idioms)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_cloudwatchlogs as cloudwatchlogs;

use crate::app::time_window::from_wire_millis;

use super::types::{
    GetEventsRequest, LogEvent, LogEventPage, LogGroup, LogGroupPage, LogStream, LogStreamPage,
};

/// Paginated access to CloudWatch Logs.
///
/// Each call fetches exactly one page. Callers drain pagination themselves by
/// passing back the returned token.
#[async_trait]
pub trait LogsApi: Send + Sync {
    /// One page of `DescribeLogGroups`
    async fn describe_log_groups(&self, next_token: Option<String>) -> Result<LogGroupPage>;

    /// One page of `DescribeLogStreams` for a group
    async fn describe_log_streams(
        &self,
        log_group_name: &str,
        next_token: Option<String>,
    ) -> Result<LogStreamPage>;

    /// One page of `GetLogEvents`
    async fn get_log_events(&self, request: &GetEventsRequest) -> Result<LogEventPage>;
}

/// CloudWatch Logs client wrapper
#[derive(Clone, Debug)]
pub struct CloudWatchLogsClient {
    client: cloudwatchlogs::Client,
}

impl CloudWatchLogsClient {
    /// Create a new CloudWatch Logs client from a loaded SDK config
    pub fn new(aws_config: &aws_types::SdkConfig) -> Self {
        Self {
            client: cloudwatchlogs::Client::new(aws_config),
        }
    }
}

/// Latest of the activity timestamps the service reports for a stream.
fn last_activity(stream: &cloudwatchlogs::types::LogStream) -> Option<i64> {
    [
        stream.last_event_timestamp,
        stream.last_ingestion_time,
    ]
    .into_iter()
    .flatten()
    .max()
    .or(stream.creation_time)
}

#[async_trait]
impl LogsApi for CloudWatchLogsClient {
    async fn describe_log_groups(&self, next_token: Option<String>) -> Result<LogGroupPage> {
        let response = self
            .client
            .describe_log_groups()
            .set_next_token(next_token)
            .send()
            .await
            .with_context(|| "Failed to list log groups")?;

        let mut groups = Vec::new();

        if let Some(aws_groups) = response.log_groups {
            for group in aws_groups {
                if let Some(name) = group.log_group_name {
                    groups.push(LogGroup::new(name));
                }
            }
        }

        Ok(LogGroupPage {
            groups,
            next_token: response.next_token,
        })
    }

    async fn describe_log_streams(
        &self,
        log_group_name: &str,
        next_token: Option<String>,
    ) -> Result<LogStreamPage> {
        let response = self
            .client
            .describe_log_streams()
            .log_group_name(log_group_name)
            .set_next_token(next_token)
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to list log streams for log group: {}",
                    log_group_name
                )
            })?;

        let mut streams = Vec::new();

        if let Some(aws_streams) = response.log_streams {
            for stream in aws_streams {
                let activity = last_activity(&stream).and_then(from_wire_millis);
                if let Some(name) = stream.log_stream_name {
                    streams.push(LogStream::new(log_group_name, name, activity));
                }
            }
        }

        Ok(LogStreamPage {
            streams,
            next_token: response.next_token,
        })
    }

    async fn get_log_events(&self, request: &GetEventsRequest) -> Result<LogEventPage> {
        let response = self
            .client
            .get_log_events()
            .log_group_name(&request.log_group_name)
            .log_stream_name(&request.log_stream_name)
            .start_from_head(request.start_from_head)
            .set_start_time(request.start_time)
            .set_end_time(request.end_time)
            .set_limit(request.limit)
            .set_next_token(request.next_token.clone())
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to get log events from {}/{}",
                    request.log_group_name, request.log_stream_name
                )
            })?;

        let events = response
            .events
            .unwrap_or_default()
            .into_iter()
            .map(|event| {
                LogEvent::from_wire(
                    event.timestamp.unwrap_or(0),
                    event.ingestion_time.unwrap_or(0),
                    event.message.unwrap_or_default(),
                )
            })
            .collect();

        Ok(LogEventPage {
            events,
            next_forward_token: response.next_forward_token,
        })
    }
}
