//! Log group and log stream discovery.

#![warn(clippy::all, rust_2018_idioms)]

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::Arc;

use crate::app::data_plane::cloudwatch_logs::{LogGroup, LogStream, LogsApi};
use crate::app::error::ConfigError;

/// Which groups and streams to merge.
///
/// Patterns are unanchored: a name is selected when the pattern matches
/// anywhere inside it.
#[derive(Debug, Clone)]
pub struct StreamSelector {
    pub group_pattern: Regex,
    pub stream_pattern: Regex,
    /// Streams whose last activity is at or before this instant are skipped
    pub min_last_activity: Option<DateTime<Utc>>,
}

impl StreamSelector {
    /// Compile both patterns. Fails before any network call is made.
    pub fn new(
        group_pattern: &str,
        stream_pattern: &str,
        min_last_activity: Option<DateTime<Utc>>,
    ) -> Result<Self, ConfigError> {
        let compile = |option: &'static str, pattern: &str| {
            Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                option,
                message: e.to_string(),
            })
        };

        Ok(Self {
            group_pattern: compile("log-groups", group_pattern)?,
            stream_pattern: compile("log-streams", stream_pattern)?,
            min_last_activity,
        })
    }

    pub fn matches_group(&self, group: &LogGroup) -> bool {
        self.group_pattern.is_match(&group.name)
    }

    pub fn matches_stream(&self, stream: &LogStream) -> bool {
        if !self.stream_pattern.is_match(&stream.name) {
            return false;
        }
        match (self.min_last_activity, stream.last_activity) {
            (Some(threshold), Some(activity)) => activity > threshold,
            _ => true,
        }
    }
}

/// Walks `DescribeLogGroups` and `DescribeLogStreams` to completion.
pub struct SourceDiscovery {
    api: Arc<dyn LogsApi>,
}

impl SourceDiscovery {
    pub fn new(api: Arc<dyn LogsApi>) -> Self {
        Self { api }
    }

    /// All groups whose name matches, in service order.
    pub async fn discover_groups(&self, selector: &StreamSelector) -> Result<Vec<LogGroup>> {
        let mut groups = Vec::new();
        let mut next_token = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .api
                .describe_log_groups(next_token.take())
                .await
                .with_context(|| format!("Failed to list log groups (page {})", pages + 1))?;
            pages += 1;

            groups.extend(
                page.groups
                    .into_iter()
                    .filter(|group| selector.matches_group(group)),
            );

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        trace_debug!(
            "Matched {} log groups across {} pages",
            groups.len(),
            pages
        );
        Ok(groups)
    }

    /// Matching streams of one group, in service order.
    pub async fn discover_streams(
        &self,
        group: &LogGroup,
        selector: &StreamSelector,
    ) -> Result<Vec<LogStream>> {
        let mut streams = Vec::new();
        let mut next_token = None;

        loop {
            let page = self
                .api
                .describe_log_streams(&group.name, next_token.take())
                .await
                .with_context(|| format!("Failed to list log streams for {}", group.name))?;

            streams.extend(
                page.streams
                    .into_iter()
                    .filter(|stream| selector.matches_stream(stream)),
            );

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        trace_debug!("{}: {} matching streams", group.name, streams.len());
        Ok(streams)
    }

    /// Every matching stream of every matching group. Order is service
    /// order, not sorted.
    pub async fn discover(&self, selector: &StreamSelector) -> Result<Vec<LogStream>> {
        let groups = self.discover_groups(selector).await?;

        let mut streams = Vec::new();
        for group in &groups {
            streams.extend(self.discover_streams(group, selector).await?);
        }

        trace_info!(
            "Discovered {} streams in {} log groups",
            streams.len(),
            groups.len()
        );
        Ok(streams)
    }
}
