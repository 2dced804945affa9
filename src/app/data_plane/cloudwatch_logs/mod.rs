//! CloudWatch Logs Integration Module
//!
//! The remote side of the merge engine: discovery snapshots, event types and
//! page-level access to `DescribeLogGroups`, `DescribeLogStreams` and
//! `GetLogEvents`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cwtail::app::data_plane::cloudwatch_logs::{CloudWatchLogsClient, GetEventsRequest, LogsApi};
//!
//! # async fn example(sdk_config: aws_types::SdkConfig) -> anyhow::Result<()> {
//! let client = CloudWatchLogsClient::new(&sdk_config);
//!
//! let request = GetEventsRequest::new("/aws/lambda/my-function", "2024/01/01/[$LATEST]abc");
//! let page = client.get_log_events(&request).await?;
//!
//! for event in page.events {
//!     println!("{}: {}", event.timestamp, event.message);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all, rust_2018_idioms)]

pub mod client;
pub mod types;

// Re-export commonly used types
pub use client::{CloudWatchLogsClient, LogsApi};
pub use types::{
    GetEventsRequest, LogEvent, LogEventPage, LogGroup, LogGroupPage, LogStream, LogStreamPage,
};
