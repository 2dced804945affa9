//! cwtail - merge CloudWatch Logs streams into one time-ordered output
//!
//! cwtail discovers log streams by name pattern and prints their events as a
//! single sequence ordered by event timestamp, either for a fixed time window
//! or continuously (`--tail`).
//!
//! # Architecture Overview
//!
//! - **Discovery** ([`app::log_merge::discovery`]): drains `DescribeLogGroups`
//!   and `DescribeLogStreams`, filtering names by regex and streams by last
//!   activity
//! - **Adapters** ([`app::log_merge::adapter`]): one lazy, peekable reader per
//!   stream over paginated `GetLogEvents`, cut off at the window end
//! - **Merge** ([`app::log_merge::merge`]): streaming k-way merge that always
//!   emits the earliest pending event, ties broken by registration order
//! - **Driver** ([`app::log_merge::driver`]): runs the pull loop and handles
//!   cancellation and follow-mode polling
//!
//! The remote API sits behind [`app::data_plane::cloudwatch_logs::LogsApi`], so
//! the engine runs unchanged against the AWS SDK or an in-memory fake.
//!
//! Execution is sequential on one task: no background fetches, one page
//! request in flight at a time, memory bounded by one page per stream.

#![warn(clippy::all, rust_2018_idioms)]

// Include logging macros first
#[macro_use]
pub mod logging_macros;

pub mod app;
