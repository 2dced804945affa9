//! Time-ordered merge of many CloudWatch log streams.
//!
//! ## Pipeline
//!
//! ```text
//! Driver
//!   ├─ SourceDiscovery      DescribeLogGroups / DescribeLogStreams, regex filtered
//!   └─ MergeCoordinator     picks the earliest head each step
//!        └─ EventStreamAdapter × N   GetLogEvents pages, peek/advance, end cutoff
//! ```
//!
//! Everything runs on the caller's task. There is no background fetching: a
//! step that needs fresh data waits for exactly one page request.

#![warn(clippy::all, rust_2018_idioms)]

pub mod adapter;
pub mod discovery;
pub mod driver;
pub mod merge;
pub mod output;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{EventStreamAdapter, Peek, DEFAULT_POLL_INTERVAL};
pub use discovery::{SourceDiscovery, StreamSelector};
pub use driver::{Driver, DriverState, RunOutcome, TailRequest};
pub use merge::{MergeCoordinator, MergeStep, MergedEvent};
pub use output::{format_utc, EventSink, LineSink, OutputFormat};
