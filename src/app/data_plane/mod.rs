//! Data Plane Services Module
//!
//! AWS data plane integrations. Data plane calls read data held inside AWS
//! resources (here: log events), as opposed to control plane operations.
//!
//! ## Available Services
//!
//! - **CloudWatch Logs**: discover log groups and streams, page through events

pub mod cloudwatch_logs;

// Re-export commonly used types
pub use cloudwatch_logs::{CloudWatchLogsClient, LogsApi};
