//! Core modules for cwtail.
//!
//! # Module Organization
//!
//! ## Merge engine
//! - [`log_merge`] - discovery, per-stream adapters, the k-way merge and the run driver
//! - [`time_window`] - time expressions and the query window
//!
//! ## AWS Integration
//! - [`data_plane`] - CloudWatch Logs types and the paginated API client
//! - [`credentials`] - one-shot credential acquisition and SDK config
//! - [`aws_config_file`] - AWS shared config file profiles
//!
//! ## Invocation
//! - [`cli`] - command line options and validation
//! - [`error`] - configuration errors reported before any network call

pub mod aws_config_file;
pub mod cli;
pub mod credentials;
pub mod data_plane;
pub mod error;
pub mod log_merge;
pub mod time_window;

pub use error::ConfigError;
