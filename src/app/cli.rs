//! Command line surface.
//!
//! [`Cli`] is the raw clap parse. [`Cli::into_settings`] validates it and
//! resolves time expressions; everything that can be wrong with the
//! invocation is reported here, before any network call.

#![warn(clippy::all, rust_2018_idioms)]

use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use super::aws_config_file::{expand_home, DEFAULT_CONFIG_PATH, DEFAULT_PROFILE};
use super::error::ConfigError;
use super::log_merge::{OutputFormat, StreamSelector, TailRequest};
use super::time_window::{parse_time, TimeWindow};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_BRANCH"),
    "@",
    env!("GIT_COMMIT"),
    ")"
);

/// Merge CloudWatch Logs streams into one time-ordered output.
#[derive(Debug, Clone, Parser)]
#[command(name = "cwtail", version, long_version = LONG_VERSION, about)]
pub struct Cli {
    /// AWS profile in your AWS config file to use for credentials
    #[arg(long, env = "AWS_PROFILE", default_value = DEFAULT_PROFILE)]
    pub aws_profile: String,

    /// Path to AWS config file
    #[arg(long, env = "AWS_CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub aws_config_path: String,

    /// AWS region to query
    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    /// Regexp to match log groups against
    #[arg(short = 'g', long)]
    pub log_groups: String,

    /// Regexp to match log stream names against
    #[arg(short = 's', long, default_value = ".*")]
    pub log_streams: String,

    /// Time (relative or absolute) to begin logs at, or 'start'
    #[arg(short = 'b', long, allow_hyphen_values = true)]
    pub begin_at: String,

    /// Time (relative or absolute) to end logs at, or 'now'
    #[arg(
        short = 'e',
        long,
        allow_hyphen_values = true,
        conflicts_with = "tail",
        required_unless_present = "tail"
    )]
    pub end_at: Option<String>,

    /// Stream logs as they come in. Incompatible with --end-at
    #[arg(short = 't', long)]
    pub tail: bool,

    /// Seconds to wait between polls once every stream is caught up (--tail)
    #[arg(long, default_value_t = 2)]
    pub poll_interval: u64,

    /// Maximum events per GetLogEvents page (1-10000)
    #[arg(long)]
    pub page_size: Option<i32>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Append diagnostic logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Provide verbose debug information to stderr
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// A validated invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub profile: String,
    pub config_path: PathBuf,
    pub region: String,
    pub request: TailRequest,
    pub output: OutputFormat,
}

impl Cli {
    /// Validate options and resolve time expressions against `now`.
    pub fn into_settings(self, now: DateTime<Utc>) -> Result<Settings, ConfigError> {
        let start = parse_time(&self.begin_at, now)?;
        let end = match &self.end_at {
            Some(end_at) => parse_time(end_at, now)?,
            None => None,
        };

        if self.tail && end.is_some() {
            return Err(ConfigError::InvalidOption {
                option: "tail",
                message: "and --end-at are not compatible".to_string(),
            });
        }

        let window = TimeWindow::new(start, end)?;
        let selector = StreamSelector::new(&self.log_groups, &self.log_streams, start)?;

        if let Some(page_size) = self.page_size {
            if !(1..=10_000).contains(&page_size) {
                return Err(ConfigError::InvalidOption {
                    option: "page-size",
                    message: format!("must be between 1 and 10000, got {}", page_size),
                });
            }
        }

        if self.poll_interval == 0 {
            return Err(ConfigError::InvalidOption {
                option: "poll-interval",
                message: "must be at least 1 second".to_string(),
            });
        }

        let request = TailRequest::new(selector, window)
            .with_follow(self.tail)
            .with_poll_interval(Duration::from_secs(self.poll_interval))
            .with_page_limit(self.page_size);

        Ok(Settings {
            profile: self.aws_profile,
            config_path: expand_home(&self.aws_config_path),
            region: self.region,
            request,
            output: self.output,
        })
    }
}
