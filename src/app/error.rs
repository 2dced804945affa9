//! Configuration errors.
//!
//! Everything here is detected before the first network call and maps to
//! exit code 2. Runtime failures (API errors) travel as plain `anyhow::Error`.

#![warn(clippy::all, rust_2018_idioms)]

use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A time expression could not be parsed
    InvalidTime(String),
    /// `--begin-at` is not before `--end-at`
    EmptyWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// A name pattern failed to compile
    InvalidPattern { option: &'static str, message: String },
    /// An option value is out of range or inconsistent with another
    InvalidOption { option: &'static str, message: String },
    /// The AWS config file exists but could not be read or parsed
    ConfigFile { path: String, message: String },
    /// No credential source produced credentials
    NoCredentials { profile: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidTime(input) => {
                write!(f, "unable to parse time expression: '{}'", input)
            }
            ConfigError::EmptyWindow { start, end } => write!(
                f,
                "begin time {} is not before end time {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            ),
            ConfigError::InvalidPattern { option, message } => {
                write!(f, "--{} failed to compile to a regexp: {}", option, message)
            }
            ConfigError::InvalidOption { option, message } => {
                write!(f, "--{} {}", option, message)
            }
            ConfigError::ConfigFile { path, message } => {
                write!(f, "failed to read AWS config file {}: {}", path, message)
            }
            ConfigError::NoCredentials { profile } => write!(
                f,
                "no AWS credentials found (checked environment, profile '{}' and instance metadata)",
                profile
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
