//! AWS shared config file reader.
//!
//! Understands the subset of the INI format the AWS CLI writes:
//! `[default]` and `[profile <name>]` headers followed by `key = value`
//! lines. Lines before the first header belong to `default`; comments and
//! anything else are ignored.

#![warn(clippy::all, rust_2018_idioms)]

use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "~/.aws/config";
pub const DEFAULT_PROFILE: &str = "default";

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix('~') {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

fn profile_header() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\[profile\s+([A-Za-z0-9_.\-]+)\]$").expect("profile header pattern is valid")
    })
}

fn key_value() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9_.\-]+)\s*=\s*(\S+)").expect("key/value pattern is valid")
    })
}

/// Parsed profiles, keyed by profile name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsConfigFile {
    profiles: HashMap<String, HashMap<String, String>>,
}

impl AwsConfigFile {
    /// Load and parse `path`. A missing file is `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            trace_debug!("No AWS config file at {:?}", path);
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ConfigFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Self::parse(&contents)
            .map(Some)
            .map_err(|message| ConfigError::ConfigFile {
                path: path.display().to_string(),
                message,
            })
    }

    pub fn parse(contents: &str) -> Result<Self, String> {
        let mut profiles: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current = DEFAULT_PROFILE.to_string();

        for (number, raw) in contents.lines().enumerate() {
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line == "[default]" {
                current = DEFAULT_PROFILE.to_string();
            } else if line.starts_with("[profile") {
                let name = profile_header()
                    .captures(line)
                    .and_then(|captures| captures.get(1))
                    .ok_or_else(|| format!("line {}: malformed profile header '{}'", number + 1, line))?;
                current = name.as_str().to_string();
            } else if let Some(captures) = key_value().captures(line) {
                profiles
                    .entry(current.clone())
                    .or_default()
                    .insert(captures[1].to_string(), captures[2].to_string());
            }
        }

        Ok(Self { profiles })
    }

    pub fn profile(&self, name: &str) -> Option<&HashMap<String, String>> {
        self.profiles.get(name)
    }

    pub fn get(&self, profile: &str, key: &str) -> Option<&str> {
        self.profile(profile)
            .and_then(|values| values.get(key))
            .map(String::as_str)
    }
}
