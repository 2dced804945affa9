//! Credential acquisition and SDK config construction.
//!
//! Credentials are resolved once at startup, in this order:
//!
//! 1. `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` (+ `AWS_SESSION_TOKEN`)
//! 2. the selected profile in the AWS config file
//! 3. an EC2 instance role, if the instance metadata service answers
//!
//! Finding nothing is a configuration error; the run stops before any
//! CloudWatch Logs call.

#![warn(clippy::all, rust_2018_idioms)]

use aws_config::imds::credentials::ImdsCredentialsProvider;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_types::region::Region;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::aws_config_file::AwsConfigFile;
use super::error::ConfigError;

const INSTANCE_METADATA_IAM_URL: &str = "http://169.254.169.254/latest/meta-data/iam/";
const INSTANCE_METADATA_TIMEOUT: Duration = Duration::from_secs(1);

/// Static keys from the environment or a profile
#[derive(Clone, PartialEq, Eq)]
pub struct AccessKeys {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AccessKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessKeys")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .finish()
    }
}

impl AccessKeys {
    /// Create AWS SDK Credentials from these keys
    pub fn to_aws_credentials(&self) -> Credentials {
        Credentials::from_keys(
            &self.access_key_id,
            &self.secret_access_key,
            self.session_token.clone(),
        )
    }
}

/// Where credentials came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquiredCredentials {
    Environment(AccessKeys),
    Profile { name: String, keys: AccessKeys },
    /// The instance metadata service is reachable; the SDK fetches role
    /// credentials from it on demand
    InstanceRole,
}

impl AcquiredCredentials {
    pub fn source(&self) -> String {
        match self {
            AcquiredCredentials::Environment(_) => "environment".to_string(),
            AcquiredCredentials::Profile { name, .. } => format!("profile '{}'", name),
            AcquiredCredentials::InstanceRole => "instance metadata".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CredentialProvider {
    profile: String,
    config_path: PathBuf,
    probe_instance_metadata: bool,
}

impl CredentialProvider {
    pub fn new(profile: impl Into<String>, config_path: PathBuf) -> Self {
        Self {
            profile: profile.into(),
            config_path,
            probe_instance_metadata: true,
        }
    }

    /// Skip the instance metadata probe (offline use and tests).
    pub fn with_instance_metadata(mut self, probe: bool) -> Self {
        self.probe_instance_metadata = probe;
        self
    }

    /// Resolve credentials from the process environment.
    pub async fn acquire(&self) -> Result<AcquiredCredentials, ConfigError> {
        self.acquire_with_env(|key| std::env::var(key).ok()).await
    }

    /// Resolve credentials using `env` for environment lookups.
    pub async fn acquire_with_env<F>(&self, env: F) -> Result<AcquiredCredentials, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let (Some(access_key_id), Some(secret_access_key)) =
            (env("AWS_ACCESS_KEY_ID"), env("AWS_SECRET_ACCESS_KEY"))
        {
            debug!("Using credentials from environment");
            return Ok(AcquiredCredentials::Environment(AccessKeys {
                access_key_id,
                secret_access_key,
                session_token: env("AWS_SESSION_TOKEN"),
            }));
        }

        if let Some(keys) = self.profile_keys()? {
            debug!("Using credentials from profile {}", self.profile);
            return Ok(AcquiredCredentials::Profile {
                name: self.profile.clone(),
                keys,
            });
        }

        if self.probe_instance_metadata && instance_role_available().await {
            warn!("No static credentials found, falling back to the EC2 instance role");
            return Ok(AcquiredCredentials::InstanceRole);
        }

        Err(ConfigError::NoCredentials {
            profile: self.profile.clone(),
        })
    }

    fn profile_keys(&self) -> Result<Option<AccessKeys>, ConfigError> {
        let Some(config) = AwsConfigFile::load(&self.config_path)? else {
            return Ok(None);
        };

        let keys = match (
            config.get(&self.profile, "aws_access_key_id"),
            config.get(&self.profile, "aws_secret_access_key"),
        ) {
            (Some(access_key_id), Some(secret_access_key)) => Some(AccessKeys {
                access_key_id: access_key_id.to_string(),
                secret_access_key: secret_access_key.to_string(),
                session_token: config
                    .get(&self.profile, "aws_session_token")
                    .map(str::to_string),
            }),
            _ => None,
        };
        Ok(keys)
    }
}

/// True when the instance metadata IAM endpoint answers with anything but 404.
async fn instance_role_available() -> bool {
    let client = match reqwest::Client::builder()
        .connect_timeout(INSTANCE_METADATA_TIMEOUT)
        .timeout(INSTANCE_METADATA_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            debug!("Could not build metadata client: {}", e);
            return false;
        }
    };

    match client.get(INSTANCE_METADATA_IAM_URL).send().await {
        Ok(response) => response.status() != reqwest::StatusCode::NOT_FOUND,
        Err(e) => {
            debug!("Instance metadata not reachable: {}", e);
            false
        }
    }
}

/// Build the SDK config for `region` from acquired credentials.
pub async fn build_sdk_config(
    credentials: &AcquiredCredentials,
    region: &str,
) -> aws_types::SdkConfig {
    let loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));

    let loader = match credentials {
        AcquiredCredentials::Environment(keys) | AcquiredCredentials::Profile { keys, .. } => {
            loader.credentials_provider(keys.to_aws_credentials())
        }
        AcquiredCredentials::InstanceRole => {
            loader.credentials_provider(ImdsCredentialsProvider::builder().build())
        }
    };

    let config = loader.load().await;
    info!(
        "AWS config ready for region {} using {}",
        region,
        credentials.source()
    );
    config
}
