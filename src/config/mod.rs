use std::path::PathBuf;

use clap_complete::shells::Shell;

use crate::types::{ClientConfigLocation, S3Credentials, SyncMode, SyncParams};

pub mod args;
pub mod credentials;

#[derive(Debug, Clone)]
pub struct Config {
    pub command: Command,
    pub source: Option<StorageConfig>,
    pub target: Option<StorageConfig>,
    pub source_credential_file: PathBuf,
    pub target_credential_file: PathBuf,
    pub marker_dir: PathBuf,
    pub transfer_config: TransferConfig,
    pub tracing_config: Option<TracingConfig>,
    pub show_no_progress: bool,
}

impl Config {
    pub fn sync_params(&self) -> Option<&SyncParams> {
        if let Command::Sync { params, .. } = &self.command {
            return Some(params);
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Sync { mode: SyncMode, params: SyncParams },
    ClearMarker { mode: SyncMode, container: String },
    Containers,
    Credentials,
    Completions(Shell),
}

impl Command {
    /// Whether the credential files must be loaded for this command.
    pub fn requires_credentials(&self) -> bool {
        matches!(
            self,
            Command::Sync { .. } | Command::Containers | Command::Credentials
        )
    }
}

#[derive(Debug, Clone)]
pub enum StorageConfig {
    S3(ClientConfig),
    Local(PathBuf),
}

impl StorageConfig {
    pub fn provider(&self) -> &'static str {
        match self {
            StorageConfig::S3(_) => "s3",
            StorageConfig::Local(_) => "local",
        }
    }

    /// Human readable summary. Secrets are never included.
    pub fn describe(&self) -> String {
        match self {
            StorageConfig::S3(client_config) => {
                let credential = match &client_config.credential {
                    S3Credentials::Profile(profile) => format!("profile {profile}"),
                    S3Credentials::Credentials { access_keys } => format!(
                        "access key {} (secret redacted{})",
                        access_keys.access_key,
                        if access_keys.session_token.is_some() {
                            ", session token redacted"
                        } else {
                            ""
                        }
                    ),
                    S3Credentials::FromEnvironment => "environment".to_string(),
                };
                format!(
                    "provider: s3, credential: {credential}, region: {}, endpoint: {}, force path style: {}",
                    client_config.region.as_deref().unwrap_or("(default)"),
                    client_config.endpoint_url.as_deref().unwrap_or("(default)"),
                    client_config.force_path_style
                )
            }
            StorageConfig::Local(root) => {
                format!("provider: local, root: {}", root.display())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_config_location: ClientConfigLocation,
    pub credential: S3Credentials,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub retry_config: RetryConfig,
    pub cli_timeout_config: CLITimeoutConfig,
    pub disable_stalled_stream_protection: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub aws_max_attempts: u32,
    pub initial_backoff_milliseconds: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CLITimeoutConfig {
    pub operation_timeout_milliseconds: Option<u64>,
    pub operation_attempt_timeout_milliseconds: Option<u64>,
    pub connect_timeout_milliseconds: Option<u64>,
    pub read_timeout_milliseconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub aws_sdk_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    pub copy_chunksize: u64,
}
