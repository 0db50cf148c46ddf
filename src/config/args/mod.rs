use std::ffi::OsString;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::builder::NonEmptyStringValueParser;
use clap::{Args, Parser, Subcommand};
use clap_complete::shells::Shell;
use clap_verbosity_flag::{Verbosity, WarnLevel};
#[cfg(feature = "version")]
use shadow_rs::shadow;

use crate::Config;
use crate::config::args::value_parser::{date_time, human_bytes};
use crate::config::credentials::{ClientSettings, load_storage_config};
use crate::config::{CLITimeoutConfig, Command, RetryConfig, TracingConfig, TransferConfig};
use crate::types::{ClientConfigLocation, SyncMode, SyncParams};

mod tests;
pub mod value_parser;

const DEFAULT_SOURCE_CREDENTIAL_FILE: &str = "source.json";
const DEFAULT_TARGET_CREDENTIAL_FILE: &str = "target.json";
const DEFAULT_MARKER_DIR: &str = ".";
const DEFAULT_COPY_CHUNKSIZE: &str = "1MiB";
const DEFAULT_AWS_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_INITIAL_BACKOFF_MILLISECONDS: u64 = 100;
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_AWS_SDK_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;
const DEFAULT_SHOW_NO_PROGRESS: bool = false;
const DEFAULT_DISABLE_STALLED_STREAM_PROTECTION: bool = false;
const DEFAULT_SKIP_MARKER: bool = false;

const MAX_KEYS_RANGE: std::ops::RangeInclusive<i64> = 1..=100_000;

#[cfg(feature = "version")]
shadow!(build);

/// Resumable, incremental copy of object storage containers.
#[derive(Parser, Clone, Debug)]
#[command(name = "object-storage-migrate")]
#[cfg_attr(feature = "version", command(version=format!("{} ({} {}), {}", build::PKG_VERSION, build::SHORT_COMMIT, build::BUILD_TARGET, build::RUST_VERSION)))]
pub struct CLIArgs {
    #[command(subcommand)]
    command: Commands,

    /// credential file of the source storage
    #[arg(long, env, global = true, default_value = DEFAULT_SOURCE_CREDENTIAL_FILE, value_name = "FILE", help_heading = "Storage")]
    source_credential_file: PathBuf,

    /// credential file of the target storage
    #[arg(long, env, global = true, default_value = DEFAULT_TARGET_CREDENTIAL_FILE, value_name = "FILE", help_heading = "Storage")]
    target_credential_file: PathBuf,

    /// directory that holds the marker files
    #[arg(long, env, global = true, default_value = DEFAULT_MARKER_DIR, value_name = "DIR", help_heading = "Storage")]
    marker_dir: PathBuf,

    /// location of the file that the AWS CLI uses to store configuration profiles
    #[arg(long, env, global = true, value_name = "FILE", help_heading = "AWS Configuration")]
    aws_config_file: Option<PathBuf>,

    /// location of the file that the AWS CLI uses to store access keys
    #[arg(long, env, global = true, value_name = "FILE", help_heading = "AWS Configuration")]
    aws_shared_credentials_file: Option<PathBuf>,

    /// buffer size of a single copy step. allow suffixes: KB, KiB, MB, MiB
    #[arg(long, env, global = true, default_value = DEFAULT_COPY_CHUNKSIZE, value_parser = human_bytes::check_human_bytes, help_heading = "Performance")]
    copy_chunksize: String,

    #[command(flatten)]
    verbosity: Verbosity<WarnLevel>,

    /// show trace as json format
    #[arg(long, env, global = true, default_value_t = DEFAULT_JSON_TRACING, help_heading = "Tracing/Logging")]
    json_tracing: bool,

    /// enable aws sdk tracing
    #[arg(long, env, global = true, default_value_t = DEFAULT_AWS_SDK_TRACING, help_heading = "Tracing/Logging")]
    aws_sdk_tracing: bool,

    /// show span event tracing
    #[arg(long, env, global = true, default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Tracing/Logging")]
    span_events_tracing: bool,

    /// disable ANSI terminal colors
    #[arg(long, env, global = true, default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Tracing/Logging")]
    disable_color_tracing: bool,

    /// do not show the progress indicator
    #[arg(long, env, global = true, default_value_t = DEFAULT_SHOW_NO_PROGRESS, help_heading = "Tracing/Logging")]
    show_no_progress: bool,

    /// maximum retry attempts of the AWS SDK retry handler
    #[arg(long, env, global = true, default_value_t = DEFAULT_AWS_MAX_ATTEMPTS, value_name = "max_attempts", help_heading = "Retry Options")]
    aws_max_attempts: u32,

    /// a multiplier value used when calculating backoff times as part of an exponential backoff with jitter strategy.
    #[arg(long, env, global = true, default_value_t = DEFAULT_INITIAL_BACKOFF_MILLISECONDS, value_name = "initial_backoff", help_heading = "Retry Options")]
    initial_backoff_milliseconds: u64,

    /// operation timeout (milliseconds). For details, see the AWS SDK for Rust TimeoutConfig documentation.
    /// The default has no timeout.
    #[arg(
        long,
        env,
        global = true,
        value_name = "operation_timeout",
        help_heading = "Timeout Options"
    )]
    operation_timeout_milliseconds: Option<u64>,

    /// operation attempt timeout (milliseconds). For details, see the AWS SDK for Rust TimeoutConfig documentation.
    /// The default has no timeout.
    #[arg(
        long,
        env,
        global = true,
        value_name = "operation_attempt_timeout",
        help_heading = "Timeout Options"
    )]
    operation_attempt_timeout_milliseconds: Option<u64>,

    /// connect timeout (milliseconds).
    /// The default has AWS SDK default timeout (Currently 3100 milliseconds).
    #[arg(
        long,
        env,
        global = true,
        value_name = "connect_timeout",
        help_heading = "Timeout Options"
    )]
    connect_timeout_milliseconds: Option<u64>,

    /// read timeout (milliseconds).
    /// The default has no timeout.
    #[arg(
        long,
        env,
        global = true,
        value_name = "read_timeout",
        help_heading = "Timeout Options"
    )]
    read_timeout_milliseconds: Option<u64>,

    /// disable stalled stream protection
    #[arg(long, env, global = true, default_value_t = DEFAULT_DISABLE_STALLED_STREAM_PROTECTION, help_heading = "Advanced")]
    disable_stalled_stream_protection: bool,
}

#[derive(Subcommand, Clone, Debug)]
enum Commands {
    /// copy objects modified after the date marker, oldest first
    SyncDate(SyncDateArgs),

    /// copy objects whose names sort after the name marker, one page at a time
    SyncName(SyncNameArgs),

    /// delete the date marker of a container
    ClearDateMarker(ContainerArgs),

    /// delete the name marker of a container
    ClearNameMarker(ContainerArgs),

    /// list the containers of the source and the target storage
    Containers,

    /// show the loaded credentials. secrets are redacted
    Credentials,

    /// generate a auto completions script
    Completions {
        /// Valid values: bash, fish, zsh, powershell, elvish.
        #[arg(value_parser = clap::value_parser!(Shell))]
        shell: Shell,
    },
}

#[derive(Args, Clone, Debug)]
struct ContainerArgs {
    /// source container name
    #[arg(value_parser = NonEmptyStringValueParser::new())]
    container: String,
}

#[derive(Args, Clone, Debug)]
struct SyncArgs {
    /// source container name
    #[arg(value_parser = NonEmptyStringValueParser::new())]
    container: String,

    /// target container name. defaults to the source container name
    #[arg(long, env = "OBJECT_STORAGE_MIGRATE_TO", value_parser = NonEmptyStringValueParser::new())]
    to: Option<String>,

    /// ignore the stored marker when choosing where to start
    #[arg(long, env = "OBJECT_STORAGE_MIGRATE_SKIP_MARKER", default_value_t = DEFAULT_SKIP_MARKER)]
    skip_marker: bool,

    /// number of objects requested in a single listing call
    #[arg(long, env = "OBJECT_STORAGE_MIGRATE_MAX_KEYS", value_parser = clap::value_parser!(i32).range(MAX_KEYS_RANGE))]
    max_keys: Option<i32>,
}

#[derive(Args, Clone, Debug)]
struct SyncDateArgs {
    #[command(flatten)]
    sync: SyncArgs,

    /// copy only objects modified after this date. overrides the stored marker
    /// e.g. 2024-01-02T03:04:05Z, 2024-01-02T03:04:05 (UTC), 2024-01-02 (UTC)
    #[arg(long, env = "OBJECT_STORAGE_MIGRATE_SINCE", value_parser = date_time::parse_date_time)]
    since: Option<DateTime<Utc>>,
}

#[derive(Args, Clone, Debug)]
struct SyncNameArgs {
    #[command(flatten)]
    sync: SyncArgs,

    /// start after this object name. overrides the stored marker
    #[arg(long, env = "OBJECT_STORAGE_MIGRATE_MARKER", value_parser = NonEmptyStringValueParser::new())]
    marker: Option<String>,
}

pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let config_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    crate::Config::try_from(config_args)
}

impl CLIArgs {
    fn build_command(&self) -> Command {
        match &self.command {
            Commands::SyncDate(args) => Command::Sync {
                mode: SyncMode::Date,
                params: SyncParams {
                    since: args.since,
                    ..args.sync.build_sync_params()
                },
            },
            Commands::SyncName(args) => Command::Sync {
                mode: SyncMode::Name,
                params: SyncParams {
                    marker: args.marker.clone(),
                    ..args.sync.build_sync_params()
                },
            },
            Commands::ClearDateMarker(args) => Command::ClearMarker {
                mode: SyncMode::Date,
                container: args.container.clone(),
            },
            Commands::ClearNameMarker(args) => Command::ClearMarker {
                mode: SyncMode::Name,
                container: args.container.clone(),
            },
            Commands::Containers => Command::Containers,
            Commands::Credentials => Command::Credentials,
            Commands::Completions { shell } => Command::Completions(*shell),
        }
    }

    fn build_tracing_config(&self) -> Option<TracingConfig> {
        self.verbosity
            .log_level()
            .map(|log_level| TracingConfig {
                tracing_level: log_level,
                json_tracing: self.json_tracing,
                aws_sdk_tracing: self.aws_sdk_tracing,
                span_events_tracing: self.span_events_tracing,
                disable_color_tracing: self.disable_color_tracing,
            })
    }

    fn build_client_settings(&self) -> ClientSettings {
        ClientSettings {
            client_config_location: ClientConfigLocation {
                aws_config_file: self.aws_config_file.clone(),
                aws_shared_credentials_file: self.aws_shared_credentials_file.clone(),
            },
            retry_config: RetryConfig {
                aws_max_attempts: self.aws_max_attempts,
                initial_backoff_milliseconds: self.initial_backoff_milliseconds,
            },
            cli_timeout_config: CLITimeoutConfig {
                operation_timeout_milliseconds: self.operation_timeout_milliseconds,
                operation_attempt_timeout_milliseconds: self
                    .operation_attempt_timeout_milliseconds,
                connect_timeout_milliseconds: self.connect_timeout_milliseconds,
                read_timeout_milliseconds: self.read_timeout_milliseconds,
            },
            disable_stalled_stream_protection: self.disable_stalled_stream_protection,
        }
    }
}

impl SyncArgs {
    fn build_sync_params(&self) -> SyncParams {
        SyncParams {
            container: self.container.clone(),
            target_container: self.to.clone(),
            skip_marker: self.skip_marker,
            max_keys: self.max_keys,
            ..Default::default()
        }
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(value: CLIArgs) -> Result<Self, Self::Error> {
        let command = value.build_command();

        let (source, target) = if command.requires_credentials() {
            let settings = value.build_client_settings();
            (
                Some(load_storage_config(
                    &value.source_credential_file,
                    &settings,
                )?),
                Some(load_storage_config(
                    &value.target_credential_file,
                    &settings,
                )?),
            )
        } else {
            (None, None)
        };

        let copy_chunksize = human_bytes::parse_human_bytes(&value.copy_chunksize)?;

        Ok(Config {
            command,
            source,
            target,
            tracing_config: value.build_tracing_config(),
            source_credential_file: value.source_credential_file,
            target_credential_file: value.target_credential_file,
            marker_dir: value.marker_dir,
            transfer_config: TransferConfig { copy_chunksize },
            show_no_progress: value.show_no_progress,
        })
    }
}
