use std::fmt;
use std::fmt::{Debug, Formatter};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use zeroize_derive::{Zeroize, ZeroizeOnDrop};

pub mod async_callback;
pub mod error;
pub mod token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncMode {
    Date,
    Name,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Name => "name",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One object as reported by a listing call.
///
/// A later listing of the same name may carry a newer `last_modified`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    pub name: String,
    pub container: String,
    pub last_modified: DateTime<Utc>,
    pub content_type: Option<String>,
    pub size: Option<u64>,
}

impl ObjectDescriptor {
    pub fn key(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checkpoint {
    Date(DateTime<Utc>),
    Name(String),
}

impl Checkpoint {
    pub fn mode(&self) -> SyncMode {
        match self {
            Self::Date(_) => SyncMode::Date,
            Self::Name(_) => SyncMode::Name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncParams {
    pub container: String,
    pub target_container: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub marker: Option<String>,
    pub skip_marker: bool,
    pub max_keys: Option<i32>,
}

impl SyncParams {
    pub fn new(container: &str) -> Self {
        Self {
            container: container.to_string(),
            ..Default::default()
        }
    }

    pub fn target_container(&self) -> &str {
        self.target_container.as_deref().unwrap_or(&self.container)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyResult {
    pub source: ObjectDescriptor,
    pub target_container: String,
    pub target_name: String,
    pub transferred_bytes: u64,
}

#[derive(Debug, PartialEq)]
pub enum SyncStatistics {
    SyncBytes(u64),
    SyncComplete { key: String },
    SyncError { key: String },
    CheckpointCommitted { marker: String },
}

#[derive(Debug, Clone)]
pub struct ClientConfigLocation {
    pub aws_config_file: Option<PathBuf>,
    pub aws_shared_credentials_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum S3Credentials {
    Profile(String),
    Credentials { access_keys: AccessKeys },
    FromEnvironment,
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessKeys {
    pub access_key: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Debug for AccessKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut keys = f.debug_struct("AccessKeys");
        let session_token = self
            .session_token
            .as_ref()
            .map_or("None", |_| "** redacted **");
        keys.field("access_key", &self.access_key)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &session_token);
        keys.finish()
    }
}
