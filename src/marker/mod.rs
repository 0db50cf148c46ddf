//! Durable per-container checkpoints.
//!
//! Each (mode, container) pair owns one plain-text file in the marker
//! directory. The file holds the checkpoint literal and nothing else: an
//! RFC 3339 timestamp for the date mode, or an object name for the name mode.
//!
//! A marker file is owned by a single sync run. There is no interprocess
//! locking; two concurrent runs against the same container and mode are
//! undefined.

use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tempfile::NamedTempFile;
use tracing::{trace, warn};

use crate::types::error::MigrateError;
use crate::types::{Checkpoint, SyncMode};

const MARKER_FILE_PREFIX: &str = ".object-storage-migrate-marker";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkerKey {
    mode: SyncMode,
    container: String,
}

impl MarkerKey {
    pub fn new(mode: SyncMode, container: &str) -> Self {
        Self {
            mode,
            container: container.to_string(),
        }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn file_name(&self) -> String {
        format!(
            "{MARKER_FILE_PREFIX}-{}-file_{}",
            self.mode,
            self.container.replace(['/', '\\'], "_")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearResult {
    Deleted,
    Empty,
}

#[derive(Debug, Clone)]
pub struct MarkerStore {
    dir: PathBuf,
}

impl MarkerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, key: &MarkerKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Missing or unreadable markers mean "no prior progress" and are never an error.
    pub async fn read(&self, key: &MarkerKey) -> Option<String> {
        let path = self.path(key);
        let path_string = path.to_string_lossy().to_string();

        match tokio::fs::read_to_string(&path).await {
            Ok(value) if value.is_empty() => {
                warn!(path = path_string, "marker is empty. it is ignored.");
                None
            }
            Ok(value) => {
                trace!(path = path_string, value = value, "marker has been read.");
                Some(value)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                trace!(path = path_string, "marker not found.");
                None
            }
            Err(e) => {
                let error = e.to_string();
                warn!(
                    path = path_string,
                    error = error,
                    "failed to read marker. it is ignored."
                );
                None
            }
        }
    }

    pub async fn read_checkpoint(&self, key: &MarkerKey) -> Option<Checkpoint> {
        let value = self.read(key).await?;

        match key.mode() {
            SyncMode::Date => match parse_date_marker(&value) {
                Ok(date) => Some(Checkpoint::Date(date)),
                Err(e) => {
                    let path = self.path(key).to_string_lossy().to_string();
                    let error = e.to_string();
                    warn!(
                        path = path,
                        value = value,
                        error = error,
                        "invalid date marker. it is ignored."
                    );
                    None
                }
            },
            SyncMode::Name => Some(Checkpoint::Name(value)),
        }
    }

    /// Returns only after the value is on disk. A crash leaves either the old or the new value.
    pub async fn write(&self, key: &MarkerKey, value: &str) -> Result<(), MigrateError> {
        let path = self.path(key);

        let dir = self.dir.clone();
        let target = path.clone();
        let contents = value.as_bytes().to_vec();
        let result =
            tokio::task::spawn_blocking(move || write_durably(&dir, &target, &contents)).await;

        let source = match result {
            Ok(Ok(())) => {
                let path = path.to_string_lossy().to_string();
                trace!(path = path, value = value, "marker has been written.");
                return Ok(());
            }
            Ok(Err(e)) => e,
            Err(join_error) => io::Error::other(join_error),
        };

        Err(MigrateError::MarkerWrite { path, source })
    }

    pub async fn write_checkpoint(
        &self,
        key: &MarkerKey,
        checkpoint: &Checkpoint,
    ) -> Result<(), MigrateError> {
        debug_assert_eq!(key.mode(), checkpoint.mode());

        self.write(key, &format_checkpoint(checkpoint)).await
    }

    pub async fn clear(&self, key: &MarkerKey) -> io::Result<ClearResult> {
        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(ClearResult::Deleted),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ClearResult::Empty),
            Err(e) => Err(e),
        }
    }
}

pub fn format_checkpoint(checkpoint: &Checkpoint) -> String {
    match checkpoint {
        Checkpoint::Date(date) => format_date_marker(date),
        Checkpoint::Name(name) => name.clone(),
    }
}

// Sub-second digits are kept as-is, so a stored date compares equal to the listed one.
pub fn format_date_marker(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn parse_date_marker(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value.trim()).map(|date| date.with_timezone(&Utc))
}

fn write_durably(dir: &Path, path: &Path, contents: &[u8]) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir)?;
    temp_file.write_all(contents)?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path).map_err(|e| e.error)?;

    #[cfg(unix)]
    std::fs::File::open(dir)?.sync_all()?;

    Ok(())
}
