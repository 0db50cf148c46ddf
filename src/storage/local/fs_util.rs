use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use tempfile::NamedTempFile;
use tracing::trace;

/// In-flight uploads live next to their destination under this prefix until `complete()`.
pub const UPLOAD_TEMP_FILE_PREFIX: &str = ".object-storage-migrate-upload-";

static PARENT_DIRECTORY_COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[/\\])\.\.([/\\]|$)").unwrap());

pub fn check_directory_traversal(key: &str) -> bool {
    PARENT_DIRECTORY_COMPONENT.is_match(key)
}

pub fn is_key_a_directory(key: &str) -> bool {
    if cfg!(windows) && key.ends_with('\\') {
        return true;
    }

    key.ends_with('/')
}

pub fn remove_root_slash(key: &str) -> &str {
    key.trim_start_matches('/')
}

pub fn key_to_file_path(path: &Path, key: &str) -> PathBuf {
    path.join(convert_os_specific_directory_char(remove_root_slash(key)))
}

/// Inverse of `key_to_file_path` for a path below `path`.
pub fn file_path_to_key(path: &Path, file_path: &Path) -> Option<String> {
    let relative = file_path.strip_prefix(path).ok()?;

    let components = relative
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect::<Option<Vec<&str>>>()?;

    Some(components.join("/"))
}

pub fn is_upload_temp_file(file_name: &str) -> bool {
    file_name.starts_with(UPLOAD_TEMP_FILE_PREFIX)
}

pub fn system_time_to_date_time(system_time: std::time::SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(system_time)
}

pub async fn create_temp_file_from_key(path: &Path, key: &str) -> Result<NamedTempFile> {
    create_directory_hierarchy_from_key(path, key).await?;

    let temp_directory_path = key_to_directory_without_filename(path, key);
    let file = tempfile::Builder::new()
        .prefix(UPLOAD_TEMP_FILE_PREFIX)
        .tempfile_in(temp_directory_path)
        .context("tempfile::Builder::tempfile_in() failed.")?;
    Ok(file)
}

pub async fn create_directory_hierarchy_from_key(path: &Path, key: &str) -> Result<bool> {
    let directory_path = key_to_directory_without_filename(path, key);

    if directory_path.try_exists().unwrap_or(false) {
        return Ok(false);
    }

    tokio::fs::create_dir_all(&directory_path)
        .await
        .context("tokio::fs::create_dir_all() failed.")?;

    let directory = directory_path.to_string_lossy().to_string();
    trace!(key = key, directory = directory, "directory created.");

    Ok(true)
}

fn key_to_directory_without_filename(path: &Path, key: &str) -> PathBuf {
    let key = remove_root_slash(key);
    if is_key_a_directory(key) {
        return path.join(convert_os_specific_directory_char(key));
    }

    match key.rfind('/') {
        Some(index) => path.join(convert_os_specific_directory_char(&key[..index])),
        None => path.to_path_buf(),
    }
}

fn convert_os_specific_directory_char(key: &str) -> String {
    key.replace('/', std::path::MAIN_SEPARATOR_STR)
}
