use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use anyhow::{Context as _, Result, anyhow};
use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use crate::config::StorageConfig;
use crate::storage::{
    DownloadStream, Storage, StorageFactory, StorageTrait, UploadStream, UploadWriter,
};
use crate::types::error::MigrateError;
use crate::types::{ContainerInfo, ObjectDescriptor};

pub mod fs_util;

type SortedNames = Arc<Vec<String>>;

pub struct LocalStorageFactory {}

#[async_trait]
impl StorageFactory for LocalStorageFactory {
    async fn create(storage_config: StorageConfig) -> Result<Storage> {
        let StorageConfig::Local(root) = storage_config else {
            return Err(anyhow!("local storage requires a local root directory."));
        };

        Ok(LocalStorage::boxed_new(root))
    }
}

/// Containers are the sub-directories of `root`. Object names are `/`-separated paths below them.
///
/// A listing without a marker walks the container once and keeps the sorted
/// names. Following pages of the same scan are served from them.
#[derive(Clone)]
struct LocalStorage {
    root: PathBuf,
    sorted_names: Arc<Mutex<HashMap<String, SortedNames>>>,
}

impl LocalStorage {
    fn boxed_new(root: PathBuf) -> Storage {
        Box::new(LocalStorage {
            root,
            sorted_names: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn container_path(&self, container: &str) -> Result<PathBuf> {
        if container.is_empty() || fs_util::check_directory_traversal(container) {
            return Err(anyhow!(MigrateError::DirectoryTraversalError))
                .with_context(|| format!("invalid container name: {container}"));
        }

        Ok(fs_util::key_to_file_path(&self.root, container))
    }

    fn object_path(&self, container: &str, name: &str) -> Result<PathBuf> {
        if fs_util::check_directory_traversal(name) {
            return Err(anyhow!(MigrateError::DirectoryTraversalError))
                .with_context(|| format!("invalid object name: {name}"));
        }

        Ok(fs_util::key_to_file_path(
            &self.container_path(container)?,
            name,
        ))
    }

    async fn names_for_scan(
        &self,
        container: &str,
        container_path: &Path,
        marker: Option<&str>,
    ) -> Result<SortedNames> {
        if marker.is_some() {
            let cached = self
                .sorted_names
                .lock()
                .ok()
                .and_then(|sorted_names| sorted_names.get(container).cloned());
            if let Some(names) = cached {
                return Ok(names);
            }
        }

        let walk_path = container_path.to_path_buf();
        let names = tokio::task::spawn_blocking(move || collect_names(&walk_path))
            .await
            .context("local listing task failed.")??;
        let names = Arc::new(names);

        if let Ok(mut sorted_names) = self.sorted_names.lock() {
            sorted_names.insert(container.to_string(), names.clone());
        }

        Ok(names)
    }
}

/// Names of all regular files below `container_path` in lexical order.
fn collect_names(container_path: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in WalkDir::new(container_path).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                // removed while walking
                if e.depth() > 0
                    && e.io_error()
                        .is_some_and(|inner| inner.kind() == io::ErrorKind::NotFound)
                {
                    continue;
                }

                return Err(anyhow!(e)).context("failed to list local files.");
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        if entry
            .file_name()
            .to_str()
            .is_some_and(fs_util::is_upload_temp_file)
        {
            continue;
        }

        let Some(name) = fs_util::file_path_to_key(container_path, entry.path()) else {
            let path = entry.path().to_string_lossy().to_string();
            warn!(path = path, "file name is not valid UTF-8. skipping.");
            continue;
        };

        names.push(name);
    }

    names.sort();

    Ok(names)
}

#[async_trait]
impl StorageTrait for LocalStorage {
    fn is_local_storage(&self) -> bool {
        true
    }

    async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        let mut read_dir = tokio::fs::read_dir(&self.root)
            .await
            .with_context(|| format!("failed to read directory: {}", self.root.display()))?;

        let mut containers = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }

            if let Some(name) = entry.file_name().to_str() {
                containers.push(ContainerInfo {
                    name: name.to_string(),
                });
            }
        }

        containers.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(containers)
    }

    async fn list_objects(
        &self,
        container: &str,
        limit: i32,
        marker: Option<&str>,
    ) -> Result<Vec<ObjectDescriptor>> {
        let container_path = self.container_path(container)?;
        let limit = usize::try_from(limit).context("limit must not be negative.")?;

        let names = self
            .names_for_scan(container, &container_path, marker)
            .await?;
        let start = marker.map_or(0, |marker| {
            names.partition_point(|name| name.as_str() <= marker)
        });

        let mut objects = Vec::new();
        for name in &names[start..] {
            if objects.len() == limit {
                break;
            }

            let path = fs_util::key_to_file_path(&container_path, name);
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    trace!(name = name.as_str(), "file removed while listing.");
                    continue;
                }
                Err(e) => {
                    return Err(anyhow!(e)).with_context(|| {
                        format!("failed to read file metadata: {}", path.display())
                    });
                }
            };

            let content_type = mime_guess::from_path(&path)
                .first_raw()
                .map(str::to_string);

            objects.push(ObjectDescriptor {
                name: name.clone(),
                container: container.to_string(),
                last_modified: fs_util::system_time_to_date_time(metadata.modified()?),
                content_type,
                size: Some(metadata.len()),
            });
        }

        debug!(
            container = container,
            marker = marker,
            count = objects.len(),
            "local files listed."
        );

        Ok(objects)
    }

    async fn open_download(&self, container: &str, name: &str) -> Result<DownloadStream> {
        let path = self.object_path(container, name)?;

        let file = tokio::fs::File::open(&path)
            .await
            .with_context(|| format!("failed to open file: {}", path.display()))?;
        let content_length = file.metadata().await?.len();

        let content_type = mime_guess::from_path(&path)
            .first_raw()
            .map(str::to_string);

        Ok(DownloadStream {
            reader: Box::new(file),
            content_type,
            content_length: Some(content_length),
        })
    }

    async fn open_upload(
        &self,
        container: &str,
        name: &str,
        _content_type: Option<&str>,
        _content_length: Option<u64>,
    ) -> Result<UploadStream> {
        let container_path = self.container_path(container)?;
        let real_path = self.object_path(container, name)?;

        if fs_util::is_key_a_directory(name) {
            return Ok(Box::new(LocalDirectoryWriter {
                container_path,
                name: name.to_string(),
            }));
        }

        let temp_file = fs_util::create_temp_file_from_key(&container_path, name).await?;
        let file = tokio::fs::File::from_std(
            temp_file
                .as_file()
                .try_clone()
                .context("failed to clone the temporary file handle.")?,
        );

        Ok(Box::new(LocalFileWriter {
            file,
            temp_file,
            real_path,
        }))
    }
}

/// Writes into a temporary file next to the destination. The temporary
/// file is removed on drop unless `complete()` persisted it.
struct LocalFileWriter {
    file: tokio::fs::File,
    temp_file: NamedTempFile,
    real_path: PathBuf,
}

impl AsyncWrite for LocalFileWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.file).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_shutdown(cx)
    }
}

#[async_trait]
impl UploadWriter for LocalFileWriter {
    async fn complete(self: Box<Self>) -> Result<()> {
        let LocalFileWriter {
            mut file,
            temp_file,
            real_path,
        } = *self;

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        temp_file
            .persist(&real_path)
            .map_err(|e| e.error)
            .with_context(|| format!("failed to persist file: {}", real_path.display()))?;

        let path = real_path.to_string_lossy().to_string();
        trace!(path = path, "local file persisted.");

        Ok(())
    }
}

/// Directory markers (`name/`) carry no data. The directory is created on `complete()`.
/// Content cannot be stored under such a name and fails the write.
struct LocalDirectoryWriter {
    container_path: PathBuf,
    name: String,
}

impl AsyncWrite for LocalDirectoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("directory object with content: {}", self.name),
        )))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl UploadWriter for LocalDirectoryWriter {
    async fn complete(self: Box<Self>) -> Result<()> {
        fs_util::create_directory_hierarchy_from_key(&self.container_path, &self.name).await?;
        Ok(())
    }
}
