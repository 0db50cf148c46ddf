use anyhow::anyhow;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{info, trace, warn};

use crate::types::async_callback::AsyncReadWithCallback;
use crate::types::error::{CopySide, MigrateError};
use crate::storage::UploadStream;
use crate::types::{CopyResult, ObjectDescriptor};

use super::stage::Stage;

const MIN_COPY_CHUNKSIZE: usize = 1024;

/// Streams one object from the source to the target.
pub struct ObjectSyncer<'a> {
    base: &'a Stage,
}

impl<'a> ObjectSyncer<'a> {
    pub fn new(base: &'a Stage) -> Self {
        Self { base }
    }

    /// Copies `object` into `target_container` (its own container when `None`).
    ///
    /// At most one chunk is in flight: the next read is issued only after
    /// the previous chunk was accepted by the upload. The copy succeeds once
    /// the target reports the upload as durable.
    pub async fn copy(
        &self,
        object: &ObjectDescriptor,
        target_container: Option<&str>,
    ) -> Result<CopyResult, MigrateError> {
        let target_container = target_container.unwrap_or(&object.container);
        let copy_error = |side: CopySide, source: anyhow::Error| MigrateError::Copy {
            container: object.container.clone(),
            name: object.name.clone(),
            side,
            source,
        };

        trace!(
            container = object.container.as_str(),
            name = object.name.as_str(),
            "copy has started."
        );

        let download = self
            .base
            .source
            .open_download(&object.container, &object.name)
            .await
            .map_err(|e| copy_error(CopySide::Read, e))?;

        let content_type = object
            .content_type
            .clone()
            .or_else(|| download.content_type.clone());
        let content_length = download.content_length.or(object.size);

        let mut upload = self
            .base
            .target
            .open_upload(
                target_container,
                &object.name,
                content_type.as_deref(),
                content_length,
            )
            .await
            .map_err(|e| copy_error(CopySide::Write, e))?;

        let mut reader =
            AsyncReadWithCallback::new(download.reader, self.base.stats_sender.clone());
        let mut buffer = vec![0u8; self.chunksize()];

        loop {
            if self.base.is_cancelled() {
                abort_upload(upload, object).await;

                warn!(
                    container = object.container.as_str(),
                    name = object.name.as_str(),
                    "copy has been cancelled."
                );
                return Err(MigrateError::Cancelled);
            }

            let read_size = match reader.read(&mut buffer).await {
                Ok(read_size) => read_size,
                Err(e) => {
                    abort_upload(upload, object).await;
                    return Err(copy_error(CopySide::Read, anyhow!(e)));
                }
            };
            if read_size == 0 {
                break;
            }

            if let Err(e) = upload.write_all(&buffer[..read_size]).await {
                trace!(
                    name = object.name.as_str(),
                    error = e.to_string(),
                    "upload write failed."
                );

                // the provider failure explains a broken pipe better
                let source = upload.abort().await.unwrap_or_else(|| anyhow!(e));
                return Err(copy_error(CopySide::Write, source));
            }
        }

        upload
            .complete()
            .await
            .map_err(|e| copy_error(CopySide::Write, e))?;

        let transferred_bytes = reader.total_bytes();
        info!(
            container = object.container.as_str(),
            target_container = target_container,
            name = object.name.as_str(),
            size = transferred_bytes,
            "object copied."
        );

        Ok(CopyResult {
            source: object.clone(),
            target_container: target_container.to_string(),
            target_name: object.name.clone(),
            transferred_bytes,
        })
    }

    fn chunksize(&self) -> usize {
        usize::try_from(self.base.config.transfer_config.copy_chunksize)
            .unwrap_or(usize::MAX)
            .max(MIN_COPY_CHUNKSIZE)
    }
}

/// Abandons an upload whose copy already failed on the read side or was
/// cancelled. A failure reported by the target is logged only.
async fn abort_upload(upload: UploadStream, object: &ObjectDescriptor) {
    if let Some(e) = upload.abort().await {
        let error = format!("{e:#}");
        trace!(
            container = object.container.as_str(),
            name = object.name.as_str(),
            error = error,
            "upload abort reported an error."
        );
    }
}
