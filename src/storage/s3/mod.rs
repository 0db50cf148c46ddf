use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use anyhow::{Context as _, Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::types::Object;
use aws_smithy_types_convert::date_time::DateTimeExt;
use tokio::io::{AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::config::{ClientConfig, StorageConfig};
use crate::storage::{
    DownloadStream, Storage, StorageFactory, StorageTrait, UploadStream, UploadWriter,
    convert_to_byte_stream,
};
use crate::types::{ContainerInfo, ObjectDescriptor};

mod client_builder;

/// ListObjects returns at most this many keys per request.
const MAX_KEYS_PER_REQUEST: usize = 1000;

const UPLOAD_PIPE_SIZE: usize = 64 * 1024;

pub struct S3StorageFactory {}

#[async_trait]
impl StorageFactory for S3StorageFactory {
    async fn create(storage_config: StorageConfig) -> Result<Storage> {
        let StorageConfig::S3(client_config) = storage_config else {
            return Err(anyhow!("s3 storage requires a client config."));
        };

        Ok(S3Storage::boxed_new(&client_config).await)
    }
}

#[derive(Clone)]
struct S3Storage {
    client: Arc<Client>,
}

impl S3Storage {
    async fn boxed_new(client_config: &ClientConfig) -> Storage {
        let storage = S3Storage {
            client: Arc::new(client_config.create_client().await),
        };

        Box::new(storage)
    }
}

#[async_trait]
impl StorageTrait for S3Storage {
    fn is_local_storage(&self) -> bool {
        false
    }

    async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        let list_buckets_output = self
            .client
            .list_buckets()
            .send()
            .await
            .context("aws_sdk_s3::client::list_buckets() failed.")?;

        Ok(list_buckets_output
            .buckets()
            .iter()
            .filter_map(|bucket| bucket.name())
            .map(|name| ContainerInfo {
                name: name.to_string(),
            })
            .collect())
    }

    async fn list_objects(
        &self,
        container: &str,
        limit: i32,
        marker: Option<&str>,
    ) -> Result<Vec<ObjectDescriptor>> {
        let limit = usize::try_from(limit).context("limit must not be negative.")?;

        let mut objects = Vec::new();
        let mut marker = marker.map(str::to_string);

        while objects.len() < limit {
            let remaining = (limit - objects.len()).min(MAX_KEYS_PER_REQUEST);

            let list_objects_output = self
                .client
                .list_objects()
                .bucket(container)
                .set_marker(marker.clone())
                .max_keys(remaining as i32)
                .send()
                .await
                .context("aws_sdk_s3::client::list_objects() failed.")?;

            for object in list_objects_output.contents() {
                objects.push(object_to_descriptor(container, object)?);
            }

            debug!(
                container = container,
                marker = marker.as_deref(),
                count = list_objects_output.contents().len(),
                "ListObjects page received."
            );

            if !list_objects_output.is_truncated().unwrap_or(false) {
                break;
            }

            let next_marker = list_objects_output
                .next_marker()
                .or_else(|| list_objects_output.contents().last().and_then(Object::key))
                .map(str::to_string);
            if next_marker.is_none() {
                break;
            }
            marker = next_marker;
        }

        Ok(objects)
    }

    async fn open_download(&self, container: &str, name: &str) -> Result<DownloadStream> {
        let get_object_output = self
            .client
            .get_object()
            .bucket(container)
            .key(name)
            .send()
            .await
            .context("aws_sdk_s3::client::get_object() failed.")?;

        let content_type = get_object_output.content_type().map(str::to_string);
        let content_length = get_object_output
            .content_length()
            .and_then(|length| u64::try_from(length).ok());

        Ok(DownloadStream {
            reader: Box::new(Box::pin(get_object_output.body.into_async_read())),
            content_type,
            content_length,
        })
    }

    async fn open_upload(
        &self,
        container: &str,
        name: &str,
        content_type: Option<&str>,
        content_length: Option<u64>,
    ) -> Result<UploadStream> {
        let content_length = content_length
            .ok_or_else(|| anyhow!("content length is required to upload to s3: {name}"))?;
        let content_length =
            i64::try_from(content_length).context("content length out of range.")?;

        let (writer, reader) = tokio::io::duplex(UPLOAD_PIPE_SIZE);

        let put_object = self
            .client
            .put_object()
            .bucket(container)
            .key(name)
            .set_content_type(content_type.map(str::to_string))
            .content_length(content_length)
            .body(convert_to_byte_stream(reader));

        let key = name.to_string();
        let handle = tokio::spawn(async move {
            let put_object_output = put_object
                .send()
                .await
                .context("aws_sdk_s3::client::put_object() failed.")?;

            let e_tag = put_object_output.e_tag().unwrap_or_default();
            trace!(key = key, e_tag = e_tag, "put_object() completed.");

            Ok(())
        });

        Ok(Box::new(S3UploadWriter {
            writer: Some(writer),
            handle: Some(handle),
        }))
    }
}

fn object_to_descriptor(container: &str, object: &Object) -> Result<ObjectDescriptor> {
    let name = object
        .key()
        .ok_or_else(|| anyhow!("ListObjects returned an object without a key."))?;

    let last_modified = object
        .last_modified()
        .ok_or_else(|| anyhow!("ListObjects returned an object without LastModified: {name}"))?
        .to_chrono_utc()
        .with_context(|| format!("invalid LastModified: {name}"))?;

    Ok(ObjectDescriptor {
        name: name.to_string(),
        container: container.to_string(),
        last_modified,
        content_type: None,
        size: object.size().and_then(|size| u64::try_from(size).ok()),
    })
}

/// Feeds the body of a spawned `put_object` through a bounded pipe.
///
/// Dropping the writer before `complete()` aborts the request, so S3 never
/// stores a truncated object.
struct S3UploadWriter {
    writer: Option<DuplexStream>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl S3UploadWriter {
    fn writer(&mut self) -> io::Result<&mut DuplexStream> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "upload already closed."))
    }
}

impl AsyncWrite for S3UploadWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.writer() {
            Ok(writer) => Pin::new(writer).poll_write(cx, buf),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.writer() {
            Ok(writer) => Pin::new(writer).poll_flush(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.writer() {
            Ok(writer) => Pin::new(writer).poll_shutdown(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

#[async_trait]
impl UploadWriter for S3UploadWriter {
    async fn complete(mut self: Box<Self>) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            // a failed request has already dropped the read half
            let _ = writer.shutdown().await;
        }

        let handle = self
            .handle
            .take()
            .ok_or_else(|| anyhow!("upload already completed."))?;

        handle.await.context("put_object task failed.")?
    }

    async fn abort(mut self: Box<Self>) -> Option<anyhow::Error> {
        drop(self.writer.take());

        let handle = self.handle.take()?;
        if !handle.is_finished() {
            handle.abort();
            return None;
        }

        match handle.await {
            Ok(result) => result.err(),
            Err(e) => Some(anyhow!(e)),
        }
    }
}

impl Drop for S3UploadWriter {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
