use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_smithy_types::body::SdkBody;
use dyn_clone::DynClone;
use futures_util::stream::TryStreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::io::ReaderStream;

use crate::config::StorageConfig;
use crate::types::{ContainerInfo, ObjectDescriptor};

pub mod local;
pub mod s3;

#[cfg(test)]
pub(crate) mod mock;

pub type Storage = Box<dyn StorageTrait + Send + Sync>;

pub struct StoragePair {
    pub source: Storage,
    pub target: Storage,
}

#[async_trait]
pub trait StorageFactory {
    async fn create(storage_config: StorageConfig) -> Result<Storage>;
}

/// Capabilities a provider driver offers to the sync engine.
///
/// A storage handle is not bound to a container; every call names the one it works on.
#[async_trait]
pub trait StorageTrait: DynClone {
    fn is_local_storage(&self) -> bool;

    async fn list_containers(&self) -> Result<Vec<ContainerInfo>>;

    /// Returns up to `limit` objects whose names sort strictly after `marker`.
    /// A result shorter than `limit` means the listing is exhausted.
    async fn list_objects(
        &self,
        container: &str,
        limit: i32,
        marker: Option<&str>,
    ) -> Result<Vec<ObjectDescriptor>>;

    async fn open_download(&self, container: &str, name: &str) -> Result<DownloadStream>;

    async fn open_upload(
        &self,
        container: &str,
        name: &str,
        content_type: Option<&str>,
        content_length: Option<u64>,
    ) -> Result<UploadStream>;
}

pub struct DownloadStream {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

/// Write half of an upload.
///
/// Dropping a writer without calling `complete()` abandons the upload and
/// leaves no object behind.
#[async_trait]
pub trait UploadWriter: AsyncWrite + Send + Unpin {
    /// Resolves once the provider has durably stored every written byte.
    async fn complete(self: Box<Self>) -> Result<()>;

    /// Abandons the upload. Returns the provider failure that broke the
    /// writer, if one is known.
    async fn abort(self: Box<Self>) -> Option<anyhow::Error> {
        None
    }
}

pub type UploadStream = Box<dyn UploadWriter>;

#[rustfmt::skip] // For coverage tool incorrectness
pub fn convert_to_byte_stream<R>(reader: R) -> ByteStream
where
    R: AsyncRead + Send + Sync + 'static,
{
    let reader_stream = ReaderStream::new(reader).map_ok(Frame::data);

    let stream_body = StreamBody::new(reader_stream);

    let boxed_body = BodyExt::boxed(stream_body);

    let sdk_body = SdkBody::from_body_1_x(boxed_body);

    ByteStream::new(sdk_body)
}
