use std::collections::{BTreeMap, HashSet};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::storage::{DownloadStream, Storage, StorageTrait, UploadStream, UploadWriter};
use crate::types::{ContainerInfo, ObjectDescriptor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ListCall {
    pub container: String,
    pub limit: i32,
    pub marker: Option<String>,
}

#[derive(Debug, Clone)]
struct MockObject {
    data: Vec<u8>,
    last_modified: DateTime<Utc>,
    content_type: Option<String>,
}

#[derive(Default)]
struct MockState {
    containers: BTreeMap<String, BTreeMap<String, MockObject>>,
    list_calls: Vec<ListCall>,
    fail_list_call: Option<usize>,
    fail_download: HashSet<String>,
    fail_read: HashSet<String>,
    fail_upload: HashSet<String>,
    fail_write: HashSet<String>,
    fail_complete: HashSet<String>,
    fail_abort: HashSet<String>,
    write_limit: Option<usize>,
    completed: Vec<String>,
    aborted: Vec<String>,
}

#[derive(Default)]
struct TransferCounters {
    read: AtomicU64,
    written: AtomicU64,
    max_outstanding: AtomicU64,
}

/// In-memory storage with scripted failures.
#[derive(Clone, Default)]
pub(crate) struct MockStorage {
    state: Arc<Mutex<MockState>>,
    counters: Arc<TransferCounters>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two storages sharing transfer counters, so the bytes read from the
    /// first can be compared with the bytes accepted by the second.
    pub fn new_pair() -> (Self, Self) {
        let source = Self::new();
        let target = Self {
            state: Arc::new(Mutex::new(MockState::default())),
            counters: source.counters.clone(),
        };
        (source, target)
    }

    pub fn boxed(&self) -> Storage {
        Box::new(self.clone())
    }

    pub fn put(&self, container: &str, name: &str, data: &[u8], last_modified: DateTime<Utc>) {
        self.put_with_content_type(container, name, data, last_modified, None);
    }

    pub fn put_with_content_type(
        &self,
        container: &str,
        name: &str,
        data: &[u8],
        last_modified: DateTime<Utc>,
        content_type: Option<&str>,
    ) {
        let mut state = self.state.lock().unwrap();
        state.containers.entry(container.to_string()).or_default().insert(
            name.to_string(),
            MockObject {
                data: data.to_vec(),
                last_modified,
                content_type: content_type.map(str::to_string),
            },
        );
    }

    pub fn create_container(&self, container: &str) {
        self.state
            .lock()
            .unwrap()
            .containers
            .entry(container.to_string())
            .or_default();
    }

    pub fn object(&self, container: &str, name: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state
            .containers
            .get(container)
            .and_then(|objects| objects.get(name))
            .map(|object| object.data.clone())
    }

    pub fn content_type(&self, container: &str, name: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .containers
            .get(container)
            .and_then(|objects| objects.get(name))
            .and_then(|object| object.content_type.clone())
    }

    pub fn names(&self, container: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .containers
            .get(container)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Names in the order their uploads completed.
    pub fn completed(&self) -> Vec<String> {
        self.state.lock().unwrap().completed.clone()
    }

    /// Names whose uploads were aborted, in order.
    pub fn aborted(&self) -> Vec<String> {
        self.state.lock().unwrap().aborted.clone()
    }

    pub fn list_calls(&self) -> Vec<ListCall> {
        self.state.lock().unwrap().list_calls.clone()
    }

    /// The n-th list call (starting at 1) fails.
    pub fn fail_list_call(&self, n: usize) {
        self.state.lock().unwrap().fail_list_call = Some(n);
    }

    pub fn fail_download(&self, name: &str) {
        self.state.lock().unwrap().fail_download.insert(name.to_string());
    }

    pub fn fail_read(&self, name: &str) {
        self.state.lock().unwrap().fail_read.insert(name.to_string());
    }

    pub fn fail_upload(&self, name: &str) {
        self.state.lock().unwrap().fail_upload.insert(name.to_string());
    }

    /// Writes fail after the first one was accepted.
    pub fn fail_write(&self, name: &str) {
        self.state.lock().unwrap().fail_write.insert(name.to_string());
    }

    /// Aborting the upload reports a provider failure.
    pub fn fail_abort(&self, name: &str) {
        self.state.lock().unwrap().fail_abort.insert(name.to_string());
    }

    pub fn fail_complete(&self, name: &str) {
        self.state.lock().unwrap().fail_complete.insert(name.to_string());
    }

    /// Writers accept at most `limit` bytes per poll.
    pub fn set_write_limit(&self, limit: usize) {
        self.state.lock().unwrap().write_limit = Some(limit);
    }

    pub fn max_outstanding_bytes(&self) -> u64 {
        self.counters.max_outstanding.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageTrait for MockStorage {
    fn is_local_storage(&self) -> bool {
        false
    }

    async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .containers
            .keys()
            .map(|name| ContainerInfo { name: name.clone() })
            .collect())
    }

    async fn list_objects(
        &self,
        container: &str,
        limit: i32,
        marker: Option<&str>,
    ) -> Result<Vec<ObjectDescriptor>> {
        let mut state = self.state.lock().unwrap();
        state.list_calls.push(ListCall {
            container: container.to_string(),
            limit,
            marker: marker.map(str::to_string),
        });

        if state.fail_list_call == Some(state.list_calls.len()) {
            return Err(anyhow!("injected listing failure."));
        }

        let objects = state
            .containers
            .get(container)
            .ok_or_else(|| anyhow!("container not found: {container}"))?;

        Ok(objects
            .iter()
            .filter(|(name, _)| marker.is_none_or(|marker| name.as_str() > marker))
            .take(limit as usize)
            .map(|(name, object)| ObjectDescriptor {
                name: name.clone(),
                container: container.to_string(),
                last_modified: object.last_modified,
                content_type: None,
                size: Some(object.data.len() as u64),
            })
            .collect())
    }

    async fn open_download(&self, container: &str, name: &str) -> Result<DownloadStream> {
        let state = self.state.lock().unwrap();
        if state.fail_download.contains(name) {
            return Err(anyhow!("injected download failure."));
        }

        let object = state
            .containers
            .get(container)
            .and_then(|objects| objects.get(name))
            .ok_or_else(|| anyhow!("object not found: {container}/{name}"))?;

        Ok(DownloadStream {
            reader: Box::new(MockReader {
                data: object.data.clone(),
                position: 0,
                fail: state.fail_read.contains(name),
                counters: self.counters.clone(),
            }),
            content_type: object.content_type.clone(),
            content_length: Some(object.data.len() as u64),
        })
    }

    async fn open_upload(
        &self,
        container: &str,
        name: &str,
        content_type: Option<&str>,
        _content_length: Option<u64>,
    ) -> Result<UploadStream> {
        let state = self.state.lock().unwrap();
        if state.fail_upload.contains(name) {
            return Err(anyhow!("injected upload failure."));
        }

        Ok(Box::new(MockWriter {
            storage: self.clone(),
            container: container.to_string(),
            name: name.to_string(),
            content_type: content_type.map(str::to_string),
            buffer: Vec::new(),
            write_limit: state.write_limit,
            fail_write: state.fail_write.contains(name),
        }))
    }
}

struct MockReader {
    data: Vec<u8>,
    position: usize,
    fail: bool,
    counters: Arc<TransferCounters>,
}

impl AsyncRead for MockReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        // fails after the first half has been delivered
        if self.fail && self.data.len() / 2 <= self.position {
            return Poll::Ready(Err(io::Error::other("injected read failure.")));
        }

        let end = if self.fail {
            self.data.len() / 2
        } else {
            self.data.len()
        };
        let size = buf.remaining().min(end - self.position);
        let start = self.position;
        buf.put_slice(&self.data[start..start + size]);
        self.position += size;

        self.counters.read.fetch_add(size as u64, Ordering::SeqCst);

        Poll::Ready(Ok(()))
    }
}

struct MockWriter {
    storage: MockStorage,
    container: String,
    name: String,
    content_type: Option<String>,
    buffer: Vec<u8>,
    write_limit: Option<usize>,
    fail_write: bool,
}

impl AsyncWrite for MockWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.fail_write && !self.buffer.is_empty() {
            return Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)));
        }

        let counters = self.storage.counters.clone();
        let outstanding = counters
            .read
            .load(Ordering::SeqCst)
            .saturating_sub(counters.written.load(Ordering::SeqCst));
        counters
            .max_outstanding
            .fetch_max(outstanding, Ordering::SeqCst);

        let size = self.write_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        self.buffer.extend_from_slice(&buf[..size]);
        counters.written.fetch_add(size as u64, Ordering::SeqCst);

        Poll::Ready(Ok(size))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl UploadWriter for MockWriter {
    async fn complete(self: Box<Self>) -> Result<()> {
        let mut state = self.storage.state.lock().unwrap();
        if state.fail_complete.contains(&self.name) {
            return Err(anyhow!("injected completion failure."));
        }

        state
            .containers
            .entry(self.container.clone())
            .or_default()
            .insert(
                self.name.clone(),
                MockObject {
                    data: self.buffer.clone(),
                    last_modified: Utc::now(),
                    content_type: self.content_type.clone(),
                },
            );
        state.completed.push(self.name.clone());

        Ok(())
    }

    async fn abort(self: Box<Self>) -> Option<anyhow::Error> {
        let mut state = self.storage.state.lock().unwrap();
        state.aborted.push(self.name.clone());
        if state.fail_abort.contains(&self.name) {
            return Some(anyhow!("injected abort failure."));
        }
        if self.fail_write {
            return Some(anyhow!("injected write failure."));
        }
        None
    }
}
