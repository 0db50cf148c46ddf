use std::io::Result;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_channel::Sender;
use pin_project::pin_project;
use tokio::io::{AsyncRead, ReadBuf};

use crate::types::SyncStatistics;

/// Reports every chunk read from `inner` as `SyncStatistics::SyncBytes`.
#[pin_project]
pub struct AsyncReadWithCallback<R: AsyncRead> {
    #[pin]
    inner: R,
    stats_sender: Sender<SyncStatistics>,
    total_bytes: u64,
}

impl<R: AsyncRead> AsyncReadWithCallback<R> {
    pub fn new(inner: R, stats_sender: Sender<SyncStatistics>) -> Self {
        Self {
            inner,
            stats_sender,
            total_bytes: 0,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

impl<R: AsyncRead> AsyncRead for AsyncReadWithCallback<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<Result<()>> {
        let this = self.project();

        let before = buf.filled().len();

        let result = this.inner.poll_read(cx, buf);
        if !result.is_ready() {
            return result;
        }

        let sync_bytes = buf.filled().len() - before;
        if 0 < sync_bytes {
            *this.total_bytes += sync_bytes as u64;

            // The receiver may already be closed by the caller.
            let _ = this
                .stats_sender
                .try_send(SyncStatistics::SyncBytes(sync_bytes as u64));
        }

        result
    }
}
