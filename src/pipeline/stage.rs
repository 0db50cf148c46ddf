use async_channel::Sender;

use crate::Config;
use crate::marker::MarkerStore;
use crate::storage::Storage;
use crate::types::SyncStatistics;
use crate::types::token::PipelineCancellationToken;

/// Everything a sync run works with. Built once per run and borrowed by
/// the lister, the syncer and the strategies.
pub struct Stage {
    pub config: Config,
    pub source: Storage,
    pub target: Storage,
    pub marker_store: MarkerStore,
    pub cancellation_token: PipelineCancellationToken,
    pub stats_sender: Sender<SyncStatistics>,
}

impl Stage {
    pub fn new(
        config: Config,
        source: Storage,
        target: Storage,
        marker_store: MarkerStore,
        cancellation_token: PipelineCancellationToken,
        stats_sender: Sender<SyncStatistics>,
    ) -> Self {
        Self {
            config,
            source,
            target,
            marker_store,
            cancellation_token,
            stats_sender,
        }
    }

    pub async fn send_stats(&self, stats: SyncStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
