use async_trait::async_trait;
use tracing::info;

use crate::marker::MarkerKey;
use crate::pipeline::lister::ObjectLister;
use crate::pipeline::stage::Stage;
use crate::types::error::MigrateError;
use crate::types::{Checkpoint, SyncMode, SyncParams};

use super::{SyncStrategy, SyncSummary, copy_and_commit};

pub const DEFAULT_NAME_PAGE_SIZE: i32 = 1;

/// Copies objects in listing order, resuming after the last copied name.
///
/// The checkpoint is committed after each object, before the next page is
/// requested, so the stored name is always a valid listing marker.
pub struct NameSyncStrategy {}

impl NameSyncStrategy {
    pub fn new() -> Self {
        Self {}
    }

    async fn resolve_marker(
        &self,
        stage: &Stage,
        params: &SyncParams,
        marker_key: &MarkerKey,
    ) -> Option<String> {
        if params.marker.is_some() {
            return params.marker.clone();
        }

        match stage.marker_store.read_checkpoint(marker_key).await {
            Some(Checkpoint::Name(name)) => Some(name),
            _ => None,
        }
    }
}

impl Default for NameSyncStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncStrategy for NameSyncStrategy {
    fn mode(&self) -> SyncMode {
        SyncMode::Name
    }

    async fn sync(&self, stage: &Stage, params: &SyncParams) -> Result<SyncSummary, MigrateError> {
        let marker_key = MarkerKey::new(SyncMode::Name, &params.container);
        let resolved_marker = self.resolve_marker(stage, params, &marker_key).await;

        // a full re-scan that still moves the checkpoint forward
        let start_marker = if params.skip_marker {
            None
        } else {
            resolved_marker
        };

        info!(
            container = params.container.as_str(),
            marker = start_marker.as_deref(),
            "sync by name has started."
        );

        let page_size = params.max_keys.unwrap_or(DEFAULT_NAME_PAGE_SIZE);
        let mut lister =
            ObjectLister::new(&stage.source, &params.container, page_size, start_marker);

        let mut summary = SyncSummary::default();
        while let Some(object) = lister.next().await? {
            let checkpoint = Checkpoint::Name(object.name.clone());
            copy_and_commit(stage, &object, params, &marker_key, checkpoint, &mut summary).await?;
        }

        info!(
            container = params.container.as_str(),
            copied_objects = summary.copied_objects,
            "sync by name has been completed."
        );

        Ok(summary)
    }
}
