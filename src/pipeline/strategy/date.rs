use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::marker::{MarkerKey, format_date_marker};
use crate::pipeline::lister::ObjectLister;
use crate::pipeline::stage::Stage;
use crate::types::error::MigrateError;
use crate::types::{Checkpoint, SyncMode, SyncParams};

use super::{SyncStrategy, SyncSummary, copy_and_commit};

pub const DEFAULT_DATE_PAGE_SIZE: i32 = 10000;

/// Copies objects modified after the checkpoint, oldest first.
///
/// The whole listing is pulled before the first copy, because the provider
/// lists by name and the copy order is by modification time.
pub struct DateSyncStrategy {}

impl DateSyncStrategy {
    pub fn new() -> Self {
        Self {}
    }

    async fn resolve_checkpoint(
        &self,
        stage: &Stage,
        params: &SyncParams,
        marker_key: &MarkerKey,
    ) -> DateTime<Utc> {
        if let Some(since) = params.since {
            return since;
        }

        if !params.skip_marker {
            if let Some(Checkpoint::Date(date)) =
                stage.marker_store.read_checkpoint(marker_key).await
            {
                return date;
            }
        }

        DateTime::<Utc>::UNIX_EPOCH
    }
}

impl Default for DateSyncStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncStrategy for DateSyncStrategy {
    fn mode(&self) -> SyncMode {
        SyncMode::Date
    }

    async fn sync(&self, stage: &Stage, params: &SyncParams) -> Result<SyncSummary, MigrateError> {
        let marker_key = MarkerKey::new(SyncMode::Date, &params.container);
        let since = self.resolve_checkpoint(stage, params, &marker_key).await;

        let since_string = format_date_marker(&since);
        info!(
            container = params.container.as_str(),
            since = since_string,
            "sync by date has started."
        );

        let page_size = params.max_keys.unwrap_or(DEFAULT_DATE_PAGE_SIZE);
        let mut lister = ObjectLister::new(&stage.source, &params.container, page_size, None);

        let mut objects = Vec::new();
        while let Some(object) = lister.next().await? {
            if stage.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }

            if since < object.last_modified {
                objects.push(object);
            }
        }

        // stable, so equal timestamps keep the listing order
        objects.sort_by_key(|object| object.last_modified);

        debug!(
            container = params.container.as_str(),
            pages = lister.page_count(),
            new_objects = objects.len(),
            "listing for sync by date has been completed."
        );

        let mut summary = SyncSummary::default();
        for object in &objects {
            copy_and_commit(
                stage,
                object,
                params,
                &marker_key,
                Checkpoint::Date(object.last_modified),
                &mut summary,
            )
            .await?;
        }

        info!(
            container = params.container.as_str(),
            copied_objects = summary.copied_objects,
            "sync by date has been completed."
        );

        Ok(summary)
    }
}
