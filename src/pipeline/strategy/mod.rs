//! Sync strategies decide which listed objects are new, in which order they
//! are copied and which checkpoint is committed after each copy.

use async_trait::async_trait;
use tracing::{error, trace};

use crate::marker::{MarkerKey, format_checkpoint};
use crate::pipeline::stage::Stage;
use crate::pipeline::syncer::ObjectSyncer;
use crate::types::error::MigrateError;
use crate::types::{Checkpoint, CopyResult, ObjectDescriptor, SyncMode, SyncParams, SyncStatistics};

pub mod date;
pub mod name;

pub type Strategy = Box<dyn SyncStrategy + Send + Sync>;

#[async_trait]
pub trait SyncStrategy {
    fn mode(&self) -> SyncMode;

    /// Copies every new object of `params.container`, one at a time.
    ///
    /// The first failure aborts the run. The checkpoint then still names the
    /// last object that was copied successfully.
    async fn sync(&self, stage: &Stage, params: &SyncParams) -> Result<SyncSummary, MigrateError>;
}

pub fn create_strategy(mode: SyncMode) -> Strategy {
    match mode {
        SyncMode::Date => Box::new(date::DateSyncStrategy::new()),
        SyncMode::Name => Box::new(name::NameSyncStrategy::new()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub copied_objects: u64,
    pub transferred_bytes: u64,
    pub checkpoint: Option<Checkpoint>,
}

impl SyncSummary {
    fn add(&mut self, copy_result: &CopyResult, checkpoint: Checkpoint) {
        self.copied_objects += 1;
        self.transferred_bytes += copy_result.transferred_bytes;
        self.checkpoint = Some(checkpoint);
    }
}

/// Copies one object and then durably records `checkpoint` for it.
pub(crate) async fn copy_and_commit(
    stage: &Stage,
    object: &ObjectDescriptor,
    params: &SyncParams,
    marker_key: &MarkerKey,
    checkpoint: Checkpoint,
    summary: &mut SyncSummary,
) -> Result<(), MigrateError> {
    if stage.is_cancelled() {
        return Err(MigrateError::Cancelled);
    }

    let copy_result = match ObjectSyncer::new(stage)
        .copy(object, Some(params.target_container()))
        .await
    {
        Ok(copy_result) => copy_result,
        Err(e) => {
            if !e.is_cancelled() {
                stage
                    .send_stats(SyncStatistics::SyncError {
                        key: object.name.clone(),
                    })
                    .await;
            }
            return Err(e);
        }
    };

    if let Err(e) = stage
        .marker_store
        .write_checkpoint(marker_key, &checkpoint)
        .await
    {
        let error = e.to_string();
        error!(
            name = object.name.as_str(),
            error = error,
            "object copied but the checkpoint could not be persisted."
        );
        return Err(e);
    }

    let marker = format_checkpoint(&checkpoint);
    trace!(
        container = params.container.as_str(),
        marker = marker.as_str(),
        "checkpoint committed."
    );

    summary.add(&copy_result, checkpoint);

    stage
        .send_stats(SyncStatistics::CheckpointCommitted { marker })
        .await;
    stage
        .send_stats(SyncStatistics::SyncComplete {
            key: object.name.clone(),
        })
        .await;

    Ok(())
}
