use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Error, Result, anyhow};
use async_channel::{Receiver, Sender};
use tracing::{error, trace, warn};

use crate::Config;
use crate::config::Command;
use crate::marker::MarkerStore;
use crate::pipeline::stage::Stage;
use crate::pipeline::strategy::{SyncSummary, create_strategy};
use crate::storage::{Storage, StoragePair};
use crate::types::SyncStatistics;
use crate::types::token::PipelineCancellationToken;

pub mod lister;
pub mod stage;
pub mod storage_factory;
pub mod strategy;
pub mod syncer;

/// One sync run of one container.
pub struct Pipeline {
    config: Config,
    source: Storage,
    target: Storage,
    cancellation_token: PipelineCancellationToken,
    stats_sender: Sender<SyncStatistics>,
    stats_receiver: Receiver<SyncStatistics>,
    has_error: Arc<AtomicBool>,
    errors: Arc<Mutex<VecDeque<Error>>>,
    sync_summary: Option<SyncSummary>,
    cancelled: bool,
    ready: bool,
}

impl Pipeline {
    pub async fn new(config: Config, cancellation_token: PipelineCancellationToken) -> Result<Self> {
        let storage_pair = storage_factory::create_storage_pair(&config).await?;

        Ok(Self::with_storage_pair(
            config,
            storage_pair,
            cancellation_token,
        ))
    }

    pub fn with_storage_pair(
        config: Config,
        storage_pair: StoragePair,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        let StoragePair { source, target } = storage_pair;
        let (stats_sender, stats_receiver) = async_channel::unbounded();

        Self {
            config,
            source,
            target,
            cancellation_token,
            stats_sender,
            stats_receiver,
            has_error: Arc::new(AtomicBool::new(false)),
            errors: Arc::new(Mutex::new(VecDeque::new())),
            sync_summary: None,
            cancelled: false,
            ready: true,
        }
    }

    pub async fn run(&mut self) {
        if !self.ready {
            self.print_and_store_error(anyhow!("a pipeline can be run only once."));
            return;
        }
        self.ready = false;

        self.sync().await;

        self.shutdown();
    }

    async fn sync(&mut self) {
        let Command::Sync { mode, params } = &self.config.command else {
            self.print_and_store_error(anyhow!("the command is not a sync command."));
            return;
        };
        let (mode, params) = (*mode, params.clone());

        trace!(mode = mode.as_str(), "pipeline has started.");

        let stage = Stage::new(
            self.config.clone(),
            dyn_clone::clone_box(&*self.source),
            dyn_clone::clone_box(&*self.target),
            MarkerStore::new(&self.config.marker_dir),
            self.cancellation_token.clone(),
            self.stats_sender.clone(),
        );

        match create_strategy(mode).sync(&stage, &params).await {
            Ok(sync_summary) => {
                self.sync_summary = Some(sync_summary);
            }
            Err(e) if e.is_cancelled() => {
                self.cancelled = true;
                warn!(
                    container = params.container.as_str(),
                    "sync has been cancelled."
                );
            }
            Err(e) => {
                self.print_and_store_error(anyhow!(e));
            }
        }

        trace!(mode = mode.as_str(), "pipeline has been completed.");
    }

    fn shutdown(&self) {
        self.close_stats_sender();
    }

    fn print_and_store_error(&self, e: Error) {
        self.has_error.store(true, Ordering::SeqCst);

        let error = format!("{e:#}");
        error!(error = error, "sync has been aborted.");

        if let Ok(mut errors) = self.errors.lock() {
            errors.push_back(e);
        }
    }

    pub fn get_stats_receiver(&self) -> Receiver<SyncStatistics> {
        self.stats_receiver.clone()
    }

    pub fn has_error(&self) -> bool {
        self.has_error.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn get_errors_and_consume(&self) -> Option<Vec<Error>> {
        if !self.has_error() {
            return None;
        }

        let mut errors = self.errors.lock().ok()?;
        Some(errors.drain(..).collect())
    }

    pub fn get_sync_summary(&self) -> Option<&SyncSummary> {
        self.sync_summary.as_ref()
    }

    pub fn close_stats_sender(&self) {
        self.stats_sender.close();
    }
}
