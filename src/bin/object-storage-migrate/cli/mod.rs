use anyhow::{Context, Result, anyhow};
use tokio::time::Instant;
use tracing::{error, info, trace, warn};

use object_storage_migrate::Config;
use object_storage_migrate::config::{Command, StorageConfig};
use object_storage_migrate::marker::{ClearResult, MarkerKey, MarkerStore};
use object_storage_migrate::pipeline::Pipeline;
use object_storage_migrate::pipeline::storage_factory::create_storage;
use object_storage_migrate::types::SyncMode;
use object_storage_migrate::types::token::create_pipeline_cancellation_token;

mod ctrl_c_handler;
mod indicator;
mod ui_config;

pub async fn run(config: Config) -> Result<()> {
    let result = match &config.command {
        Command::Sync { .. } => run_sync(config.clone()).await,
        Command::ClearMarker { mode, container } => {
            clear_marker(&config, *mode, container).await
        }
        Command::Containers => list_containers(&config).await,
        Command::Credentials => show_credentials(&config),
        Command::Completions(_) => Ok(()),
    };

    if let Err(e) = &result {
        let error = format!("{e:#}");
        error!(error = error, "object-storage-migrate failed.");
    }

    result
}

async fn run_sync(config: Config) -> Result<()> {
    let cancellation_token = create_pipeline_cancellation_token();
    ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

    let start_time = Instant::now();
    trace!("sync pipeline start.");

    let mut pipeline = Pipeline::new(config.clone(), cancellation_token).await?;
    let indicator_join_handle = indicator::show_indicator(
        pipeline.get_stats_receiver(),
        ui_config::is_progress_indicator_needed(&config),
        ui_config::is_show_result_needed(&config),
        ui_config::is_log_sync_summary_needed(&config),
    );

    pipeline.run().await;
    indicator_join_handle.await?;

    let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());
    if pipeline.has_error() {
        let errors = pipeline.get_errors_and_consume().unwrap_or_default();
        return Err(errors
            .into_iter()
            .next()
            .unwrap_or_else(|| anyhow!("sync failed.")));
    }

    if pipeline.is_cancelled() {
        warn!(duration_sec = duration_sec, "sync has been cancelled.");
        return Ok(());
    }

    trace!(duration_sec = duration_sec, "sync has been completed.");

    Ok(())
}

async fn clear_marker(config: &Config, mode: SyncMode, container: &str) -> Result<()> {
    let marker_store = MarkerStore::new(&config.marker_dir);
    let key = MarkerKey::new(mode, container);
    let path = marker_store.path(&key);

    let result = marker_store
        .clear(&key)
        .await
        .with_context(|| format!("failed to clear the marker: {}", path.display()))?;

    match result {
        ClearResult::Deleted => println!("deleted: {}", path.display()),
        ClearResult::Empty => println!("empty: {}", path.display()),
    }

    info!(
        mode = mode.as_str(),
        container = container,
        "marker has been cleared."
    );

    Ok(())
}

async fn list_containers(config: &Config) -> Result<()> {
    for (side, storage_config) in storage_configs(config)? {
        let storage = create_storage(storage_config.clone())
            .await
            .with_context(|| format!("failed to create the {side} storage."))?;
        let containers = storage
            .list_containers()
            .await
            .with_context(|| format!("failed to list the {side} containers."))?;

        println!("{side}:");
        for container in containers {
            println!("  {}", container.name);
        }
    }

    Ok(())
}

fn show_credentials(config: &Config) -> Result<()> {
    for (side, storage_config) in storage_configs(config)? {
        println!("{side}: {}", storage_config.describe());
    }

    Ok(())
}

fn storage_configs(config: &Config) -> Result<[(&'static str, &StorageConfig); 2]> {
    let source = config
        .source
        .as_ref()
        .ok_or_else(|| anyhow!("source storage is not configured."))?;
    let target = config
        .target
        .as_ref()
        .ok_or_else(|| anyhow!("target storage is not configured."))?;

    Ok([("source", source), ("target", target)])
}
