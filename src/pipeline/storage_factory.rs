use anyhow::{Context, Result, anyhow};

use crate::Config;
use crate::config::StorageConfig;
use crate::storage::local::LocalStorageFactory;
use crate::storage::s3::S3StorageFactory;
use crate::storage::{Storage, StorageFactory, StoragePair};

pub async fn create_storage_pair(config: &Config) -> Result<StoragePair> {
    let source = config
        .source
        .clone()
        .ok_or_else(|| anyhow!("source storage is not configured."))?;
    let target = config
        .target
        .clone()
        .ok_or_else(|| anyhow!("target storage is not configured."))?;

    Ok(StoragePair {
        source: create_storage(source)
            .await
            .context("failed to create the source storage.")?,
        target: create_storage(target)
            .await
            .context("failed to create the target storage.")?,
    })
}

pub async fn create_storage(storage_config: StorageConfig) -> Result<Storage> {
    match storage_config {
        StorageConfig::S3(_) => S3StorageFactory::create(storage_config).await,
        StorageConfig::Local(_) => LocalStorageFactory::create(storage_config).await,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::pipeline::stage::test_support::create_test_config;
    use crate::types::{SyncMode, SyncParams};

    #[tokio::test]
    async fn create_local_pair() {
        init_dummy_tracing_subscriber();

        let mut config = create_test_config(
            SyncMode::Date,
            SyncParams::new("photos"),
            &PathBuf::from("."),
            1024,
        );
        config.source = Some(StorageConfig::Local(PathBuf::from("./source")));
        config.target = Some(StorageConfig::Local(PathBuf::from("./target")));

        let StoragePair { source, target } = create_storage_pair(&config).await.unwrap();
        assert!(source.is_local_storage());
        assert!(target.is_local_storage());
    }

    #[tokio::test]
    async fn missing_storage_config() {
        init_dummy_tracing_subscriber();

        let config = create_test_config(
            SyncMode::Date,
            SyncParams::new("photos"),
            &PathBuf::from("."),
            1024,
        );

        assert!(create_storage_pair(&config).await.is_err());
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
