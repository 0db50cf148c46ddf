#![allow(dead_code)]

use std::path::{Path, PathBuf};

use async_channel::Receiver;
use chrono::{DateTime, TimeZone, Utc};
use filetime::{FileTime, set_file_mtime};
use tempfile::TempDir;

use object_storage_migrate::Config;
use object_storage_migrate::config::args::build_config_from_args;
use object_storage_migrate::marker::{MarkerKey, MarkerStore};
use object_storage_migrate::pipeline::Pipeline;
use object_storage_migrate::types::token::create_pipeline_cancellation_token;
use object_storage_migrate::types::{SyncMode, SyncStatistics};

pub const PHOTOS: &str = "photos";

/// A source and a target local storage plus a marker directory, all inside
/// one temporary directory.
pub struct TestHelper {
    dir: TempDir,
}

impl TestHelper {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        for sub_dir in ["source", "target", "markers"] {
            std::fs::create_dir_all(dir.path().join(sub_dir)).unwrap();
        }

        let helper = Self { dir };
        helper.write_credential("source.json", &helper.source_root());
        helper.write_credential("target.json", &helper.target_root());
        helper
    }

    pub fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }

    pub fn source_root(&self) -> PathBuf {
        self.dir.path().join("source")
    }

    pub fn target_root(&self) -> PathBuf {
        self.dir.path().join("target")
    }

    pub fn marker_dir(&self) -> PathBuf {
        self.dir.path().join("markers")
    }

    pub fn put_source(&self, container: &str, name: &str, body: &[u8], last_modified: i64) {
        let path = self.source_root().join(container).join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, body).unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(last_modified, 0)).unwrap();
    }

    /// `a.jpg` (T3), `b.jpg` (T2) and `c.jpg` (T1).
    pub fn put_photos(&self) {
        self.put_source(PHOTOS, "a.jpg", b"aaaaa", Self::t(3).timestamp());
        self.put_source(PHOTOS, "b.jpg", b"bbbbb", Self::t(2).timestamp());
        self.put_source(PHOTOS, "c.jpg", b"ccccc", Self::t(1).timestamp());
    }

    pub fn t(n: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, n, 0, 0, 0).unwrap()
    }

    pub fn target_object(&self, container: &str, name: &str) -> Option<Vec<u8>> {
        std::fs::read(self.target_root().join(container).join(name)).ok()
    }

    pub fn target_names(&self, container: &str) -> Vec<String> {
        let container_path = self.target_root().join(container);
        let mut names: Vec<String> = walkdir::WalkDir::new(&container_path)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                entry
                    .path()
                    .strip_prefix(&container_path)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        names.sort();
        names
    }

    pub fn config(&self, command: &[&str]) -> Config {
        build_config_from_args(self.args(command)).unwrap()
    }

    pub fn args(&self, command: &[&str]) -> Vec<String> {
        let mut args = vec![
            "object-storage-migrate".to_string(),
            "--source-credential-file".to_string(),
            path_arg(&self.dir.path().join("source.json")),
            "--target-credential-file".to_string(),
            path_arg(&self.dir.path().join("target.json")),
            "--marker-dir".to_string(),
            path_arg(&self.marker_dir()),
            "--copy-chunksize".to_string(),
            "1KiB".to_string(),
        ];
        args.extend(command.iter().map(|arg| arg.to_string()));
        args
    }

    /// Runs one pipeline and returns it with the names it copied, in order.
    pub async fn sync(&self, command: &[&str]) -> (Pipeline, Vec<String>) {
        let config = self.config(command);
        let mut pipeline = Pipeline::new(config, create_pipeline_cancellation_token())
            .await
            .unwrap();
        let stats_receiver = pipeline.get_stats_receiver();

        pipeline.run().await;

        (pipeline, completed_keys(stats_receiver))
    }

    pub async fn read_marker(&self, mode: SyncMode, container: &str) -> Option<String> {
        MarkerStore::new(self.marker_dir())
            .read(&MarkerKey::new(mode, container))
            .await
    }

    pub async fn write_marker(&self, mode: SyncMode, container: &str, value: &str) {
        MarkerStore::new(self.marker_dir())
            .write(&MarkerKey::new(mode, container), value)
            .await
            .unwrap();
    }

    fn write_credential(&self, file_name: &str, root: &Path) {
        let credential = serde_json::json!({
            "provider": "local",
            "root": root.to_string_lossy(),
        });
        std::fs::write(self.dir.path().join(file_name), credential.to_string()).unwrap();
    }
}

pub fn completed_keys(stats_receiver: Receiver<SyncStatistics>) -> Vec<String> {
    let mut keys = Vec::new();
    while let Ok(sync_stats) = stats_receiver.try_recv() {
        if let SyncStatistics::SyncComplete { key } = sync_stats {
            keys.push(key);
        }
    }
    keys
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
