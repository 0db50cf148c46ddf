/*!
# Overview
object-storage-migrate incrementally replicates the objects of one object storage container
into another, and resumes safely where the previous run stopped.

## Features
- Two sync modes
  - `sync-date`: copies the objects modified after the last checkpoint, oldest first.
    The checkpoint is the modification time of the last copied object.
  - `sync-name`: copies the objects in listing order, one page at a time.
    The checkpoint is the name of the last copied object.

- Resumable
  The checkpoint is written durably after every successfully copied object.
  A failed or interrupted run leaves it at the last success, so running the same command again
  resumes at the failed object. At most one object is copied twice, none is skipped.

- Bounded memory
  Objects are streamed from the source to the target one chunk at a time (`--copy-chunksize`).
  An object is never buffered as a whole.

- Providers
  - S3 and S3-compatible storage (AWS SDK for Rust)
  - Local filesystem (a directory per container)

## As a library
The CLI is a thin wrapper of this library.

Example usage
=============

```Toml
[dependencies]
object-storage-migrate = "0.3"
tokio = { version = "1", features = ["full"] }
```

```no_run
use object_storage_migrate::config::args::build_config_from_args;
use object_storage_migrate::pipeline::Pipeline;
use object_storage_migrate::types::SyncStatistics;
use object_storage_migrate::types::token::create_pipeline_cancellation_token;

#[tokio::main]
async fn main() {
    // source.json and target.json hold the credentials of each side.
    // {"provider": "local", "root": "/data/containers"}
    let args = vec![
        "object-storage-migrate",
        "--source-credential-file",
        "./source.json",
        "--target-credential-file",
        "./target.json",
        "sync-date",
        "photos",
        "--to",
        "photos-backup",
    ];
    let config = build_config_from_args(args).unwrap();

    // The token can be used to stop the run between two objects.
    let cancellation_token = create_pipeline_cancellation_token();
    let mut pipeline = Pipeline::new(config, cancellation_token).await.unwrap();
    let stats_receiver = pipeline.get_stats_receiver();

    pipeline.run().await;

    let mut copied = 0;
    while let Ok(sync_stats) = stats_receiver.try_recv() {
        if let SyncStatistics::SyncComplete { key } = sync_stats {
            copied += 1;
            println!("{copied} {key}");
        }
    }

    if pipeline.has_error() {
        println!("{:?}", pipeline.get_errors_and_consume().unwrap()[0]);
    }
}
```
*/

pub use config::Config;
pub use config::args::CLIArgs;

pub mod config;
pub mod marker;
pub mod pipeline;
pub mod storage;
pub mod types;
