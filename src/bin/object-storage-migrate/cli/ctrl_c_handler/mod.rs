use tokio::task::JoinHandle;
use tokio::{select, signal};
use tracing::{debug, error, warn};

use object_storage_migrate::types::token::PipelineCancellationToken;

/// Cancels the sync on the first ctrl-c. The copy in flight is abandoned
/// and the marker stays at the last committed object.
pub fn spawn_ctrl_c_handler(cancellation_token: PipelineCancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        select! {
            _ = cancellation_token.cancelled() => {
                debug!("sync finished before ctrl-c.")
            }
            result = signal::ctrl_c() => {
                match result {
                    Ok(()) => {
                        warn!("ctrl-c received. stopping after the current object.");
                        cancellation_token.cancel();
                    }
                    Err(e) => {
                        error!("failed to listen for ctrl-c signal: {e}");
                    }
                }
            }
        }
    })
}
