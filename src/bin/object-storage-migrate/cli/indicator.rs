use std::io;
use std::io::Write;

use async_channel::Receiver;
use indicatif::{HumanBytes, HumanCount, HumanDuration, ProgressBar, ProgressStyle};
use simple_moving_average::{SMA, SumTreeSMA};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

use object_storage_migrate::types::SyncStatistics;

const MOVING_AVERAGE_PERIOD_SECS: usize = 10;
const REFRESH_INTERVAL: f32 = 1.0;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct IndicatorTotals {
    sync_count: u64,
    sync_bytes: u64,
    error_count: u64,
    last_marker: Option<String>,
}

impl IndicatorTotals {
    /// Returns the line to print for a copied object.
    fn apply(&mut self, sync_stats: SyncStatistics) -> Option<String> {
        match sync_stats {
            SyncStatistics::SyncBytes(size) => {
                self.sync_bytes += size;
            }
            SyncStatistics::SyncComplete { key } => {
                self.sync_count += 1;
                return Some(format!("{} {key}", self.sync_count));
            }
            SyncStatistics::SyncError { .. } => {
                self.error_count += 1;
            }
            SyncStatistics::CheckpointCommitted { marker } => {
                self.last_marker = Some(marker);
            }
        }
        None
    }
}

pub fn show_indicator(
    stats_receiver: Receiver<SyncStatistics>,
    show_progress: bool,
    show_result: bool,
    log_sync_summary: bool,
) -> JoinHandle<()> {
    let progress_text = ProgressBar::new(0);
    if let Ok(progress_style) = ProgressStyle::with_template("{wide_msg}") {
        progress_text.set_style(progress_style);
    }
    if !show_progress {
        progress_text.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    tokio::spawn(async move {
        let start_time = Instant::now();

        let mut ma_synced_bytes = SumTreeSMA::<_, u64, MOVING_AVERAGE_PERIOD_SECS>::new();
        let mut ma_synced_count = SumTreeSMA::<_, u64, MOVING_AVERAGE_PERIOD_SECS>::new();

        let mut totals = IndicatorTotals::default();

        loop {
            let period_sync_count = totals.sync_count;
            let period_sync_bytes = totals.sync_bytes;

            let period = Instant::now();
            loop {
                while let Ok(sync_stats) = stats_receiver.try_recv() {
                    if let Some(line) = totals.apply(sync_stats) {
                        if show_result {
                            progress_text.suspend(|| println!("{line}"));
                        }
                    }
                }

                if REFRESH_INTERVAL < period.elapsed().as_secs_f32() {
                    break;
                }

                if stats_receiver.is_closed() && stats_receiver.is_empty() {
                    finish(
                        &progress_text,
                        &totals,
                        start_time,
                        show_result,
                        log_sync_summary,
                    );
                    return;
                }

                tokio::time::sleep(std::time::Duration::from_secs_f32(0.05)).await;
            }

            ma_synced_bytes.add_sample(totals.sync_bytes - period_sync_bytes);
            ma_synced_count.add_sample(totals.sync_count - period_sync_count);

            if show_progress {
                progress_text.set_message(format!(
                    "{:>3} | {:>3}/sec,  transferred {:>3} objects | {:>3} objects/sec,  error {} objects",
                    HumanBytes(totals.sync_bytes),
                    HumanBytes(ma_synced_bytes.get_average()).to_string(),
                    totals.sync_count,
                    HumanCount(ma_synced_count.get_average()).to_string(),
                    totals.error_count,
                ));
            }
        }
    })
}

fn finish(
    progress_text: &ProgressBar,
    totals: &IndicatorTotals,
    start_time: Instant,
    show_result: bool,
    log_sync_summary: bool,
) {
    let elapsed = start_time.elapsed();
    let elapsed_secs_f64 = elapsed.as_secs_f64();

    let (objects_per_sec, sync_bytes_per_sec) = if elapsed_secs_f64 < REFRESH_INTERVAL as f64 {
        (totals.sync_count, totals.sync_bytes)
    } else {
        (
            (totals.sync_count as f64 / elapsed_secs_f64) as u64,
            (totals.sync_bytes as f64 / elapsed_secs_f64) as u64,
        )
    };

    if log_sync_summary {
        info!(
            message = "sync summary",
            transferred_byte = totals.sync_bytes,
            transferred_byte_per_sec = sync_bytes_per_sec,
            transferred_object = totals.sync_count,
            transferred_object_per_sec = objects_per_sec,
            error = totals.error_count,
            marker = totals.last_marker.as_deref(),
            duration_sec = elapsed_secs_f64,
        );
    }

    if show_result {
        if let Ok(result_style) = ProgressStyle::with_template("{msg}") {
            progress_text.set_style(result_style);
        }

        let summary = format!(
            "{:>3} | {:>3}/sec,  transferred {:>3} objects | {:>3} objects/sec,  error {} objects,  marker {},  duration {}",
            HumanBytes(totals.sync_bytes),
            HumanBytes(sync_bytes_per_sec),
            totals.sync_count,
            HumanCount(objects_per_sec),
            totals.error_count,
            totals.last_marker.as_deref().unwrap_or("-"),
            HumanDuration(elapsed),
        );
        progress_text.finish_and_clear();
        println!("{summary}");
        let _ = io::stdout().flush();
    } else {
        progress_text.finish_and_clear();
    }
}
