//! Periodic sampling of a conversion's progress feed.

use super::{ProgressFeed, is_complete, parse_progress};
use crate::db::Database;
use crate::types::Event;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Parameters for spawning a progress monitor background task
pub(crate) struct ProgressMonitorParams {
    /// Resource being converted
    pub url: String,
    /// Feed the conversion writes into
    pub feed: ProgressFeed,
    /// Sampling interval
    pub interval: Duration,
    /// Event broadcast sender
    pub event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Database handle
    pub db: Arc<Database>,
    /// Cancelled by the job once the conversion call returns
    pub cancel_token: CancellationToken,
}

/// Spawn a background task that samples the feed and persists `convert_fraction`.
///
/// Only positive values are written, and only when they differ from the last
/// written one. The task ends on its own once the feed reports completion, or
/// when the token is cancelled. Once the token is observed as cancelled no
/// further write is started, so a caller that cancels and then joins the handle
/// can rely on the monitor being quiet from that point on.
pub(crate) fn spawn_progress_monitor(params: ProgressMonitorParams) -> tokio::task::JoinHandle<()> {
    let ProgressMonitorParams {
        url,
        feed,
        interval,
        event_tx,
        db,
        cancel_token,
    } = params;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_written: Option<f64> = None;

        loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {
                    let Some(fraction) = parse_progress(&feed.snapshot()) else {
                        continue;
                    };

                    if fraction > 0.0 && last_written != Some(fraction) {
                        if cancel_token.is_cancelled() {
                            break;
                        }

                        match db.set_convert_fraction(&url, fraction).await {
                            Ok(true) => {
                                tracing::debug!(url = %url, fraction, "Conversion progress");
                                last_written = Some(fraction);
                                event_tx
                                    .send(Event::TransformProgress {
                                        url: url.clone(),
                                        convert_fraction: fraction,
                                    })
                                    .ok();
                            }
                            Ok(false) => {
                                tracing::debug!(url = %url, "Record left processing, monitor stopping");
                                break;
                            }
                            Err(e) => {
                                tracing::error!(url = %url, error = %e, "Failed to record conversion progress");
                            }
                        }
                    }

                    if is_complete(fraction) {
                        break;
                    }
                }
            }
        }
    })
}
