//! Transform stage - offloaded conversion supervised by the progress monitor.

use crate::error::{Error, Result, TransformError};
use crate::progress::{ProgressFeed, ProgressMonitorParams, parse_progress, spawn_progress_monitor};
use crate::types::Event;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use super::context::JobContext;

/// Run the conversion on the blocking pool while the monitor samples its feed
///
/// The monitor is always cancelled and joined before this returns, then the feed
/// is parsed one final time so a value printed just before the conversion ended
/// is not lost.
pub(super) async fn convert(ctx: &JobContext, input: &Path, output: &Path) -> Result<()> {
    let feed = ProgressFeed::new();
    let cancel_token = CancellationToken::new();

    let monitor = spawn_progress_monitor(ProgressMonitorParams {
        url: ctx.url.clone(),
        feed: feed.clone(),
        interval: ctx.config.transform.monitor_interval,
        event_tx: ctx.event_tx.clone(),
        db: ctx.db.clone(),
        cancel_token: cancel_token.clone(),
    });

    let transformer = ctx.transformer.clone();
    let input = input.to_path_buf();
    let output = output.to_path_buf();
    let task_feed = feed.clone();
    tracing::info!(url = %ctx.url, transformer = transformer.name(), "Conversion started");

    let outcome = tokio::task::spawn_blocking(move || {
        transformer.transform(&input, &output, &task_feed)
    })
    .await;

    cancel_token.cancel();
    if let Err(e) = monitor.await {
        tracing::warn!(url = %ctx.url, error = %e, "Progress monitor task ended abnormally");
    }

    let outcome = match outcome {
        Ok(result) => result,
        Err(e) => Err(Error::Transform(TransformError::Panicked {
            reason: e.to_string(),
        })),
    };

    match record_final_sample(ctx, &feed).await {
        Ok(()) => {}
        Err(e) if outcome.is_ok() => return Err(e),
        Err(e) => {
            tracing::error!(url = %ctx.url, error = %e, "Failed to record final conversion progress")
        }
    }

    outcome
}

async fn record_final_sample(ctx: &JobContext, feed: &ProgressFeed) -> Result<()> {
    let Some(fraction) = parse_progress(&feed.snapshot()) else {
        return Ok(());
    };
    if fraction <= 0.0 {
        return Ok(());
    }

    if ctx.db.set_convert_fraction(&ctx.url, fraction).await? {
        ctx.emit(Event::TransformProgress {
            url: ctx.url.clone(),
            convert_fraction: fraction,
        });
    }
    Ok(())
}
