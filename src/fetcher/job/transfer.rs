//! Transfer stage - streams the remote payload into the staging file.

use crate::db::ByteProgress;
use crate::error::{Error, Result, TransferError};
use crate::types::Event;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use super::context::JobContext;

/// Stream the source into `staging_file` in fixed-size chunks
///
/// Each chunk is written to disk and then counted in the store before the next
/// one is processed, so the persisted byte counter never runs ahead of the file.
/// The whole request, body included, is bounded by the transfer timeout.
/// Returns the number of bytes received.
pub(super) async fn fetch_to_staging(ctx: &JobContext, staging_file: &Path) -> Result<u64> {
    let url = ctx.url.as_str();
    let transfer = &ctx.config.transfer;

    let mut response = ctx
        .http
        .get(url)
        .timeout(transfer.transfer_timeout)
        .send()
        .await
        .map_err(|e| TransferError::from_reqwest(url, e))?;

    if !response.status().is_success() {
        return Err(TransferError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        }
        .into());
    }

    let mut file = tokio::fs::File::create(staging_file).await?;
    let chunk_size = transfer.chunk_size_bytes;
    let mut pending: Vec<u8> = Vec::with_capacity(chunk_size);
    let mut tracker = OvershootWarning::default();
    let mut received: u64 = 0;

    while let Some(bytes) = response
        .chunk()
        .await
        .map_err(|e| TransferError::from_reqwest(url, e))?
    {
        pending.extend_from_slice(&bytes);

        while pending.len() >= chunk_size {
            let rest = pending.split_off(chunk_size);
            let chunk = std::mem::replace(&mut pending, rest);
            received += commit_chunk(ctx, &mut file, &chunk, &mut tracker).await?;
        }
    }

    if !pending.is_empty() {
        received += commit_chunk(ctx, &mut file, &pending, &mut tracker).await?;
    }

    file.flush().await?;
    file.sync_all().await?;

    if received < ctx.total_size_bytes {
        return Err(TransferError::Incomplete {
            url: url.to_string(),
            expected: ctx.total_size_bytes,
            received,
        }
        .into());
    }

    tracing::info!(url = %url, received, "Transfer complete");
    Ok(received)
}

/// Write one chunk, then persist the counter and derived fraction
async fn commit_chunk(
    ctx: &JobContext,
    file: &mut tokio::fs::File,
    chunk: &[u8],
    tracker: &mut OvershootWarning,
) -> Result<u64> {
    file.write_all(chunk).await?;

    let len = chunk.len() as u64;
    let progress = ctx
        .db
        .add_downloaded_bytes(&ctx.url, len)
        .await?
        .ok_or_else(|| {
            Error::Consistency(format!("{} is no longer downloading", ctx.url))
        })?;

    tracker.check(&ctx.url, &progress);
    tracing::debug!(
        url = %ctx.url,
        downloaded_bytes = progress.downloaded_bytes,
        fraction = progress.download_fraction,
        "Chunk staged"
    );

    ctx.emit(Event::TransferProgress {
        url: ctx.url.clone(),
        downloaded_bytes: progress.downloaded_bytes.max(0) as u64,
        download_fraction: progress.download_fraction,
    });

    Ok(len)
}

/// Logs once per job when the source sends more than it declared
#[derive(Default)]
struct OvershootWarning {
    warned: bool,
}

impl OvershootWarning {
    fn check(&mut self, url: &str, progress: &ByteProgress) {
        if progress.overshot() && !self.warned {
            self.warned = true;
            tracing::warn!(
                url = %url,
                downloaded_bytes = progress.downloaded_bytes,
                total_size_bytes = progress.total_size_bytes,
                "Source sent more bytes than it declared"
            );
        }
    }
}
