//! Job orchestration - state machine for a single resource.

use crate::error::{Error, Result, TransformError};
use crate::types::{Event, ResourceState};
use std::path::{Path, PathBuf};

use crate::fetcher::admission::JobSlot;
use super::context::JobContext;
use super::convert::convert;
use super::transfer::fetch_to_staging;

/// Core job -- drives one resource from `downloading` to `ready` or `error`.
///
/// Phases:
/// 1. Check the record exists and is `downloading`
/// 2. Stream the payload into a scoped staging directory
/// 3. `downloaded`, then `processing`
/// 4. Convert into a partial file next to the artifact, then rename it into place
/// 5. `ready`
///
/// Every transition is committed before the next phase starts. Any error moves
/// the record to `error`; nothing is retried. The staging directory is removed
/// on every exit path.
///
/// On failure the slot is released before `error` is committed, so the URL can
/// be registered again as soon as the failure is visible.
pub(crate) async fn run_job(ctx: JobContext, slot: JobSlot) {
    tracing::info!(url = %ctx.url, "Job started");

    match execute(&ctx).await {
        Ok(()) => {
            drop(slot);
            tracing::info!(url = %ctx.url, local_path = %ctx.local_path.display(), "Job finished");
        }
        Err(e) => {
            tracing::error!(url = %ctx.url, error = %e, "Job failed");
            drop(slot);
            ctx.mark_failed(&e).await;
        }
    }
}

async fn execute(ctx: &JobContext) -> Result<()> {
    let record = ctx
        .db
        .get_resource(&ctx.url)
        .await?
        .ok_or_else(|| Error::Consistency(format!("no record for {}", ctx.url)))?;
    if record.state != ResourceState::Downloading {
        return Err(Error::Consistency(format!(
            "{} started in state {} instead of downloading",
            ctx.url, record.state
        )));
    }

    let staging = staging_dir(ctx)?;
    let staged = staging.path().join("payload");

    fetch_to_staging(ctx, &staged).await?;
    ctx.transition(ResourceState::Downloading, ResourceState::Downloaded)
        .await?;
    ctx.emit(Event::Downloaded {
        url: ctx.url.clone(),
    });

    ctx.transition(ResourceState::Downloaded, ResourceState::Processing)
        .await?;
    ctx.emit(Event::Processing {
        url: ctx.url.clone(),
    });

    let partial = partial_path(&ctx.local_path);
    let converted = convert(ctx, &staged, &partial).await;
    let published = match converted {
        Ok(()) => publish_artifact(ctx, &partial).await,
        Err(e) => Err(e),
    };
    if let Err(e) = published {
        if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %partial.display(), error = %cleanup, "Failed to remove partial artifact");
            }
        }
        return Err(e);
    }

    ctx.transition(ResourceState::Processing, ResourceState::Ready)
        .await?;
    ctx.emit(Event::Ready {
        url: ctx.url.clone(),
        local_path: ctx.local_path.to_string_lossy().into_owned(),
    });

    drop(staging);
    Ok(())
}

/// Per-job staging directory, removed when the handle is dropped
fn staging_dir(ctx: &JobContext) -> Result<tempfile::TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("cogfetch-");
    let dir = match &ctx.config.storage.staging_dir {
        Some(parent) => builder.tempdir_in(parent)?,
        None => builder.tempdir()?,
    };
    tracing::debug!(url = %ctx.url, staging = %dir.path().display(), "Created staging directory");
    Ok(dir)
}

/// Hidden sibling of the artifact the conversion writes into
fn partial_path(local_path: &Path) -> PathBuf {
    let name = local_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    local_path.with_file_name(format!(".{}.partial", name))
}

/// Move the finished conversion output to the artifact path
///
/// The rename is atomic within the data directory, so readers never see a
/// half-written artifact.
async fn publish_artifact(ctx: &JobContext, partial: &Path) -> Result<()> {
    let metadata = match tokio::fs::metadata(partial).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::Transform(TransformError::Failed {
                reason: format!("{} produced no output", ctx.transformer.name()),
            }));
        }
        Err(e) => return Err(e.into()),
    };

    if metadata.len() == 0 {
        tracing::warn!(url = %ctx.url, "Conversion produced an empty artifact");
    }

    tokio::fs::rename(partial, &ctx.local_path).await?;
    Ok(())
}
