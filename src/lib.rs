//! # cogfetch
//!
//! Background pipeline that fetches remote raster files by URL, converts them
//! into tile-ready artifacts and tracks their progress.
//!
//! A registered URL becomes a tracked resource that moves through
//! `downloading`, `downloaded`, `processing` and ends in `ready` or `error`.
//! Transfer and conversion progress are persisted as fractions so any caller
//! can poll them while the job runs detached.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - One cloneable facade, embedded by a host process
//! - **Durable status** - Every state change is committed to SQLite before the next phase
//! - **Pluggable conversion** - Any [`Transformer`] can stand in for the external program
//! - **Event-driven** - Consumers can subscribe to lifecycle events instead of polling
//!
//! ## Quick Start
//!
//! ```no_run
//! use cogfetch::{CogFetcher, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = CogFetcher::new(Config::default()).await?;
//!
//!     let info = fetcher.register("https://example.com/maps/sheet.tif").await?;
//!     println!("{} is {}", info.url, info.state);
//!
//!     let status = fetcher.status(&info.url).await?;
//!     println!("downloaded {:.0}%", status.download_fraction * 100.0);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod progress;
pub mod transform;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::{
    ApiConfig, Config, JobConfig, PersistenceConfig, StorageConfig, TransferConfig,
    TransformConfig,
};
pub use db::Database;
pub use error::{
    ApiError, DatabaseError, Error, ErrorDetail, Result, ToHttpStatus, TransferError,
    TransformError,
};
pub use fetcher::CogFetcher;
pub use progress::{ProgressFeed, parse_progress};
pub use transform::{CliTransformer, Transformer, UnavailableTransformer};
pub use types::{Event, ResourceInfo, ResourceState, VersionInfo};

/// Run until SIGTERM or SIGINT, then shut the fetcher down gracefully
///
/// On non-unix platforms Ctrl+C is used instead.
///
/// # Example
///
/// ```no_run
/// use cogfetch::{CogFetcher, Config};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let fetcher = Arc::new(CogFetcher::new(Config::default()).await?);
///     let _api = fetcher.spawn_api_server();
///
///     cogfetch::run_with_shutdown(&fetcher).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(fetcher: &CogFetcher) -> Result<()> {
    wait_for_signal().await;
    fetcher.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
