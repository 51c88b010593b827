//! Core fetcher implementation split into focused submodules.
//!
//! The `CogFetcher` struct and its methods are organized by domain:
//! - [`admission`] - Single-flight job queue with a concurrency cap
//! - [`registration`] - Metadata probe, registration and status queries
//! - [`lifecycle`] - Startup recovery and shutdown coordination
//! - [`job`] - Per-resource pipeline execution (transfer, transform)

mod admission;
mod job;
mod lifecycle;
mod registration;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::transform::{Transformer, select_transformer};
use crate::types::Event;
use admission::JobQueue;
use std::sync::Arc;

/// Main fetcher instance (cloneable - all fields are Arc-wrapped or cheap handles)
#[derive(Clone)]
pub struct CogFetcher {
    /// Database instance for persistence (wrapped in Arc for sharing across tasks)
    /// Public for integration tests to query resource state
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// HTTP client for metadata probes and transfers
    pub(crate) http: reqwest::Client,
    /// Conversion implementation (trait object for pluggable implementations)
    pub(crate) transformer: Arc<dyn Transformer>,
    /// In-flight jobs keyed by URL
    pub(crate) jobs: JobQueue,
}

impl CogFetcher {
    /// Create a new CogFetcher instance
    ///
    /// This initializes all core components:
    /// - Validates the configuration
    /// - Creates the data and staging directories
    /// - Opens/creates the SQLite database and runs migrations
    /// - Fails records left mid-pipeline by a previous process
    /// - Picks the conversion program (see [`select_transformer`])
    pub async fn new(config: Config) -> Result<Self> {
        let transformer = select_transformer(&config.transform);
        Self::with_transformer(config, transformer).await
    }

    /// Create a new CogFetcher with a caller-provided conversion implementation
    pub async fn with_transformer(
        config: Config,
        transformer: Arc<dyn Transformer>,
    ) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.storage.data_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create data directory '{}': {}",
                        config.storage.data_dir.display(),
                        e
                    ),
                ))
            })?;
        if let Some(staging_dir) = &config.storage.staging_dir {
            tokio::fs::create_dir_all(staging_dir).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create staging directory '{}': {}",
                        staging_dir.display(),
                        e
                    ),
                ))
            })?;
        }

        let db = Database::new(&config.persistence.database_path).await?;

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let http = reqwest::Client::builder()
            .connect_timeout(config.transfer.connect_timeout)
            .user_agent(concat!("cogfetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to build HTTP client: {}", e)))?;

        tracing::info!(
            transformer = transformer.name(),
            max_concurrent_jobs = config.jobs.max_concurrent_jobs,
            data_dir = %config.storage.data_dir.display(),
            "Fetcher initialized"
        );

        let fetcher = Self {
            db: Arc::new(db),
            event_tx,
            jobs: JobQueue::new(config.jobs.max_concurrent_jobs),
            config: Arc::new(config),
            http,
            transformer,
        };

        fetcher.recover_interrupted().await?;
        fetcher.db.set_clean_start().await?;

        Ok(fetcher)
    }

    /// Subscribe to resource lifecycle events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber falling behind by more than 1000 events receives `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use cogfetch::{CogFetcher, Config};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let fetcher = CogFetcher::new(Config::default()).await?;
    ///
    ///     let mut events = fetcher.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(?event, "resource event");
    ///         }
    ///     });
    ///
    ///     fetcher.register("https://example.com/maps/sheet.tif").await?;
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Name of the conversion implementation in use
    pub fn transformer_name(&self) -> &'static str {
        self.transformer.name()
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    ///
    /// Listens on the configured bind address (default: 127.0.0.1:8080).
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let fetcher = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(fetcher, config).await })
    }
}
