//! Registration of remote files and status queries.

use crate::db::{NewResource, TrackedResource};
use crate::error::{Error, Result};
use crate::types::{Event, ResourceInfo, ResourceState, VersionInfo};
use crate::utils::{destination_for_url, tile_endpoint};
use reqwest::header::CONTENT_LENGTH;

use super::CogFetcher;
use super::job::{JobContext, run_job};

impl CogFetcher {
    /// Register a remote file and start its fetch-and-convert job
    ///
    /// Before anything is persisted the URL is mapped onto an artifact path under
    /// the data directory and its size is read from a `HEAD` request. On success
    /// the record is in `downloading` with zeroed counters and a job keyed by the
    /// URL has been admitted; the job itself runs detached.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the URL has no usable path or is not http(s)
    /// - [`Error::RegistrationConflict`] if a non-error record or a job exists for the URL,
    ///   or another URL's non-error record or job already owns the same artifact path
    /// - [`Error::MetadataUnavailable`] if the size cannot be obtained
    /// - [`Error::ShuttingDown`] once shutdown has started
    pub async fn register(&self, url: &str) -> Result<ResourceInfo> {
        let url = url.trim();
        let local_path = destination_for_url(&self.config.storage.data_dir, url)?;
        let artifact = local_path.to_string_lossy().into_owned();

        // Cheap pre-check so a duplicate does not cost a remote probe
        if let Some(existing) = self.db.get_resource(url).await? {
            if existing.state.is_active() {
                return Err(Error::RegistrationConflict {
                    url: url.to_string(),
                    state: existing.state,
                });
            }
        }

        let slot = match self.jobs.reserve(url, &local_path) {
            Ok(slot) => slot,
            Err(Error::RegistrationConflict { url: holder, .. }) => {
                let state = self
                    .db
                    .get_resource(&holder)
                    .await?
                    .map(|r| r.state)
                    .unwrap_or(ResourceState::Downloading);
                return Err(Error::RegistrationConflict { url: holder, state });
            }
            Err(e) => return Err(e),
        };
        tracing::debug!(url = %slot.key(), "Reserved job slot");

        // Finished artifacts are owned by their record, not by a slot
        if let Some(owner) = self.db.artifact_owner(&artifact, url).await? {
            tracing::warn!(
                url = %url,
                owner = %owner.url,
                local_path = %artifact,
                "Artifact path already owned by another URL"
            );
            return Err(Error::RegistrationConflict {
                url: owner.url,
                state: owner.state,
            });
        }

        let total_size_bytes = self.probe_size(url).await?;

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let requested_at = chrono::Utc::now();
        let retention = chrono::Duration::from_std(self.config.storage.retention)
            .map_err(|e| Error::Config {
                message: format!("retention out of range: {}", e),
                key: Some("retention".to_string()),
            })?;

        let record = self
            .db
            .register_resource(&NewResource {
                url: url.to_string(),
                local_path: artifact,
                total_size_bytes,
                requested_at,
                expires_at: requested_at + retention,
            })
            .await?;

        tracing::info!(
            url = %url,
            total_size_bytes,
            local_path = %local_path.display(),
            "Registered resource"
        );
        self.emit_event(Event::Registered {
            url: url.to_string(),
            total_size_bytes,
        });

        let ctx = JobContext {
            url: url.to_string(),
            local_path,
            total_size_bytes,
            db: self.db.clone(),
            event_tx: self.event_tx.clone(),
            config: self.config.clone(),
            http: self.http.clone(),
            transformer: self.transformer.clone(),
        };
        slot.spawn(move |slot| run_job(ctx, slot));

        Ok(self.resource_info(record))
    }

    /// Read the declared size of a remote file with a `HEAD` request
    pub(crate) async fn probe_size(&self, url: &str) -> Result<u64> {
        let unavailable = |reason: String| Error::MetadataUnavailable {
            url: url.to_string(),
            reason,
        };

        let response = self
            .http
            .head(url)
            .timeout(self.config.transfer.probe_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    unavailable("metadata request timed out".to_string())
                } else {
                    unavailable(format!("metadata request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(unavailable(format!(
                "metadata request answered with HTTP {}",
                response.status().as_u16()
            )));
        }

        // Read the header itself: for HEAD the body size hint is always zero
        let size = response
            .headers()
            .get(CONTENT_LENGTH)
            .ok_or_else(|| unavailable("no Content-Length header".to_string()))?
            .to_str()
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .ok_or_else(|| unavailable("unparseable Content-Length header".to_string()))?;

        if size == 0 {
            return Err(unavailable("declared size is zero".to_string()));
        }

        tracing::debug!(url = %url, size, "Probed remote size");
        Ok(size)
    }

    /// Current status of a tracked resource
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the URL was never registered.
    pub async fn status(&self, url: &str) -> Result<ResourceInfo> {
        let url = url.trim();
        let record = self
            .db
            .get_resource(url)
            .await?
            .ok_or_else(|| Error::NotFound(format!("resource {}", url)))?;

        Ok(self.resource_info(record))
    }

    /// Every tracked resource, oldest registration first
    pub async fn list(&self) -> Result<Vec<ResourceInfo>> {
        let records = self.db.list_resources().await?;
        Ok(records
            .into_iter()
            .map(|record| self.resource_info(record))
            .collect())
    }

    /// Version of the service and its status database
    pub async fn version(&self) -> Result<VersionInfo> {
        let db_version = match self.db.engine_version().await {
            Ok(version) => Some(version),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read database engine version");
                None
            }
        };

        Ok(VersionInfo {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            db_schema_version: self.db.schema_version().await?,
            db_version,
        })
    }

    fn resource_info(&self, record: TrackedResource) -> ResourceInfo {
        let api = &self.config.server.api;
        let endpoint = api
            .base_url
            .as_deref()
            .map(|base| tile_endpoint(base, &api.tile_path_template, &record.local_path));
        record.into_info(endpoint)
    }
}
