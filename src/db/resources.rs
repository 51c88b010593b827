//! Tracked resource persistence: registration, progress counters, state transitions.

use crate::error::DatabaseError;
use crate::types::ResourceState;
use crate::{Error, Result};

use super::{ByteProgress, Database, NewResource, TrackedResource};

const RESOURCE_COLUMNS: &str = "url, local_path, requested_at, expires_at, state, \
     total_size_bytes, downloaded_bytes, download_fraction, convert_fraction, \
     error_message, updated_at";

impl Database {
    /// Register a resource in `downloading` state with zeroed counters
    ///
    /// A new URL is inserted. An existing record is overwritten only when it is in
    /// `error`, which resets counters, conversion progress and the error message.
    /// Any other existing record is left untouched and the call fails with
    /// [`Error::RegistrationConflict`].
    pub async fn register_resource(&self, resource: &NewResource) -> Result<TrackedResource> {
        if resource.total_size_bytes == 0 {
            return Err(Error::MetadataUnavailable {
                url: resource.url.clone(),
                reason: "declared size is zero".to_string(),
            });
        }

        let total = i64::try_from(resource.total_size_bytes).map_err(|_| {
            Error::MetadataUnavailable {
                url: resource.url.clone(),
                reason: format!("declared size {} is out of range", resource.total_size_bytes),
            }
        })?;
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO tracked_resources (
                url, local_path, requested_at, expires_at, state,
                total_size_bytes, downloaded_bytes, download_fraction,
                convert_fraction, error_message, updated_at
            )
            VALUES (?, ?, ?, ?, 'downloading', ?, 0, 0.0, NULL, NULL, ?)
            ON CONFLICT(url) DO UPDATE SET
                local_path = excluded.local_path,
                requested_at = excluded.requested_at,
                expires_at = excluded.expires_at,
                state = 'downloading',
                total_size_bytes = excluded.total_size_bytes,
                downloaded_bytes = 0,
                download_fraction = 0.0,
                convert_fraction = NULL,
                error_message = NULL,
                updated_at = excluded.updated_at
            WHERE tracked_resources.state = 'error'
            "#,
        )
        .bind(&resource.url)
        .bind(&resource.local_path)
        .bind(resource.requested_at.timestamp())
        .bind(resource.expires_at.timestamp())
        .bind(total)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to register resource: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            let existing = self.get_resource(&resource.url).await?;
            return Err(Error::RegistrationConflict {
                url: resource.url.clone(),
                state: existing
                    .map(|r| r.state)
                    .unwrap_or(ResourceState::Downloading),
            });
        }

        self.get_resource(&resource.url).await?.ok_or_else(|| {
            Error::Consistency(format!("{} vanished right after registration", resource.url))
        })
    }

    /// Get a tracked resource by URL
    pub async fn get_resource(&self, url: &str) -> Result<Option<TrackedResource>> {
        let row = sqlx::query_as::<_, TrackedResource>(&format!(
            "SELECT {} FROM tracked_resources WHERE url = ?",
            RESOURCE_COLUMNS
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get resource: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Whether any record exists for the URL
    pub async fn resource_exists(&self, url: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tracked_resources WHERE url = ?)")
                .bind(url)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to check resource existence: {}",
                        e
                    )))
                })?;

        Ok(exists)
    }

    /// A record of a different URL that owns the artifact at `local_path`
    ///
    /// Records in `error` do not own their artifact any more and are ignored.
    pub async fn artifact_owner(
        &self,
        local_path: &str,
        url: &str,
    ) -> Result<Option<TrackedResource>> {
        let row = sqlx::query_as::<_, TrackedResource>(&format!(
            "SELECT {} FROM tracked_resources \
             WHERE local_path = ? AND url != ? AND state != 'error' \
             ORDER BY requested_at ASC LIMIT 1",
            RESOURCE_COLUMNS
        ))
        .bind(local_path)
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to look up artifact owner: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// List every tracked resource, oldest registration first
    pub async fn list_resources(&self) -> Result<Vec<TrackedResource>> {
        let rows = sqlx::query_as::<_, TrackedResource>(&format!(
            "SELECT {} FROM tracked_resources ORDER BY requested_at ASC, url ASC",
            RESOURCE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list resources: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Add a staged chunk to the byte counter and recompute the transfer fraction
    ///
    /// Counter and fraction change in one statement. Only applies while the
    /// record is `downloading`; returns `None` when no such record exists.
    pub async fn add_downloaded_bytes(&self, url: &str, bytes: u64) -> Result<Option<ByteProgress>> {
        let bytes = i64::try_from(bytes).map_err(|_| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "chunk length {} out of range",
                bytes
            )))
        })?;
        let now = chrono::Utc::now().timestamp();

        let progress = sqlx::query_as::<_, ByteProgress>(
            r#"
            UPDATE tracked_resources
            SET downloaded_bytes = downloaded_bytes + ?,
                download_fraction = MIN(1.0, CAST(downloaded_bytes + ? AS REAL) / total_size_bytes),
                updated_at = ?
            WHERE url = ? AND state = 'downloading'
            RETURNING downloaded_bytes, total_size_bytes, download_fraction
            "#,
        )
        .bind(bytes)
        .bind(bytes)
        .bind(now)
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to record downloaded bytes: {}",
                e
            )))
        })?;

        Ok(progress)
    }

    /// Move a record from `from` to `to`
    ///
    /// Returns `false` when the record is not currently in `from`. Edges outside
    /// the lifecycle state machine are refused without touching the store.
    pub async fn transition_state(
        &self,
        url: &str,
        from: ResourceState,
        to: ResourceState,
    ) -> Result<bool> {
        if !from.can_transition_to(to) {
            return Err(Error::Consistency(format!(
                "illegal transition {} -> {} for {}",
                from, to, url
            )));
        }

        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "UPDATE tracked_resources SET state = ?, updated_at = ? WHERE url = ? AND state = ?",
        )
        .bind(to)
        .bind(now)
        .bind(url)
        .bind(from)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update resource state: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Move a non-terminal record to `error` with a reason
    ///
    /// Returns `false` when the record is missing or already terminal.
    pub async fn mark_error(&self, url: &str, message: &str) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE tracked_resources
            SET state = 'error', error_message = ?, updated_at = ?
            WHERE url = ? AND state IN ('downloading', 'downloaded', 'processing')
            "#,
        )
        .bind(message)
        .bind(now)
        .bind(url)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to mark resource as failed: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a conversion progress sample
    ///
    /// The value is clamped to [0, 1]. Only applies while the record is `processing`.
    pub async fn set_convert_fraction(&self, url: &str, fraction: f64) -> Result<bool> {
        let fraction = fraction.clamp(0.0, 1.0);
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE tracked_resources
            SET convert_fraction = ?, updated_at = ?
            WHERE url = ? AND state = 'processing'
            "#,
        )
        .bind(fraction)
        .bind(now)
        .bind(url)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to record conversion progress: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Fail every record left mid-pipeline by a previous process
    ///
    /// Jobs do not survive a restart, so records in `downloading`, `downloaded`
    /// or `processing` at startup can never progress. Returns their URLs.
    pub async fn fail_interrupted(&self, reason: &str) -> Result<Vec<String>> {
        let now = chrono::Utc::now().timestamp();
        let urls: Vec<String> = sqlx::query_scalar(
            r#"
            UPDATE tracked_resources
            SET state = 'error', error_message = ?, updated_at = ?
            WHERE state IN ('downloading', 'downloaded', 'processing')
            RETURNING url
            "#,
        )
        .bind(reason)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to fail interrupted resources: {}",
                e
            )))
        })?;

        Ok(urls)
    }
}
