//! Database layer for cogfetch
//!
//! Handles SQLite persistence for tracked resources and runtime state.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`resources`] - Tracked resource registration, progress counters, state transitions
//! - [`state`] - Runtime state (shutdown tracking)
//!
//! Every write is a single statement committed before the method returns, so a
//! crash leaves each record at its last completed write.

use crate::types::{ResourceInfo, ResourceState};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

mod migrations;
mod resources;
mod state;

pub use migrations::SCHEMA_VERSION;

/// Resource to be registered in the database
#[derive(Debug, Clone)]
pub struct NewResource {
    /// Source URL (identity key)
    pub url: String,
    /// Absolute path of the finished artifact
    pub local_path: String,
    /// Declared payload size from the metadata probe (must be positive)
    pub total_size_bytes: u64,
    /// Registration time
    pub requested_at: DateTime<Utc>,
    /// When an external reaper may delete the artifact
    pub expires_at: DateTime<Utc>,
}

/// Tracked resource record from database
#[derive(Debug, Clone, FromRow)]
pub struct TrackedResource {
    /// Source URL (identity key)
    pub url: String,
    /// Absolute path of the finished artifact
    pub local_path: String,
    /// Unix timestamp of registration
    pub requested_at: i64,
    /// Unix timestamp after which the artifact may be reaped
    pub expires_at: i64,
    /// Lifecycle state
    pub state: ResourceState,
    /// Declared payload size in bytes
    pub total_size_bytes: i64,
    /// Bytes staged so far
    pub downloaded_bytes: i64,
    /// `downloaded_bytes / total_size_bytes`, clamped to 1.0
    pub download_fraction: f64,
    /// Last conversion progress sample
    pub convert_fraction: Option<f64>,
    /// Failure reason when `state` is `error`
    pub error_message: Option<String>,
    /// Unix timestamp of the last write
    pub updated_at: i64,
}

impl TrackedResource {
    /// Project the record into the caller-facing status view
    pub fn into_info(self, tile_endpoint: Option<String>) -> ResourceInfo {
        ResourceInfo {
            url: self.url,
            local_path: self.local_path,
            requested_at: timestamp_to_datetime(self.requested_at),
            expires_at: timestamp_to_datetime(self.expires_at),
            state: self.state,
            total_size_bytes: self.total_size_bytes.max(0) as u64,
            downloaded_bytes: self.downloaded_bytes.max(0) as u64,
            download_fraction: self.download_fraction,
            convert_fraction: self.convert_fraction,
            error_message: self.error_message,
            tile_endpoint: tile_endpoint.filter(|_| self.state == ResourceState::Ready),
        }
    }
}

/// Byte counters returned after a transfer chunk is recorded
#[derive(Debug, Clone, Copy, PartialEq, FromRow)]
pub struct ByteProgress {
    /// Bytes staged so far
    pub downloaded_bytes: i64,
    /// Declared payload size
    pub total_size_bytes: i64,
    /// Derived transfer fraction
    pub download_fraction: f64,
}

impl ByteProgress {
    /// Whether more bytes were recorded than the source declared
    pub fn overshot(&self) -> bool {
        self.downloaded_bytes > self.total_size_bytes
    }
}

fn timestamp_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// Database handle for cogfetch
pub struct Database {
    pool: SqlitePool,
}
