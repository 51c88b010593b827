//! Configuration types for cogfetch

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Artifact and staging storage configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StorageConfig {
    /// Root directory for finished artifacts (default: "./data")
    ///
    /// The artifact for `https://host/a/b.tif` lands at `<data_dir>/a/b.tif`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Parent directory for per-job staging directories (default: system temp dir)
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,

    /// How long an artifact is kept before an external reaper may delete it (default: 7 days)
    #[serde(default = "default_retention", with = "duration_serde")]
    pub retention: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            staging_dir: None,
            retention: default_retention(),
        }
    }
}

/// Remote transfer configuration (metadata probe and streaming download)
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TransferConfig {
    /// Bytes written and persisted per progress update (default: 8 MiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,

    /// Overall bound on a single transfer (default: 1 hour)
    #[serde(default = "default_transfer_timeout", with = "duration_serde")]
    pub transfer_timeout: Duration,

    /// Bound on the HEAD request issued at registration (default: 15 seconds)
    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    pub probe_timeout: Duration,

    /// TCP connect timeout (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: default_chunk_size(),
            transfer_timeout: default_transfer_timeout(),
            probe_timeout: default_probe_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// Conversion program configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TransformConfig {
    /// Path to the conversion executable (auto-detected as `rio` if None)
    #[serde(default)]
    pub transform_program: Option<PathBuf>,

    /// Argument template; `{input}` and `{output}` are substituted per job
    #[serde(default = "default_transform_args")]
    pub transform_args: Vec<String>,

    /// Whether to search PATH for the program if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// How often the progress feed is sampled (default: 1000 ms)
    #[serde(default = "default_monitor_interval", with = "duration_millis_serde")]
    pub monitor_interval: Duration,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            transform_program: None,
            transform_args: default_transform_args(),
            search_path: true,
            monitor_interval: default_monitor_interval(),
        }
    }
}

/// Job execution configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JobConfig {
    /// Maximum jobs executing at once (default: 2)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_jobs: usize,

    /// How long shutdown waits for in-flight jobs (default: 30 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Main configuration for CogFetcher
///
/// Fields are organized into logical sub-configs:
/// - [`storage`](StorageConfig) - artifact root, staging, retention
/// - [`transfer`](TransferConfig) - chunking and timeouts
/// - [`transform`](TransformConfig) - conversion program and progress sampling
/// - [`jobs`](JobConfig) - concurrency and shutdown
///
/// Sub-configs are flattened, so the JSON form is a single flat object
/// apart from `persistence` and `api`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Artifact and staging storage
    #[serde(flatten)]
    pub storage: StorageConfig,

    /// Remote transfer settings
    #[serde(flatten)]
    pub transfer: TransferConfig,

    /// Conversion program settings
    #[serde(flatten)]
    pub transform: TransformConfig,

    /// Job execution settings
    #[serde(flatten)]
    pub jobs: JobConfig,

    /// Status database
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// API and external server integration
    #[serde(flatten)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Artifact root directory
    pub fn data_dir(&self) -> &PathBuf {
        &self.storage.data_dir
    }

    /// Check settings that would make the pipeline unable to make progress
    pub fn validate(&self) -> Result<()> {
        if self.transfer.chunk_size_bytes == 0 {
            return Err(config_error("chunk size must be positive", "chunk_size_bytes"));
        }
        if self.jobs.max_concurrent_jobs == 0 {
            return Err(config_error(
                "at least one job must be allowed to run",
                "max_concurrent_jobs",
            ));
        }
        if self.transform.monitor_interval.is_zero() {
            return Err(config_error(
                "monitor interval must be positive",
                "monitor_interval",
            ));
        }
        if self.transfer.transfer_timeout.is_zero() {
            return Err(config_error(
                "transfer timeout must be positive",
                "transfer_timeout",
            ));
        }
        if !self
            .transform
            .transform_args
            .iter()
            .any(|arg| arg.contains("{output}"))
        {
            return Err(config_error(
                "argument template must reference {output}",
                "transform_args",
            ));
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

/// Status database configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Database path (default: "./cogfetch.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8080)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,

    /// Public base URL of the tile server; tile endpoints are omitted when unset
    #[serde(default)]
    pub base_url: Option<String>,

    /// Path appended to `base_url` for the XYZ tile endpoint
    #[serde(default = "default_tile_path_template")]
    pub tile_path_template: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
            base_url: None,
            tile_path_template: default_tile_path_template(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_retention() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

fn default_chunk_size() -> usize {
    8 * 1024 * 1024
}

fn default_transfer_timeout() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_transform_args() -> Vec<String> {
    [
        "cogeo",
        "create",
        "{input}",
        "{output}",
        "--cog-profile",
        "jpeg",
        "--web-optimized",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_monitor_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_max_concurrent() -> usize {
    2
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./cogfetch.db")
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_tile_path_template() -> String {
    "/titiler/tiles/WebMercatorQuad/{z}/{x}/{y}@1x.jpg".to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Millisecond variant for sub-second intervals
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
