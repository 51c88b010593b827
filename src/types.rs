//! Core types for cogfetch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Lifecycle state of a tracked resource
///
/// The success path is `downloading -> downloaded -> processing -> ready`.
/// `error` can be entered from any non-terminal state. `ready` and `error`
/// are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    /// Payload is being streamed to the staging location
    Downloading,
    /// Payload fully staged, conversion not started yet
    Downloaded,
    /// Conversion running
    Processing,
    /// Artifact complete and safe to read
    Ready,
    /// Job failed; the resource may be registered again
    Error,
}

impl ResourceState {
    /// Every state, in lifecycle order
    pub const ALL: [ResourceState; 5] = [
        ResourceState::Downloading,
        ResourceState::Downloaded,
        ResourceState::Processing,
        ResourceState::Ready,
        ResourceState::Error,
    ];

    /// Text form stored in the database and used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceState::Downloading => "downloading",
            ResourceState::Downloaded => "downloaded",
            ResourceState::Processing => "processing",
            ResourceState::Ready => "ready",
            ResourceState::Error => "error",
        }
    }

    /// Whether no further automatic transition happens from this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResourceState::Ready | ResourceState::Error)
    }

    /// Whether a record in this state blocks a new registration for the same URL
    pub fn is_active(&self) -> bool {
        !matches!(self, ResourceState::Error)
    }

    /// Whether `self -> next` is an edge of the lifecycle state machine
    pub fn can_transition_to(&self, next: ResourceState) -> bool {
        use ResourceState::*;
        match (self, next) {
            (Downloading, Downloaded) | (Downloaded, Processing) | (Processing, Ready) => true,
            (from, Error) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown state string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownState(pub String);

impl fmt::Display for UnknownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown resource state '{}'", self.0)
    }
}

impl std::error::Error for UnknownState {}

impl FromStr for ResourceState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}

// Stored as TEXT so the database stays readable with plain sqlite tooling
impl sqlx::Type<sqlx::Sqlite> for ResourceState {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <str as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for ResourceState {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.as_str().to_string(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for ResourceState {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let text = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(text.parse()?)
    }
}

/// Status projection of a tracked resource, as returned to callers
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ResourceInfo {
    /// Source URL (identity key)
    pub url: String,

    /// Absolute path of the finished artifact
    pub local_path: String,

    /// When the resource was registered
    pub requested_at: DateTime<Utc>,

    /// When an external reaper may delete the artifact
    pub expires_at: DateTime<Utc>,

    /// Current lifecycle state
    pub state: ResourceState,

    /// Declared size of the remote payload in bytes
    pub total_size_bytes: u64,

    /// Bytes staged so far
    pub downloaded_bytes: u64,

    /// Transfer completion (0.0 to 1.0)
    pub download_fraction: f64,

    /// Conversion completion (0.0 to 1.0), unset until the first progress sample
    pub convert_fraction: Option<f64>,

    /// Failure reason when `state` is `error`
    pub error_message: Option<String>,

    /// XYZ tile endpoint serving the artifact, only when `state` is `ready`
    pub tile_endpoint: Option<String>,
}

/// Version information for the running service
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct VersionInfo {
    /// Crate version
    pub app_version: String,
    /// Schema version of the status database
    pub db_schema_version: i64,
    /// Database engine and version (e.g. `sqlite: 3.45.1`)
    pub db_version: Option<String>,
}

/// Event emitted during a resource's lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Registration accepted and job admitted
    Registered {
        /// Source URL
        url: String,
        /// Declared payload size
        total_size_bytes: u64,
    },

    /// A chunk was staged
    TransferProgress {
        /// Source URL
        url: String,
        /// Bytes staged so far
        downloaded_bytes: u64,
        /// Transfer completion (0.0 to 1.0)
        download_fraction: f64,
    },

    /// Payload fully staged
    Downloaded {
        /// Source URL
        url: String,
    },

    /// Conversion started
    Processing {
        /// Source URL
        url: String,
    },

    /// New conversion progress sample
    TransformProgress {
        /// Source URL
        url: String,
        /// Conversion completion (0.0 to 1.0)
        convert_fraction: f64,
    },

    /// Artifact ready
    Ready {
        /// Source URL
        url: String,
        /// Artifact path
        local_path: String,
    },

    /// Job failed
    Failed {
        /// Source URL
        url: String,
        /// Failure reason
        error: String,
    },

    /// Service shutting down
    Shutdown,
}

impl Event {
    /// Short event name, used as the SSE event type
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Registered { .. } => "registered",
            Event::TransferProgress { .. } => "transfer_progress",
            Event::Downloaded { .. } => "downloaded",
            Event::Processing { .. } => "processing",
            Event::TransformProgress { .. } => "transform_progress",
            Event::Ready { .. } => "ready",
            Event::Failed { .. } => "failed",
            Event::Shutdown => "shutdown",
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_text() {
        for state in ResourceState::ALL {
            assert_eq!(state.as_str().parse::<ResourceState>(), Ok(state));
        }
        assert!("paused".parse::<ResourceState>().is_err());
    }

    #[test]
    fn success_path_is_the_only_forward_path() {
        use ResourceState::*;
        assert!(Downloading.can_transition_to(Downloaded));
        assert!(Downloaded.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Ready));

        assert!(!Downloading.can_transition_to(Processing));
        assert!(!Downloaded.can_transition_to(Downloading));
        assert!(!Processing.can_transition_to(Downloaded));
        assert!(!Ready.can_transition_to(Processing));
    }

    #[test]
    fn error_is_reachable_from_non_terminal_states_only() {
        use ResourceState::*;
        for from in [Downloading, Downloaded, Processing] {
            assert!(from.can_transition_to(Error), "{from} -> error");
        }
        assert!(!Ready.can_transition_to(Error));
        assert!(!Error.can_transition_to(Error));
        assert!(!Error.can_transition_to(Downloading));
    }

    #[test]
    fn only_error_is_inactive() {
        for state in ResourceState::ALL {
            assert_eq!(state.is_active(), state != ResourceState::Error);
        }
    }

    #[test]
    fn state_serializes_lowercase() {
        let json = serde_json::to_string(&ResourceState::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }

    #[test]
    fn event_is_tagged_with_snake_case_type() {
        let event = Event::TransformProgress {
            url: "https://example.com/a.tif".into(),
            convert_fraction: 0.5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "transform_progress");
        assert_eq!(event.kind(), "transform_progress");
    }
}
