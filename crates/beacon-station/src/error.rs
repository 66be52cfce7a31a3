//! # Station Error Types
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Domain         │  │   Store         │  │     Runtime             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Core(..)       │  │  NotFound       │  │  ChannelError           │ │
//! │  │  wrong_cell,    │  │  Rejected       │  │  ShuttingDown           │ │
//! │  │  not_yet_...    │  │  Conflict       │  │  Transport              │ │
//! │  │                 │  │  Unavailable    │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │  Configuration  │                                                   │
//! │  │  InvalidConfig  │                                                   │
//! │  │  InvalidUrl     │                                                   │
//! │  │  ConfigLoad/Save│                                                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use beacon_core::CoreError;
use beacon_db::DbError;
use thiserror::Error;

// =============================================================================
// Store Error
// =============================================================================

/// Failures from a [`crate::store::StationStore`] backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A write broke the capacity or intake rules; nothing was written.
    #[error("{0}")]
    Rejected(CoreError),

    /// The commit raced another writer, e.g. an order line picked by
    /// another station since this round was resolved.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Duplicate {field}: '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// The backing store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => StoreError::NotFound { entity, id },
            DbError::Rejected(core) => StoreError::Rejected(core),
            DbError::UniqueViolation { field, value } => StoreError::Duplicate { field, value },
            DbError::Conflict(reason) => StoreError::Conflict(reason),
            e if e.is_unavailable() => StoreError::Unavailable(e.to_string()),
            e => StoreError::Backend(e.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Station Error
// =============================================================================

/// Errors returned by station operations.
#[derive(Debug, Error)]
pub enum StationError {
    /// Domain outcome from the session or allocation engine.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invalid station configuration.
    #[error("Invalid station configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    /// An HTTP or WebSocket call failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// The engine is shutting down.
    #[error("Station engine is shutting down")]
    ShuttingDown,
}

pub type StationResult<T> = Result<T, StationError>;

impl From<std::io::Error> for StationError {
    fn from(err: std::io::Error) -> Self {
        StationError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for StationError {
    fn from(err: toml::de::Error) -> Self {
        StationError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for StationError {
    fn from(err: toml::ser::Error) -> Self {
        StationError::ConfigSaveFailed(err.to_string())
    }
}

impl From<reqwest::Error> for StationError {
    fn from(err: reqwest::Error) -> Self {
        StationError::Transport(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for StationError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        StationError::Transport(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl StationError {
    /// Wraps a store failure met while fetching a prerequisite.
    ///
    /// Unreachable stores surface as `transport_failure`; anything else keeps
    /// its store category.
    pub fn fetching(operation: &str, err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) | StoreError::Backend(reason) => {
                StationError::Core(CoreError::transport(operation, reason))
            }
            other => StationError::Store(other),
        }
    }

    /// Maps a failed commit onto `commit_failed`.
    pub fn commit_failed(err: StoreError) -> Self {
        StationError::Core(CoreError::CommitFailed {
            reason: err.to_string(),
        })
    }

    /// Stable snake_case code for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            StationError::Core(e) => e.kind(),
            StationError::Store(StoreError::NotFound { .. }) => "not_found",
            StationError::Store(StoreError::Duplicate { .. }) => "duplicate",
            StationError::Store(StoreError::Rejected(CoreError::Validation(_))) => "validation",
            StationError::Store(StoreError::Rejected(_) | StoreError::Conflict(_)) => "commit_failed",
            StationError::Store(StoreError::Unavailable(_) | StoreError::Backend(_)) => {
                "transport_failure"
            }
            StationError::InvalidConfig(_)
            | StationError::InvalidUrl(_)
            | StationError::ConfigLoadFailed(_)
            | StationError::ConfigSaveFailed(_) => "invalid_config",
            StationError::Transport(_) => "transport_failure",
            StationError::ChannelError(_) | StationError::ShuttingDown => "internal",
        }
    }

    /// True when retrying the same step may succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            "not_yet_retrievable" | "no_capacity" | "commit_failed" | "transport_failure"
        )
    }

    /// True for configuration problems.
    pub fn is_config_error(&self) -> bool {
        self.kind() == "invalid_config"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_follow_core() {
        let err = StationError::from(CoreError::wrong_cell("R1-S1-BIN7"));
        assert_eq!(err.kind(), "wrong_cell");
        assert!(!err.is_retryable());

        assert!(StationError::from(CoreError::NotYetRetrievable).is_retryable());
    }

    #[test]
    fn test_store_unavailable_is_transport_failure() {
        let err = StationError::fetching("cell lookup", StoreError::Unavailable("pool closed".into()));
        assert_eq!(err.kind(), "transport_failure");
        assert!(err.is_retryable());

        let err = StationError::fetching("cell lookup", StoreError::not_found("Cell", "R1-S1-P9"));
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_db_error_mapping() {
        let err: StoreError = DbError::PoolExhausted.into();
        assert!(matches!(err, StoreError::Unavailable(_)));

        let err: StoreError = DbError::duplicate("order_no", "SO-1").into();
        assert!(matches!(err, StoreError::Duplicate { .. }));

        let err: StoreError = DbError::Conflict("SO-1 over-picked".into()).into();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(StationError::Store(err).kind(), "commit_failed");

        let invalid = beacon_core::ValidationError::MustBePositive { field: "quantity".into() };
        let err: StoreError = DbError::Rejected(invalid.into()).into();
        assert_eq!(StationError::Store(err).kind(), "validation");
    }

    #[test]
    fn test_commit_failed_wraps_reason() {
        let err = StationError::commit_failed(StoreError::Rejected(CoreError::CellNotFound("P1".into())));
        assert_eq!(err.kind(), "commit_failed");
        assert!(err.to_string().contains("P1"));
    }
}
