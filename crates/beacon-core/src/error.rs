//! # Error Types
//!
//! Domain-specific error types for beacon-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  beacon-core errors (this file)                                        │
//! │  ├── CoreError        - Station/allocation outcomes operators see      │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  beacon-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  beacon-station errors                                                 │
//! │  └── StationError     - Store, transport and channel failures          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → StationError → ApiError           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Recovery Semantics
//! Every variant leaves the scan session in a resumable state:
//!
//! | Variant               | Session afterwards                         |
//! |-----------------------|--------------------------------------------|
//! | `NotYetRetrievable`   | Idle, retry later                          |
//! | `WrongCell`           | Unchanged, operator rescans                |
//! | `CommitFailed`        | AwaitingSecondScan, rolled back            |
//! | `TransportFailure`    | Step whose prerequisite failed             |
//! | `CapacityExceeded`    | Surfaced to the operator as commit failure |

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Station and allocation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// No single zone can satisfy any outstanding order.
    ///
    /// Not a failure: the order is re-evaluated after the next commit.
    #[error("No order is retrievable yet")]
    NotYetRetrievable,

    /// The scanned cell is not the one the session is waiting for.
    #[error("Wrong cell ({cell_id})")]
    WrongCell { cell_id: String },

    /// The commit was rolled back.
    #[error("Commit failed: {reason}")]
    CommitFailed { reason: String },

    /// An external dependency could not be reached.
    #[error("{operation} failed: {reason}")]
    TransportFailure { operation: String, reason: String },

    /// An adjustment would push a cell above its capacity.
    ///
    /// ## When This Occurs
    /// ```text
    /// Put-away of 5 × ITEM-A into P3
    ///      │
    ///      ▼
    /// P3: capacity 20, holding 18
    ///      │
    ///      ▼
    /// CapacityExceeded { cell_id: "P3", capacity: 20, requested: 23 }
    /// ```
    #[error("Cell {cell_id} capacity {capacity} exceeded (would hold {requested})")]
    CapacityExceeded {
        cell_id: String,
        capacity: i64,
        requested: i64,
    },

    /// An adjustment would take more units than the cell holds.
    #[error("Cell {cell_id} holds {available} of {item_code}, cannot remove {requested}")]
    InsufficientStock {
        cell_id: String,
        item_code: String,
        available: i64,
        requested: i64,
    },

    /// A cell referenced by an adjustment does not exist.
    #[error("Cell not found: {0}")]
    CellNotFound(String),

    /// The requested operation is not valid in the session's current state.
    #[error("Station is {actual}, expected {expected}")]
    InvalidState { expected: String, actual: String },

    /// Neither the order nor its zone has a bin to collect into.
    #[error("No bin available for order {order_no}")]
    NoBinAvailable { order_no: String },

    /// No zone has room for the stock being put away.
    #[error("No zone has capacity for {quantity} × {item_code}")]
    NoCapacity { item_code: String, quantity: i64 },

    /// The scanned item code is not in the pending put-away list.
    #[error("Item code ({0}) not found in store list")]
    UnknownItem(String),

    /// There are no pending stock requests.
    #[error("Nothing to put away")]
    NothingToPutAway,

    /// Operator-confirmed quantities are out of bounds.
    #[error("Invalid quantity for {item_code}: {reason}")]
    InvalidQuantity { item_code: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Stable snake_case code for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NotYetRetrievable => "not_yet_retrievable",
            CoreError::WrongCell { .. } => "wrong_cell",
            CoreError::CommitFailed { .. } => "commit_failed",
            CoreError::TransportFailure { .. } => "transport_failure",
            CoreError::CapacityExceeded { .. } => "capacity_exceeded",
            CoreError::InsufficientStock { .. } => "insufficient_stock",
            CoreError::CellNotFound(_) => "not_found",
            CoreError::InvalidState { .. } => "invalid_state",
            CoreError::NoBinAvailable { .. } => "no_bin_available",
            CoreError::NoCapacity { .. } => "no_capacity",
            CoreError::UnknownItem(_) => "unknown_item",
            CoreError::NothingToPutAway => "nothing_to_put_away",
            CoreError::InvalidQuantity { .. } => "invalid_quantity",
            CoreError::Validation(_) => "validation",
        }
    }

    /// Shorthand for a wrong-cell error.
    pub fn wrong_cell(cell_id: impl Into<String>) -> Self {
        CoreError::WrongCell {
            cell_id: cell_id.into(),
        }
    }

    /// Shorthand for a transport failure.
    pub fn transport(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::TransportFailure {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised while applying cell adjustments.
    ///
    /// These are reported to the operator as `commit_failed`.
    pub fn is_adjustment_error(&self) -> bool {
        matches!(
            self,
            CoreError::CapacityExceeded { .. }
                | CoreError::InsufficientStock { .. }
                | CoreError::CellNotFound(_)
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
