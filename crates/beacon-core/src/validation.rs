//! # Validation Module
//!
//! Input checks applied before anything reaches the session or the store.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Scanner / HTTP body                                          │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Identifier shape (non-empty, bounded, printable)                  │
//! │  └── Quantity bounds                                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints on quantities                                   │
//! │  └── Foreign keys from contents to cells                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::MAX_IDENTIFIER_LEN;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifier Validators
// =============================================================================

fn validate_identifier(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_IDENTIFIER_LEN,
        });
    }

    if value.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain whitespace or control characters".to_string(),
        });
    }

    Ok(())
}

/// Validates a scanned cell id.
///
/// ## Rules
/// - Non-empty, at most 64 characters, no whitespace
/// - At least `RACK-SIDE-SLOT` segments
///
/// ## Example
/// ```rust
/// use beacon_core::validation::validate_cell_id;
///
/// assert!(validate_cell_id("R1-S1-P4").is_ok());
/// assert!(validate_cell_id("P4").is_err());
/// ```
pub fn validate_cell_id(cell_id: &str) -> ValidationResult<()> {
    validate_identifier("cell_id", cell_id)?;

    if cell_id.trim().splitn(3, '-').filter(|s| !s.is_empty()).count() < 3 {
        return Err(ValidationError::InvalidFormat {
            field: "cell_id".to_string(),
            reason: "expected RACK-SIDE-SLOT".to_string(),
        });
    }

    Ok(())
}

/// Validates a scanned or typed item code.
pub fn validate_item_code(item_code: &str) -> ValidationResult<()> {
    validate_identifier("item_code", item_code)
}

/// Validates an order number.
pub fn validate_order_no(order_no: &str) -> ValidationResult<()> {
    validate_identifier("order_no", order_no)
}

/// Validates a stock (put-away) request number.
pub fn validate_request_no(request_no: &str) -> ValidationResult<()> {
    validate_identifier("request_no", request_no)
}

/// Validates a station id used as a registry key.
pub fn validate_station_id(station_id: &str) -> ValidationResult<()> {
    validate_identifier("station_id", station_id)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a requested or stocked quantity (must be at least 1).
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates a cell capacity.
pub fn validate_capacity(capacity: i64) -> ValidationResult<()> {
    if capacity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "capacity".to_string(),
        });
    }
    Ok(())
}
