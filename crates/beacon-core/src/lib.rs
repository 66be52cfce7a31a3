//! # beacon-core: Pure Station Logic for Beacon
//!
//! This crate holds the allocation engine and the scan-session state machine
//! that drive light-directed retrieval and put-away stations. Everything here
//! is deterministic and free of I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Beacon Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 station-api (axum HTTP surface)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        beacon-station (workers, lights, fleet, stores)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ beacon-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────┐  ┌───────────┐  ┌───────────┐ │   │
//! │  │   │   types   │  │ allocation │  │  session  │  │   input   │ │   │
//! │  │   │ Cell,Zone │  │ zone pick  │  │ two-scan  │  │ key→scan  │ │   │
//! │  │   │ Order     │  │ put-away   │  │ protocol  │  │ buffer    │ │   │
//! │  │   └───────────┘  └────────────┘  └───────────┘  └───────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 beacon-db (SQLite persistence)                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (StorageCell, Zone, Order, StockRequest, ...)
//! - [`allocation`] - Retrieval and put-away zone selection
//! - [`session`] - Per-station scan session state machine
//! - [`input`] - Keystroke to barcode-scan assembly
//! - [`error`] - Domain error types
//! - [`validation`] - Identifier and quantity checks
//!
//! ## Example Usage
//!
//! ```rust
//! use beacon_core::allocation::{allocate_retrieval, RetrievalAllocation};
//! use beacon_core::types::{CellKind, Order, OrderLine, StorageCell};
//!
//! let cells = vec![
//!     StorageCell::new("R1-S1-P1", CellKind::Pigeonhole, 20).unwrap().with_item("A", 2),
//!     StorageCell::new("R1-S1-P2", CellKind::Pigeonhole, 20).unwrap().with_item("B", 1),
//! ];
//! let order = Order::new("SO-100", vec![OrderLine::new("A", 2), OrderLine::new("B", 1)]);
//!
//! match allocate_retrieval(&order, &cells) {
//!     RetrievalAllocation::Retrievable(plan) => assert_eq!(plan.zone.to_string(), "R1-S1"),
//!     RetrievalAllocation::NotYetRetrievable => unreachable!(),
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod error;
pub mod input;
pub mod session;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default capacity of a pigeonhole, in item units.
pub const DEFAULT_PIGEONHOLE_CAPACITY: i64 = 20;

/// Default capacity of a collection bin, in item units.
pub const DEFAULT_BIN_CAPACITY: i64 = 100;

/// Light colour the panel uses for pick locations.
pub const DEFAULT_LIGHT_COLOR: u32 = 64;

/// Longest identifier accepted from a scanner (cell ids, item codes, order numbers).
pub const MAX_IDENTIFIER_LEN: usize = 64;
