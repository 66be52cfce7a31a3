//! # beacon-db: Database Layer for Beacon
//!
//! SQLite storage behind the station runtime, accessed through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Beacon Data Flow                                 │
//! │                                                                         │
//! │  Station worker (scan_second → commit)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     beacon-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ CellRepo      │    │ 001_initial  │  │   │
//! │  │   │ SqlitePool    │◄───│ OrderRepo     │    │  _schema.sql │  │   │
//! │  │   │ Transactions  │    │ StockRepo     │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use beacon_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./beacon.db")).await?;
//! let cells = db.cells().find_containing("ITEM-A").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::cells::CellRepository;
pub use repository::orders::OrderRepository;
pub use repository::stock::StockRepository;
