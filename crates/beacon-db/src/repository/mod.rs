//! # Repository Module
//!
//! Database repository implementations for Beacon.
//!
//! ## Repositories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  db.cells()                                                             │
//! │  ├── find_containing(item_code)   cells holding ≥1 unit                │
//! │  ├── get(cell_id) / list()                                             │
//! │  ├── first_bin_in_zone(zone)                                           │
//! │  └── commit(plan)                 one transaction, all or nothing      │
//! │                                                                         │
//! │  db.orders()                                                            │
//! │  ├── list_unfulfilled() / get(order_no)                                │
//! │  ├── insert(order) / assign_bin(order_no, bin_id)                      │
//! │  └── mark_lines_fulfilled(order_no, item_codes)                        │
//! │                                                                         │
//! │  db.stock()                                                             │
//! │  ├── list_pending() / insert(request)                                  │
//! │  └── mark_applied(request_no)                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `*_in` helpers take a connection so [`cells::CellRepository::commit`]
//! can run order and stock updates inside its own transaction.

pub mod cells;
pub mod orders;
pub mod stock;
