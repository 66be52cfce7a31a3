//! # Station Stores
//!
//! The Cell Index and the order/stock repository as seen by station workers.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           StationStore                                  │
//! │                                                                         │
//! │   CellIndex                          OrderStore                         │
//! │   ─────────                          ──────────                         │
//! │   find_cells_containing(item)        list_unfulfilled_orders()          │
//! │   cell_by_id(id)                     mark_lines_fulfilled(order, items) │
//! │   list_cells()                       bin_for_order(order)               │
//! │   first_bin_in_zone(zone)            pending_stock_requests()           │
//! │   commit_adjustments(adjs)                                              │
//! │                                                                         │
//! │   commit(plan): adjustments + order/stock update, all or nothing       │
//! │                                                                         │
//! │   MemoryStore  per-cell locks, taken in cell-id order                   │
//! │   SqliteStore  one sqlx transaction per commit                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use beacon_core::allocation::{allocate_retrieval, RetrievalAllocation, RetrievalPlan};
use beacon_core::session::CommitPlan;
use beacon_core::{Adjustment, Order, StockRequest, StorageCell, Zone};

use crate::error::StoreResult;

/// Queryable view of storage-cell contents.
#[async_trait]
pub trait CellIndex: Send + Sync {
    /// Cells holding at least one unit of `item_code`.
    async fn find_cells_containing(&self, item_code: &str) -> StoreResult<Vec<StorageCell>>;

    /// A single cell; unknown ids are [`crate::StoreError::NotFound`].
    async fn cell_by_id(&self, cell_id: &str) -> StoreResult<StorageCell>;

    async fn list_cells(&self) -> StoreResult<Vec<StorageCell>>;

    /// Lowest-id bin cell of a zone.
    async fn first_bin_in_zone(&self, zone: &Zone) -> StoreResult<Option<String>>;

    /// Applies adjustments all or nothing.
    async fn commit_adjustments(&self, adjustments: &[Adjustment]) -> StoreResult<()>;
}

/// Orders, designated bins and inbound stock.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Orders with at least one open line, oldest first.
    async fn list_unfulfilled_orders(&self) -> StoreResult<Vec<Order>>;

    async fn mark_lines_fulfilled(&self, order_no: &str, item_codes: &[String]) -> StoreResult<()>;

    async fn bin_for_order(&self, order_no: &str) -> StoreResult<Option<String>>;

    /// Stock requests not yet put away, oldest first.
    async fn pending_stock_requests(&self) -> StoreResult<Vec<StockRequest>>;
}

/// Everything a station needs from persistence.
#[async_trait]
pub trait StationStore: CellIndex + OrderStore {
    /// Applies a commit plan: cell adjustments and the order or stock
    /// update succeed together or not at all.
    async fn commit(&self, plan: &CommitPlan) -> StoreResult<()>;
}

// =============================================================================
// Allocation helpers
// =============================================================================

/// Candidate cells for every open requirement of `order`, deduplicated.
pub async fn candidate_cells<S>(store: &S, order: &Order) -> StoreResult<Vec<StorageCell>>
where
    S: CellIndex + ?Sized,
{
    let mut cells: BTreeMap<String, StorageCell> = BTreeMap::new();
    for item_code in order.requirements().keys() {
        for cell in store.find_cells_containing(item_code).await? {
            cells.entry(cell.cell_id.clone()).or_insert(cell);
        }
    }
    Ok(cells.into_values().collect())
}

/// Allocates `order` against the cells currently holding its items.
pub async fn allocate_order<S>(store: &S, order: &Order) -> StoreResult<RetrievalAllocation>
where
    S: CellIndex + ?Sized,
{
    let cells = candidate_cells(store, order).await?;
    Ok(allocate_retrieval(order, &cells))
}

/// Plans for every unfulfilled order that is retrievable right now.
pub async fn retrievable_plans<S>(store: &S) -> StoreResult<Vec<RetrievalPlan>>
where
    S: StationStore + ?Sized,
{
    let orders = store.list_unfulfilled_orders().await?;
    let item_codes: BTreeSet<String> = orders
        .iter()
        .flat_map(|o| o.requirements().into_keys())
        .collect();

    let mut cells: BTreeMap<String, StorageCell> = BTreeMap::new();
    for item_code in &item_codes {
        for cell in store.find_cells_containing(item_code).await? {
            cells.entry(cell.cell_id.clone()).or_insert(cell);
        }
    }
    let cells: Vec<StorageCell> = cells.into_values().collect();

    Ok(beacon_core::allocation::retrievable_orders(&orders, &cells))
}
