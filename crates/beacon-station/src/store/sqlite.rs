//! # SQLite Store
//!
//! [`StationStore`] over `beacon-db`. Each commit runs as one transaction;
//! commits from this process are additionally serialised through a lock so
//! concurrent stations queue here instead of contending for SQLite's writer.

use async_trait::async_trait;
use beacon_core::session::CommitPlan;
use beacon_core::{Adjustment, Order, StockRequest, StorageCell, Zone};
use beacon_db::Database;
use tokio::sync::Mutex;

use super::{CellIndex, OrderStore, StationStore};
use crate::error::{StoreError, StoreResult};

#[derive(Debug)]
pub struct SqliteStore {
    db: Database,
    commit_lock: Mutex<()>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        SqliteStore {
            db,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl CellIndex for SqliteStore {
    async fn find_cells_containing(&self, item_code: &str) -> StoreResult<Vec<StorageCell>> {
        Ok(self.db.cells().find_containing(item_code).await?)
    }

    async fn cell_by_id(&self, cell_id: &str) -> StoreResult<StorageCell> {
        self.db
            .cells()
            .get(cell_id)
            .await?
            .ok_or_else(|| StoreError::not_found("Cell", cell_id))
    }

    async fn list_cells(&self) -> StoreResult<Vec<StorageCell>> {
        Ok(self.db.cells().list().await?)
    }

    async fn first_bin_in_zone(&self, zone: &Zone) -> StoreResult<Option<String>> {
        Ok(self.db.cells().first_bin_in_zone(zone).await?)
    }

    async fn commit_adjustments(&self, adjustments: &[Adjustment]) -> StoreResult<()> {
        let _commit_guard = self.commit_lock.lock().await;
        Ok(self.db.cells().adjust(adjustments).await?)
    }
}

#[async_trait]
impl OrderStore for SqliteStore {
    async fn list_unfulfilled_orders(&self) -> StoreResult<Vec<Order>> {
        Ok(self.db.orders().list_unfulfilled().await?)
    }

    async fn mark_lines_fulfilled(&self, order_no: &str, item_codes: &[String]) -> StoreResult<()> {
        Ok(self.db.orders().mark_lines_fulfilled(order_no, item_codes).await?)
    }

    async fn bin_for_order(&self, order_no: &str) -> StoreResult<Option<String>> {
        Ok(self.db.orders().bin_for(order_no).await?)
    }

    async fn pending_stock_requests(&self) -> StoreResult<Vec<StockRequest>> {
        Ok(self.db.stock().list_pending().await?)
    }
}

#[async_trait]
impl StationStore for SqliteStore {
    async fn commit(&self, plan: &CommitPlan) -> StoreResult<()> {
        let _commit_guard = self.commit_lock.lock().await;
        Ok(self.db.cells().commit(plan).await?)
    }
}
