//! # In-Memory Store
//!
//! A [`StationStore`] kept entirely in process memory.
//!
//! ## Locking
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cells:   RwLock<BTreeMap<cell_id, Arc<Mutex<StorageCell>>>>            │
//! │  records: Mutex<Records>   (orders, bins, stock requests)               │
//! │                                                                         │
//! │  commit(plan):                                                          │
//! │    1. read-lock the map, collect the touched cells' mutexes            │
//! │    2. lock them in cell-id order (no two commits can deadlock)         │
//! │    3. apply every adjustment to clones                                  │
//! │    4. lock records, apply the order/stock update to a clone             │
//! │    5. all succeeded → write clones back; otherwise drop them            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads lock one cell at a time, so queries from other stations only wait
//! for commits on the cells they actually read.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use beacon_core::session::{touched_cells, CommitPlan, Completion};
use beacon_core::{Adjustment, CellKind, CoreError, Order, PickItem, StockRequest, StorageCell, Zone};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::{CellIndex, OrderStore, StationStore};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default, Clone)]
struct Records {
    /// Intake order.
    orders: Vec<Order>,
    bins: HashMap<String, String>,
    stock: Vec<StockRequest>,
}

/// In-memory Cell Index and order/stock repository.
#[derive(Debug, Default)]
pub struct MemoryStore {
    cells: RwLock<BTreeMap<String, Arc<Mutex<StorageCell>>>>,
    records: Mutex<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style constructor from an initial set of cells.
    pub fn with_cells(cells: impl IntoIterator<Item = StorageCell>) -> Self {
        let store = Self::new();
        for cell in cells {
            store.insert_cell(cell);
        }
        store
    }

    /// Registers (or replaces) a cell.
    pub fn insert_cell(&self, cell: StorageCell) {
        self.cells
            .write()
            .insert(cell.cell_id.clone(), Arc::new(Mutex::new(cell)));
    }

    /// Adds an order; rejects a malformed order or one whose number
    /// already exists.
    pub fn insert_order(&self, order: Order) -> StoreResult<()> {
        order.validate().map_err(|e| StoreError::Rejected(e.into()))?;
        let mut records = self.records.lock();
        if records.orders.iter().any(|o| o.order_no == order.order_no) {
            return Err(StoreError::Duplicate {
                field: "order_no".into(),
                value: order.order_no,
            });
        }
        debug!(order_no = %order.order_no, "Order added");
        records.orders.push(order);
        Ok(())
    }

    pub fn assign_bin(&self, order_no: impl Into<String>, bin_id: impl Into<String>) {
        self.records.lock().bins.insert(order_no.into(), bin_id.into());
    }

    pub fn insert_stock_request(&self, request: StockRequest) -> StoreResult<()> {
        request.validate().map_err(|e| StoreError::Rejected(e.into()))?;
        let mut records = self.records.lock();
        if records.stock.iter().any(|r| r.request_no == request.request_no) {
            return Err(StoreError::Duplicate {
                field: "request_no".into(),
                value: request.request_no,
            });
        }
        records.stock.push(request);
        Ok(())
    }

    /// Current state of an order, including fulfilled ones.
    pub fn order(&self, order_no: &str) -> Option<Order> {
        self.records
            .lock()
            .orders
            .iter()
            .find(|o| o.order_no == order_no)
            .cloned()
    }

    /// Snapshot of one cell.
    pub fn cell(&self, cell_id: &str) -> Option<StorageCell> {
        let handle = self.cells.read().get(cell_id).cloned()?;
        let cell = handle.lock().clone();
        Some(cell)
    }

    fn snapshot_where(&self, keep: impl Fn(&StorageCell) -> bool) -> Vec<StorageCell> {
        let handles: Vec<_> = self.cells.read().values().cloned().collect();
        handles
            .iter()
            .map(|h| h.lock().clone())
            .filter(|c| keep(c))
            .collect()
    }

    /// Locks the touched cells in id order and applies `adjustments`; when
    /// `completion` is given the order/stock update joins the same unit.
    fn apply_locked(&self, adjustments: &[Adjustment], completion: Option<&Completion>) -> StoreResult<()> {
        let ids: BTreeSet<&str> = adjustments.iter().map(|a| a.cell_id.as_str()).collect();

        let handles: Vec<(String, Arc<Mutex<StorageCell>>)> = {
            let map = self.cells.read();
            ids.iter()
                .map(|id| {
                    map.get(*id)
                        .map(|h| (id.to_string(), Arc::clone(h)))
                        .ok_or_else(|| StoreError::Rejected(CoreError::CellNotFound(id.to_string())))
                })
                .collect::<StoreResult<_>>()?
        };

        let mut guards: BTreeMap<String, _> = handles
            .iter()
            .map(|(id, h)| (id.clone(), h.lock()))
            .collect();

        let mut staged: BTreeMap<String, StorageCell> = guards
            .iter()
            .map(|(id, guard)| (id.clone(), (**guard).clone()))
            .collect();

        for adjustment in adjustments {
            if let Some(cell) = staged.get_mut(&adjustment.cell_id) {
                cell.apply(&adjustment.item_code, adjustment.delta)
                    .map_err(StoreError::Rejected)?;
            }
        }

        if let Some(completion) = completion {
            let mut records = self.records.lock();
            let mut next = records.clone();
            apply_completion(&mut next, completion)?;
            *records = next;
        }

        for (id, cell) in staged {
            if let Some(guard) = guards.get_mut(&id) {
                **guard = cell;
            }
        }
        Ok(())
    }
}

fn apply_completion(records: &mut Records, completion: &Completion) -> StoreResult<()> {
    match completion {
        Completion::OrderLines {
            order_no,
            picks,
            fulfilled_item_codes,
        } => {
            let order = records
                .orders
                .iter_mut()
                .find(|o| &o.order_no == order_no)
                .ok_or_else(|| StoreError::not_found("Order", order_no))?;
            ensure_open_lines(order, picks)?;
            order.apply_picks(picks);
            order.mark_fulfilled(fulfilled_item_codes);
        }
        Completion::StockRequest { request_no } => {
            let request = records
                .stock
                .iter_mut()
                .find(|r| &r.request_no == request_no && !r.applied)
                .ok_or_else(|| StoreError::not_found("Pending stock request", request_no))?;
            request.applied = true;
        }
    }
    Ok(())
}

/// Every pick must fit the order's outstanding units for its item; a line
/// closed or partly picked by another station in the meantime fails the
/// commit.
fn ensure_open_lines(order: &Order, picks: &[PickItem]) -> StoreResult<()> {
    let outstanding = order.requirements();
    let mut asked: BTreeMap<&str, i64> = BTreeMap::new();
    for pick in picks {
        *asked.entry(pick.item_code.as_str()).or_insert(0) += pick.quantity;
    }

    for (item_code, quantity) in asked {
        let open = outstanding.get(item_code).copied().unwrap_or(0);
        if open == 0 {
            return Err(StoreError::not_found(
                "Open order line",
                format!("{}/{}", order.order_no, item_code),
            ));
        }
        if quantity > open {
            return Err(StoreError::Conflict(format!(
                "order {} needs {} more of {}, round takes {}",
                order.order_no, open, item_code, quantity
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl CellIndex for MemoryStore {
    async fn find_cells_containing(&self, item_code: &str) -> StoreResult<Vec<StorageCell>> {
        Ok(self.snapshot_where(|c| c.holds(item_code)))
    }

    async fn cell_by_id(&self, cell_id: &str) -> StoreResult<StorageCell> {
        self.cell(cell_id)
            .ok_or_else(|| StoreError::not_found("Cell", cell_id))
    }

    async fn list_cells(&self) -> StoreResult<Vec<StorageCell>> {
        Ok(self.snapshot_where(|_| true))
    }

    async fn first_bin_in_zone(&self, zone: &Zone) -> StoreResult<Option<String>> {
        Ok(self
            .snapshot_where(|c| c.kind == CellKind::Bin && &c.zone == zone)
            .into_iter()
            .map(|c| c.cell_id)
            .next())
    }

    async fn commit_adjustments(&self, adjustments: &[Adjustment]) -> StoreResult<()> {
        self.apply_locked(adjustments, None)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn list_unfulfilled_orders(&self) -> StoreResult<Vec<Order>> {
        Ok(self
            .records
            .lock()
            .orders
            .iter()
            .filter(|o| !o.is_complete())
            .cloned()
            .collect())
    }

    async fn mark_lines_fulfilled(&self, order_no: &str, item_codes: &[String]) -> StoreResult<()> {
        let mut records = self.records.lock();
        let order = records
            .orders
            .iter_mut()
            .find(|o| o.order_no == order_no)
            .ok_or_else(|| StoreError::not_found("Order", order_no))?;
        order.mark_fulfilled(item_codes);
        Ok(())
    }

    async fn bin_for_order(&self, order_no: &str) -> StoreResult<Option<String>> {
        Ok(self.records.lock().bins.get(order_no).cloned())
    }

    async fn pending_stock_requests(&self) -> StoreResult<Vec<StockRequest>> {
        Ok(self
            .records
            .lock()
            .stock
            .iter()
            .filter(|r| !r.applied)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StationStore for MemoryStore {
    async fn commit(&self, plan: &CommitPlan) -> StoreResult<()> {
        self.apply_locked(&plan.adjustments, Some(&plan.completion))?;
        info!(
            zone = %plan.zone,
            cells = ?touched_cells(plan),
            "Commit applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::OrderLine;

    fn store() -> MemoryStore {
        let store = MemoryStore::with_cells([
            StorageCell::new("R1-S1-P1", CellKind::Pigeonhole, 10).unwrap().with_item("A", 2),
            StorageCell::new("R1-S1-P2", CellKind::Pigeonhole, 10).unwrap().with_item("B", 1),
            StorageCell::new("R1-S1-BIN9", CellKind::Bin, 50).unwrap(),
            StorageCell::new("R1-S1-BIN7", CellKind::Bin, 50).unwrap(),
        ]);
        store
            .insert_order(Order::new("SO-100", vec![OrderLine::new("A", 2), OrderLine::new("B", 1)]))
            .unwrap();
        store
    }

    fn plan(adjustments: Vec<Adjustment>, picks: Vec<PickItem>) -> CommitPlan {
        CommitPlan {
            zone: Zone::new("R1", "S1"),
            adjustments,
            completion: Completion::OrderLines {
                order_no: "SO-100".into(),
                picks,
                fulfilled_item_codes: vec!["A".into()],
            },
        }
    }

    #[tokio::test]
    async fn test_queries() {
        let store = store();
        let cells = store.find_cells_containing("A").await.unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].cell_id, "R1-S1-P1");

        assert!(matches!(
            store.cell_by_id("R1-S1-P9").await,
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(
            store.first_bin_in_zone(&Zone::new("R1", "S1")).await.unwrap().as_deref(),
            Some("R1-S1-BIN7")
        );
    }

    #[tokio::test]
    async fn test_commit_updates_cells_and_order() {
        let store = store();
        store
            .commit(&plan(vec![Adjustment::new("R1-S1-P1", "A", -2)], vec![PickItem::new("A", 2)]))
            .await
            .unwrap();

        assert_eq!(store.cell("R1-S1-P1").unwrap().quantity_of("A"), 0);
        let order = store.order("SO-100").unwrap();
        assert!(order.lines[0].fulfilled);
        assert!(!order.lines[1].fulfilled);
        assert_eq!(store.list_unfulfilled_orders().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_adjustment_leaves_everything_untouched() {
        let store = store();
        let err = store
            .commit(&plan(
                vec![
                    Adjustment::new("R1-S1-P1", "A", -2),
                    Adjustment::new("R1-S1-P2", "B", -5),
                ],
                vec![PickItem::new("A", 2)],
            ))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::Rejected(CoreError::InsufficientStock { .. })
        ));
        assert_eq!(store.cell("R1-S1-P1").unwrap().quantity_of("A"), 2);
        assert_eq!(store.cell("R1-S1-P2").unwrap().quantity_of("B"), 1);
        assert!(!store.order("SO-100").unwrap().lines[0].fulfilled);
    }

    #[tokio::test]
    async fn test_closed_line_fails_commit_without_touching_cells() {
        let store = store();
        store.mark_lines_fulfilled("SO-100", &["A".into()]).await.unwrap();

        let err = store
            .commit(&plan(vec![Adjustment::new("R1-S1-P1", "A", -2)], vec![PickItem::new("A", 2)]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(store.cell("R1-S1-P1").unwrap().quantity_of("A"), 2);
    }

    #[tokio::test]
    async fn test_over_pick_fails_commit_without_touching_cells() {
        let store = store();
        store.insert_cell(StorageCell::new("R1-S1-P1", CellKind::Pigeonhole, 10).unwrap().with_item("A", 5));
        let round = |quantity: i64| CommitPlan {
            zone: Zone::new("R1", "S1"),
            adjustments: vec![Adjustment::new("R1-S1-P1", "A", -quantity)],
            completion: Completion::OrderLines {
                order_no: "SO-100".into(),
                picks: vec![PickItem::new("A", quantity)],
                fulfilled_item_codes: vec![],
            },
        };
        store.commit(&round(1)).await.unwrap();

        let err = store.commit(&round(2)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.cell("R1-S1-P1").unwrap().quantity_of("A"), 4);
        let order = store.order("SO-100").unwrap();
        assert_eq!(order.lines[0].picked_quantity, 1);
        assert!(!order.lines[0].fulfilled);
    }

    #[tokio::test]
    async fn test_capacity_enforced() {
        let store = store();
        let err = store
            .commit_adjustments(&[Adjustment::new("R1-S1-P2", "C", 10)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Rejected(CoreError::CapacityExceeded { .. })
        ));

        let err = store
            .commit_adjustments(&[Adjustment::new("R7-S1-P1", "C", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(CoreError::CellNotFound(_))));
    }

    #[tokio::test]
    async fn test_stock_request_applied_once() {
        let store = store();
        store.insert_stock_request(StockRequest::new("ST-1", "C", 3)).unwrap();
        let put = CommitPlan {
            zone: Zone::new("R1", "S1"),
            adjustments: vec![Adjustment::new("R1-S1-P2", "C", 3)],
            completion: Completion::StockRequest {
                request_no: "ST-1".into(),
            },
        };

        store.commit(&put).await.unwrap();
        assert!(store.pending_stock_requests().await.unwrap().is_empty());

        assert!(store.commit(&put).await.is_err());
        assert_eq!(store.cell("R1-S1-P2").unwrap().quantity_of("C"), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_commits_never_overdraw() {
        let store = Arc::new(MemoryStore::with_cells([StorageCell::new(
            "R1-S1-P1",
            CellKind::Pigeonhole,
            100,
        )
        .unwrap()
        .with_item("A", 50)]));

        let mut tasks = Vec::new();
        for _ in 0..80 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store
                    .commit_adjustments(&[Adjustment::new("R1-S1-P1", "A", -1)])
                    .await
                    .is_ok()
            }));
        }

        let mut ok = 0;
        for task in tasks {
            if task.await.unwrap() {
                ok += 1;
            }
        }
        assert_eq!(ok, 50);
        assert_eq!(store.cell("R1-S1-P1").unwrap().quantity_of("A"), 0);
    }

    #[test]
    fn test_malformed_intake_rejected() {
        let store = store();
        let err = store
            .insert_order(Order::new("SO-7", vec![OrderLine::new("A", 0)]))
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(CoreError::Validation(_))));
        assert!(store.order("SO-7").is_none());

        let err = store
            .insert_stock_request(StockRequest::new("ST-9", "C", -2))
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_negative_stock_request_never_pending() {
        let store = store();
        assert!(store.insert_stock_request(StockRequest::new("ST-9", "C", -2)).is_err());
        assert!(store.pending_stock_requests().await.unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_order_rejected() {
        let store = store();
        let err = store
            .insert_order(Order::new("SO-100", vec![OrderLine::new("Z", 1)]))
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
    }
}
