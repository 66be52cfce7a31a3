//! # Scan Session
//!
//! The per-station state machine behind the two-scan protocol.
//!
//! ## States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌──────┐  begin_*   ┌───────────────────┐  accept_first_scan          │
//! │   │ Idle │──────────►│ AwaitingFirstScan │  accept_item_scan ─────┐    │
//! │   └──────┘            └───────────────────┘                        │    │
//! │      ▲                   │ wrong_cell: stay                        ▼    │
//! │      │                                            ┌────────────────────┐│
//! │      │ commit_succeeded                           │ AwaitingSecondScan ││
//! │      │                                            └────────────────────┘│
//! │   ┌────────────┐   scan_second (matching cell)        │   ▲             │
//! │   │ Committing │◄─────────────────────────────────────┘   │             │
//! │   └────────────┘──────────────────────────────────────────┘             │
//! │                         commit_failed                                   │
//! │                                                                         │
//! │   abandon(): any state ──► Idle                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The session never performs I/O. The station worker looks things up, calls
//! the `check_*` methods to validate without moving, then the `accept_*`
//! methods once every prerequisite has been fetched. A failed lookup therefore
//! leaves the session at the step that needed it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::allocation::{pick_items, PutawayPlan, RetrievalPlan};
use crate::error::{CoreError, CoreResult};
use crate::types::{Adjustment, Order, PickItem, StockRequest, StorageCell, Zone};

// =============================================================================
// Public State Types
// =============================================================================

/// Name of the session's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    AwaitingFirstScan,
    AwaitingSecondScan,
    Committing,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingFirstScan => "awaiting_first_scan",
            SessionState::AwaitingSecondScan => "awaiting_second_scan",
            SessionState::Committing => "committing",
        }
    }
}

/// Which kind of scan the session accepts next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStep {
    Nothing,
    /// Retrieval: a pigeonhole from the valid first-scan set.
    SourceCell,
    /// Retrieval: the resolved bin.
    Bin,
    /// Put-away: an item code from the pending list.
    ItemCode,
    /// Put-away: one of the target pigeonholes.
    TargetCell,
}

/// What the session is working on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTask {
    Retrieval { order: Order, plan: RetrievalPlan },
    Putaway { requests: Vec<StockRequest> },
}

/// State carried from the first scan into the second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingCommit {
    Retrieval {
        source_cell: String,
        bin_id: String,
        resolved: Vec<PickItem>,
        confirmed: Vec<PickItem>,
    },
    Putaway { plan: PutawayPlan },
}

/// Result of a valid retrieval first scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstScanResolution {
    pub order_no: String,
    pub zone: Zone,
    pub items: Vec<PickItem>,
    pub bin_id: String,
}

/// Order or stock state changed by a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Completion {
    OrderLines {
        order_no: String,
        picks: Vec<PickItem>,
        fulfilled_item_codes: Vec<String>,
    },
    StockRequest { request_no: String },
}

/// Everything one commit must apply atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPlan {
    pub zone: Zone,
    pub adjustments: Vec<Adjustment>,
    pub completion: Completion,
}

/// Serialisable view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub task: Option<String>,
    pub order_no: Option<String>,
    pub request_no: Option<String>,
    pub zone: Option<Zone>,
    pub valid_cells: Vec<String>,
    pub bin_id: Option<String>,
    pub resolved: Vec<PickItem>,
    pub confirmed: Vec<PickItem>,
}

// =============================================================================
// Scan Session
// =============================================================================

#[derive(Debug, Clone, Default)]
enum Phase {
    #[default]
    Idle,
    AwaitingFirstScan(SessionTask),
    AwaitingSecondScan(SessionTask, PendingCommit),
    Committing(SessionTask, PendingCommit),
}

/// One station's scan session.
#[derive(Debug, Clone, Default)]
pub struct ScanSession {
    phase: Phase,
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Idle => SessionState::Idle,
            Phase::AwaitingFirstScan(_) => SessionState::AwaitingFirstScan,
            Phase::AwaitingSecondScan(..) => SessionState::AwaitingSecondScan,
            Phase::Committing(..) => SessionState::Committing,
        }
    }

    fn invalid(&self, expected: SessionState) -> CoreError {
        CoreError::InvalidState {
            expected: expected.as_str().to_string(),
            actual: self.state().as_str().to_string(),
        }
    }

    fn require_idle(&self) -> CoreResult<()> {
        match self.phase {
            Phase::Idle => Ok(()),
            _ => Err(self.invalid(SessionState::Idle)),
        }
    }

    // -------------------------------------------------------------------------
    // Start
    // -------------------------------------------------------------------------

    /// Idle → AwaitingFirstScan for a retrievable order.
    pub fn begin_retrieval(&mut self, order: Order, plan: RetrievalPlan) -> CoreResult<()> {
        self.require_idle()?;
        self.phase = Phase::AwaitingFirstScan(SessionTask::Retrieval { order, plan });
        Ok(())
    }

    /// Idle → AwaitingFirstScan over the pending stock requests.
    pub fn begin_putaway(&mut self, requests: Vec<StockRequest>) -> CoreResult<()> {
        self.require_idle()?;
        let requests: Vec<_> = requests.into_iter().filter(|r| !r.applied).collect();
        if requests.is_empty() {
            return Err(CoreError::NothingToPutAway);
        }
        self.phase = Phase::AwaitingFirstScan(SessionTask::Putaway { requests });
        Ok(())
    }

    // -------------------------------------------------------------------------
    // First scan
    // -------------------------------------------------------------------------

    /// Validates a retrieval first scan without changing state.
    ///
    /// Returns the plan so the caller can resolve the bin for its zone.
    pub fn check_first_scan(&self, cell_id: &str) -> CoreResult<(&Order, &RetrievalPlan)> {
        match &self.phase {
            Phase::AwaitingFirstScan(SessionTask::Retrieval { order, plan }) => {
                if plan.valid_first_scan_cells.contains(cell_id) {
                    Ok((order, plan))
                } else {
                    Err(CoreError::wrong_cell(cell_id))
                }
            }
            _ => Err(self.invalid(SessionState::AwaitingFirstScan)),
        }
    }

    /// AwaitingFirstScan → AwaitingSecondScan with the items `cell` yields.
    ///
    /// A cell that no longer holds anything the order needs is a wrong cell.
    pub fn accept_first_scan(
        &mut self,
        cell: &StorageCell,
        bin_id: impl Into<String>,
    ) -> CoreResult<FirstScanResolution> {
        let (order, plan) = self.check_first_scan(&cell.cell_id)?;

        let items = pick_items(order, cell);
        if items.is_empty() {
            return Err(CoreError::wrong_cell(&cell.cell_id));
        }

        let bin_id = bin_id.into();
        let resolution = FirstScanResolution {
            order_no: order.order_no.clone(),
            zone: plan.zone.clone(),
            items: items.clone(),
            bin_id: bin_id.clone(),
        };

        if let Phase::AwaitingFirstScan(task) = std::mem::take(&mut self.phase) {
            self.phase = Phase::AwaitingSecondScan(
                task,
                PendingCommit::Retrieval {
                    source_cell: cell.cell_id.clone(),
                    bin_id,
                    resolved: items.clone(),
                    confirmed: items,
                },
            );
        }
        Ok(resolution)
    }

    /// Validates a put-away item scan without changing state.
    pub fn check_item_scan(&self, item_code: &str) -> CoreResult<&StockRequest> {
        match &self.phase {
            Phase::AwaitingFirstScan(SessionTask::Putaway { requests }) => requests
                .iter()
                .find(|r| r.item_code == item_code)
                .ok_or_else(|| CoreError::UnknownItem(item_code.to_string())),
            _ => Err(self.invalid(SessionState::AwaitingFirstScan)),
        }
    }

    /// AwaitingFirstScan → AwaitingSecondScan once a zone has been chosen.
    pub fn accept_item_scan(&mut self, plan: PutawayPlan) -> CoreResult<()> {
        let request_no = self.check_item_scan(&plan.item_code)?.request_no.clone();
        if request_no != plan.request_no {
            return Err(CoreError::UnknownItem(plan.item_code));
        }

        if let Phase::AwaitingFirstScan(task) = std::mem::take(&mut self.phase) {
            self.phase = Phase::AwaitingSecondScan(task, PendingCommit::Putaway { plan });
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Between scans
    // -------------------------------------------------------------------------

    /// Replaces the quantities to take. Items left out keep their resolved amount.
    pub fn confirm_quantities(&mut self, items: &[PickItem]) -> CoreResult<Vec<PickItem>> {
        let expected = self.invalid(SessionState::AwaitingSecondScan);
        let Phase::AwaitingSecondScan(
            _,
            PendingCommit::Retrieval {
                resolved,
                confirmed,
                ..
            },
        ) = &mut self.phase
        else {
            return Err(expected);
        };

        let mut next = confirmed.clone();
        for item in items {
            let Some(limit) = resolved
                .iter()
                .find(|r| r.item_code == item.item_code)
                .map(|r| r.quantity)
            else {
                return Err(CoreError::InvalidQuantity {
                    item_code: item.item_code.clone(),
                    reason: "not resolved for this cell".to_string(),
                });
            };
            if item.quantity < 0 || item.quantity > limit {
                return Err(CoreError::InvalidQuantity {
                    item_code: item.item_code.clone(),
                    reason: format!("must be between 0 and {}", limit),
                });
            }
            if let Some(slot) = next.iter_mut().find(|c| c.item_code == item.item_code) {
                slot.quantity = item.quantity;
            }
        }

        // A round must move at least one unit; abandon instead.
        if next.iter().all(|c| c.quantity == 0) {
            return Err(CoreError::InvalidQuantity {
                item_code: next
                    .iter()
                    .map(|c| c.item_code.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
                reason: "at least one unit must be taken".to_string(),
            });
        }

        *confirmed = next.clone();
        Ok(next)
    }

    // -------------------------------------------------------------------------
    // Second scan and commit
    // -------------------------------------------------------------------------

    /// AwaitingSecondScan → Committing when `cell_id` is the awaited cell.
    pub fn scan_second(&mut self, cell_id: &str) -> CoreResult<CommitPlan> {
        let plan = match &self.phase {
            Phase::AwaitingSecondScan(task, pending) => build_commit(task, pending, cell_id)?,
            _ => return Err(self.invalid(SessionState::AwaitingSecondScan)),
        };

        if let Phase::AwaitingSecondScan(task, pending) = std::mem::take(&mut self.phase) {
            self.phase = Phase::Committing(task, pending);
        }
        Ok(plan)
    }

    /// A light-panel confirmation, validated exactly like a second scan.
    pub fn confirmation(&mut self, location_id: &str) -> CoreResult<CommitPlan> {
        self.scan_second(location_id)
    }

    /// Committing → Idle.
    pub fn commit_succeeded(&mut self) -> CoreResult<()> {
        match self.phase {
            Phase::Committing(..) => {
                self.phase = Phase::Idle;
                Ok(())
            }
            _ => Err(self.invalid(SessionState::Committing)),
        }
    }

    /// Committing → AwaitingSecondScan, keeping the resolved allocation.
    pub fn commit_failed(&mut self) -> CoreResult<()> {
        match std::mem::take(&mut self.phase) {
            Phase::Committing(task, pending) => {
                self.phase = Phase::AwaitingSecondScan(task, pending);
                Ok(())
            }
            other => {
                self.phase = other;
                Err(self.invalid(SessionState::Committing))
            }
        }
    }

    /// Any state → Idle without committing. Returns the state left.
    pub fn abandon(&mut self) -> SessionState {
        let left = self.state();
        self.phase = Phase::Idle;
        left
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn expected_scan(&self) -> ScanStep {
        match &self.phase {
            Phase::AwaitingFirstScan(SessionTask::Retrieval { .. }) => ScanStep::SourceCell,
            Phase::AwaitingFirstScan(SessionTask::Putaway { .. }) => ScanStep::ItemCode,
            Phase::AwaitingSecondScan(_, PendingCommit::Retrieval { .. }) => ScanStep::Bin,
            Phase::AwaitingSecondScan(_, PendingCommit::Putaway { .. }) => ScanStep::TargetCell,
            _ => ScanStep::Nothing,
        }
    }

    /// The lit location this session waits on, if any.
    pub fn awaited_location(&self) -> Option<&str> {
        match &self.phase {
            Phase::AwaitingSecondScan(_, PendingCommit::Retrieval { bin_id, .. }) => Some(bin_id),
            _ => None,
        }
    }

    /// Zone of the current task, once known.
    pub fn zone(&self) -> Option<&Zone> {
        match &self.phase {
            Phase::Idle => None,
            Phase::AwaitingFirstScan(task) => task_zone(task, None),
            Phase::AwaitingSecondScan(task, pending) | Phase::Committing(task, pending) => {
                task_zone(task, Some(pending))
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let mut snap = SessionSnapshot {
            state: self.state(),
            task: None,
            order_no: None,
            request_no: None,
            zone: self.zone().cloned(),
            valid_cells: Vec::new(),
            bin_id: None,
            resolved: Vec::new(),
            confirmed: Vec::new(),
        };

        let (task, pending) = match &self.phase {
            Phase::Idle => return snap,
            Phase::AwaitingFirstScan(task) => (task, None),
            Phase::AwaitingSecondScan(task, pending) | Phase::Committing(task, pending) => {
                (task, Some(pending))
            }
        };

        match task {
            SessionTask::Retrieval { order, plan } => {
                snap.task = Some("retrieval".to_string());
                snap.order_no = Some(order.order_no.clone());
                snap.valid_cells = plan.valid_first_scan_cells.iter().cloned().collect();
            }
            SessionTask::Putaway { .. } => snap.task = Some("putaway".to_string()),
        }

        match pending {
            Some(PendingCommit::Retrieval {
                bin_id,
                resolved,
                confirmed,
                ..
            }) => {
                snap.bin_id = Some(bin_id.clone());
                snap.resolved = resolved.clone();
                snap.confirmed = confirmed.clone();
            }
            Some(PendingCommit::Putaway { plan }) => {
                snap.request_no = Some(plan.request_no.clone());
                snap.valid_cells = plan.target_cells.iter().cloned().collect();
                snap.confirmed = vec![PickItem::new(plan.item_code.clone(), plan.quantity)];
            }
            None => {}
        }

        snap
    }
}

fn task_zone<'a>(task: &'a SessionTask, pending: Option<&'a PendingCommit>) -> Option<&'a Zone> {
    match (task, pending) {
        (SessionTask::Retrieval { plan, .. }, _) => Some(&plan.zone),
        (SessionTask::Putaway { .. }, Some(PendingCommit::Putaway { plan })) => Some(&plan.zone),
        _ => None,
    }
}

fn build_commit(task: &SessionTask, pending: &PendingCommit, cell_id: &str) -> CoreResult<CommitPlan> {
    match (task, pending) {
        (
            SessionTask::Retrieval { order, plan },
            PendingCommit::Retrieval {
                source_cell,
                bin_id,
                confirmed,
                ..
            },
        ) => {
            if cell_id != bin_id {
                return Err(CoreError::wrong_cell(cell_id));
            }

            let picks: Vec<PickItem> = confirmed.iter().filter(|p| p.quantity > 0).cloned().collect();
            if picks.is_empty() {
                return Err(CoreError::InvalidQuantity {
                    item_code: order.order_no.clone(),
                    reason: "nothing confirmed for this round".to_string(),
                });
            }
            let adjustments = picks
                .iter()
                .map(|p| Adjustment::new(source_cell.clone(), p.item_code.clone(), -p.quantity))
                .collect();
            let fulfilled_item_codes = order.clone().apply_picks(&picks);

            Ok(CommitPlan {
                zone: plan.zone.clone(),
                adjustments,
                completion: Completion::OrderLines {
                    order_no: order.order_no.clone(),
                    picks,
                    fulfilled_item_codes,
                },
            })
        }
        (SessionTask::Putaway { .. }, PendingCommit::Putaway { plan }) => {
            if !plan.target_cells.contains(cell_id) {
                return Err(CoreError::wrong_cell(cell_id));
            }
            Ok(CommitPlan {
                zone: plan.zone.clone(),
                adjustments: vec![Adjustment::new(cell_id, plan.item_code.clone(), plan.quantity)],
                completion: Completion::StockRequest {
                    request_no: plan.request_no.clone(),
                },
            })
        }
        _ => Err(CoreError::InvalidState {
            expected: "matching task".to_string(),
            actual: "mismatched pending commit".to_string(),
        }),
    }
}

/// Cells a commit plan touches, sorted and deduplicated.
pub fn touched_cells(plan: &CommitPlan) -> BTreeSet<String> {
    plan.adjustments.iter().map(|a| a.cell_id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::{allocate_putaway, allocate_retrieval};
    use crate::types::{CellKind, OrderLine};

    fn cells() -> Vec<StorageCell> {
        vec![
            StorageCell::new("R1-S1-P1", CellKind::Pigeonhole, 20).unwrap().with_item("A", 2),
            StorageCell::new("R1-S1-P2", CellKind::Pigeonhole, 20).unwrap().with_item("B", 1),
        ]
    }

    fn so_100() -> Order {
        Order::new("SO-100", vec![OrderLine::new("A", 2), OrderLine::new("B", 1)])
    }

    fn started() -> ScanSession {
        let order = so_100();
        let plan = allocate_retrieval(&order, &cells()).plan().unwrap();
        let mut session = ScanSession::new();
        session.begin_retrieval(order, plan).unwrap();
        session
    }

    fn at_second_scan() -> ScanSession {
        let mut session = started();
        session.accept_first_scan(&cells()[0], "R1-S1-BIN7").unwrap();
        session
    }

    #[test]
    fn test_first_scan_outside_valid_set() {
        let mut session = started();
        let stray = StorageCell::new("R1-S1-P9", CellKind::Pigeonhole, 20)
            .unwrap()
            .with_item("A", 5);

        let err = session.accept_first_scan(&stray, "R1-S1-BIN7").unwrap_err();
        assert_eq!(err, CoreError::wrong_cell("R1-S1-P9"));
        assert_eq!(session.state(), SessionState::AwaitingFirstScan);
    }

    #[test]
    fn test_first_scan_resolves_items_and_bin() {
        let mut session = started();
        let res = session.accept_first_scan(&cells()[0], "R1-S1-BIN7").unwrap();

        assert_eq!(res.items, vec![PickItem::new("A", 2)]);
        assert_eq!(res.bin_id, "R1-S1-BIN7");
        assert_eq!(session.state(), SessionState::AwaitingSecondScan);
        assert_eq!(session.awaited_location(), Some("R1-S1-BIN7"));
        assert_eq!(session.expected_scan(), ScanStep::Bin);
    }

    #[test]
    fn test_second_scan_wrong_bin_keeps_state() {
        let mut session = at_second_scan();
        let err = session.scan_second("R1-S1-BIN8").unwrap_err();
        assert_eq!(err.kind(), "wrong_cell");
        assert_eq!(session.state(), SessionState::AwaitingSecondScan);
    }

    #[test]
    fn test_second_scan_builds_commit() {
        let mut session = at_second_scan();
        let plan = session.scan_second("R1-S1-BIN7").unwrap();

        assert_eq!(session.state(), SessionState::Committing);
        assert_eq!(plan.adjustments, vec![Adjustment::new("R1-S1-P1", "A", -2)]);
        assert_eq!(
            plan.completion,
            Completion::OrderLines {
                order_no: "SO-100".into(),
                picks: vec![PickItem::new("A", 2)],
                fulfilled_item_codes: vec!["A".into()],
            }
        );

        session.commit_succeeded().unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.snapshot().zone, None);
    }

    #[test]
    fn test_commit_failure_returns_to_second_scan() {
        let mut session = at_second_scan();
        session.scan_second("R1-S1-BIN7").unwrap();
        session.commit_failed().unwrap();

        assert_eq!(session.state(), SessionState::AwaitingSecondScan);
        assert_eq!(session.awaited_location(), Some("R1-S1-BIN7"));
        assert!(session.scan_second("R1-S1-BIN7").is_ok());
    }

    #[test]
    fn test_confirm_quantities_bounds() {
        let mut session = at_second_scan();

        let err = session.confirm_quantities(&[PickItem::new("A", 3)]).unwrap_err();
        assert_eq!(err.kind(), "invalid_quantity");
        let err = session.confirm_quantities(&[PickItem::new("B", 1)]).unwrap_err();
        assert_eq!(err.kind(), "invalid_quantity");

        let confirmed = session.confirm_quantities(&[PickItem::new("A", 1)]).unwrap();
        assert_eq!(confirmed, vec![PickItem::new("A", 1)]);

        let plan = session.scan_second("R1-S1-BIN7").unwrap();
        assert_eq!(plan.adjustments, vec![Adjustment::new("R1-S1-P1", "A", -1)]);
        match plan.completion {
            Completion::OrderLines { fulfilled_item_codes, .. } => assert!(fulfilled_item_codes.is_empty()),
            other => panic!("unexpected completion {:?}", other),
        }
    }

    #[test]
    fn test_confirm_nothing_taken_rejected() {
        let mut session = at_second_scan();

        let err = session.confirm_quantities(&[PickItem::new("A", 0)]).unwrap_err();
        assert_eq!(err.kind(), "invalid_quantity");

        // Earlier confirmation survives the rejected one.
        let plan = session.scan_second("R1-S1-BIN7").unwrap();
        assert_eq!(plan.adjustments, vec![Adjustment::new("R1-S1-P1", "A", -2)]);
    }

    #[test]
    fn test_confirmation_validated_like_scan() {
        let mut session = at_second_scan();
        assert_eq!(session.confirmation("99").unwrap_err().kind(), "wrong_cell");
        assert_eq!(session.state(), SessionState::AwaitingSecondScan);
    }

    #[test]
    fn test_begin_requires_idle() {
        let mut session = started();
        let order = so_100();
        let plan = allocate_retrieval(&order, &cells()).plan().unwrap();
        assert_eq!(session.begin_retrieval(order, plan).unwrap_err().kind(), "invalid_state");

        assert_eq!(session.abandon(), SessionState::AwaitingFirstScan);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_putaway_flow() {
        let mut session = ScanSession::new();
        assert_eq!(
            session.begin_putaway(vec![]).unwrap_err(),
            CoreError::NothingToPutAway
        );

        let request = StockRequest::new("ST-1", "A", 4);
        session.begin_putaway(vec![request.clone()]).unwrap();
        assert_eq!(session.expected_scan(), ScanStep::ItemCode);
        assert_eq!(session.check_item_scan("Z").unwrap_err().kind(), "unknown_item");

        let plan = allocate_putaway(&request, &cells()).unwrap();
        session.accept_item_scan(plan).unwrap();
        assert_eq!(session.expected_scan(), ScanStep::TargetCell);
        assert_eq!(session.awaited_location(), None);

        assert_eq!(session.scan_second("R9-S9-P1").unwrap_err().kind(), "wrong_cell");
        let commit = session.scan_second("R1-S1-P2").unwrap();
        assert_eq!(commit.adjustments, vec![Adjustment::new("R1-S1-P2", "A", 4)]);
        assert_eq!(commit.completion, Completion::StockRequest { request_no: "ST-1".into() });
    }

    #[test]
    fn test_snapshot_reports_progress() {
        let session = at_second_scan();
        let snap = session.snapshot();
        assert_eq!(snap.state, SessionState::AwaitingSecondScan);
        assert_eq!(snap.order_no.as_deref(), Some("SO-100"));
        assert_eq!(snap.bin_id.as_deref(), Some("R1-S1-BIN7"));
        assert_eq!(snap.valid_cells, vec!["R1-S1-P1", "R1-S1-P2"]);
    }
}
