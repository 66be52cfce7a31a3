//! # Station Worker
//!
//! One worker task per station. Every operation for a station goes through
//! its command queue, so scans are handled strictly in arrival order and a
//! second scan always sees the result of the first.
//!
//! ## Worker Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  StationHandle ──► mpsc<StationCommand> ──► StationWorker (task)       │
//! │       ▲                                         │                       │
//! │       └──────────── oneshot reply ◄─────────────┤                       │
//! │                                                 │                       │
//! │                            ┌────────────────────┼───────────────────┐   │
//! │                            ▼                    ▼                   ▼   │
//! │                       ScanSession          StationStore     Signals/Fleet│
//! │                       (pure state)         (lookups,        (fire and   │
//! │                                             commit)          forget)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The worker fetches what a step needs before touching the session, so a
//! failed lookup leaves the session at the step that needed it.

use std::sync::Arc;

use beacon_core::allocation::{allocate_putaway, PutawayPlan, RetrievalAllocation, RetrievalPlan};
use beacon_core::input::{Key, ScanBuffer};
use beacon_core::session::{
    CommitPlan, Completion, FirstScanResolution, ScanSession, ScanStep, SessionSnapshot, SessionState,
};
use beacon_core::{
    CoreError, FleetRequest, FleetTaskType, PickItem, SignalCommand, StockRequest, Zone,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{StationError, StationResult};
use crate::fleet::FleetDispatcher;
use crate::signal::SignalCoordinator;
use crate::store::{allocate_order, retrievable_plans, StationStore};

// =============================================================================
// Operation Results
// =============================================================================

/// A retrieval session has started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalStarted {
    pub order_no: String,
    pub zone: Zone,
    pub valid_first_scan_cells: Vec<String>,
}

/// A put-away session has started over these requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutawayStarted {
    pub pending: Vec<StockRequest>,
}

/// Proof of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub commit_id: Uuid,
    pub station_id: String,
    pub zone: Zone,
    pub completion: Completion,
    pub committed_at: DateTime<Utc>,
}

/// Result of a scan routed by the session's current step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanOutcome {
    Resolved(FirstScanResolution),
    PutawayPlanned(PutawayPlan),
    Committed(CommitReceipt),
}

/// Result of a single keystroke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyOutcome {
    /// Still assembling; `pending` is the buffer so far.
    Buffered { pending: String },
    Scanned { token: String, outcome: ScanOutcome },
}

/// Snapshot returned by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationStatus {
    pub station_id: String,
    pub session: SessionSnapshot,
    pub pending_input: String,
    pub last_zone: Option<Zone>,
}

// =============================================================================
// Shared Context
// =============================================================================

/// Collaborators shared by every station worker.
#[derive(Clone)]
pub struct StationContext {
    pub store: Arc<dyn StationStore>,
    pub signals: Arc<SignalCoordinator>,
    pub fleet: Arc<dyn FleetDispatcher>,
    pub retrievable: Arc<watch::Sender<Vec<RetrievalPlan>>>,
    pub light_color: u32,
}

// =============================================================================
// Commands and Handle
// =============================================================================

type Reply<T> = oneshot::Sender<StationResult<T>>;

enum StationCommand {
    StartRetrieval(Reply<RetrievalStarted>),
    ScanFirst(String, Reply<FirstScanResolution>),
    ConfirmQuantities(Vec<PickItem>, Reply<Vec<PickItem>>),
    ScanSecond(String, Reply<CommitReceipt>),
    Confirmation(String, Reply<CommitReceipt>),
    StartPutaway(Reply<PutawayStarted>),
    ScanItemCode(String, Reply<PutawayPlan>),
    ScanTargetCell(String, Reply<CommitReceipt>),
    KeyPress(Key, Reply<KeyOutcome>),
    Abandon(Reply<SessionState>),
    Advance(Reply<Option<Zone>>),
    Status(Reply<StationStatus>),
    Shutdown,
}

/// Cheap, cloneable handle to a station worker.
#[derive(Clone)]
pub struct StationHandle {
    station_id: Arc<str>,
    cmd_tx: mpsc::Sender<StationCommand>,
}

impl StationHandle {
    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> StationCommand) -> StationResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| StationError::ShuttingDown)?;
        reply_rx
            .await
            .map_err(|_| StationError::ChannelError("Station worker dropped the reply".into()))?
    }

    pub async fn start_retrieval(&self) -> StationResult<RetrievalStarted> {
        self.request(StationCommand::StartRetrieval).await
    }

    pub async fn scan_first(&self, cell_id: impl Into<String>) -> StationResult<FirstScanResolution> {
        let cell_id = cell_id.into();
        self.request(|reply| StationCommand::ScanFirst(cell_id, reply)).await
    }

    pub async fn confirm_quantities(&self, items: Vec<PickItem>) -> StationResult<Vec<PickItem>> {
        self.request(|reply| StationCommand::ConfirmQuantities(items, reply)).await
    }

    pub async fn scan_second(&self, cell_id: impl Into<String>) -> StationResult<CommitReceipt> {
        let cell_id = cell_id.into();
        self.request(|reply| StationCommand::ScanSecond(cell_id, reply)).await
    }

    /// A light-panel confirmation for this station.
    pub async fn confirm(&self, location_id: impl Into<String>) -> StationResult<CommitReceipt> {
        let location_id = location_id.into();
        self.request(|reply| StationCommand::Confirmation(location_id, reply)).await
    }

    pub async fn start_putaway(&self) -> StationResult<PutawayStarted> {
        self.request(StationCommand::StartPutaway).await
    }

    pub async fn scan_item_code(&self, item_code: impl Into<String>) -> StationResult<PutawayPlan> {
        let item_code = item_code.into();
        self.request(|reply| StationCommand::ScanItemCode(item_code, reply)).await
    }

    pub async fn scan_target_cell(&self, cell_id: impl Into<String>) -> StationResult<CommitReceipt> {
        let cell_id = cell_id.into();
        self.request(|reply| StationCommand::ScanTargetCell(cell_id, reply)).await
    }

    pub async fn key_press(&self, key: Key) -> StationResult<KeyOutcome> {
        self.request(|reply| StationCommand::KeyPress(key, reply)).await
    }

    pub async fn abandon(&self) -> StationResult<SessionState> {
        self.request(StationCommand::Abandon).await
    }

    pub async fn advance(&self) -> StationResult<Option<Zone>> {
        self.request(StationCommand::Advance).await
    }

    pub async fn status(&self) -> StationResult<StationStatus> {
        self.request(StationCommand::Status).await
    }

    pub async fn shutdown(&self) -> StationResult<()> {
        self.cmd_tx
            .send(StationCommand::Shutdown)
            .await
            .map_err(|_| StationError::ShuttingDown)
    }
}

// =============================================================================
// Worker
// =============================================================================

pub struct StationWorker {
    station_id: String,
    ctx: StationContext,
    session: ScanSession,
    buffer: ScanBuffer,
    /// Zone most recently brought to the station.
    last_zone: Option<Zone>,
}

impl StationWorker {
    pub fn new(station_id: impl Into<String>, ctx: StationContext) -> Self {
        StationWorker {
            station_id: station_id.into(),
            ctx,
            session: ScanSession::new(),
            buffer: ScanBuffer::new(),
            last_zone: None,
        }
    }

    /// Spawns the worker task and returns its handle.
    pub fn start(self) -> StationHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let handle = StationHandle {
            station_id: Arc::from(self.station_id.as_str()),
            cmd_tx,
        };
        tokio::spawn(self.run(cmd_rx));
        handle
    }

    async fn run(mut self, mut cmd_rx: mpsc::Receiver<StationCommand>) {
        info!(station = %self.station_id, "Station worker started");

        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                StationCommand::StartRetrieval(reply) => {
                    let _ = reply.send(self.start_retrieval().await);
                }
                StationCommand::ScanFirst(cell_id, reply) => {
                    let _ = reply.send(self.scan_first(&cell_id).await);
                }
                StationCommand::ConfirmQuantities(items, reply) => {
                    let _ = reply.send(self.confirm_quantities(&items));
                }
                StationCommand::ScanSecond(cell_id, reply) => {
                    let _ = reply.send(self.scan_second(&cell_id).await);
                }
                StationCommand::Confirmation(location_id, reply) => {
                    let _ = reply.send(self.confirmation(&location_id).await);
                }
                StationCommand::StartPutaway(reply) => {
                    let _ = reply.send(self.start_putaway().await);
                }
                StationCommand::ScanItemCode(item_code, reply) => {
                    let _ = reply.send(self.scan_item_code(&item_code).await);
                }
                StationCommand::ScanTargetCell(cell_id, reply) => {
                    let _ = reply.send(self.scan_target_cell(&cell_id).await);
                }
                StationCommand::KeyPress(key, reply) => {
                    let _ = reply.send(self.key_press(key).await);
                }
                StationCommand::Abandon(reply) => {
                    let _ = reply.send(Ok(self.abandon()));
                }
                StationCommand::Advance(reply) => {
                    let _ = reply.send(Ok(self.advance().await));
                }
                StationCommand::Status(reply) => {
                    let _ = reply.send(Ok(self.status()));
                }
                StationCommand::Shutdown => break,
            }
        }

        self.ctx.signals.release(&self.station_id);
        info!(station = %self.station_id, "Station worker stopped");
    }

    // -------------------------------------------------------------------------
    // Retrieval
    // -------------------------------------------------------------------------

    async fn start_retrieval(&mut self) -> StationResult<RetrievalStarted> {
        self.ensure_idle()?;
        let store = &self.ctx.store;

        let orders = store
            .list_unfulfilled_orders()
            .await
            .map_err(|e| StationError::fetching("list unfulfilled orders", e))?;

        for order in orders {
            let allocation = allocate_order(store.as_ref(), &order)
                .await
                .map_err(|e| StationError::fetching("cell lookup", e))?;

            if let RetrievalAllocation::Retrievable(plan) = allocation {
                let started = RetrievalStarted {
                    order_no: plan.order_no.clone(),
                    zone: plan.zone.clone(),
                    valid_first_scan_cells: plan.valid_first_scan_cells.iter().cloned().collect(),
                };
                let zone = plan.zone.clone();
                self.session.begin_retrieval(order, plan)?;

                info!(
                    station = %self.station_id,
                    order_no = %started.order_no,
                    zone = %zone,
                    cells = started.valid_first_scan_cells.len(),
                    "Retrieval started"
                );
                self.bring_zone(zone).await;
                return Ok(started);
            }
        }

        debug!(station = %self.station_id, "No order retrievable yet");
        Err(CoreError::NotYetRetrievable.into())
    }

    async fn scan_first(&mut self, cell_id: &str) -> StationResult<FirstScanResolution> {
        let (order_no, zone) = {
            let (order, plan) = self.session.check_first_scan(cell_id).map_err(|e| {
                debug!(station = %self.station_id, cell_id, "First scan rejected");
                e
            })?;
            (order.order_no.clone(), plan.zone.clone())
        };

        let cell = self
            .ctx
            .store
            .cell_by_id(cell_id)
            .await
            .map_err(|e| StationError::fetching("cell lookup", e))?;
        let bin_id = self.resolve_bin(&order_no, &zone).await?;

        let resolution = self.session.accept_first_scan(&cell, bin_id)?;

        let command = SignalCommand::for_pick(
            &resolution.bin_id,
            &resolution.order_no,
            &resolution.zone,
            &resolution.items,
            self.ctx.light_color,
        );
        self.ctx.signals.activate(&self.station_id, &command).await;

        info!(
            station = %self.station_id,
            order_no = %order_no,
            cell_id,
            bin_id = %resolution.bin_id,
            "First scan accepted"
        );
        Ok(resolution)
    }

    /// The order's designated bin, else the zone's first bin.
    async fn resolve_bin(&self, order_no: &str, zone: &Zone) -> StationResult<String> {
        let store = &self.ctx.store;

        if let Some(bin) = store
            .bin_for_order(order_no)
            .await
            .map_err(|e| StationError::fetching("bin lookup", e))?
        {
            return Ok(bin);
        }

        store
            .first_bin_in_zone(zone)
            .await
            .map_err(|e| StationError::fetching("bin lookup", e))?
            .ok_or_else(|| {
                CoreError::NoBinAvailable {
                    order_no: order_no.to_string(),
                }
                .into()
            })
    }

    fn confirm_quantities(&mut self, items: &[PickItem]) -> StationResult<Vec<PickItem>> {
        let confirmed = self.session.confirm_quantities(items)?;
        debug!(station = %self.station_id, ?confirmed, "Quantities confirmed");
        Ok(confirmed)
    }

    async fn scan_second(&mut self, cell_id: &str) -> StationResult<CommitReceipt> {
        self.expect_step(ScanStep::Bin)?;
        let plan = self.session.scan_second(cell_id)?;
        self.commit(plan).await
    }

    async fn confirmation(&mut self, location_id: &str) -> StationResult<CommitReceipt> {
        let plan = self.session.confirmation(location_id)?;
        info!(station = %self.station_id, location_id, "Panel confirmation accepted");
        self.commit(plan).await
    }

    // -------------------------------------------------------------------------
    // Put-away
    // -------------------------------------------------------------------------

    async fn start_putaway(&mut self) -> StationResult<PutawayStarted> {
        self.ensure_idle()?;

        let pending = self
            .ctx
            .store
            .pending_stock_requests()
            .await
            .map_err(|e| StationError::fetching("list stock requests", e))?;
        let pending: Vec<StockRequest> = pending.into_iter().filter(|r| !r.applied).collect();

        self.session.begin_putaway(pending.clone())?;
        info!(station = %self.station_id, requests = pending.len(), "Put-away started");
        Ok(PutawayStarted { pending })
    }

    async fn scan_item_code(&mut self, item_code: &str) -> StationResult<PutawayPlan> {
        let request = self.session.check_item_scan(item_code)?.clone();

        let cells = self
            .ctx
            .store
            .list_cells()
            .await
            .map_err(|e| StationError::fetching("cell lookup", e))?;

        let plan = allocate_putaway(&request, &cells).ok_or_else(|| CoreError::NoCapacity {
            item_code: request.item_code.clone(),
            quantity: request.quantity,
        })?;
        self.session.accept_item_scan(plan.clone())?;

        info!(
            station = %self.station_id,
            request_no = %plan.request_no,
            zone = %plan.zone,
            targets = plan.target_cells.len(),
            "Put-away zone allocated"
        );
        self.bring_zone(plan.zone.clone()).await;
        Ok(plan)
    }

    async fn scan_target_cell(&mut self, cell_id: &str) -> StationResult<CommitReceipt> {
        self.expect_step(ScanStep::TargetCell)?;
        let plan = self.session.scan_second(cell_id)?;
        self.commit(plan).await
    }

    // -------------------------------------------------------------------------
    // Commit
    // -------------------------------------------------------------------------

    async fn commit(&mut self, plan: CommitPlan) -> StationResult<CommitReceipt> {
        match self.ctx.store.commit(&plan).await {
            Ok(()) => {
                self.session.commit_succeeded()?;
                self.ctx.signals.release(&self.station_id);

                let receipt = CommitReceipt {
                    commit_id: Uuid::new_v4(),
                    station_id: self.station_id.clone(),
                    zone: plan.zone.clone(),
                    completion: plan.completion.clone(),
                    committed_at: Utc::now(),
                };
                info!(
                    station = %self.station_id,
                    commit_id = %receipt.commit_id,
                    zone = %plan.zone,
                    adjustments = plan.adjustments.len(),
                    "Commit succeeded"
                );

                if matches!(plan.completion, Completion::StockRequest { .. }) {
                    self.send_back(plan.zone.clone()).await;
                }
                self.refresh_retrievable().await;
                Ok(receipt)
            }
            Err(e) => {
                self.session.commit_failed()?;
                warn!(
                    station = %self.station_id,
                    zone = %plan.zone,
                    error = %e,
                    "Commit failed, awaiting second scan again"
                );
                Err(StationError::commit_failed(e))
            }
        }
    }

    async fn refresh_retrievable(&self) {
        match retrievable_plans(self.ctx.store.as_ref()).await {
            Ok(plans) => {
                debug!(retrievable = plans.len(), "Retrievable orders refreshed");
                self.ctx.retrievable.send_replace(plans);
            }
            Err(e) => warn!(error = %e, "Failed to refresh retrievable orders"),
        }
    }

    // -------------------------------------------------------------------------
    // Input, reset, status
    // -------------------------------------------------------------------------

    async fn key_press(&mut self, key: Key) -> StationResult<KeyOutcome> {
        let Some(scan) = self.buffer.push(key).map_err(CoreError::from)? else {
            return Ok(KeyOutcome::Buffered {
                pending: self.buffer.pending().to_string(),
            });
        };

        debug!(station = %self.station_id, token = %scan.token, "Barcode assembled");
        let token = scan.token;
        let outcome = match self.session.expected_scan() {
            ScanStep::SourceCell => ScanOutcome::Resolved(self.scan_first(&token).await?),
            ScanStep::Bin => ScanOutcome::Committed(self.scan_second(&token).await?),
            ScanStep::ItemCode => ScanOutcome::PutawayPlanned(self.scan_item_code(&token).await?),
            ScanStep::TargetCell => ScanOutcome::Committed(self.scan_target_cell(&token).await?),
            ScanStep::Nothing => return Err(self.step_error(ScanStep::SourceCell)),
        };
        Ok(KeyOutcome::Scanned { token, outcome })
    }

    fn abandon(&mut self) -> SessionState {
        let left = self.session.abandon();
        self.buffer.clear();
        self.ctx.signals.release(&self.station_id);
        info!(station = %self.station_id, from = left.as_str(), "Session abandoned");
        left
    }

    /// "Next"/"Complete": sends the last zone back and resets the session.
    async fn advance(&mut self) -> Option<Zone> {
        self.abandon();
        let zone = self.last_zone.take();
        if let Some(ref zone) = zone {
            self.dispatch(FleetTaskType::Return, zone).await;
        }
        zone
    }

    fn status(&self) -> StationStatus {
        StationStatus {
            station_id: self.station_id.clone(),
            session: self.session.snapshot(),
            pending_input: self.buffer.pending().to_string(),
            last_zone: self.last_zone.clone(),
        }
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn ensure_idle(&self) -> StationResult<()> {
        match self.session.state() {
            SessionState::Idle => Ok(()),
            other => Err(CoreError::InvalidState {
                expected: SessionState::Idle.as_str().to_string(),
                actual: other.as_str().to_string(),
            }
            .into()),
        }
    }

    fn expect_step(&self, step: ScanStep) -> StationResult<()> {
        if self.session.expected_scan() == step {
            Ok(())
        } else {
            Err(self.step_error(step))
        }
    }

    fn step_error(&self, wanted: ScanStep) -> StationError {
        CoreError::InvalidState {
            expected: step_name(wanted).to_string(),
            actual: step_name(self.session.expected_scan()).to_string(),
        }
        .into()
    }

    /// Fetches `zone` to the station, returning the previous one first.
    async fn bring_zone(&mut self, zone: Zone) {
        if let Some(previous) = self.last_zone.take() {
            if previous != zone {
                self.dispatch(FleetTaskType::Return, &previous).await;
            }
        }
        self.dispatch(FleetTaskType::Fetch, &zone).await;
        self.last_zone = Some(zone);
    }

    async fn send_back(&mut self, zone: Zone) {
        self.dispatch(FleetTaskType::Return, &zone).await;
        if self.last_zone.as_ref() == Some(&zone) {
            self.last_zone = None;
        }
    }

    async fn dispatch(&self, task: FleetTaskType, zone: &Zone) {
        let request = FleetRequest::new(task, self.station_id.clone(), zone);
        if let Err(e) = self.ctx.fleet.dispatch(&request).await {
            warn!(station = %self.station_id, zone = %zone, error = %e, "Fleet dispatch failed");
        }
    }
}

fn step_name(step: ScanStep) -> &'static str {
    match step {
        ScanStep::Nothing => "idle",
        ScanStep::SourceCell => "source_cell_scan",
        ScanStep::Bin => "bin_scan",
        ScanStep::ItemCode => "item_code_scan",
        ScanStep::TargetCell => "target_cell_scan",
    }
}
