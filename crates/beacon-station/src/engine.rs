//! # Station Engine
//!
//! Registry of station workers plus the shared pieces they use.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          StationEngine                                  │
//! │                                                                         │
//! │   stations: station_id ──► StationHandle   (spawned on first use)      │
//! │                                                                         │
//! │   retrievable: watch<Vec<RetrievalPlan>>   (refreshed after commits)   │
//! │                                                                         │
//! │   confirmation dispatch:                                               │
//! │     broadcast<SignalConfirmation> ──► stations_awaiting(location)      │
//! │                                   ──► tokio::spawn(handle.confirm())   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use beacon_core::allocation::{PutawayPlan, RetrievalPlan};
use beacon_core::input::Key;
use beacon_core::session::{FirstScanResolution, SessionState};
use beacon_core::validation::validate_station_id;
use beacon_core::{CoreError, PickItem, SignalConfirmation, Zone, DEFAULT_LIGHT_COLOR};
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{StationError, StationResult};
use crate::fleet::FleetDispatcher;
use crate::signal::SignalCoordinator;
use crate::station::{
    CommitReceipt, KeyOutcome, PutawayStarted, RetrievalStarted, StationContext, StationHandle,
    StationStatus, StationWorker,
};
use crate::store::{retrievable_plans, StationStore};

/// Tunables for the engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Panel colour for pick lights.
    pub light_color: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            light_color: DEFAULT_LIGHT_COLOR,
        }
    }
}

struct EngineInner {
    ctx: StationContext,
    stations: Mutex<HashMap<String, StationHandle>>,
    retrievable_rx: watch::Receiver<Vec<RetrievalPlan>>,
}

/// Entry point for every station operation.
#[derive(Clone)]
pub struct StationEngine {
    inner: Arc<EngineInner>,
}

impl StationEngine {
    pub fn new(
        store: Arc<dyn StationStore>,
        signals: Arc<SignalCoordinator>,
        fleet: Arc<dyn FleetDispatcher>,
        options: EngineOptions,
    ) -> Self {
        let (retrievable_tx, retrievable_rx) = watch::channel(Vec::new());
        let ctx = StationContext {
            store,
            signals,
            fleet,
            retrievable: Arc::new(retrievable_tx),
            light_color: options.light_color,
        };

        StationEngine {
            inner: Arc::new(EngineInner {
                ctx,
                stations: Mutex::new(HashMap::new()),
                retrievable_rx,
            }),
        }
    }

    /// Handle for `station_id`, spawning its worker on first use.
    pub fn station(&self, station_id: &str) -> StationResult<StationHandle> {
        validate_station_id(station_id).map_err(CoreError::from)?;

        let mut stations = self.inner.stations.lock();
        if let Some(handle) = stations.get(station_id) {
            return Ok(handle.clone());
        }

        let handle = StationWorker::new(station_id, self.inner.ctx.clone()).start();
        stations.insert(station_id.to_string(), handle.clone());
        debug!(station = %station_id, "Station registered");
        Ok(handle)
    }

    /// Ids of every station with a running worker.
    pub fn stations(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.stations.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn signals(&self) -> &Arc<SignalCoordinator> {
        &self.inner.ctx.signals
    }

    // -------------------------------------------------------------------------
    // Station operations
    // -------------------------------------------------------------------------

    pub async fn start_retrieval(&self, station_id: &str) -> StationResult<RetrievalStarted> {
        self.station(station_id)?.start_retrieval().await
    }

    pub async fn scan_first(&self, station_id: &str, cell_id: &str) -> StationResult<FirstScanResolution> {
        self.station(station_id)?.scan_first(cell_id).await
    }

    pub async fn confirm_quantities(&self, station_id: &str, items: Vec<PickItem>) -> StationResult<Vec<PickItem>> {
        self.station(station_id)?.confirm_quantities(items).await
    }

    pub async fn scan_second(&self, station_id: &str, cell_id: &str) -> StationResult<CommitReceipt> {
        self.station(station_id)?.scan_second(cell_id).await
    }

    pub async fn start_putaway(&self, station_id: &str) -> StationResult<PutawayStarted> {
        self.station(station_id)?.start_putaway().await
    }

    pub async fn scan_item_code(&self, station_id: &str, item_code: &str) -> StationResult<PutawayPlan> {
        self.station(station_id)?.scan_item_code(item_code).await
    }

    pub async fn scan_target_cell(&self, station_id: &str, cell_id: &str) -> StationResult<CommitReceipt> {
        self.station(station_id)?.scan_target_cell(cell_id).await
    }

    pub async fn key_press(&self, station_id: &str, key: Key) -> StationResult<KeyOutcome> {
        self.station(station_id)?.key_press(key).await
    }

    pub async fn abandon(&self, station_id: &str) -> StationResult<SessionState> {
        self.station(station_id)?.abandon().await
    }

    pub async fn advance(&self, station_id: &str) -> StationResult<Option<Zone>> {
        self.station(station_id)?.advance().await
    }

    pub async fn status(&self, station_id: &str) -> StationResult<StationStatus> {
        self.station(station_id)?.status().await
    }

    // -------------------------------------------------------------------------
    // Retrievable orders
    // -------------------------------------------------------------------------

    /// Receiver updated after every commit that changes cell contents.
    pub fn subscribe_retrievable(&self) -> watch::Receiver<Vec<RetrievalPlan>> {
        self.inner.retrievable_rx.clone()
    }

    /// Latest published list.
    pub fn retrievable(&self) -> Vec<RetrievalPlan> {
        self.inner.retrievable_rx.borrow().clone()
    }

    /// Recomputes and publishes the retrievable list now.
    pub async fn refresh_retrievable(&self) -> StationResult<Vec<RetrievalPlan>> {
        let plans = retrievable_plans(self.inner.ctx.store.as_ref())
            .await
            .map_err(|e| StationError::fetching("list retrievable orders", e))?;
        self.inner.ctx.retrievable.send_replace(plans.clone());
        Ok(plans)
    }

    // -------------------------------------------------------------------------
    // Confirmations
    // -------------------------------------------------------------------------

    /// Routes one confirmation to the stations awaiting its location.
    ///
    /// Returns how many stations it was handed to; unawaited locations are
    /// dropped. Each hand-off runs on its own task.
    pub fn route_confirmation(&self, confirmation: &SignalConfirmation) -> usize {
        let stations = self.signals().stations_awaiting(&confirmation.location_id);
        if stations.is_empty() {
            debug!(location_id = %confirmation.location_id, "Confirmation for unawaited location dropped");
            return 0;
        }

        let mut routed = 0;
        for station_id in stations {
            let handle = match self.inner.stations.lock().get(&station_id) {
                Some(handle) => handle.clone(),
                None => continue,
            };
            let location_id = confirmation.location_id.clone();
            tokio::spawn(async move {
                match handle.confirm(location_id.as_str()).await {
                    Ok(receipt) => debug!(
                        station = %handle.station_id(),
                        commit_id = %receipt.commit_id,
                        "Confirmation committed"
                    ),
                    Err(e) => warn!(
                        station = %handle.station_id(),
                        location_id = %location_id,
                        error = %e,
                        "Confirmation rejected"
                    ),
                }
            });
            routed += 1;
        }
        routed
    }

    /// Spawns the loop that consumes the coordinator's confirmation stream.
    pub fn spawn_confirmation_dispatch(&self) -> JoinHandle<()> {
        let engine = self.clone();
        let mut rx = self.signals().subscribe();

        tokio::spawn(async move {
            info!("Confirmation dispatch started");
            loop {
                match rx.recv().await {
                    Ok(confirmation) => {
                        engine.route_confirmation(&confirmation);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Confirmation dispatch lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            info!("Confirmation dispatch stopped");
        })
    }

    /// Stops every station worker.
    pub async fn shutdown(&self) {
        let handles: Vec<StationHandle> = self.inner.stations.lock().drain().map(|(_, h)| h).collect();
        for handle in handles {
            if let Err(e) = handle.shutdown().await {
                debug!(station = %handle.station_id(), error = %e, "Station already stopped");
            }
        }
        info!("Station engine stopped");
    }
}
