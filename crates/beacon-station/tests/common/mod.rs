//! Shared fixtures for station scenario tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beacon_core::session::SessionState;
use beacon_core::{CellKind, FleetRequest, FleetTaskType, Order, OrderLine, SignalCommand, StorageCell, Zone};
use beacon_station::{
    EngineOptions, FleetDispatcher, MemoryStore, SignalCoordinator, SignalSink, StationEngine,
    StationResult,
};
use parking_lot::Mutex;

#[derive(Default)]
pub struct RecordingPanel {
    pub commands: Mutex<Vec<SignalCommand>>,
}

#[async_trait]
impl SignalSink for RecordingPanel {
    async fn activate(&self, command: &SignalCommand) -> StationResult<()> {
        self.commands.lock().push(command.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingFleet {
    pub requests: Mutex<Vec<FleetRequest>>,
}

impl RecordingFleet {
    pub fn tasks(&self) -> Vec<(FleetTaskType, String)> {
        self.requests
            .lock()
            .iter()
            .map(|r| (r.task_type, format!("{}-{}", r.rack, r.side)))
            .collect()
    }
}

#[async_trait]
impl FleetDispatcher for RecordingFleet {
    async fn dispatch(&self, request: &FleetRequest) -> StationResult<()> {
        self.requests.lock().push(request.clone());
        Ok(())
    }
}

pub struct Harness {
    pub engine: StationEngine,
    pub store: Arc<MemoryStore>,
    pub panel: Arc<RecordingPanel>,
    pub fleet: Arc<RecordingFleet>,
}

impl Harness {
    pub fn new(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        let panel = Arc::new(RecordingPanel::default());
        let fleet = Arc::new(RecordingFleet::default());
        let signals = Arc::new(SignalCoordinator::new(panel.clone()));
        let engine = StationEngine::new(store.clone(), signals, fleet.clone(), EngineOptions::default());

        Harness {
            engine,
            store,
            panel,
            fleet,
        }
    }

    pub fn quantity(&self, cell_id: &str, item_code: &str) -> i64 {
        self.store.cell(cell_id).map(|c| c.quantity_of(item_code)).unwrap_or(-1)
    }

    pub async fn state(&self, station: &str) -> SessionState {
        self.engine.status(station).await.unwrap().session.state
    }

    /// Polls until the station reaches `state`; panics after two seconds.
    pub async fn wait_for_state(&self, station: &str, state: SessionState) {
        for _ in 0..200 {
            if self.state(station).await == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("station {} never reached {:?}", station, state);
    }
}

pub fn cell(id: &str, kind: CellKind, capacity: i64) -> StorageCell {
    StorageCell::new(id, kind, capacity).unwrap()
}

/// Two zones, no orders:
/// - R1-S1: P1{A:2}, P2{B:1}, BIN7
/// - R2-S1: P1{C:1}, BIN1
pub fn empty_warehouse() -> MemoryStore {
    MemoryStore::with_cells([
        cell("R1-S1-P1", CellKind::Pigeonhole, 10).with_item("A", 2),
        cell("R1-S1-P2", CellKind::Pigeonhole, 10).with_item("B", 1),
        cell("R1-S1-BIN7", CellKind::Bin, 50),
        cell("R2-S1-P1", CellKind::Pigeonhole, 10).with_item("C", 1),
        cell("R2-S1-BIN1", CellKind::Bin, 50),
    ])
}

/// [`empty_warehouse`] plus SO-100, which needs {A:2, B:1} and collects
/// into R1-S1-BIN7.
pub fn warehouse() -> MemoryStore {
    let store = empty_warehouse();
    store
        .insert_order(Order::new("SO-100", vec![OrderLine::new("A", 2), OrderLine::new("B", 1)]))
        .unwrap();
    store.assign_bin("SO-100", "R1-S1-BIN7");
    store
}

pub fn zone(s: &str) -> Zone {
    s.parse().unwrap()
}
