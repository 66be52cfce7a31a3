//! # beacon-station: Station Runtime for Beacon
//!
//! Runs the scan sessions defined in `beacon-core` against real
//! collaborators: a store, the light panel, and the robot fleet.
//!
//! ## Runtime Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        beacon-station                                   │
//! │                                                                         │
//! │   ┌──────────────────────────────────────────────────────────────────┐ │
//! │   │                      StationEngine                               │ │
//! │   │   station("st-1") ─► StationHandle ─► StationWorker (task)      │ │
//! │   │   station("st-2") ─► StationHandle ─► StationWorker (task)      │ │
//! │   └───────────┬──────────────────┬──────────────────┬───────────────┘ │
//! │               │                  │                  │                  │
//! │        ┌──────▼──────┐   ┌───────▼───────┐   ┌──────▼──────┐          │
//! │        │StationStore │   │SignalCoordinator│ │FleetDispatcher│        │
//! │        │ memory/sqlite│  │ HTTP + WS      │  │ HTTP         │          │
//! │        └─────────────┘   └───────────────┘   └─────────────┘          │
//! │                                                                         │
//! │   Workers never share a session; the store is the only shared state.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`engine`] - Station registry, confirmation routing, retrievable list
//! - [`station`] - Per-station worker and its handle
//! - [`store`] - Cell Index / order store traits and implementations
//! - [`signal`] - Light panel commands and confirmation stream
//! - [`fleet`] - Rack dispatch client
//! - [`config`] - Station configuration
//! - [`error`] - Error types

pub mod config;
pub mod engine;
pub mod error;
pub mod fleet;
pub mod signal;
pub mod station;
pub mod store;

pub use config::StationConfig;
pub use engine::{EngineOptions, StationEngine};
pub use error::{StationError, StationResult, StoreError, StoreResult};
pub use fleet::{FleetDispatcher, HttpFleetClient};
pub use signal::{HttpLightPanel, ListenerConfig, PanelListener, SignalCoordinator, SignalSink};
pub use station::{
    CommitReceipt, KeyOutcome, PutawayStarted, RetrievalStarted, ScanOutcome, StationHandle,
    StationStatus,
};
pub use store::{CellIndex, MemoryStore, OrderStore, SqliteStore, StationStore};
