//! Put-away flow scenarios.

mod common;

use beacon_core::session::{Completion, SessionState};
use beacon_core::{FleetTaskType, StockRequest};
use beacon_station::OrderStore;
use common::{empty_warehouse, zone, Harness};

const ST: &str = "inbound-1";

#[tokio::test]
async fn test_putaway_round_to_least_loaded_zone() {
    let store = empty_warehouse();
    store.insert_stock_request(StockRequest::new("ST-1", "C", 3)).unwrap();
    let h = Harness::new(store);

    let started = h.engine.start_putaway(ST).await.unwrap();
    assert_eq!(started.pending.len(), 1);

    let err = h.engine.scan_item_code(ST, "Z").await.unwrap_err();
    assert_eq!(err.kind(), "unknown_item");
    assert_eq!(h.state(ST).await, SessionState::AwaitingFirstScan);

    // R1-S1 holds 3 units, R2-S1 holds 1.
    let plan = h.engine.scan_item_code(ST, "C").await.unwrap();
    assert_eq!(plan.zone, zone("R2-S1"));
    assert!(plan.target_cells.contains("R2-S1-P1"));
    assert_eq!(h.fleet.tasks(), vec![(FleetTaskType::Fetch, "R2-S1".to_string())]);

    let err = h.engine.scan_target_cell(ST, "R1-S1-P1").await.unwrap_err();
    assert_eq!(err.kind(), "wrong_cell");
    assert_eq!(h.quantity("R1-S1-P1", "C"), 0);

    let receipt = h.engine.scan_target_cell(ST, "R2-S1-P1").await.unwrap();
    assert_eq!(
        receipt.completion,
        Completion::StockRequest {
            request_no: "ST-1".into()
        }
    );
    assert_eq!(h.quantity("R2-S1-P1", "C"), 4);
    assert_eq!(h.state(ST).await, SessionState::Idle);
    assert!(h.store.pending_stock_requests().await.unwrap().is_empty());
    assert_eq!(
        h.fleet.tasks().last(),
        Some(&(FleetTaskType::Return, "R2-S1".to_string()))
    );

    // Put-away never lights the panel.
    assert!(h.panel.commands.lock().is_empty());

    let err = h.engine.start_putaway(ST).await.unwrap_err();
    assert_eq!(err.kind(), "nothing_to_put_away");
}

#[tokio::test]
async fn test_no_capacity_keeps_item_scan() {
    let store = empty_warehouse();
    store.insert_stock_request(StockRequest::new("ST-9", "C", 50)).unwrap();
    let h = Harness::new(store);

    h.engine.start_putaway(ST).await.unwrap();
    let err = h.engine.scan_item_code(ST, "C").await.unwrap_err();
    assert_eq!(err.kind(), "no_capacity");
    assert!(err.is_retryable());
    assert_eq!(h.state(ST).await, SessionState::AwaitingFirstScan);
    assert!(h.fleet.tasks().is_empty());
}

#[tokio::test]
async fn test_retrieval_scans_rejected_during_putaway() {
    let store = empty_warehouse();
    store.insert_stock_request(StockRequest::new("ST-1", "C", 1)).unwrap();
    let h = Harness::new(store);

    h.engine.start_putaway(ST).await.unwrap();
    h.engine.scan_item_code(ST, "C").await.unwrap();

    let err = h.engine.scan_second(ST, "R2-S1-P1").await.unwrap_err();
    assert_eq!(err.kind(), "invalid_state");
    assert_eq!(h.state(ST).await, SessionState::AwaitingSecondScan);

    let status = h.engine.status(ST).await.unwrap();
    assert_eq!(status.session.request_no.as_deref(), Some("ST-1"));
    assert_eq!(status.session.task.as_deref(), Some("putaway"));
}
