//! Retrieval flow scenarios against the in-memory store.

mod common;

use beacon_core::session::{Completion, SessionState};
use beacon_core::{CellKind, FleetTaskType, Order, OrderLine, PickItem};
use common::{cell, empty_warehouse, warehouse, zone, Harness};

const ST: &str = "station-1";

#[tokio::test]
async fn test_so_100_two_scan_round() {
    let h = Harness::new(warehouse());

    let started = h.engine.start_retrieval(ST).await.unwrap();
    assert_eq!(started.order_no, "SO-100");
    assert_eq!(started.zone, zone("R1-S1"));
    assert_eq!(started.valid_first_scan_cells, vec!["R1-S1-P1", "R1-S1-P2"]);
    assert_eq!(h.fleet.tasks(), vec![(FleetTaskType::Fetch, "R1-S1".to_string())]);

    let err = h.engine.scan_first(ST, "R2-S1-P1").await.unwrap_err();
    assert_eq!(err.kind(), "wrong_cell");
    assert_eq!(h.state(ST).await, SessionState::AwaitingFirstScan);

    let resolved = h.engine.scan_first(ST, "R1-S1-P1").await.unwrap();
    assert_eq!(resolved.items, vec![PickItem::new("A", 2)]);
    assert_eq!(resolved.bin_id, "R1-S1-BIN7");
    assert_eq!(beacon_core::expand_units(&resolved.items), vec!["A", "A"]);

    let lit = h.panel.commands.lock().clone();
    assert_eq!(lit.len(), 1);
    assert_eq!(lit[0].location_id, "R1-S1-BIN7");
    assert_eq!(lit[0].payload.quantity, 2);

    let err = h.engine.scan_second(ST, "R2-S1-BIN1").await.unwrap_err();
    assert_eq!(err.kind(), "wrong_cell");
    assert_eq!(h.quantity("R1-S1-P1", "A"), 2);
    assert_eq!(h.state(ST).await, SessionState::AwaitingSecondScan);

    let receipt = h.engine.scan_second(ST, "R1-S1-BIN7").await.unwrap();
    assert_eq!(receipt.zone, zone("R1-S1"));
    assert!(matches!(
        receipt.completion,
        Completion::OrderLines { ref fulfilled_item_codes, .. } if fulfilled_item_codes == &["A".to_string()]
    ));
    assert_eq!(h.quantity("R1-S1-P1", "A"), 0);
    assert_eq!(h.state(ST).await, SessionState::Idle);

    let order = h.store.order("SO-100").unwrap();
    assert!(order.lines[0].fulfilled);
    assert!(!order.lines[1].fulfilled);

    // B is still open, so the order comes back with only P2 valid.
    let again = h.engine.start_retrieval(ST).await.unwrap();
    assert_eq!(again.order_no, "SO-100");
    assert_eq!(again.valid_first_scan_cells, vec!["R1-S1-P2"]);
}

#[tokio::test]
async fn test_not_yet_retrievable_leaves_cells_alone() {
    let store = empty_warehouse();
    store
        .insert_order(Order::new("SO-101", vec![OrderLine::new("A", 1), OrderLine::new("C", 1)]))
        .unwrap();
    let h = Harness::new(store);

    let err = h.engine.start_retrieval(ST).await.unwrap_err();
    assert_eq!(err.kind(), "not_yet_retrievable");
    assert!(err.is_retryable());
    assert_eq!(h.state(ST).await, SessionState::Idle);
    assert_eq!(h.quantity("R1-S1-P1", "A"), 2);
    assert_eq!(h.quantity("R2-S1-P1", "C"), 1);
    assert!(h.fleet.tasks().is_empty());
}

#[tokio::test]
async fn test_start_when_busy_is_invalid_state() {
    let h = Harness::new(warehouse());
    h.engine.start_retrieval(ST).await.unwrap();

    let err = h.engine.start_retrieval(ST).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_state");
    let err = h.engine.start_putaway(ST).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_state");
}

#[tokio::test]
async fn test_failed_commit_rolls_back_and_allows_retry() {
    let h = Harness::new(warehouse());
    h.engine.start_retrieval(ST).await.unwrap();
    h.engine.scan_first(ST, "R1-S1-P1").await.unwrap();

    // Someone takes one A out of P1 between the scans.
    use beacon_station::CellIndex;
    h.store
        .commit_adjustments(&[beacon_core::Adjustment::new("R1-S1-P1", "A", -1)])
        .await
        .unwrap();

    let err = h.engine.scan_second(ST, "R1-S1-BIN7").await.unwrap_err();
    assert_eq!(err.kind(), "commit_failed");
    assert_eq!(h.state(ST).await, SessionState::AwaitingSecondScan);
    assert_eq!(h.quantity("R1-S1-P1", "A"), 1);
    assert!(!h.store.order("SO-100").unwrap().lines[0].fulfilled);

    // Operator lowers the quantity to what is there and rescans the bin.
    h.engine
        .confirm_quantities(ST, vec![PickItem::new("A", 1)])
        .await
        .unwrap();
    h.engine.scan_second(ST, "R1-S1-BIN7").await.unwrap();
    assert_eq!(h.quantity("R1-S1-P1", "A"), 0);

    let order = h.store.order("SO-100").unwrap();
    assert_eq!(order.lines[0].picked_quantity, 1);
    assert!(!order.lines[0].fulfilled);
}

#[tokio::test]
async fn test_confirm_quantities_bounds() {
    let h = Harness::new(warehouse());
    h.engine.start_retrieval(ST).await.unwrap();

    let err = h
        .engine
        .confirm_quantities(ST, vec![PickItem::new("A", 1)])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_state");

    h.engine.scan_first(ST, "R1-S1-P1").await.unwrap();
    for bad in [PickItem::new("A", 3), PickItem::new("A", -1), PickItem::new("Z", 1)] {
        let err = h.engine.confirm_quantities(ST, vec![bad]).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_quantity");
    }

    let confirmed = h
        .engine
        .confirm_quantities(ST, vec![PickItem::new("A", 1)])
        .await
        .unwrap();
    assert_eq!(confirmed, vec![PickItem::new("A", 1)]);
    assert_eq!(h.engine.status(ST).await.unwrap().session.confirmed, confirmed);
}

#[tokio::test]
async fn test_zone_bin_used_when_order_has_none() {
    let store = empty_warehouse();
    store
        .insert_order(Order::new("SO-200", vec![OrderLine::new("C", 1)]))
        .unwrap();
    let h = Harness::new(store);

    h.engine.start_retrieval(ST).await.unwrap();
    let resolved = h.engine.scan_first(ST, "R2-S1-P1").await.unwrap();
    assert_eq!(resolved.bin_id, "R2-S1-BIN1");
}

#[tokio::test]
async fn test_no_bin_available_stays_at_first_scan() {
    let store = beacon_station::MemoryStore::with_cells([
        cell("R3-S2-P1", CellKind::Pigeonhole, 10).with_item("Q", 1)
    ]);
    store
        .insert_order(Order::new("SO-300", vec![OrderLine::new("Q", 1)]))
        .unwrap();
    let h = Harness::new(store);

    h.engine.start_retrieval(ST).await.unwrap();
    let err = h.engine.scan_first(ST, "R3-S2-P1").await.unwrap_err();
    assert_eq!(err.kind(), "no_bin_available");
    assert_eq!(h.state(ST).await, SessionState::AwaitingFirstScan);
    assert!(h.panel.commands.lock().is_empty());
}

#[tokio::test]
async fn test_abandon_and_advance() {
    let h = Harness::new(warehouse());
    h.engine.start_retrieval(ST).await.unwrap();
    h.engine.scan_first(ST, "R1-S1-P1").await.unwrap();
    assert_eq!(
        h.engine.signals().awaited_by(ST).as_deref(),
        Some("R1-S1-BIN7")
    );

    let left = h.engine.abandon(ST).await.unwrap();
    assert_eq!(left, SessionState::AwaitingSecondScan);
    assert_eq!(h.state(ST).await, SessionState::Idle);
    assert!(h.engine.signals().awaited_by(ST).is_none());
    assert_eq!(h.quantity("R1-S1-P1", "A"), 2);

    let returned = h.engine.advance(ST).await.unwrap();
    assert_eq!(returned, Some(zone("R1-S1")));
    assert_eq!(
        h.fleet.tasks().last(),
        Some(&(FleetTaskType::Return, "R1-S1".to_string()))
    );
    assert_eq!(h.engine.advance(ST).await.unwrap(), None);
}

#[tokio::test]
async fn test_commit_publishes_retrievable_orders() {
    let h = Harness::new(warehouse());
    let mut rx = h.engine.subscribe_retrievable();
    assert!(rx.borrow_and_update().is_empty());

    h.engine.start_retrieval(ST).await.unwrap();
    h.engine.scan_first(ST, "R1-S1-P1").await.unwrap();
    h.engine.scan_second(ST, "R1-S1-BIN7").await.unwrap();

    assert!(rx.has_changed().unwrap());
    let plans = rx.borrow_and_update().clone();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].order_no, "SO-100");
    assert_eq!(h.engine.retrievable(), plans);
}

#[tokio::test]
async fn test_two_stations_cannot_take_the_same_units() {
    let h = Harness::new(warehouse());

    for station in ["station-1", "station-2"] {
        h.engine.start_retrieval(station).await.unwrap();
        h.engine.scan_first(station, "R1-S1-P1").await.unwrap();
    }

    h.engine.scan_second("station-1", "R1-S1-BIN7").await.unwrap();
    let err = h.engine.scan_second("station-2", "R1-S1-BIN7").await.unwrap_err();
    assert_eq!(err.kind(), "commit_failed");
    assert_eq!(h.quantity("R1-S1-P1", "A"), 0);
    assert_eq!(h.engine.stations(), vec!["station-1", "station-2"]);
}

#[tokio::test]
async fn test_second_round_cannot_over_pick_the_order() {
    let store = beacon_station::MemoryStore::with_cells([
        cell("R1-S1-P1", CellKind::Pigeonhole, 10).with_item("A", 5),
        cell("R1-S1-BIN7", CellKind::Bin, 50),
    ]);
    store
        .insert_order(Order::new("SO-1", vec![OrderLine::new("A", 2)]))
        .unwrap();
    let h = Harness::new(store);

    for station in ["station-1", "station-2"] {
        h.engine.start_retrieval(station).await.unwrap();
        h.engine.scan_first(station, "R1-S1-P1").await.unwrap();
    }
    h.engine
        .confirm_quantities("station-1", vec![PickItem::new("A", 1)])
        .await
        .unwrap();
    h.engine.scan_second("station-1", "R1-S1-BIN7").await.unwrap();

    // station-2 still holds the stale A×2 round.
    let err = h.engine.scan_second("station-2", "R1-S1-BIN7").await.unwrap_err();
    assert_eq!(err.kind(), "commit_failed");
    assert_eq!(h.quantity("R1-S1-P1", "A"), 4);
    assert_eq!(h.state("station-2").await, SessionState::AwaitingSecondScan);

    let order = h.store.order("SO-1").unwrap();
    assert_eq!(order.lines[0].picked_quantity, 1);
    assert!(!order.lines[0].fulfilled);
}

#[tokio::test]
async fn test_confirming_nothing_is_rejected() {
    let h = Harness::new(warehouse());
    h.engine.start_retrieval(ST).await.unwrap();
    h.engine.scan_first(ST, "R1-S1-P1").await.unwrap();

    let err = h
        .engine
        .confirm_quantities(ST, vec![PickItem::new("A", 0)])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_quantity");
    assert_eq!(h.state(ST).await, SessionState::AwaitingSecondScan);
    assert_eq!(
        h.engine.status(ST).await.unwrap().session.confirmed,
        vec![PickItem::new("A", 2)]
    );
    assert_eq!(h.quantity("R1-S1-P1", "A"), 2);
}

#[tokio::test]
async fn test_invalid_station_id_rejected() {
    let h = Harness::new(warehouse());
    let err = h.engine.start_retrieval("  ").await.unwrap_err();
    assert_eq!(err.kind(), "validation");
}
