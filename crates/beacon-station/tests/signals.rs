//! Panel confirmations and keystroke input.

mod common;

use beacon_core::input::Key;
use beacon_core::session::SessionState;
use beacon_core::SignalConfirmation;
use beacon_station::{KeyOutcome, ScanOutcome};
use common::{warehouse, Harness};

const ST: &str = "station-1";

fn confirmation(location_id: &str) -> SignalConfirmation {
    SignalConfirmation {
        location_id: location_id.to_string(),
    }
}

async fn awaiting_bin7(h: &Harness) {
    h.engine.start_retrieval(ST).await.unwrap();
    h.engine.scan_first(ST, "R1-S1-P1").await.unwrap();
}

#[tokio::test]
async fn test_unawaited_location_is_ignored() {
    let h = Harness::new(warehouse());
    awaiting_bin7(&h).await;

    assert_eq!(h.engine.route_confirmation(&confirmation("99")), 0);
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(h.state(ST).await, SessionState::AwaitingSecondScan);
    assert_eq!(h.quantity("R1-S1-P1", "A"), 2);
}

#[tokio::test]
async fn test_matching_confirmation_commits() {
    let h = Harness::new(warehouse());
    awaiting_bin7(&h).await;

    assert_eq!(h.engine.route_confirmation(&confirmation("R1-S1-BIN7")), 1);
    h.wait_for_state(ST, SessionState::Idle).await;
    assert_eq!(h.quantity("R1-S1-P1", "A"), 0);
    assert!(h.engine.signals().awaited_by(ST).is_none());
}

#[tokio::test]
async fn test_dispatch_loop_consumes_published_events() {
    let h = Harness::new(warehouse());
    let dispatch = h.engine.spawn_confirmation_dispatch();
    awaiting_bin7(&h).await;

    h.engine.signals().publish(confirmation("99"));
    h.engine.signals().publish(confirmation("R1-S1-BIN7"));
    h.wait_for_state(ST, SessionState::Idle).await;
    assert_eq!(h.quantity("R1-S1-P1", "A"), 0);

    dispatch.abort();
}

#[tokio::test]
async fn test_direct_confirmation_is_validated_like_a_scan() {
    let h = Harness::new(warehouse());
    awaiting_bin7(&h).await;

    let station = h.engine.station(ST).unwrap();
    let err = station.confirm("R2-S1-BIN1").await.unwrap_err();
    assert_eq!(err.kind(), "wrong_cell");
    assert_eq!(h.state(ST).await, SessionState::AwaitingSecondScan);
}

async fn type_token(h: &Harness, keys: &[&str]) -> KeyOutcome {
    let mut last = None;
    for key in keys {
        let key: Key = key.parse().unwrap();
        last = Some(h.engine.key_press(ST, key).await.unwrap());
    }
    last.unwrap()
}

#[tokio::test]
async fn test_keystrokes_drive_both_scans() {
    let h = Harness::new(warehouse());
    h.engine.start_retrieval(ST).await.unwrap();

    let outcome = type_token(&h, &["Shift", "R", "1", "-", "S", "1", "-", "P", "9"]).await;
    assert_eq!(
        outcome,
        KeyOutcome::Buffered {
            pending: "R1-S1-P9".into()
        }
    );
    assert_eq!(h.engine.status(ST).await.unwrap().pending_input, "R1-S1-P9");

    let outcome = type_token(&h, &["Backspace", "1", "Enter"]).await;
    match outcome {
        KeyOutcome::Scanned {
            token,
            outcome: ScanOutcome::Resolved(resolution),
        } => {
            assert_eq!(token, "R1-S1-P1");
            assert_eq!(resolution.bin_id, "R1-S1-BIN7");
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let keys: Vec<String> = "R1-S1-BIN7".chars().map(String::from).collect();
    let mut keys: Vec<&str> = keys.iter().map(String::as_str).collect();
    keys.push("Enter");
    let outcome = type_token(&h, &keys).await;
    assert!(matches!(
        outcome,
        KeyOutcome::Scanned {
            outcome: ScanOutcome::Committed(_),
            ..
        }
    ));
    assert_eq!(h.state(ST).await, SessionState::Idle);
}

#[tokio::test]
async fn test_enter_while_idle_is_invalid_state() {
    let h = Harness::new(warehouse());
    h.engine.key_press(ST, Key::Char('X')).await.unwrap();
    let err = h.engine.key_press(ST, Key::Enter).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_state");

    // The buffer was consumed by Enter.
    assert_eq!(h.engine.status(ST).await.unwrap().pending_input, "");
}

#[tokio::test]
async fn test_over_long_scan_is_not_routed() {
    let h = Harness::new(warehouse());
    h.engine.start_retrieval(ST).await.unwrap();

    // "R1-S1-P1" followed by scanner noise past the identifier limit.
    let noisy = format!("R1-S1-P1{}", "X".repeat(beacon_core::MAX_IDENTIFIER_LEN));
    for c in noisy.chars() {
        h.engine.key_press(ST, Key::Char(c)).await.unwrap();
    }
    let err = h.engine.key_press(ST, Key::Enter).await.unwrap_err();
    assert_eq!(err.kind(), "validation");
    assert_eq!(h.state(ST).await, SessionState::AwaitingFirstScan);
    assert_eq!(h.engine.status(ST).await.unwrap().pending_input, "");
}
