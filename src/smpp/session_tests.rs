//! Unit tests for the session registry:
//! - a Session exists iff at least one Connection is bound to it
//! - rebinding detaches the connection from its prior Session first
//! - `receivers_for` only yields RECEIVER/TRANSCEIVER connections

use tokio::sync::mpsc;

use crate::smpp::session::{BindMode, ConnectionHandle, ConnectionId, SessionRegistry};

fn handle(mode: BindMode) -> ConnectionHandle {
    let (tx, _rx) = mpsc::unbounded_channel();
    ConnectionHandle::new(ConnectionId::new(), mode, tx)
}

#[test]
fn session_exists_only_while_bound() {
    let registry = SessionRegistry::new();
    assert!(!registry.session_exists("mtc"));

    let conn = handle(BindMode::Transceiver);
    registry.bind("mtc", conn.clone());
    assert!(registry.session_exists("mtc"));

    registry.unbind(conn.id);
    assert!(
        !registry.session_exists("mtc"),
        "session must be removed once its connection set is empty"
    );
}

#[test]
fn session_survives_while_any_connection_remains() {
    let registry = SessionRegistry::new();
    let a = handle(BindMode::Receiver);
    let b = handle(BindMode::Receiver);
    registry.bind("mtc", a.clone());
    registry.bind("mtc", b.clone());

    registry.unbind(a.id);
    assert!(registry.session_exists("mtc"));
    assert_eq!(registry.receivers_for("mtc").len(), 1);

    registry.unbind(b.id);
    assert!(!registry.session_exists("mtc"));
}

#[test]
fn rebinding_detaches_from_prior_session() {
    let registry = SessionRegistry::new();
    let conn = handle(BindMode::Transceiver);
    registry.bind("old_id", conn.clone());
    assert!(registry.session_exists("old_id"));

    registry.bind("new_id", conn.clone());
    assert!(
        !registry.session_exists("old_id"),
        "binding to a new system_id must unbind from the old one"
    );
    assert!(registry.session_exists("new_id"));
}

#[test]
fn receivers_for_excludes_transmitter_only_connections() {
    let registry = SessionRegistry::new();
    let rx = handle(BindMode::Receiver);
    let tx = handle(BindMode::Transmitter);
    let trx = handle(BindMode::Transceiver);

    registry.bind("mtc", rx.clone());
    registry.bind("mtc", tx.clone());
    registry.bind("mtc", trx.clone());

    let receivers = registry.receivers_for("mtc");
    assert_eq!(receivers.len(), 2, "only RECEIVER and TRANSCEIVER connections count");
    let ids: Vec<_> = receivers.iter().map(|c| c.id).collect();
    assert!(ids.contains(&rx.id));
    assert!(ids.contains(&trx.id));
    assert!(!ids.contains(&tx.id));
}

#[test]
fn unbind_of_unknown_connection_is_a_no_op() {
    let registry = SessionRegistry::new();
    registry.unbind(ConnectionId::new());
    assert_eq!(registry.session_count(), 0);
}

#[test]
fn sequence_numbers_strictly_increase_per_connection() {
    let conn = handle(BindMode::Receiver);
    let first = conn.next_seq();
    let second = conn.next_seq();
    let third = conn.next_seq();
    assert!(first < second);
    assert!(second < third);
}
