//! Session registry: `system_id -> {bound connections}`, and the routing
//! table the Receipt Bus subscriber consults to find local receivers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::pdu::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    Unbound,
    Receiver,
    Transmitter,
    Transceiver,
}

impl BindMode {
    pub fn can_receive(self) -> bool {
        matches!(self, BindMode::Receiver | BindMode::Transceiver)
    }

    pub fn can_transmit(self) -> bool {
        matches!(self, BindMode::Transmitter | BindMode::Transceiver)
    }
}

/// Identifies one Connection Handler within the registry. Generated once
/// per accepted socket and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

impl ConnectionId {
    pub fn new() -> Self {
        ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// The registry's handle on a bound connection: enough to address it from
/// another task (the bus subscriber, the dispatcher) without touching the
/// socket directly.
#[derive(Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub mode: BindMode,
    sender: mpsc::UnboundedSender<Command>,
    seq: Arc<AtomicU32>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, mode: BindMode, sender: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            id,
            mode,
            sender,
            seq: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Next sequence number for a server-originated PDU on this connection.
    /// Strictly increasing, starting at 1.
    pub fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Queues `command` for the connection's single writer task. Silently
    /// drops if the connection has already closed.
    pub fn send(&self, command: Command) {
        let _ = self.sender.send(command);
    }
}

struct Session {
    connections: HashMap<ConnectionId, ConnectionHandle>,
}

impl Session {
    fn new() -> Self {
        Self {
            connections: HashMap::new(),
        }
    }
}

/// Process-local, per-worker state: which connections are bound to which
/// `system_id`. Mutated only from the worker's single event loop, but
/// kept behind `DashMap`/`Arc` (thread-safe) for simplicity rather than
/// introducing a non-`Send` task-local executor.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
    bound_to: DashMap<ConnectionId, String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handle` to `system_id`, detaching it from any prior Session
    /// first. Does not itself authenticate (callers run the Provider
    /// check before calling this).
    pub fn bind(&self, system_id: &str, handle: ConnectionHandle) {
        self.unbind(handle.id);
        self.sessions
            .entry(system_id.to_string())
            .or_insert_with(Session::new)
            .connections
            .insert(handle.id, handle);
        self.bound_to.insert(handle.id, system_id.to_string());
    }

    /// Removes `id` from its Session, if any, and removes the Session
    /// itself once its connection set is empty. A no-op if `id` is not
    /// currently bound.
    pub fn unbind(&self, id: ConnectionId) {
        let Some((_, system_id)) = self.bound_to.remove(&id) else {
            return;
        };
        let mut now_empty = false;
        if let Some(mut session) = self.sessions.get_mut(&system_id) {
            session.connections.remove(&id);
            now_empty = session.connections.is_empty();
        }
        if now_empty {
            self.sessions.remove(&system_id);
        }
    }

    /// Every local connection bound to `system_id` in RECEIVER or
    /// TRANSCEIVER mode.
    pub fn receivers_for(&self, system_id: &str) -> Vec<ConnectionHandle> {
        self.sessions
            .get(system_id)
            .map(|session| {
                session
                    .connections
                    .values()
                    .filter(|handle| handle.mode.can_receive())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn session_exists(&self, system_id: &str) -> bool {
        self.sessions.contains_key(system_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
