//! Room broadcaster: per-poll registry of live connections.
//!
//! Each connection owns a bounded mpsc queue drained by its writer task, so
//! fan-out never blocks the mutating path: delivery is `try_send`, and a
//! connection whose queue is full or closed is dropped from the registry
//! without aborting delivery to the others.

use dashmap::DashMap;
use ranker_engine::PollId;
use serde_json::to_string;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::events::ServerEvent;

/// Identifies one live transport connection.
pub type ConnectionId = Uuid;

type Room = DashMap<ConnectionId, mpsc::Sender<String>>;

/// Registry of all rooms in this process. Internally synchronized; callers
/// never coordinate subscribe/unsubscribe/broadcast explicitly.
pub struct RoomRegistry {
    rooms: DashMap<PollId, Room>,
    channel_capacity: usize,
}

impl RoomRegistry {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            channel_capacity,
        }
    }

    /// Queue capacity each connection's writer task should allocate.
    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// Register a connection and immediately queue the catch-up snapshot, so
    /// a late joiner never waits for the next mutation to see state.
    pub fn subscribe(
        &self,
        poll_id: &str,
        connection_id: ConnectionId,
        sender: mpsc::Sender<String>,
        snapshot: &ServerEvent,
    ) {
        if let Some(msg) = encode(snapshot) {
            // Fresh queue, capacity >= 1: this cannot fail while the
            // connection is alive.
            let _ = sender.try_send(msg);
        }
        self.rooms
            .entry(poll_id.to_string())
            .or_default()
            .insert(connection_id, sender);
        debug!(poll_id, connection_id = %connection_id, "Connection subscribed");
    }

    /// Idempotent removal; no error if the connection is already absent.
    pub fn unsubscribe(&self, poll_id: &str, connection_id: ConnectionId) {
        if let Some(room) = self.rooms.get(poll_id) {
            if room.remove(&connection_id).is_some() {
                debug!(poll_id, connection_id = %connection_id, "Connection unsubscribed");
            }
        }
    }

    /// Send an event to every connection in the room, best-effort per
    /// connection.
    pub fn broadcast(&self, poll_id: &str, event: &ServerEvent) {
        let Some(msg) = encode(event) else { return };
        let Some(room) = self.rooms.get(poll_id) else {
            return;
        };

        let mut stale = Vec::new();
        for entry in room.iter() {
            if entry.value().try_send(msg.clone()).is_err() {
                stale.push(*entry.key());
            }
        }
        for connection_id in stale {
            room.remove(&connection_id);
            warn!(poll_id, %connection_id, "Dropped unresponsive connection");
        }
    }

    /// Deliver an event to one connection only (error reporting path).
    pub fn send_to(&self, poll_id: &str, connection_id: ConnectionId, event: &ServerEvent) {
        let Some(msg) = encode(event) else { return };
        if let Some(room) = self.rooms.get(poll_id) {
            let gone = match room.get(&connection_id) {
                Some(sender) => sender.try_send(msg).is_err(),
                None => false,
            };
            if gone {
                room.remove(&connection_id);
                warn!(poll_id, %connection_id, "Dropped unresponsive connection");
            }
        }
    }

    /// Number of live connections subscribed to a poll.
    pub fn connection_count(&self, poll_id: &str) -> usize {
        self.rooms.get(poll_id).map_or(0, |room| room.len())
    }

    /// Remove the whole room on poll teardown. Dropping the senders closes
    /// each connection's queue, winding its writer task down.
    pub fn drop_room(&self, poll_id: &str) {
        if self.rooms.remove(poll_id).is_some() {
            debug!(poll_id, "Room dropped");
        }
    }
}

fn encode(event: &ServerEvent) -> Option<String> {
    match to_string(event) {
        Ok(msg) => Some(msg),
        Err(e) => {
            error!(error = %e, "Failed to serialize server event");
            None
        }
    }
}
