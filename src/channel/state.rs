use super::postgres_changes::PostgresChangesFilter;
use super::presence::{Presence, RawPresenceDiff, RawPresenceState};
use crate::events::{BroadcastMessage, PostgresChange};
use crate::messaging::ChannelEvent;
use std::sync::Arc;
use uuid::Uuid;

/// Channel subscription lifecycle.
///
/// `Closed -> Joining -> Joined -> Leaving -> Closed`, with `Joining ->
/// Errored` on a refused or timed-out join. `Errored` channels may rejoin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Closed,
    Errored,
    Joined,
    Joining,
    Leaving,
}

/// Typed payload handed to channel listeners.
#[derive(Debug, Clone)]
pub enum EventPayload {
    /// Postgres row change (INSERT, UPDATE, DELETE, SELECT)
    PostgresChange(PostgresChange),
    /// Broadcast message (user-defined pub/sub)
    Broadcast(BroadcastMessage),
    /// Full presence state pushed after join
    PresenceState(RawPresenceState),
    /// Presence joins/leaves
    PresenceDiff(RawPresenceDiff),
    /// System events (replies, errors, etc.)
    System(serde_json::Value),
    /// Custom user-defined events
    Custom(serde_json::Value),
}

/// Listener callbacks run on the receive path, so they must be non-blocking.
/// A returned error is caught at the dispatch boundary and handed to the
/// channel's error observer; it never reaches the receive loop.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;
pub type ListenerCallback =
    Arc<dyn Fn(EventPayload) -> Result<(), ListenerError> + Send + Sync + 'static>;
pub type ErrorObserver = Arc<dyn Fn(Uuid, ListenerError) + Send + Sync + 'static>;

/// One listener registration: event filter plus callback.
#[derive(Clone)]
pub struct EventBinding {
    pub id: Uuid,
    pub event: ChannelEvent,
    pub filter: Option<PostgresChangesFilter>,
    pub callback: ListenerCallback,
}

impl std::fmt::Debug for EventBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBinding")
            .field("id", &self.id)
            .field("event", &self.event)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

/// Mutable state for a RealtimeChannel.
///
/// Bindings are stored in registration order; the dispatch path takes a
/// snapshot clone, so registration and removal are safe concurrently with an
/// in-flight dispatch.
pub struct ChannelState {
    pub status: ChannelStatus,
    pub bindings: Vec<EventBinding>,
    pub presence: Presence,
    pub join_ref: Option<String>,
    pub error_observer: Option<ErrorObserver>,
}

impl ChannelState {
    pub fn new() -> Self {
        Self {
            status: ChannelStatus::Closed,
            bindings: Vec::new(),
            presence: Presence::default(),
            join_ref: None,
            error_observer: None,
        }
    }
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new()
    }
}
