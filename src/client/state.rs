use super::connection::ConnectionState;
use crate::channel::RealtimeChannel;
use crate::infrastructure::TaskManager;
use crate::types::PushReply;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};

/// Consolidated mutable state for RealtimeClient
/// Using a single struct reduces lock contention
pub struct ClientState {
    /// Current ref counter for message IDs
    pub ref_counter: u64,

    /// Pending heartbeat ref (if any)
    pub pending_heartbeat_ref: Option<String>,

    /// All channels managed by this client, in creation order
    pub channels: Vec<Arc<RealtimeChannel>>,

    /// Channels that were `Joined` or mid-join when the transport dropped,
    /// captured by the read loop before it fails their in-flight acks (the
    /// failing ack moves a mid-join channel to `Errored`, so a status scan
    /// after reconnect would miss it)
    pub rejoin_pending: Vec<Arc<RealtimeChannel>>,

    /// In-flight request acks, keyed by the ref sent with the request.
    /// The receive loop resolves an entry when the matching phx_reply
    /// arrives; dropping a sender fails the waiting caller.
    pub pending_replies: HashMap<String, oneshot::Sender<PushReply>>,

    /// Background task manager
    pub task_manager: TaskManager,

    /// Whether the disconnect was manual (prevents auto-reconnect)
    pub was_manual_disconnect: bool,

    /// Sender for state change notifications
    pub state_change_tx: Option<watch::Sender<(ConnectionState, bool)>>,
}

impl ClientState {
    pub fn new() -> Self {
        Self {
            ref_counter: 0,
            pending_heartbeat_ref: None,
            channels: Vec::new(),
            rejoin_pending: Vec::new(),
            pending_replies: HashMap::new(),
            task_manager: TaskManager::new(),
            was_manual_disconnect: false,
            state_change_tx: None,
        }
    }

    /// Generate next message reference
    pub fn make_ref(&mut self) -> String {
        self.ref_counter += 1;
        self.ref_counter.to_string()
    }

    /// Notify state change watchers
    pub fn notify_state_change(&self, state: ConnectionState, manual: bool) {
        if let Some(tx) = &self.state_change_tx {
            if tx.send((state, manual)).is_err() {
                tracing::debug!(
                    "State change watcher disconnected, could not notify state: {:?}",
                    state
                );
            }
        }
    }

    /// Drops all in-flight ack waiters, failing their callers.
    pub fn fail_pending_replies(&mut self) {
        if !self.pending_replies.is_empty() {
            tracing::debug!(
                "Dropping {} pending replies on teardown",
                self.pending_replies.len()
            );
        }
        self.pending_replies.clear();
    }
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new()
    }
}
