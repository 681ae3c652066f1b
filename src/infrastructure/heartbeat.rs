use crate::client::{ClientState, ConnectionManager};
use crate::messaging::{ChannelEvent, SystemEvent};
use crate::types::constants::PHOENIX_TOPIC;
use crate::types::message::RealtimeMessage;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time;

use crate::types::constants::HEARTBEAT_INTERVAL;

/// Periodically pings the server on the `phoenix` topic.
///
/// A heartbeat still unacked when the next tick fires means the transport is
/// dead even if the socket looks open; the connection is closed so the
/// reconnect path takes over.
pub struct HeartbeatManager {
    interval: Duration,
    connection: Weak<ConnectionManager>,
    state: Arc<RwLock<ClientState>>,
}

impl HeartbeatManager {
    pub fn new(connection: Weak<ConnectionManager>, state: Arc<RwLock<ClientState>>) -> Self {
        Self {
            interval: Duration::from_millis(HEARTBEAT_INTERVAL),
            connection,
            state,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawns the heartbeat loop, tracked by the client's task manager.
    pub async fn spawn_on(self, state: &Arc<RwLock<ClientState>>) {
        let mut guard = state.write().await;
        guard.task_manager.spawn(self.run());
    }

    async fn run(self) {
        let mut interval_timer = time::interval(self.interval);
        interval_timer.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            interval_timer.tick().await;

            // Client dropped, exit heartbeat task
            let Some(connection) = self.connection.upgrade() else {
                break;
            };

            if !connection.is_connected().await {
                continue;
            }

            // Unacked previous heartbeat: treat the transport as dead
            let timed_out = self.state.read().await.pending_heartbeat_ref.is_some();
            if timed_out {
                tracing::warn!("Heartbeat timeout detected, closing connection");
                self.state.write().await.pending_heartbeat_ref = None;
                if let Err(e) = connection.close().await {
                    tracing::error!("Failed to close connection after heartbeat timeout: {}", e);
                }
                // Notify the reconnection watcher
                let state = self.state.read().await;
                state.notify_state_change(
                    crate::client::ConnectionState::Closed,
                    state.was_manual_disconnect,
                );
                continue;
            }

            let new_ref = self.state.write().await.make_ref();
            let heartbeat_msg = RealtimeMessage::new(
                PHOENIX_TOPIC.to_string(),
                ChannelEvent::System(SystemEvent::Heartbeat),
                serde_json::json!({}),
            )
            .with_ref(new_ref.clone());

            match connection.send_message(heartbeat_msg).await {
                Ok(_) => {
                    self.state.write().await.pending_heartbeat_ref = Some(new_ref.clone());
                    tracing::debug!("Sent heartbeat with ref {}", new_ref);
                }
                Err(e) => {
                    tracing::error!("Failed to send heartbeat: {}", e);
                }
            }
        }
        tracing::debug!("Heartbeat task finished");
    }
}
