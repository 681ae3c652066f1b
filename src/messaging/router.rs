use super::SystemEvent;
use crate::client::ClientState;
use crate::types::constants::PHOENIX_TOPIC;
use crate::types::message::{PushReply, RealtimeMessage};
use crate::ChannelEvent;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Demultiplexes inbound frames: resolves pending acks by ref and forwards
/// everything else to the channel owning the frame's topic.
pub struct MessageRouter {
    state: Arc<RwLock<ClientState>>,
}

impl MessageRouter {
    pub fn new(state: Arc<RwLock<ClientState>>) -> Self {
        Self { state }
    }

    /// Routes one frame to the appropriate handler(s).
    pub async fn route(&self, message: RealtimeMessage) {
        tracing::debug!(
            "Routing message: topic={}, event={}",
            message.topic,
            message.event.as_str()
        );

        // Handle heartbeat acknowledgment
        if self.is_heartbeat_message(&message) {
            self.handle_heartbeat_ack(&message).await;
        }

        // Resolve pending request acks; a matched reply is not fanned out
        if message.event == ChannelEvent::System(SystemEvent::Reply)
            && self.handle_push_reply(&message).await
        {
            return;
        }

        if message.topic == PHOENIX_TOPIC {
            return;
        }

        self.route_to_channel(message).await;
    }

    /// Checks if a message is a heartbeat acknowledgment
    fn is_heartbeat_message(&self, message: &RealtimeMessage) -> bool {
        message.topic == PHOENIX_TOPIC
            && (message.event == ChannelEvent::System(SystemEvent::Reply)
                || message.event == ChannelEvent::System(SystemEvent::Heartbeat))
    }

    /// Handles heartbeat acknowledgment by clearing pending ref
    async fn handle_heartbeat_ack(&self, message: &RealtimeMessage) {
        if let Some(ref msg_ref) = message.r#ref {
            let mut state = self.state.write().await;
            if state.pending_heartbeat_ref.as_ref() == Some(msg_ref) {
                state.pending_heartbeat_ref = None;
                tracing::debug!("Received heartbeat ack for ref {}", msg_ref);
            }
        }
    }

    /// Resolves a pending request waiting on this reply's ref.
    /// Returns true if a waiter was found.
    async fn handle_push_reply(&self, message: &RealtimeMessage) -> bool {
        let Some(ref_id) = &message.r#ref else {
            return false;
        };

        let waiter = self.state.write().await.pending_replies.remove(ref_id);
        let Some(waiter) = waiter else {
            return false;
        };

        let status = message
            .payload
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or_else(|| {
                tracing::debug!("Push reply missing 'status' field, defaulting to 'error'");
                "error"
            })
            .to_string();

        let response = message
            .payload
            .get("response")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        if waiter.send(PushReply { status, response }).is_err() {
            tracing::debug!("Reply waiter for ref {} gave up before the ack", ref_id);
        }
        true
    }

    /// Forwards a frame to the channel owning its topic. Frames for unknown
    /// topics are dropped with a warning.
    async fn route_to_channel(&self, message: RealtimeMessage) {
        let channel = {
            let state = self.state.read().await;
            state
                .channels
                .iter()
                .find(|channel| channel.topic() == message.topic)
                .cloned()
        };

        match channel {
            Some(channel) => channel.trigger(message.event, message.payload).await,
            None => {
                tracing::warn!(
                    "Dropping frame for unknown topic '{}' (event '{}')",
                    message.topic,
                    message.event.as_str()
                );
            }
        }
    }
}
