use super::config::{
    BroadcastConfig, ChannelJoinConfig, JoinPayload, PostgresChangesConfig, PresenceConfig,
};
use super::postgres_changes::PostgresChangesFilter;
use super::presence::PresenceMeta;
use super::state::{
    ChannelState, ChannelStatus, ErrorObserver, EventBinding, EventPayload, ListenerCallback,
    ListenerError,
};
use crate::client::RealtimeClient;
use crate::events::{self, DecodedEvent};
use crate::messaging::{ChannelEvent, SystemEvent};
use crate::types::constants::channel_events;
use crate::types::{RealtimeError, RealtimeMessage, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Configuration options for a realtime channel.
#[derive(Debug, Clone, Default)]
pub struct RealtimeChannelOptions {
    /// Whether to receive your own broadcast messages. Default: `false`.
    pub broadcast_self: bool,
    /// Whether to receive acknowledgments for broadcast messages. Default: `false`.
    pub broadcast_ack: bool,
    /// Unique key for presence tracking. If `Some`, enables presence tracking.
    pub presence_key: Option<String>,
    /// Whether this is a private channel requiring authorization. Default: `false`.
    pub is_private: bool,
}

/// A channel for subscribing to real-time events on one topic.
///
/// A channel multiplexes three kinds of traffic over the client's single
/// socket: Postgres row changes, broadcast messages and presence updates.
/// Listeners registered with [`on()`](Self::on) survive disconnects; on
/// reconnect the client rejoins the channel and delivery resumes without
/// re-registration.
///
/// # Example
///
/// ```no_run
/// use supabase_realtime_client::{RealtimeClient, RealtimeClientOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let client = RealtimeClient::new(
/// #     "wss://your-project.supabase.co/realtime/v1",
/// #     RealtimeClientOptions {
/// #         api_key: "your-anon-key".to_string(),
/// #         ..Default::default()
/// #     }
/// # )?;
/// # client.connect().await?;
/// let channel = client.channel("room:lobby", Default::default()).await;
/// channel.subscribe().await?;
/// # Ok(())
/// # }
/// ```
pub struct RealtimeChannel {
    topic: String,
    client: Arc<RealtimeClient>,
    pub(crate) state: Arc<RwLock<ChannelState>>,
    options: RealtimeChannelOptions,
}

impl RealtimeChannel {
    pub(crate) fn new(
        topic: String,
        client: Arc<RealtimeClient>,
        options: RealtimeChannelOptions,
    ) -> Self {
        Self {
            topic,
            client,
            state: Arc::new(RwLock::new(ChannelState::new())),
            options,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn status(&self) -> ChannelStatus {
        self.state.read().await.status
    }

    pub async fn is_joined(&self) -> bool {
        self.status().await == ChannelStatus::Joined
    }

    /// Registers a listener for a specific event kind.
    ///
    /// Valid in any channel state; takes effect for frames received after
    /// registration. The callback runs on the receive path and must not
    /// block. Returns the registration id, usable with [`off()`](Self::off).
    pub async fn on<F>(&self, event: impl Into<ChannelEvent>, callback: F) -> Uuid
    where
        F: Fn(EventPayload) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.register(event.into(), None, Arc::new(callback)).await
    }

    /// Registers a listener for Postgres row changes matching `filter`.
    ///
    /// The filter is also forwarded to the server with the next join request,
    /// so register listeners before calling [`subscribe()`](Self::subscribe).
    pub async fn on_postgres_changes<F>(&self, filter: PostgresChangesFilter, callback: F) -> Uuid
    where
        F: Fn(EventPayload) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.register(
            ChannelEvent::PostgresChanges,
            Some(filter),
            Arc::new(callback),
        )
        .await
    }

    async fn register(
        &self,
        event: ChannelEvent,
        filter: Option<PostgresChangesFilter>,
        callback: ListenerCallback,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let binding = EventBinding {
            id,
            event,
            filter,
            callback,
        };
        self.state.write().await.bindings.push(binding);
        id
    }

    /// Removes a listener registration. Returns `false` if the id is unknown.
    ///
    /// A listener removed while a frame is being dispatched is not invoked
    /// for frames arriving afterwards; the in-flight dispatch works on a
    /// snapshot taken before removal.
    pub async fn off(&self, id: Uuid) -> bool {
        let mut state = self.state.write().await;
        let before = state.bindings.len();
        state.bindings.retain(|binding| binding.id != id);
        state.bindings.len() != before
    }

    /// Installs an observer for listener callback failures.
    ///
    /// Without one, failures are logged via `tracing::error!`.
    pub async fn set_error_observer<F>(&self, observer: F)
    where
        F: Fn(Uuid, ListenerError) + Send + Sync + 'static,
    {
        self.state.write().await.error_observer = Some(Arc::new(observer) as ErrorObserver);
    }

    /// Subscribes to the channel and waits for the server acknowledgment.
    ///
    /// Valid from `Closed` or `Errored`; the join frame carries the channel
    /// config (broadcast/presence options, collected postgres_changes
    /// filters, access token). The state moves to `Joining` immediately and
    /// to `Joined` once the correlated `phx_reply` arrives.
    ///
    /// # Errors
    ///
    /// - [`RealtimeError::AlreadyJoining`] while `Joining` or `Joined`
    /// - [`RealtimeError::NotConnected`] if the client socket is not open
    /// - [`RealtimeError::Channel`] on a negative acknowledgment
    /// - [`RealtimeError::Timeout`] when no acknowledgment arrives in time;
    ///   both failure cases leave the channel `Errored`, from which
    ///   `subscribe()` may be retried
    pub async fn subscribe(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            match state.status {
                ChannelStatus::Joining | ChannelStatus::Joined => {
                    return Err(RealtimeError::AlreadyJoining);
                }
                ChannelStatus::Leaving => {
                    return Err(RealtimeError::Channel(format!(
                        "cannot join '{}' while leaving",
                        self.topic
                    )));
                }
                ChannelStatus::Closed | ChannelStatus::Errored => {
                    state.status = ChannelStatus::Joining;
                }
            }
        }

        tracing::info!("Subscribing to channel: {}", self.topic);

        match self.send_join().await {
            Ok(join_ref) => {
                let mut state = self.state.write().await;
                // The caller may have left while the ack was in flight; a
                // channel no longer Joining keeps whatever state the leave
                // put it in
                if state.status == ChannelStatus::Joining {
                    state.status = ChannelStatus::Joined;
                    state.join_ref = Some(join_ref);
                    tracing::info!("Joined channel: {}", self.topic);
                } else {
                    tracing::debug!(
                        "Join ack for {} arrived after the channel left ({:?})",
                        self.topic,
                        state.status
                    );
                }
                Ok(())
            }
            Err(e) => {
                let mut state = self.state.write().await;
                if state.status == ChannelStatus::Joining {
                    state.status = ChannelStatus::Errored;
                }
                tracing::error!("Join failed for channel {}: {}", self.topic, e);
                Err(e)
            }
        }
    }

    async fn send_join(&self) -> Result<String> {
        let postgres_changes: Vec<_> = {
            let state = self.state.read().await;
            state
                .bindings
                .iter()
                .filter_map(|binding| binding.filter.as_ref())
                .map(|filter| PostgresChangesConfig {
                    event: filter.event.as_str().to_string(),
                    schema: filter.schema.clone(),
                    table: filter.table.clone(),
                    filter: filter.filter.clone(),
                })
                .collect()
        };

        // Typed join payload per the Supabase protocol
        // Reference: https://supabase.com/docs/guides/realtime/protocol
        let payload = JoinPayload {
            config: ChannelJoinConfig {
                broadcast: BroadcastConfig {
                    self_: self.options.broadcast_self,
                    ack: self.options.broadcast_ack,
                },
                presence: PresenceConfig {
                    key: self.options.presence_key.clone(),
                    enabled: self.options.presence_key.is_some(),
                },
                is_private: self.options.is_private,
                postgres_changes: if postgres_changes.is_empty() {
                    None
                } else {
                    Some(postgres_changes)
                },
            },
            access_token: self.client.access_token().map(|s| s.to_string()),
        };

        let join_ref = self.client.make_ref().await;
        let msg_ref = self.client.make_ref().await;
        let message = RealtimeMessage::new(
            self.topic.clone(),
            ChannelEvent::System(SystemEvent::Join),
            serde_json::to_value(&payload)?,
        )
        .with_ref(msg_ref.clone())
        .with_join_ref(join_ref.clone());

        let reply = self.client.push_and_await_reply(message, msg_ref).await?;
        if reply.is_ok() {
            Ok(join_ref)
        } else {
            Err(RealtimeError::Channel(format!(
                "join refused for '{}': {}",
                self.topic, reply.response
            )))
        }
    }

    /// Unsubscribes from the channel.
    ///
    /// Best effort: sends `phx_leave` and waits for the acknowledgment, but a
    /// timeout or send failure still forces the channel to `Closed`. A no-op
    /// when already `Closed` or when a leave is already in flight.
    pub async fn unsubscribe(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            match state.status {
                ChannelStatus::Closed | ChannelStatus::Leaving => return Ok(()),
                _ => state.status = ChannelStatus::Leaving,
            }
        }

        tracing::info!("Unsubscribing from channel: {}", self.topic);

        let msg_ref = self.client.make_ref().await;
        let message = RealtimeMessage::new(
            self.topic.clone(),
            ChannelEvent::System(SystemEvent::Leave),
            serde_json::json!({}),
        )
        .with_ref(msg_ref.clone());

        if let Err(e) = self.client.push_and_await_reply(message, msg_ref).await {
            tracing::debug!("Leave ack not received for {}: {}", self.topic, e);
        }

        let mut state = self.state.write().await;
        state.status = ChannelStatus::Closed;
        state.join_ref = None;
        Ok(())
    }

    /// Sends a broadcast message to all subscribers of this channel.
    ///
    /// Fails fast: the channel must be `Joined` and the socket open; nothing
    /// is buffered while disconnected.
    ///
    /// # Errors
    ///
    /// [`RealtimeError::NotJoined`] before the join acknowledgment,
    /// [`RealtimeError::NotConnected`] when the transport is down.
    pub async fn send(&self, event: impl Into<String>, payload: serde_json::Value) -> Result<()> {
        let join_ref = self.joined_ref().await?;
        let event = event.into();

        let message = RealtimeMessage::new(
            self.topic.clone(),
            ChannelEvent::Broadcast,
            serde_json::json!({
                "type": channel_events::BROADCAST,
                "event": event,
                "payload": payload,
            }),
        )
        .with_ref(self.client.make_ref().await)
        .with_join_ref(join_ref);

        self.client.push(message).await?;
        tracing::debug!("Sent broadcast '{}' on {}", event, self.topic);
        Ok(())
    }

    /// Tracks this client's presence on the channel, broadcasting `metadata`
    /// to other subscribers. Requires the channel to be `Joined`.
    pub async fn track(&self, metadata: serde_json::Value) -> Result<()> {
        self.send_presence(serde_json::json!({
            "type": channel_events::PRESENCE,
            "event": "track",
            "payload": metadata,
        }))
        .await
    }

    /// Stops tracking this client's presence on the channel.
    pub async fn untrack(&self) -> Result<()> {
        self.send_presence(serde_json::json!({
            "type": channel_events::PRESENCE,
            "event": "untrack",
        }))
        .await
    }

    async fn send_presence(&self, payload: serde_json::Value) -> Result<()> {
        let join_ref = self.joined_ref().await?;
        let message = RealtimeMessage::new(self.topic.clone(), ChannelEvent::Presence, payload)
            .with_ref(self.client.make_ref().await)
            .with_join_ref(join_ref);
        self.client.push(message).await
    }

    async fn joined_ref(&self) -> Result<String> {
        let state = self.state.read().await;
        if state.status != ChannelStatus::Joined {
            return Err(RealtimeError::NotJoined);
        }
        Ok(state.join_ref.clone().unwrap_or_default())
    }

    /// Snapshot of the presence state currently tracked on this channel.
    pub async fn presence_list(&self) -> Vec<(String, Vec<PresenceMeta>)> {
        self.state.read().await.presence.list()
    }

    /// Re-enters the join flow after a reconnect, keeping bindings intact.
    pub(crate) async fn rejoin(&self) -> Result<()> {
        self.state.write().await.status = ChannelStatus::Closed;
        self.subscribe().await
    }

    /// Dispatches an inbound frame to matching listeners.
    ///
    /// Decodes the payload once, then invokes matching callbacks
    /// synchronously in registration order against a snapshot of the binding
    /// set. Callback failures are isolated per listener.
    pub(crate) async fn trigger(&self, event: ChannelEvent, payload: serde_json::Value) {
        let decoded = match &event {
            ChannelEvent::PostgresChanges
            | ChannelEvent::Broadcast
            | ChannelEvent::PresenceState
            | ChannelEvent::PresenceDiff => match events::decode(&event, &payload) {
                Ok(decoded) => self.into_payload(decoded).await,
                Err(e) => {
                    tracing::warn!(
                        "Dropping undecodable '{}' frame on {}: {}",
                        event.as_str(),
                        self.topic,
                        e
                    );
                    return;
                }
            },
            ChannelEvent::System(_) => EventPayload::System(payload),
            ChannelEvent::Presence | ChannelEvent::Custom(_) => EventPayload::Custom(payload),
        };

        // Snapshot so listeners can be added/removed mid-dispatch
        let (bindings, observer) = {
            let state = self.state.read().await;
            (state.bindings.clone(), state.error_observer.clone())
        };

        for binding in bindings.iter().filter(|b| b.event == event) {
            if let (Some(filter), EventPayload::PostgresChange(change)) =
                (&binding.filter, &decoded)
            {
                if !filter.matches(change) {
                    continue;
                }
            }

            if let Err(e) = (binding.callback)(decoded.clone()) {
                match &observer {
                    Some(observer) => observer(binding.id, e),
                    None => tracing::error!(
                        "Listener {} on {} failed: {}",
                        binding.id,
                        self.topic,
                        e
                    ),
                }
            }
        }
    }

    async fn into_payload(&self, decoded: DecodedEvent) -> EventPayload {
        match decoded {
            DecodedEvent::PostgresChange(change) => EventPayload::PostgresChange(change),
            DecodedEvent::Broadcast(message) => EventPayload::Broadcast(message),
            DecodedEvent::PresenceState(state) => {
                self.state
                    .write()
                    .await
                    .presence
                    .sync_state(state.clone());
                EventPayload::PresenceState(state)
            }
            DecodedEvent::PresenceDiff(diff) => {
                self.state.write().await.presence.sync_diff(diff.clone());
                EventPayload::PresenceDiff(diff)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PostgresChangeEvent;
    use crate::client::RealtimeClientOptions;
    use std::sync::Mutex;

    async fn test_channel() -> RealtimeChannel {
        let client = RealtimeClient::new(
            "ws://localhost:4000/socket",
            RealtimeClientOptions {
                api_key: "test-key".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        RealtimeChannel::new(
            "realtime:test".to_string(),
            Arc::new(client),
            Default::default(),
        )
    }

    fn broadcast_payload(event: &str) -> serde_json::Value {
        serde_json::json!({"type": "broadcast", "event": event, "payload": {"n": 1}})
    }

    fn insert_payload(table: &str) -> serde_json::Value {
        serde_json::json!({
            "type": "INSERT",
            "schema": "public",
            "table": table,
            "commit_timestamp": "2025-11-27T16:16:54.545Z",
            "columns": [{"name": "id", "type": "int8"}],
            "record": {"id": 1}
        })
    }

    #[tokio::test]
    async fn test_send_fails_before_joined() {
        let channel = test_channel().await;
        let result = channel.send("greeting", serde_json::json!({})).await;
        assert!(matches!(result, Err(RealtimeError::NotJoined)));

        let result = channel.track(serde_json::json!({"status": "online"})).await;
        assert!(matches!(result, Err(RealtimeError::NotJoined)));
    }

    #[tokio::test]
    async fn test_subscribe_rejected_while_joining_or_joined() {
        let channel = test_channel().await;

        channel.state.write().await.status = ChannelStatus::Joining;
        assert!(matches!(
            channel.subscribe().await,
            Err(RealtimeError::AlreadyJoining)
        ));

        channel.state.write().await.status = ChannelStatus::Joined;
        assert!(matches!(
            channel.subscribe().await,
            Err(RealtimeError::AlreadyJoining)
        ));
    }

    #[tokio::test]
    async fn test_subscribe_without_connection_leaves_channel_errored() {
        let channel = test_channel().await;

        let result = channel.subscribe().await;
        assert!(matches!(result, Err(RealtimeError::NotConnected)));
        assert_eq!(channel.status().await, ChannelStatus::Errored);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_best_effort() {
        let channel = test_channel().await;

        // No-op when already closed
        assert!(channel.unsubscribe().await.is_ok());
        assert_eq!(channel.status().await, ChannelStatus::Closed);

        // Forces Closed even when the leave frame cannot be sent
        channel.state.write().await.status = ChannelStatus::Joined;
        assert!(channel.unsubscribe().await.is_ok());
        assert_eq!(channel.status().await, ChannelStatus::Closed);
    }

    #[tokio::test]
    async fn test_unsubscribe_while_leaving_is_noop() {
        let channel = test_channel().await;

        // A leave already in flight is not sent a second time
        channel.state.write().await.status = ChannelStatus::Leaving;
        assert!(channel.unsubscribe().await.is_ok());
        assert_eq!(channel.status().await, ChannelStatus::Leaving);
    }

    #[tokio::test]
    async fn test_matching_listeners_invoked_once_in_registration_order() {
        let channel = test_channel().await;
        let calls = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let calls = Arc::clone(&calls);
            channel
                .on(ChannelEvent::Broadcast, move |_payload| {
                    calls.lock().unwrap().push(tag);
                    Ok(())
                })
                .await;
        }
        // Non-matching listener must not fire
        {
            let calls = Arc::clone(&calls);
            channel
                .on(ChannelEvent::Custom("other".into()), move |_payload| {
                    calls.lock().unwrap().push("other");
                    Ok(())
                })
                .await;
        }

        channel
            .trigger(ChannelEvent::Broadcast, broadcast_payload("hello"))
            .await;

        assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_dispatch_order_equals_arrival_order() {
        let channel = test_channel().await;
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_cloned = Arc::clone(&seen);
        channel
            .on(ChannelEvent::Broadcast, move |payload| {
                if let EventPayload::Broadcast(message) = payload {
                    seen_cloned.lock().unwrap().push(message.event);
                }
                Ok(())
            })
            .await;

        for name in ["one", "two", "three"] {
            channel
                .trigger(ChannelEvent::Broadcast, broadcast_payload(name))
                .await;
        }

        assert_eq!(*seen.lock().unwrap(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_block_the_next_one() {
        let channel = test_channel().await;
        let calls = Arc::new(Mutex::new(Vec::new()));
        let observed = Arc::new(Mutex::new(Vec::new()));

        let observed_cloned = Arc::clone(&observed);
        channel
            .set_error_observer(move |id, error| {
                observed_cloned.lock().unwrap().push((id, error.to_string()));
            })
            .await;

        let failing_id = channel
            .on(ChannelEvent::Broadcast, |_payload| Err("boom".into()))
            .await;
        let calls_cloned = Arc::clone(&calls);
        channel
            .on(ChannelEvent::Broadcast, move |_payload| {
                calls_cloned.lock().unwrap().push("survivor");
                Ok(())
            })
            .await;

        channel
            .trigger(ChannelEvent::Broadcast, broadcast_payload("hello"))
            .await;

        assert_eq!(*calls.lock().unwrap(), vec!["survivor"]);
        let observed = observed.lock().unwrap();
        assert_eq!(observed.len(), 1);
        assert_eq!(observed[0].0, failing_id);
        assert!(observed[0].1.contains("boom"));
    }

    #[tokio::test]
    async fn test_postgres_filter_selects_listeners() {
        let channel = test_channel().await;
        let calls = Arc::new(Mutex::new(Vec::new()));

        let calls_todos = Arc::clone(&calls);
        channel
            .on_postgres_changes(
                PostgresChangesFilter::new(PostgresChangeEvent::All, "public")
                    .table("todos"),
                move |_payload| {
                    calls_todos.lock().unwrap().push("todos");
                    Ok(())
                },
            )
            .await;
        let calls_users = Arc::clone(&calls);
        channel
            .on_postgres_changes(
                PostgresChangesFilter::new(PostgresChangeEvent::All, "public")
                    .table("users"),
                move |_payload| {
                    calls_users.lock().unwrap().push("users");
                    Ok(())
                },
            )
            .await;

        channel
            .trigger(ChannelEvent::PostgresChanges, insert_payload("todos"))
            .await;

        assert_eq!(*calls.lock().unwrap(), vec!["todos"]);
    }

    #[tokio::test]
    async fn test_listener_takes_effect_only_for_later_frames() {
        let channel = test_channel().await;
        let calls = Arc::new(Mutex::new(Vec::new()));

        let calls_a = Arc::clone(&calls);
        channel
            .on(ChannelEvent::Broadcast, move |_payload| {
                calls_a.lock().unwrap().push("a");
                Ok(())
            })
            .await;

        channel
            .trigger(ChannelEvent::Broadcast, broadcast_payload("one"))
            .await;

        let calls_b = Arc::clone(&calls);
        let b_id = channel
            .on(ChannelEvent::Broadcast, move |_payload| {
                calls_b.lock().unwrap().push("b");
                Ok(())
            })
            .await;

        channel
            .trigger(ChannelEvent::Broadcast, broadcast_payload("two"))
            .await;

        assert!(channel.off(b_id).await);

        channel
            .trigger(ChannelEvent::Broadcast, broadcast_payload("three"))
            .await;

        assert_eq!(*calls.lock().unwrap(), vec!["a", "a", "b", "a"]);
    }

    #[tokio::test]
    async fn test_undecodable_frame_is_dropped_without_dispatch() {
        let channel = test_channel().await;
        let calls = Arc::new(Mutex::new(0));

        let calls_cloned = Arc::clone(&calls);
        channel
            .on(ChannelEvent::PostgresChanges, move |_payload| {
                *calls_cloned.lock().unwrap() += 1;
                Ok(())
            })
            .await;

        // UPDATE without old_record must not reach listeners
        channel
            .trigger(
                ChannelEvent::PostgresChanges,
                serde_json::json!({
                    "type": "UPDATE",
                    "schema": "public",
                    "table": "todos",
                    "commit_timestamp": "2025-11-27T16:16:54.545Z",
                    "columns": [],
                    "record": {"id": 1}
                }),
            )
            .await;

        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_presence_frames_update_channel_presence() {
        let channel = test_channel().await;

        channel
            .trigger(
                ChannelEvent::PresenceState,
                serde_json::json!({
                    "alice": {"metas": [{"phx_ref": "r1", "status": "online"}]}
                }),
            )
            .await;
        assert_eq!(channel.presence_list().await.len(), 1);

        channel
            .trigger(
                ChannelEvent::PresenceDiff,
                serde_json::json!({
                    "joins": {"bob": {"metas": [{"phx_ref": "r2"}]}},
                    "leaves": {}
                }),
            )
            .await;
        assert_eq!(channel.presence_list().await.len(), 2);
    }
}
