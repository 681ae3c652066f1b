use super::{
    ClientState, ConnectionManager, ConnectionState, RealtimeClientBuilder, RealtimeClientOptions,
};
use crate::channel::{ChannelStatus, RealtimeChannel, RealtimeChannelOptions};
use crate::infrastructure::{Backoff, HeartbeatManager};
use crate::messaging::MessageRouter;
use crate::types::constants::{DEFAULT_TIMEOUT, HEARTBEAT_INTERVAL, VSN};
use crate::types::{PushReply, RealtimeError, RealtimeMessage, Result};
use crate::websocket::WebSocketFactory;
use futures::stream::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, RwLock};
use url::Url;

/// The main entry point for interacting with Supabase Realtime.
///
/// `RealtimeClient` owns the single WebSocket connection, demultiplexes
/// inbound frames to channels by topic, and reconnects with backoff after an
/// unexpected disconnect, rejoining every channel that was subscribed.
///
/// # Example
///
/// ```no_run
/// use supabase_realtime_client::{RealtimeClient, RealtimeClientOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RealtimeClient::new(
///     "wss://your-project.supabase.co/realtime/v1",
///     RealtimeClientOptions {
///         api_key: "your-anon-key".to_string(),
///         ..Default::default()
///     }
/// )?;
///
/// client.connect().await?;
/// // Use the client...
/// client.disconnect().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RealtimeClient {
    pub(crate) endpoint: String,
    pub(crate) options: RealtimeClientOptions,

    // Connection manager
    pub(crate) connection: Arc<ConnectionManager>,

    // Consolidated mutable state
    pub(crate) state: Arc<RwLock<ClientState>>,
}

impl RealtimeClient {
    /// Creates a new client. No connection is established until
    /// [`connect()`](Self::connect) is called.
    ///
    /// # Errors
    ///
    /// [`RealtimeError::Auth`] when `options.api_key` is empty.
    pub fn new(endpoint: impl Into<String>, options: RealtimeClientOptions) -> Result<Self> {
        RealtimeClientBuilder::new(endpoint, options).map(|builder| builder.build())
    }

    /// Set connection state and notify watchers
    async fn set_state(&self, new_state: ConnectionState) {
        self.connection.set_state(new_state).await;

        let state = self.state.read().await;
        state.notify_state_change(new_state, state.was_manual_disconnect);
    }

    /// Set manual disconnect flag and notify watchers
    async fn set_manual_disconnect(&self, manual: bool) {
        let mut state = self.state.write().await;
        state.was_manual_disconnect = manual;

        let conn_state = self.connection.state().await;
        state.notify_state_change(conn_state, manual);
    }

    /// Rejoins every channel that was subscribed (or mid-join) when the
    /// connection dropped, in channel creation order. The set captured by
    /// the read loop at drop time takes precedence over the current status,
    /// since a mid-join channel has usually moved to `Errored` by the time
    /// the reconnect completes. A refused rejoin leaves that channel
    /// `Errored` and does not block the others.
    pub async fn resubscribe_all_channels(&self) {
        let (marked, channels) = {
            let mut state = self.state.write().await;
            (
                std::mem::take(&mut state.rejoin_pending),
                state.channels.clone(),
            )
        };
        for channel in channels.iter() {
            let status = channel.status().await;
            let was_active = marked.iter().any(|m| Arc::ptr_eq(m, channel));
            if was_active || status == ChannelStatus::Joined || status == ChannelStatus::Joining {
                if let Err(e) = channel.rejoin().await {
                    tracing::error!("Failed to rejoin channel {}: {}", channel.topic(), e);
                }
            }
        }
    }

    pub(crate) async fn try_reconnect(&self) -> Result<()> {
        if self.state.read().await.was_manual_disconnect {
            tracing::info!("Manual disconnect detected, will not attempt to reconnect");
            return Ok(());
        }

        let policy = &self.options.reconnect;
        let mut backoff = Backoff::new(policy.base_delay, policy.max_delay, policy.jitter);

        loop {
            // A manual disconnect issued mid-backoff cancels the retry loop
            if self.state.read().await.was_manual_disconnect {
                tracing::info!("Manual disconnect detected, stopping reconnection attempts");
                break;
            }
            {
                let state = self.connection.state().await;
                if state == ConnectionState::Open || state == ConnectionState::Connecting {
                    tracing::info!(
                        "Already connected or connecting, stopping reconnection attempts"
                    );
                    break;
                }
            }

            if let Some(max) = policy.max_retries {
                if backoff.attempts() >= max {
                    tracing::error!("Giving up reconnection after {} attempts", max);
                    return Err(RealtimeError::Connection(format!(
                        "reconnect gave up after {} attempts",
                        max
                    )));
                }
            }

            tracing::info!("Attempting to reconnect...");
            match self.connect().await {
                Ok(_) => {
                    tracing::info!("Reconnected successfully");
                    self.resubscribe_all_channels().await;
                    break;
                }
                Err(e) => {
                    tracing::error!("Reconnection attempt failed: {}", e);
                    backoff.wait().await;
                }
            }
        }
        Ok(())
    }

    /// Establishes the WebSocket connection.
    ///
    /// Idempotent while `Open` or `Connecting` (only one in-flight connect
    /// attempt at a time). On success the read loop and heartbeat task are
    /// spawned; from then on the client routes inbound frames to channels
    /// and reconnects automatically unless disconnected manually.
    pub async fn connect(&self) -> Result<()> {
        if !self.connection.begin_connecting().await {
            return Ok(());
        }

        // Nothing from the previous connection carries over: stale read and
        // heartbeat tasks are aborted, and a heartbeat left unacked at drop
        // time must not count against the new connection
        {
            let mut state = self.state.write().await;
            state.task_manager.abort_all();
            state.pending_heartbeat_ref = None;
            state.fail_pending_replies();
        }

        // Build WebSocket URL with query parameters
        let url = self.build_endpoint_url()?;
        tracing::info!("Connecting to {}", &self.endpoint);

        // Create WebSocket connection
        let ws_stream = match WebSocketFactory::create(&url).await {
            Ok(stream) => stream,
            Err(e) => {
                // No watcher notification: the caller (or the reconnect
                // loop itself) decides whether to retry
                self.connection.set_state(ConnectionState::Closed).await;
                return Err(e);
            }
        };
        let (write_half, mut read_half) = ws_stream.split();

        // Give write half to ConnectionManager
        self.connection.set_writer(write_half).await;

        let router = MessageRouter::new(Arc::clone(&self.state));

        // Spawn read task with router using TaskManager
        let self_cloned = self.clone();
        {
            let mut state = self.state.write().await;
            state.task_manager.spawn(async move {
                tracing::debug!("Starting read task");
                while let Some(msg_result) = read_half.next().await {
                    use tokio_tungstenite::tungstenite::Message;

                    match msg_result {
                        Ok(Message::Text(text)) => {
                            match serde_json::from_str::<RealtimeMessage>(&text) {
                                Ok(realtime_msg) => router.route(realtime_msg).await,
                                Err(e) => {
                                    tracing::error!(
                                        "Failed to parse message: {} - Raw: {}",
                                        e,
                                        text
                                    );
                                }
                            }
                        }
                        Ok(Message::Close(frame)) => {
                            match frame {
                                Some(close_frame) => tracing::warn!(
                                    "Server closed connection: code={:?}, reason='{}'",
                                    close_frame.code,
                                    close_frame.reason
                                ),
                                None => tracing::warn!(
                                    "Server closed connection without close frame"
                                ),
                            }
                            break;
                        }
                        Ok(Message::Ping(data)) => {
                            tracing::debug!("Received ping ({} bytes)", data.len());
                        }
                        Ok(Message::Pong(data)) => {
                            tracing::debug!("Received pong ({} bytes)", data.len());
                        }
                        Ok(Message::Binary(data)) => {
                            tracing::warn!(
                                "Received unexpected binary message ({} bytes)",
                                data.len()
                            );
                        }
                        Ok(Message::Frame(_)) => {
                            tracing::debug!("Received raw frame (internal)");
                        }
                        Err(e) => {
                            tracing::error!("WebSocket read error: {}", e);
                            break;
                        }
                    }
                }

                // Transport is gone. Capture which channels were active
                // before failing their in-flight acks: failing an ack moves
                // a mid-join channel to Errored, which a status scan after
                // reconnect would not recognize as replayable.
                let mut rejoin = Vec::new();
                let channels = self_cloned.state.read().await.channels.clone();
                for channel in channels {
                    let status = channel.status().await;
                    if status == ChannelStatus::Joined || status == ChannelStatus::Joining {
                        rejoin.push(channel);
                    }
                }
                {
                    let mut state = self_cloned.state.write().await;
                    state.rejoin_pending = rejoin;
                    state.fail_pending_replies();
                }
                self_cloned.connection.clear_writer().await;
                self_cloned.set_state(ConnectionState::Closed).await;
                tracing::info!("Read task finished");
            });
        }

        // Spawn heartbeat task
        let heartbeat_interval = self.options.heartbeat_interval.unwrap_or(HEARTBEAT_INTERVAL);
        let heartbeat =
            HeartbeatManager::new(Arc::downgrade(&self.connection), Arc::clone(&self.state))
                .with_interval(Duration::from_millis(heartbeat_interval));
        heartbeat.spawn_on(&self.state).await;

        self.set_manual_disconnect(false).await;
        self.set_state(ConnectionState::Open).await;

        tracing::info!("Connected to WebSocket server");
        Ok(())
    }

    /// Creates or retrieves the channel for a topic.
    ///
    /// Topics are unique per client: repeated calls with the same topic
    /// return the existing channel. The `realtime:` prefix is added
    /// automatically.
    pub async fn channel(
        &self,
        topic: &str,
        options: RealtimeChannelOptions,
    ) -> Arc<RealtimeChannel> {
        let full_topic = format!("realtime:{}", topic);

        // Lookup and insert under one write lock, so concurrent calls for
        // the same topic cannot race in a duplicate registration
        let mut state = self.state.write().await;
        if let Some(existing_channel) = state
            .channels
            .iter()
            .find(|channel| channel.topic() == full_topic)
        {
            return Arc::clone(existing_channel);
        }

        let new_channel = Arc::new(RealtimeChannel::new(
            full_topic,
            Arc::new(self.clone()),
            options,
        ));
        state.channels.push(Arc::clone(&new_channel));

        new_channel
    }

    /// Removes a channel, freeing its topic.
    ///
    /// # Errors
    ///
    /// [`RealtimeError::Channel`] unless the channel has reached `Closed`
    /// (call [`RealtimeChannel::unsubscribe`] first).
    pub async fn remove_channel(&self, topic: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let Some(position) = state
            .channels
            .iter()
            .position(|channel| channel.topic() == topic)
        else {
            return Err(RealtimeError::Channel(format!(
                "no channel for topic '{}'",
                topic
            )));
        };

        if state.channels[position].status().await != ChannelStatus::Closed {
            return Err(RealtimeError::Channel(format!(
                "channel '{}' must be closed before removal",
                topic
            )));
        }

        state.channels.remove(position);
        tracing::debug!("Removed channel: {}", topic);
        Ok(())
    }

    /// Gracefully disconnects from the server.
    ///
    /// Marks the disconnect as manual (no automatic reconnection), aborts
    /// background tasks, fails in-flight acks and closes the socket. Call
    /// [`connect()`](Self::connect) to reconnect afterwards. Channel listener
    /// registrations are kept.
    pub async fn disconnect(&self) -> Result<()> {
        // The manual flag is set unconditionally: the connection state is
        // Closed during reconnect backoff, and the retry loop consults the
        // flag to stop dialing
        self.set_manual_disconnect(true).await;
        tracing::info!("Disconnecting from WebSocket server");

        {
            let mut state = self.state.write().await;
            state.task_manager.abort_all();
            state.pending_heartbeat_ref = None;
            state.rejoin_pending.clear();
            state.fail_pending_replies();
        }

        self.connection.close().await?;

        tracing::info!("Disconnected from WebSocket server");
        Ok(())
    }

    /// Checks whether the client is currently connected to the server.
    pub async fn is_connected(&self) -> bool {
        self.connection.is_connected().await
    }

    /// Build the WebSocket endpoint URL with query parameters
    fn build_endpoint_url(&self) -> Result<String> {
        let mut url = Url::parse(&self.endpoint)?;

        // Add required query parameters
        url.query_pairs_mut()
            .append_pair("apikey", &self.options.api_key)
            .append_pair("vsn", VSN);

        Ok(url.to_string())
    }

    /// Generate next message reference
    pub async fn make_ref(&self) -> String {
        let mut state = self.state.write().await;
        state.make_ref()
    }

    /// Push a message to the server. Fails fast when not connected;
    /// nothing is queued for later delivery.
    pub async fn push(&self, message: RealtimeMessage) -> Result<()> {
        if !self.is_connected().await {
            return Err(RealtimeError::NotConnected);
        }

        self.connection.send_message(message).await?;
        Ok(())
    }

    /// Pushes a request frame and waits for the `phx_reply` correlated by
    /// `msg_ref`, bounded by the configured ack timeout.
    pub(crate) async fn push_and_await_reply(
        &self,
        message: RealtimeMessage,
        msg_ref: String,
    ) -> Result<PushReply> {
        let reply_rx = self.register_reply(msg_ref.clone()).await;

        if let Err(e) = self.push(message).await {
            self.drop_reply(&msg_ref).await;
            return Err(e);
        }

        match tokio::time::timeout(self.ack_timeout(), reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(RealtimeError::Connection(
                "connection closed while awaiting ack".to_string(),
            )),
            Err(_) => {
                self.drop_reply(&msg_ref).await;
                Err(RealtimeError::Timeout)
            }
        }
    }

    pub(crate) async fn register_reply(&self, msg_ref: String) -> oneshot::Receiver<PushReply> {
        let (tx, rx) = oneshot::channel();
        self.state
            .write()
            .await
            .pending_replies
            .insert(msg_ref, tx);
        rx
    }

    pub(crate) async fn drop_reply(&self, msg_ref: &str) {
        self.state.write().await.pending_replies.remove(msg_ref);
    }

    pub(crate) fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.options.timeout.unwrap_or(DEFAULT_TIMEOUT))
    }

    /// Get access token
    pub fn access_token(&self) -> Option<&str> {
        self.options.access_token.as_deref()
    }

    /// Get API key
    pub fn api_key(&self) -> &str {
        &self.options.api_key
    }
}
