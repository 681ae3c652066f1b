use super::{ClientState, ConnectionManager, ConnectionState, RealtimeClient};
use crate::types::constants::{RECONNECT_BASE_DELAY, RECONNECT_MAX_DELAY};
use crate::types::{RealtimeError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

/// How the client retries after an unexpected disconnect.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// First retry delay; doubles on every failed attempt.
    pub base_delay: Duration,
    /// Upper bound for the delay between attempts.
    pub max_delay: Duration,
    /// Give up after this many attempts. `None` retries forever.
    pub max_retries: Option<u32>,
    /// Randomize each delay to avoid reconnect stampedes.
    pub jitter: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(RECONNECT_BASE_DELAY),
            max_delay: Duration::from_millis(RECONNECT_MAX_DELAY),
            max_retries: None,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RealtimeClientOptions {
    pub api_key: String,
    /// Ack timeout for join/leave requests, in milliseconds.
    pub timeout: Option<u64>,
    /// Heartbeat interval, in milliseconds.
    pub heartbeat_interval: Option<u64>,
    pub access_token: Option<String>,
    pub reconnect: ReconnectPolicy,
}

impl Default for RealtimeClientOptions {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            timeout: None,
            heartbeat_interval: None,
            access_token: None,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Builder for RealtimeClient that handles initialization
pub struct RealtimeClientBuilder {
    endpoint: String,
    options: RealtimeClientOptions,
}

impl RealtimeClientBuilder {
    /// Create a new builder
    pub fn new(endpoint: impl Into<String>, options: RealtimeClientOptions) -> Result<Self> {
        let endpoint = endpoint.into();

        // Validate API key is provided
        if options.api_key.is_empty() {
            return Err(RealtimeError::Auth("API key is required".to_string()));
        }

        Ok(Self { endpoint, options })
    }

    /// Build the client and spawn the reconnection watcher
    pub fn build(self) -> RealtimeClient {
        let mut client_state = ClientState::new();

        // Initialize state watcher channel
        let (state_tx, state_rx) = watch::channel((ConnectionState::Closed, false));
        client_state.state_change_tx = Some(state_tx);

        let client = RealtimeClient {
            endpoint: self.endpoint,
            options: self.options,
            connection: Arc::new(ConnectionManager::new()),
            state: Arc::new(RwLock::new(client_state)),
        };

        // Spawn reconnection watcher task
        let client_for_watcher = client.clone();
        tokio::spawn(async move {
            let mut rx = state_rx;

            while rx.changed().await.is_ok() {
                let (state, was_manual) = *rx.borrow_and_update();

                // Reconnect if closed/disconnected AND not manual
                if matches!(state, ConnectionState::Closed) && !was_manual {
                    tracing::info!("State watcher detected disconnect, attempting reconnection...");

                    if let Err(e) = client_for_watcher.try_reconnect().await {
                        tracing::error!("Reconnection watcher failed: {}", e);
                    }
                }
            }
            tracing::info!("Reconnection watcher task finished");
        });

        client
    }
}
