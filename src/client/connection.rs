use crate::types::{error::Result, message::RealtimeMessage, RealtimeError};
use futures::stream::SplitSink;
use futures::SinkExt;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
    Closing,
}

/// Owns the write half of the single socket and the connection state.
///
/// All outbound frames go through [`send_message`](Self::send_message); the
/// write lock serializes writers so frames are never interleaved.
pub struct ConnectionManager {
    ws_write: Arc<RwLock<Option<SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>>>>,
    state: Arc<RwLock<ConnectionState>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            ws_write: Arc::new(RwLock::new(None)),
            state: Arc::new(RwLock::new(ConnectionState::Closed)),
        }
    }

    /// Sets the WebSocket write sink (called after successful connection)
    pub async fn set_writer(
        &self,
        writer: SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>,
    ) {
        let mut ws = self.ws_write.write().await;
        *ws = Some(writer);
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn set_state(&self, new_state: ConnectionState) {
        let mut state = self.state.write().await;
        *state = new_state;
    }

    /// Claims the connecting slot under one write lock. Returns `false`
    /// while `Open` or `Connecting`, so only one connect attempt can be in
    /// flight at a time.
    pub async fn begin_connecting(&self) -> bool {
        let mut state = self.state.write().await;
        match *state {
            ConnectionState::Open | ConnectionState::Connecting => false,
            _ => {
                *state = ConnectionState::Connecting;
                true
            }
        }
    }

    pub async fn is_connected(&self) -> bool {
        *self.state.read().await == ConnectionState::Open
    }

    /// Serializes and writes one frame. Fails fast when the socket is gone.
    pub async fn send_message(&self, msg: RealtimeMessage) -> Result<()> {
        let json = serde_json::to_string(&msg)?;
        let message = Message::Text(json.into());

        let mut ws_guard = self.ws_write.write().await;
        match ws_guard.as_mut() {
            Some(ws) => {
                ws.send(message).await?;
                Ok(())
            }
            None => Err(RealtimeError::NotConnected),
        }
    }

    /// Closes the WebSocket connection gracefully
    pub async fn close(&self) -> Result<()> {
        self.set_state(ConnectionState::Closing).await;

        let mut ws_guard = self.ws_write.write().await;
        if let Some(ws) = ws_guard.as_mut() {
            if let Err(e) = ws.close().await {
                tracing::debug!("Close handshake failed: {}", e);
            }
        }
        *ws_guard = None;
        drop(ws_guard);

        self.set_state(ConnectionState::Closed).await;

        Ok(())
    }

    /// Clears the writer without a close handshake (used when the read side
    /// already observed the drop).
    pub async fn clear_writer(&self) {
        let mut ws = self.ws_write.write().await;
        *ws = None;
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
