//! # Supabase Realtime Client
//!
//! A Rust client for Supabase Realtime (Phoenix Channels WebSocket protocol):
//! many logical channels multiplexed over one socket, typed decoding of
//! Postgres row changes, broadcasts and presence diffs, and transparent
//! reconnection that rejoins subscribed channels.
//!
//! ## Example
//!
//! ```no_run
//! use supabase_realtime_client::{
//!     PostgresChangeEvent, PostgresChangesFilter, RealtimeClient, RealtimeClientOptions,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RealtimeClient::new(
//!         "wss://your-project.supabase.co/realtime/v1",
//!         RealtimeClientOptions {
//!             api_key: "your-anon-key".to_string(),
//!             ..Default::default()
//!         },
//!     )?;
//!
//!     client.connect().await?;
//!
//!     let channel = client.channel("db-changes", Default::default()).await;
//!     channel
//!         .on_postgres_changes(
//!             PostgresChangesFilter::new(PostgresChangeEvent::All, "public").table("todos"),
//!             |payload| {
//!                 println!("change: {:?}", payload);
//!                 Ok(())
//!             },
//!         )
//!         .await;
//!     channel.subscribe().await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod client;
pub mod events;
pub mod infrastructure;
pub mod messaging;
pub mod types;
pub mod websocket;

pub use channel::{
    ChannelStatus, EventPayload, ListenerError, PostgresChangeEvent, PostgresChangesFilter,
    RealtimeChannel, RealtimeChannelOptions,
};
pub use client::{RealtimeClient, RealtimeClientOptions, ReconnectPolicy};
pub use events::{BroadcastMessage, ChannelAction, Column, PostgresChange};
pub use messaging::{ChannelEvent, SystemEvent};
pub use types::{RealtimeError, RealtimeMessage};
