// Module declarations
mod config;
mod core;
mod postgres_changes;
mod presence;
mod state;

// Public API exports
pub use config::{ChannelJoinConfig, JoinPayload, PostgresChangesConfig};
pub use core::{RealtimeChannel, RealtimeChannelOptions};
pub use postgres_changes::{PostgresChangeEvent, PostgresChangesFilter};
pub use presence::{
    Presence, PresenceMeta, PresenceState, RawPresenceDiff, RawPresenceState,
};
pub use state::{ChannelStatus, EventPayload, ListenerError};
