use crate::types::constants::{channel_events, phoenix_events};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Type-safe channel events
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelEvent {
    /// PostgreSQL database changes
    PostgresChanges,

    /// Custom broadcast event
    Broadcast,

    /// Presence tracking messages sent by this client
    Presence,

    /// Full presence state pushed by the server after join
    PresenceState,

    /// Presence joins/leaves pushed by the server
    PresenceDiff,

    /// System events (phx_*)
    System(SystemEvent),

    /// Custom user-defined event
    Custom(String),
}

impl ChannelEvent {
    /// Parse a wire event name into a ChannelEvent
    pub fn parse(s: &str) -> Self {
        match s {
            channel_events::POSTGRES_CHANGES => Self::PostgresChanges,
            channel_events::BROADCAST => Self::Broadcast,
            channel_events::PRESENCE => Self::Presence,
            channel_events::PRESENCE_STATE => Self::PresenceState,
            channel_events::PRESENCE_DIFF => Self::PresenceDiff,
            _ if s.starts_with("phx_") || s == phoenix_events::HEARTBEAT => {
                Self::System(SystemEvent::parse(s))
            }
            _ => Self::Custom(s.to_string()),
        }
    }

    /// Convert event to its wire name
    pub fn as_str(&self) -> &str {
        match self {
            Self::PostgresChanges => channel_events::POSTGRES_CHANGES,
            Self::Broadcast => channel_events::BROADCAST,
            Self::Presence => channel_events::PRESENCE,
            Self::PresenceState => channel_events::PRESENCE_STATE,
            Self::PresenceDiff => channel_events::PRESENCE_DIFF,
            Self::System(sys) => sys.as_str(),
            Self::Custom(s) => s,
        }
    }
}

impl From<&str> for ChannelEvent {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for ChannelEvent {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl std::fmt::Display for ChannelEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// The wire frame carries the event as a bare string, so (de)serialization
// goes through the name mapping rather than a derived enum representation.
impl Serialize for ChannelEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChannelEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Phoenix system events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemEvent {
    /// Join channel
    Join,

    /// Leave channel
    Leave,

    /// Reply to a message
    Reply,

    /// Close channel
    Close,

    /// Error event
    Error,

    /// Heartbeat
    Heartbeat,
}

impl SystemEvent {
    pub fn parse(s: &str) -> Self {
        match s {
            phoenix_events::JOIN => Self::Join,
            phoenix_events::LEAVE => Self::Leave,
            phoenix_events::REPLY => Self::Reply,
            phoenix_events::CLOSE => Self::Close,
            phoenix_events::ERROR => Self::Error,
            phoenix_events::HEARTBEAT => Self::Heartbeat,
            // Unknown phx_* events are treated as errors
            _ => Self::Error,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Join => phoenix_events::JOIN,
            Self::Leave => phoenix_events::LEAVE,
            Self::Reply => phoenix_events::REPLY,
            Self::Close => phoenix_events::CLOSE,
            Self::Error => phoenix_events::ERROR,
            Self::Heartbeat => phoenix_events::HEARTBEAT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_event_parse() {
        assert_eq!(
            ChannelEvent::parse("postgres_changes"),
            ChannelEvent::PostgresChanges
        );
        assert_eq!(ChannelEvent::parse("broadcast"), ChannelEvent::Broadcast);
        assert_eq!(ChannelEvent::parse("presence"), ChannelEvent::Presence);
        assert_eq!(
            ChannelEvent::parse("presence_diff"),
            ChannelEvent::PresenceDiff
        );
        assert_eq!(
            ChannelEvent::parse("phx_join"),
            ChannelEvent::System(SystemEvent::Join)
        );
        assert_eq!(
            ChannelEvent::parse("my_custom_event"),
            ChannelEvent::Custom("my_custom_event".to_string())
        );
    }

    #[test]
    fn test_system_event_round_trip() {
        let events = vec![
            SystemEvent::Join,
            SystemEvent::Leave,
            SystemEvent::Reply,
            SystemEvent::Close,
            SystemEvent::Error,
            SystemEvent::Heartbeat,
        ];

        for event in events {
            let s = event.as_str();
            assert_eq!(SystemEvent::parse(s), event);
        }
    }

    #[test]
    fn test_channel_event_string_serde() {
        let json = serde_json::to_string(&ChannelEvent::PresenceDiff).unwrap();
        assert_eq!(json, r#""presence_diff""#);

        let parsed: ChannelEvent = serde_json::from_str(r#""sparkle""#).unwrap();
        assert_eq!(parsed, ChannelEvent::Custom("sparkle".to_string()));
    }
}
