use super::action::{BroadcastMessage, ChannelAction, Column, PostgresChange, Record};
use crate::channel::{RawPresenceDiff, RawPresenceState};
use crate::messaging::ChannelEvent;
use crate::types::{RealtimeError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// A server-pushed payload decoded into its typed form.
#[derive(Debug, Clone)]
pub enum DecodedEvent {
    PostgresChange(PostgresChange),
    Broadcast(BroadcastMessage),
    PresenceState(RawPresenceState),
    PresenceDiff(RawPresenceDiff),
}

// Server shape for postgres_changes, before per-kind validation. The server
// wraps the change as {"ids": [...], "data": {...}} when filters were
// registered by id; both forms are accepted.
#[derive(Deserialize)]
struct RawChange {
    #[serde(rename = "type")]
    kind: String,
    schema: String,
    table: String,
    commit_timestamp: DateTime<Utc>,
    #[serde(default)]
    columns: Vec<Column>,
    record: Option<Record>,
    old_record: Option<Record>,
    #[serde(default)]
    errors: Option<Vec<String>>,
}

/// Decodes a raw server payload according to its declared event kind.
///
/// Pure and side-effect free. Column values are passed through as generic
/// JSON leaves; no native type casting is attempted. Fails with
/// [`RealtimeError::Decode`] when the payload lacks fields required by the
/// event kind, or when the kind itself is not decodable.
pub fn decode(event: &ChannelEvent, payload: &Value) -> Result<DecodedEvent> {
    match event {
        ChannelEvent::PostgresChanges => decode_postgres_change(payload),
        ChannelEvent::Broadcast => decode_broadcast(payload),
        ChannelEvent::PresenceState => {
            let state: RawPresenceState = serde_json::from_value(payload.clone())
                .map_err(|e| RealtimeError::Decode(format!("invalid presence_state: {}", e)))?;
            Ok(DecodedEvent::PresenceState(state))
        }
        ChannelEvent::PresenceDiff => {
            let diff: RawPresenceDiff = serde_json::from_value(payload.clone())
                .map_err(|e| RealtimeError::Decode(format!("invalid presence_diff: {}", e)))?;
            Ok(DecodedEvent::PresenceDiff(diff))
        }
        other => Err(RealtimeError::Decode(format!(
            "event '{}' has no decodable payload",
            other.as_str()
        ))),
    }
}

fn decode_postgres_change(payload: &Value) -> Result<DecodedEvent> {
    // Unwrap the {ids, data} envelope when present
    let change = payload.get("data").unwrap_or(payload);

    let raw: RawChange = serde_json::from_value(change.clone())
        .map_err(|e| RealtimeError::Decode(format!("invalid postgres_changes payload: {}", e)))?;

    let action = match raw.kind.as_str() {
        "INSERT" => ChannelAction::Insert {
            record: require(raw.record, "record", "INSERT")?,
            columns: raw.columns,
            commit_timestamp: raw.commit_timestamp,
        },
        "UPDATE" => ChannelAction::Update {
            record: require(raw.record, "record", "UPDATE")?,
            old_record: require(raw.old_record, "old_record", "UPDATE")?,
            columns: raw.columns,
            commit_timestamp: raw.commit_timestamp,
        },
        "DELETE" => ChannelAction::Delete {
            old_record: require(raw.old_record, "old_record", "DELETE")?,
            columns: raw.columns,
            commit_timestamp: raw.commit_timestamp,
        },
        "SELECT" => ChannelAction::Select {
            record: require(raw.record, "record", "SELECT")?,
            columns: raw.columns,
            commit_timestamp: raw.commit_timestamp,
        },
        other => {
            return Err(RealtimeError::Decode(format!(
                "unknown change type '{}'",
                other
            )));
        }
    };

    Ok(DecodedEvent::PostgresChange(PostgresChange {
        schema: raw.schema,
        table: raw.table,
        errors: raw.errors,
        action,
    }))
}

fn decode_broadcast(payload: &Value) -> Result<DecodedEvent> {
    let event = payload
        .get("event")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RealtimeError::Decode("broadcast payload missing 'event'".to_string()))?
        .to_string();
    let inner = payload.get("payload").cloned().unwrap_or(Value::Null);

    Ok(DecodedEvent::Broadcast(BroadcastMessage {
        event,
        payload: inner,
    }))
}

fn require(field: Option<Record>, name: &str, kind: &str) -> Result<Record> {
    field.ok_or_else(|| RealtimeError::Decode(format!("{} payload missing '{}'", kind, name)))
}
