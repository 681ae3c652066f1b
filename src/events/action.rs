use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A generic row as sent by the server: column name to raw JSON value.
///
/// Values are left as JSON leaves; reinterpret them with the [`Column`]
/// descriptors that accompany the change.
pub type Record = HashMap<String, Value>;

/// Describes one column of the row carried by a change event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

/// One row-level change, tagged by the kind of statement that produced it.
///
/// Exactly the fields relevant to the variant are populated: `Insert` and
/// `Select` never carry an old record, `Delete` never carries a new one.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ChannelAction {
    Insert {
        record: Record,
        columns: Vec<Column>,
        commit_timestamp: DateTime<Utc>,
    },
    Update {
        record: Record,
        old_record: Record,
        columns: Vec<Column>,
        commit_timestamp: DateTime<Utc>,
    },
    Delete {
        old_record: Record,
        columns: Vec<Column>,
        commit_timestamp: DateTime<Utc>,
    },
    Select {
        record: Record,
        columns: Vec<Column>,
        commit_timestamp: DateTime<Utc>,
    },
}

impl ChannelAction {
    pub fn columns(&self) -> &[Column] {
        match self {
            Self::Insert { columns, .. }
            | Self::Update { columns, .. }
            | Self::Delete { columns, .. }
            | Self::Select { columns, .. } => columns,
        }
    }

    pub fn commit_timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Insert {
                commit_timestamp, ..
            }
            | Self::Update {
                commit_timestamp, ..
            }
            | Self::Delete {
                commit_timestamp, ..
            }
            | Self::Select {
                commit_timestamp, ..
            } => *commit_timestamp,
        }
    }

    /// The new row, if the variant has one.
    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::Insert { record, .. }
            | Self::Update { record, .. }
            | Self::Select { record, .. } => Some(record),
            Self::Delete { .. } => None,
        }
    }

    /// The previous row, if the variant has one.
    pub fn old_record(&self) -> Option<&Record> {
        match self {
            Self::Update { old_record, .. } | Self::Delete { old_record, .. } => Some(old_record),
            Self::Insert { .. } | Self::Select { .. } => None,
        }
    }

    /// Wire name of the change kind ("INSERT", "UPDATE", ...).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "INSERT",
            Self::Update { .. } => "UPDATE",
            Self::Delete { .. } => "DELETE",
            Self::Select { .. } => "SELECT",
        }
    }
}

/// A decoded `postgres_changes` event: the change plus the routing metadata
/// dispatch filters match against.
#[derive(Debug, Clone)]
pub struct PostgresChange {
    pub schema: String,
    pub table: String,
    pub errors: Option<Vec<String>>,
    pub action: ChannelAction,
}

/// An application-defined message fanned out to all subscribers of a topic.
#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    pub event: String,
    pub payload: Value,
}
