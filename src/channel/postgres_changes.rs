use crate::events::PostgresChange;
use serde::{Deserialize, Serialize};

/// Which change kinds a listener is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PostgresChangeEvent {
    #[serde(rename = "*")]
    All,
    Insert,
    Update,
    Delete,
    Select,
}

impl PostgresChangeEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "*",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Select => "SELECT",
        }
    }
}

/// Selects which `postgres_changes` events a listener receives.
///
/// The `filter` string (e.g. `"id=eq.42"`) is forwarded to the server with
/// the join request; row filtering happens server side, so locally a change
/// is matched on change kind, schema and table only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresChangesFilter {
    pub event: PostgresChangeEvent,
    pub schema: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl PostgresChangesFilter {
    pub fn new(event: PostgresChangeEvent, schema: impl Into<String>) -> Self {
        Self {
            event,
            schema: schema.into(),
            table: None,
            filter: None,
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Whether a decoded change is selected by this filter.
    pub fn matches(&self, change: &PostgresChange) -> bool {
        if self.event != PostgresChangeEvent::All && self.event.as_str() != change.action.kind() {
            return false;
        }
        if self.schema != change.schema {
            return false;
        }
        if let Some(table) = &self.table {
            if table != &change.table {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChannelAction;
    use chrono::Utc;
    use std::collections::HashMap;

    fn change(kind: &str, schema: &str, table: &str) -> PostgresChange {
        let action = match kind {
            "INSERT" => ChannelAction::Insert {
                record: HashMap::new(),
                columns: Vec::new(),
                commit_timestamp: Utc::now(),
            },
            "DELETE" => ChannelAction::Delete {
                old_record: HashMap::new(),
                columns: Vec::new(),
                commit_timestamp: Utc::now(),
            },
            _ => unreachable!(),
        };
        PostgresChange {
            schema: schema.to_string(),
            table: table.to_string(),
            errors: None,
            action,
        }
    }

    #[test]
    fn test_filter_matches_on_kind_schema_table() {
        let filter =
            PostgresChangesFilter::new(PostgresChangeEvent::Insert, "public").table("todos");

        assert!(filter.matches(&change("INSERT", "public", "todos")));
        assert!(!filter.matches(&change("DELETE", "public", "todos")));
        assert!(!filter.matches(&change("INSERT", "auth", "todos")));
        assert!(!filter.matches(&change("INSERT", "public", "users")));
    }

    #[test]
    fn test_wildcard_event_and_missing_table_match_everything() {
        let filter = PostgresChangesFilter::new(PostgresChangeEvent::All, "public");

        assert!(filter.matches(&change("INSERT", "public", "todos")));
        assert!(filter.matches(&change("DELETE", "public", "users")));
    }

    #[test]
    fn test_filter_serializes_wildcard_event() {
        let filter = PostgresChangesFilter::new(PostgresChangeEvent::All, "public");
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json.get("event").unwrap(), "*");
    }
}
