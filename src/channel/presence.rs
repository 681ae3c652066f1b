use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Presence meta entry as sent by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPresenceMeta {
    pub phx_ref: Option<String>,
    pub phx_ref_prev: Option<String>,
    #[serde(flatten)]
    pub data: HashMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPresenceEntries {
    pub metas: Vec<RawPresenceMeta>,
}

/// Server format: presence key to meta entries.
pub type RawPresenceState = HashMap<String, RawPresenceEntries>;

/// Joins/leaves pushed by the server on every presence change.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPresenceDiff {
    #[serde(default)]
    pub joins: RawPresenceState,
    #[serde(default)]
    pub leaves: RawPresenceState,
}

/// One tracked client, keyed by the server-assigned presence ref.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceMeta {
    pub presence_ref: String,
    #[serde(flatten)]
    pub data: HashMap<String, Value>,
}

pub type PresenceState = HashMap<String, Vec<PresenceMeta>>;

/// Per-channel view of who is currently tracked on the topic.
///
/// `presence_state` frames replace the whole view; `presence_diff` frames
/// apply incremental joins and leaves against it.
#[derive(Debug, Clone, Default)]
pub struct Presence {
    state: PresenceState,
}

impl Presence {
    /// Replaces the local view with a full state pushed by the server.
    pub fn sync_state(&mut self, new_state: RawPresenceState) {
        self.state = Self::transform_state(new_state);
    }

    /// Applies incremental joins/leaves to the local view.
    pub fn sync_diff(&mut self, diff: RawPresenceDiff) {
        for (key, metas) in Self::transform_state(diff.joins) {
            self.state.entry(key).or_default().extend(metas);
        }

        for (key, metas) in Self::transform_state(diff.leaves) {
            if let Some(existing) = self.state.get_mut(&key) {
                existing.retain(|meta| {
                    !metas.iter().any(|left| left.presence_ref == meta.presence_ref)
                });
                if existing.is_empty() {
                    self.state.remove(&key);
                }
            }
        }
    }

    /// Snapshot of the currently tracked clients.
    pub fn list(&self) -> Vec<(String, Vec<PresenceMeta>)> {
        self.state
            .iter()
            .map(|(key, metas)| (key.clone(), metas.clone()))
            .collect()
    }

    fn transform_state(raw_state: RawPresenceState) -> PresenceState {
        raw_state
            .into_iter()
            .map(|(key, raw_entries)| {
                let entries: Vec<PresenceMeta> = raw_entries
                    .metas
                    .into_iter()
                    .map(|raw_meta| PresenceMeta {
                        presence_ref: raw_meta.phx_ref.unwrap_or_default(),
                        data: raw_meta.data,
                    })
                    .collect();
                (key, entries)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_state(entries: &[(&str, &str)]) -> RawPresenceState {
        let mut state = RawPresenceState::new();
        for (key, phx_ref) in entries {
            state
                .entry(key.to_string())
                .or_insert_with(|| RawPresenceEntries { metas: Vec::new() })
                .metas
                .push(RawPresenceMeta {
                    phx_ref: Some(phx_ref.to_string()),
                    phx_ref_prev: None,
                    data: HashMap::new(),
                });
        }
        state
    }

    #[test]
    fn test_sync_state_replaces_view() {
        let mut presence = Presence::default();
        presence.sync_state(raw_state(&[("alice", "r1"), ("bob", "r2")]));
        assert_eq!(presence.list().len(), 2);

        presence.sync_state(raw_state(&[("carol", "r3")]));
        let list = presence.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].0, "carol");
    }

    #[test]
    fn test_sync_diff_applies_joins_and_leaves() {
        let mut presence = Presence::default();
        presence.sync_state(raw_state(&[("alice", "r1")]));

        presence.sync_diff(RawPresenceDiff {
            joins: raw_state(&[("bob", "r2")]),
            leaves: RawPresenceState::new(),
        });
        assert_eq!(presence.list().len(), 2);

        presence.sync_diff(RawPresenceDiff {
            joins: RawPresenceState::new(),
            leaves: raw_state(&[("alice", "r1")]),
        });
        let list = presence.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].0, "bob");
    }
}
