//! Preferences cache — the session's local copy of per-entity choices.
//!
//! Reads refresh from the latest host snapshot, writes apply locally at
//! once and persist in the background. A snapshot overwrites an entity's
//! entry wholesale, but only a snapshot delivered after the entry was last
//! synced: a local write is not reverted by the snapshot it was made on.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use quicktimer_domain::id::EntityId;
use quicktimer_domain::preferences::{
    DEFAULT_HISTORY_LIMIT, HistoryEntry, PreferencesPatch, PreferencesRecord,
};
use quicktimer_domain::schedule::ScheduleRequest;
use quicktimer_domain::snapshot::HostSnapshot;

use crate::ports::SchedulerBackend;

#[derive(Debug)]
struct Entry {
    record: PreferencesRecord,
    synced: u64,
}

/// Best-effort read-through / write-through preferences cache.
pub struct PreferencesCache<B> {
    backend: B,
    history_limit: usize,
    entries: HashMap<EntityId, Entry>,
    snapshot: Option<Arc<HostSnapshot>>,
    generation: u64,
}

impl<B> PreferencesCache<B>
where
    B: SchedulerBackend + Clone + 'static,
{
    /// Create an empty cache persisting through `backend`.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            history_limit: DEFAULT_HISTORY_LIMIT,
            entries: HashMap::new(),
            snapshot: None,
            generation: 0,
        }
    }

    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Cached record for `entity_id`, refreshed from the latest snapshot
    /// when that snapshot is newer than the entry.
    pub fn read(&mut self, entity_id: &EntityId) -> PreferencesRecord {
        let generation = self.generation;
        let fresh = self
            .snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.preferences_for(entity_id))
            .cloned();
        let stale = self
            .entries
            .get(entity_id)
            .is_none_or(|entry| entry.synced < generation);

        if let (Some(record), true) = (fresh, stale) {
            self.entries.insert(
                entity_id.clone(),
                Entry {
                    record,
                    synced: generation,
                },
            );
        }

        self.entries
            .get(entity_id)
            .map(|entry| entry.record.clone())
            .unwrap_or_default()
    }

    /// Take every entity's preferences from `snapshot`, snapshot-wins.
    pub fn refresh_all(&mut self, snapshot: Arc<HostSnapshot>) {
        self.generation += 1;
        for (key, record) in &snapshot.preferences {
            let Ok(entity_id) = EntityId::new(key.as_str()) else {
                debug!(key = %key, "ignoring preferences under malformed entity id");
                continue;
            };
            self.entries.insert(
                entity_id,
                Entry {
                    record: record.clone(),
                    synced: self.generation,
                },
            );
        }
        self.snapshot = Some(snapshot);
    }

    /// Merge `patch` locally and persist it in the background.
    ///
    /// A persistence failure is logged and leaves the local copy as is.
    pub fn write(&mut self, entity_id: &EntityId, patch: PreferencesPatch) -> JoinHandle<()> {
        let generation = self.generation;
        self.entries
            .entry(entity_id.clone())
            .or_insert_with(|| Entry {
                record: PreferencesRecord::default(),
                synced: generation,
            })
            .record
            .apply(&patch);

        let backend = self.backend.clone();
        let entity_id = entity_id.clone();
        tokio::spawn(async move {
            if let Err(err) = backend.persist_preferences(entity_id.clone(), patch).await {
                warn!(entity_id = %entity_id, error = %err, "failed to persist preferences");
            }
        })
    }

    /// Remember a successful schedule: its choices and a history entry.
    pub fn record_schedule(
        &mut self,
        entity_id: &EntityId,
        request: &ScheduleRequest,
    ) -> JoinHandle<()> {
        let limit = self.history_limit;
        let handle = self.write(entity_id, PreferencesPatch::from_request(request));
        if let Some(entry) = self.entries.get_mut(entity_id) {
            entry.record.push_history(HistoryEntry::from(request), limit);
        }
        handle
    }
}
