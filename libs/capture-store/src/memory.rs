use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use capture_api::{
    HistoryStore, Message, SearchQuery, StoreError, TraceStore, TracerConfig, profile_or_default,
};

use crate::partition::{HistoryLog, TracePartition, filter_counts};

// ═══════════════════════════════════════════════════════════════
//  MemoryStore
// ═══════════════════════════════════════════════════════════════

/// Volatile store for tests and ephemeral runs.
///
/// Holds one profile's history log and the trace registry with every trace
/// partition, all behind a single mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    closed: bool,
    history: HistoryLog,
    traces: BTreeMap<String, TracerConfig>,
    partitions: HashMap<(String, String), TracePartition>,
}

impl Inner {
    fn open(&mut self) -> Result<&mut Self, StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        Ok(self)
    }
}

fn partition_id(profile: &str, key: &str) -> (String, String) {
    (profile_or_default(profile).to_string(), key.to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("memory store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl HistoryStore for MemoryStore {
    fn append(&self, message: Message) -> Result<u64, StoreError> {
        let mut guard = self.lock();
        let inner = guard.open()?;
        Ok(inner.history.append(message).id)
    }

    fn archive(&self, target: &str) -> Result<usize, StoreError> {
        let mut guard = self.lock();
        Ok(guard.open()?.history.archive(target))
    }

    fn delete(&self, target: &str) -> Result<usize, StoreError> {
        let mut guard = self.lock();
        Ok(guard.open()?.history.delete(target))
    }

    fn count(&self, archived: bool) -> Result<usize, StoreError> {
        let mut guard = self.lock();
        Ok(guard.open()?.history.count(archived))
    }

    fn search(&self, query: &SearchQuery) -> Result<Vec<Message>, StoreError> {
        let mut guard = self.lock();
        Ok(guard.open()?.history.search(query))
    }

    fn topics(&self, archived: bool) -> Result<Vec<String>, StoreError> {
        let mut guard = self.lock();
        Ok(guard.open()?.history.topics(archived))
    }

    fn close(&self) -> Result<(), StoreError> {
        self.lock().closed = true;
        Ok(())
    }
}

impl TraceStore for MemoryStore {
    fn add_trace(&self, cfg: TracerConfig) -> Result<(), StoreError> {
        let mut guard = self.lock();
        let inner = guard.open()?;
        let id = partition_id(&cfg.profile, &cfg.key);
        if inner.partitions.get(&id).is_some_and(|p| !p.messages.is_empty()) {
            return Err(StoreError::TraceExists {
                profile: id.0,
                key: id.1,
            });
        }
        if let Some(existing) = inner.traces.get(&cfg.key) {
            if existing.profile_name() != cfg.profile_name() {
                return Err(StoreError::TraceExists {
                    profile: existing.profile_name().to_string(),
                    key: cfg.key,
                });
            }
        }
        inner.partitions.entry(id).or_default();
        inner.traces.insert(cfg.key.clone(), cfg);
        Ok(())
    }

    fn remove_trace(&self, key: &str) -> Result<(), StoreError> {
        let mut guard = self.lock();
        match guard.open()?.traces.remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::TraceNotFound(key.to_string())),
        }
    }

    fn load_traces(&self) -> Result<BTreeMap<String, TracerConfig>, StoreError> {
        let mut guard = self.lock();
        Ok(guard.open()?.traces.clone())
    }

    fn save_traces(&self, traces: &BTreeMap<String, TracerConfig>) -> Result<(), StoreError> {
        let mut guard = self.lock();
        guard.open()?.traces = traces.clone();
        Ok(())
    }

    fn has_data(&self, profile: &str, key: &str) -> Result<bool, StoreError> {
        let mut guard = self.lock();
        let inner = guard.open()?;
        Ok(inner
            .partitions
            .get(&partition_id(profile, key))
            .is_some_and(|p| !p.messages.is_empty()))
    }

    fn clear_data(&self, profile: &str, key: &str) -> Result<(), StoreError> {
        let mut guard = self.lock();
        guard.open()?.partitions.remove(&partition_id(profile, key));
        Ok(())
    }

    fn append(&self, profile: &str, key: &str, message: Message) -> Result<(), StoreError> {
        let mut guard = self.lock();
        guard
            .open()?
            .partitions
            .entry(partition_id(profile, key))
            .or_default()
            .push(message);
        Ok(())
    }

    fn messages(&self, profile: &str, key: &str) -> Result<Vec<Message>, StoreError> {
        let mut guard = self.lock();
        Ok(guard
            .open()?
            .partitions
            .get(&partition_id(profile, key))
            .map(|p| p.messages.clone())
            .unwrap_or_default())
    }

    fn load_counts(
        &self,
        profile: &str,
        key: &str,
        filters: &[String],
    ) -> Result<HashMap<String, u64>, StoreError> {
        let mut guard = self.lock();
        Ok(guard
            .open()?
            .partitions
            .get(&partition_id(profile, key))
            .map(|p| filter_counts(&p.counts, filters))
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
