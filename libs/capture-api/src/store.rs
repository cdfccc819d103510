use std::collections::{BTreeMap, HashMap};

use crate::error::StoreError;
use crate::message::Message;
use crate::query::SearchQuery;
use crate::trace::TracerConfig;

/// Active/archived activity log of one profile.
///
/// Implementations guard their state with a short-lived lock; no method
/// performs network I/O. Once [`close`](HistoryStore::close) has been called
/// every other method returns [`StoreError::Closed`].
pub trait HistoryStore: Send + Sync {
    /// Append one message to the partition selected by `message.archived`.
    /// Returns the assigned id.
    fn append(&self, message: Message) -> Result<u64, StoreError>;

    /// Move active messages to the archived partition. `target` is either a
    /// message id or a topic; returns how many messages moved.
    fn archive(&self, target: &str) -> Result<usize, StoreError>;

    /// Permanently remove messages by id or topic from both partitions.
    fn delete(&self, target: &str) -> Result<usize, StoreError>;

    fn count(&self, archived: bool) -> Result<usize, StoreError>;

    /// Read-only filtered view, stably sorted by timestamp.
    fn search(&self, query: &SearchQuery) -> Result<Vec<Message>, StoreError>;

    /// Distinct topics of a partition, sorted.
    fn topics(&self, archived: bool) -> Result<Vec<String>, StoreError>;

    fn close(&self) -> Result<(), StoreError>;
}

/// Trace registry plus one data partition per `(profile, key)`.
pub trait TraceStore: Send + Sync {
    /// Register a trace. Fails with [`StoreError::TraceExists`] when its
    /// partition already holds data.
    fn add_trace(&self, cfg: TracerConfig) -> Result<(), StoreError>;

    fn remove_trace(&self, key: &str) -> Result<(), StoreError>;

    fn load_traces(&self) -> Result<BTreeMap<String, TracerConfig>, StoreError>;

    fn save_traces(&self, traces: &BTreeMap<String, TracerConfig>) -> Result<(), StoreError>;

    fn has_data(&self, profile: &str, key: &str) -> Result<bool, StoreError>;

    /// Drop every message and count of the partition.
    fn clear_data(&self, profile: &str, key: &str) -> Result<(), StoreError>;

    /// Append one captured message and bump its topic count.
    fn append(&self, profile: &str, key: &str, message: Message) -> Result<(), StoreError>;

    /// Everything captured for the partition, in capture order.
    fn messages(&self, profile: &str, key: &str) -> Result<Vec<Message>, StoreError>;

    /// Persisted per-topic counts. With a non-empty `filters` list only topics
    /// matching one of the subscription filters are returned.
    fn load_counts(
        &self,
        profile: &str,
        key: &str,
        filters: &[String],
    ) -> Result<HashMap<String, u64>, StoreError>;
}
