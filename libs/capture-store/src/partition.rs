//! In-memory partition state shared by both store implementations.
//!
//! `MemoryStore` keeps these as its only state; `FileStore` keeps them as a
//! write-through cache of the JSONL files.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use capture_api::{Message, SearchQuery, search_messages, topic_filter_matches};

/// Active and archived halves of one profile's history.
#[derive(Debug, Default)]
pub(crate) struct HistoryLog {
    pub active: Vec<Message>,
    pub archived: Vec<Message>,
    next_id: u64,
}

impl HistoryLog {
    pub fn from_parts(active: Vec<Message>, archived: Vec<Message>) -> Self {
        let max_id = active.iter().chain(archived.iter()).map(|m| m.id).max().unwrap_or(0);
        let mut log = Self {
            active,
            archived,
            next_id: max_id + 1,
        };
        // Lines written before ids existed get one now.
        for msg in log.active.iter_mut().chain(log.archived.iter_mut()) {
            if msg.id == 0 {
                msg.id = log.next_id;
                log.next_id += 1;
            }
        }
        log
    }

    /// Assign an id and push into the partition named by `archived`.
    pub fn append(&mut self, mut message: Message) -> &Message {
        if self.next_id == 0 {
            self.next_id = 1;
        }
        message.id = self.next_id;
        self.next_id += 1;
        let partition = if message.archived {
            &mut self.archived
        } else {
            &mut self.active
        };
        partition.push(message);
        // Just pushed, never empty.
        &partition[partition.len() - 1]
    }

    /// Move matching active messages to the archived half.
    pub fn archive(&mut self, target: &str) -> usize {
        let selector = self.selector(target);
        let (moved, kept): (Vec<Message>, Vec<Message>) =
            std::mem::take(&mut self.active).into_iter().partition(|m| selector.matches(m));
        self.active = kept;
        let count = moved.len();
        self.archived.extend(moved.into_iter().map(|mut m| {
            m.archived = true;
            m
        }));
        count
    }

    pub fn delete(&mut self, target: &str) -> usize {
        let selector = self.selector(target);
        let before = self.active.len() + self.archived.len();
        self.active.retain(|m| !selector.matches(m));
        self.archived.retain(|m| !selector.matches(m));
        before - self.active.len() - self.archived.len()
    }

    pub fn count(&self, archived: bool) -> usize {
        self.partition(archived).len()
    }

    pub fn search(&self, query: &SearchQuery) -> Vec<Message> {
        search_messages(self.partition(query.archived), query)
    }

    pub fn topics(&self, archived: bool) -> Vec<String> {
        let topics: BTreeSet<&str> = self.partition(archived).iter().map(|m| m.topic.as_str()).collect();
        topics.into_iter().map(str::to_string).collect()
    }

    fn partition(&self, archived: bool) -> &[Message] {
        if archived { &self.archived } else { &self.active }
    }

    /// A numeric `target` naming an existing id selects that one message;
    /// anything else selects by exact topic.
    fn selector<'a>(&self, target: &'a str) -> Selector<'a> {
        match target.parse::<u64>() {
            Ok(id) if self.active.iter().chain(&self.archived).any(|m| m.id == id) => Selector::Id(id),
            _ => Selector::Topic(target),
        }
    }
}

enum Selector<'a> {
    Id(u64),
    Topic(&'a str),
}

impl Selector<'_> {
    fn matches(&self, msg: &Message) -> bool {
        match self {
            Selector::Id(id) => msg.id == *id,
            Selector::Topic(topic) => msg.topic == *topic,
        }
    }
}

/// Captured data of one `(profile, key)` trace.
#[derive(Debug, Default)]
pub(crate) struct TracePartition {
    pub messages: Vec<Message>,
    pub counts: BTreeMap<String, u64>,
}

impl TracePartition {
    pub fn push(&mut self, message: Message) {
        *self.counts.entry(message.topic.clone()).or_default() += 1;
        self.messages.push(message);
    }
}

/// Restrict per-topic counts to topics covered by `filters`.
pub(crate) fn filter_counts(counts: &BTreeMap<String, u64>, filters: &[String]) -> HashMap<String, u64> {
    let filters: Vec<&str> = filters.iter().map(|f| f.trim()).filter(|f| !f.is_empty()).collect();
    counts
        .iter()
        .filter(|(topic, _)| filters.is_empty() || filters.iter().any(|f| topic_filter_matches(f, topic)))
        .map(|(topic, n)| (topic.clone(), *n))
        .collect()
}
