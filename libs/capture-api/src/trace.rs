use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Namespace used when no profile name is given.
pub const DEFAULT_PROFILE: &str = "default";

/// Resolve an optional profile name to its partition identity.
pub fn profile_or_default(profile: &str) -> &str {
    if profile.trim().is_empty() {
        DEFAULT_PROFILE
    } else {
        profile
    }
}

/// Durable definition of one capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracerConfig {
    /// Owning connection profile.
    pub profile: String,
    /// Subscription filters. Empty means everything.
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    /// Data partition key, unique per profile.
    pub key: String,
}

impl TracerConfig {
    pub fn new(profile: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            topics: Vec::new(),
            start: None,
            end: None,
            key: key.into(),
        }
    }

    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Profile identity used for partitioning.
    pub fn profile_name(&self) -> &str {
        profile_or_default(&self.profile)
    }

    /// Non-blank subscription filters, `#` when none are configured.
    pub fn subscription_filters(&self) -> Vec<String> {
        let filters: Vec<String> = self
            .topics
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if filters.is_empty() {
            vec!["#".to_string()]
        } else {
            filters
        }
    }

    /// Whether a message stamped `ts` falls before the capture window.
    pub fn precedes_start(&self, ts: DateTime<Utc>) -> bool {
        self.start.is_some_and(|start| ts < start)
    }

    /// Whether the capture window has closed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end.is_some_and(|end| now > end)
    }
}
