use chrono::{DateTime, Utc};

use crate::error::QueryError;
use crate::filter::fuzzy_match_topic;
use crate::message::Message;

/// Parameters of a history search.
///
/// Every filter is optional: no topics, no bounds and an empty payload filter
/// return the whole partition selected by `archived`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// Selects the archived partition instead of the active one.
    pub archived: bool,
    /// Fuzzy topic patterns, OR'd.
    pub topics: Vec<String>,
    /// Inclusive lower bound.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub end: Option<DateTime<Utc>>,
    /// Case-sensitive literal the payload must contain.
    pub payload: String,
}

impl SearchQuery {
    pub fn active() -> Self {
        Self::default()
    }

    pub fn archived() -> Self {
        Self {
            archived: true,
            ..Self::default()
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

    pub fn with_window(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn matches(&self, msg: &Message) -> bool {
        if msg.archived != self.archived {
            return false;
        }
        if let Some(start) = self.start {
            if msg.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if msg.timestamp > end {
                return false;
            }
        }
        if !self.payload.is_empty() && !contains(&msg.payload, self.payload.as_bytes()) {
            return false;
        }
        fuzzy_match_topic(&msg.topic, &self.topics)
    }

    /// Parse the filter line produced by the history filter form:
    /// `topic=a,b payload=some text start=<RFC3339> end=<RFC3339> archived=true`.
    ///
    /// Words that do not start a known field belong to the previous field, so
    /// payload filters may contain spaces.
    pub fn parse(line: &str) -> Result<Self, QueryError> {
        let mut fields: Vec<(&str, String)> = Vec::new();
        for word in line.split_whitespace() {
            let field = word
                .split_once('=')
                .filter(|(name, _)| matches!(*name, "topic" | "payload" | "start" | "end" | "archived"));
            match field {
                Some((name, value)) => fields.push((name, value.to_string())),
                None => match fields.last_mut() {
                    Some((_, value)) => {
                        value.push(' ');
                        value.push_str(word);
                    }
                    None => fields.push(("topic", word.to_string())),
                },
            }
        }

        let mut query = SearchQuery::default();
        for (name, value) in fields {
            match name {
                "topic" => query.topics.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string),
                ),
                "payload" => query.payload = value,
                "start" => query.start = parse_instant("start", &value)?,
                "end" => query.end = parse_instant("end", &value)?,
                "archived" => query.archived = matches!(value.as_str(), "true" | "1" | "yes"),
                _ => {}
            }
        }

        if let (Some(start), Some(end)) = (query.start, query.end) {
            if start > end {
                return Err(QueryError::StartAfterEnd);
            }
        }
        Ok(query)
    }
}

/// Parse an RFC3339 instant. Blank input means "unbounded".
pub fn parse_instant(field: &'static str, value: &str) -> Result<Option<DateTime<Utc>>, QueryError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|t| Some(t.with_timezone(&Utc)))
        .map_err(|e| QueryError::InvalidTime {
            field,
            value: value.to_string(),
            detail: e.to_string(),
        })
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
#[path = "query_test.rs"]
mod tests;
