//! Read-time matching for history search and trace partitions.
//!
//! Two different notions of "topic matches" live here:
//!
//! - [`fuzzy_match_topic`] is what the operator types into a search box:
//!   a pattern matches when its characters occur, in order, somewhere in the
//!   topic (`"hlrt"` finds `home/living-room/temperature`).
//! - [`topic_filter_matches`] is broker subscription semantics with `+` and
//!   `#` wildcards, used to route deliveries to subscriptions.

use crate::message::Message;
use crate::query::SearchQuery;

/// Whether `topic` matches any of `patterns` as a character subsequence.
///
/// Blank patterns are ignored; a list with no usable pattern matches every
/// topic. Matching is case-sensitive.
pub fn fuzzy_match_topic<S: AsRef<str>>(topic: &str, patterns: &[S]) -> bool {
    let mut any_pattern = false;
    for pattern in patterns {
        let pattern = pattern.as_ref().trim();
        if pattern.is_empty() {
            continue;
        }
        any_pattern = true;
        if is_subsequence(pattern, topic) {
            return true;
        }
    }
    !any_pattern
}

fn is_subsequence(pattern: &str, topic: &str) -> bool {
    let mut rest = topic.chars();
    pattern.chars().all(|p| rest.any(|c| c == p))
}

/// Subscription filter matching with `+` (one level) and `#` (this level and
/// everything below, including the parent itself).
pub fn topic_filter_matches(filter: &str, topic: &str) -> bool {
    let mut levels = topic.split('/');
    for part in filter.split('/') {
        match part {
            "#" => return true,
            "+" => {
                if levels.next().is_none() {
                    return false;
                }
            }
            exact => match levels.next() {
                Some(level) if level == exact => {}
                _ => return false,
            },
        }
    }
    levels.next().is_none()
}

/// Apply `query` to a partition and return the hits stably sorted by
/// timestamp. Storage order is kept for equal timestamps.
pub fn search_messages<'a, I>(messages: I, query: &SearchQuery) -> Vec<Message>
where
    I: IntoIterator<Item = &'a Message>,
{
    let mut hits: Vec<Message> = messages
        .into_iter()
        .filter(|m| query.matches(m))
        .cloned()
        .collect();
    hits.sort_by_key(|m| m.timestamp);
    hits
}

#[cfg(test)]
#[path = "filter_test.rs"]
mod tests;
