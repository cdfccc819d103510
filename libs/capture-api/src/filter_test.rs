//! Tests for topic matching and partition search

use chrono::{Duration, Utc};

use super::*;

// ============================================================================
// Fuzzy topic matching
// ============================================================================

#[test]
fn test_empty_patterns_match_all() {
    let none: [&str; 0] = [];
    assert!(fuzzy_match_topic("sensor/temperature", &none));
    assert!(fuzzy_match_topic("", &none));
}

#[test]
fn test_blank_patterns_match_all() {
    assert!(fuzzy_match_topic("sensor/temperature", &[""]));
    assert!(fuzzy_match_topic("sensor/temperature", &["", "   "]));
}

#[test]
fn test_exact_match() {
    assert!(fuzzy_match_topic("sensor/temperature", &["sensor/temperature"]));
}

#[test]
fn test_substring_always_matches() {
    let topic = "home/living-room/temperature";
    for start in 0..topic.len() {
        for end in start + 1..=topic.len() {
            let pattern = &topic[start..end];
            assert!(fuzzy_match_topic(topic, &[pattern]), "substring {pattern:?} should match");
        }
    }
}

#[test]
fn test_non_contiguous_subsequence() {
    assert!(fuzzy_match_topic("sensor/temperature", &["sntp"]));
    assert!(fuzzy_match_topic("home/living-room/temperature", &["hlrt"]));
}

#[test]
fn test_order_matters() {
    assert!(!fuzzy_match_topic("sensor/temperature", &["pmet"]));
}

#[test]
fn test_no_match() {
    assert!(!fuzzy_match_topic("sensor/temperature", &["humidity"]));
}

#[test]
fn test_case_sensitive() {
    assert!(!fuzzy_match_topic("sensor/temperature", &["TEMP"]));
    assert!(fuzzy_match_topic("Sensor/Temp", &["ST"]));
}

#[test]
fn test_multiple_patterns_are_ored() {
    let topic = "sensor/temperature";
    let cases = [
        ("humidity", "temp"),
        ("temp", "humidity"),
        ("humidity", "light"),
        ("sens", "temp"),
    ];
    for (p1, p2) in cases {
        let either = fuzzy_match_topic(topic, &[p1]) || fuzzy_match_topic(topic, &[p2]);
        assert_eq!(fuzzy_match_topic(topic, &[p1, p2]), either, "{p1:?} | {p2:?}");
    }
}

#[test]
fn test_blank_pattern_in_list_is_ignored() {
    assert!(fuzzy_match_topic("sensor/temperature", &["", "temp"]));
    assert!(!fuzzy_match_topic("sensor/temperature", &["", "humidity"]));
}

// ============================================================================
// Subscription filters
// ============================================================================

#[test]
fn test_filter_exact() {
    assert!(topic_filter_matches("sensors/temp", "sensors/temp"));
    assert!(!topic_filter_matches("sensors/temp", "sensors/humidity"));
    assert!(!topic_filter_matches("sensors/temp", "sensors/temp/raw"));
    assert!(!topic_filter_matches("sensors/temp/raw", "sensors/temp"));
}

#[test]
fn test_filter_single_level_wildcard() {
    assert!(topic_filter_matches("sensors/+/temp", "sensors/room1/temp"));
    assert!(!topic_filter_matches("sensors/+/temp", "sensors/room1/humidity"));
    assert!(!topic_filter_matches("sensors/+", "sensors"));
}

#[test]
fn test_filter_multi_level_wildcard() {
    assert!(topic_filter_matches("sensors/#", "sensors/temp"));
    assert!(topic_filter_matches("sensors/#", "sensors/room1/temp"));
    assert!(topic_filter_matches("sensors/#", "sensors"));
    assert!(topic_filter_matches("#", "anything/at/all"));
    assert!(!topic_filter_matches("sensors/#", "office/light"));
}

// ============================================================================
// Partition search
// ============================================================================

#[test]
fn test_search_sorts_by_timestamp() {
    let now = Utc::now();
    let messages = vec![
        Message::publish("b", "2").at(now - Duration::minutes(1)),
        Message::publish("a", "1").at(now - Duration::minutes(5)),
        Message::publish("c", "3").at(now),
    ];

    let hits = search_messages(&messages, &SearchQuery::active());
    let topics: Vec<&str> = hits.iter().map(|m| m.topic.as_str()).collect();
    assert_eq!(topics, vec!["a", "b", "c"]);
}

#[test]
fn test_search_is_stable_for_equal_timestamps() {
    let now = Utc::now();
    let messages = vec![
        Message::publish("first", "x").at(now),
        Message::publish("second", "x").at(now),
    ];

    let hits = search_messages(&messages, &SearchQuery::active());
    assert_eq!(hits[0].topic, "first");
    assert_eq!(hits[1].topic, "second");
}

#[test]
fn test_search_window_is_inclusive() {
    let now = Utc::now();
    let start = now - Duration::hours(1);
    let messages = vec![
        Message::publish("edge-start", "x").at(start),
        Message::publish("edge-end", "x").at(now),
        Message::publish("outside", "x").at(start - Duration::seconds(1)),
    ];

    let query = SearchQuery::active().with_window(Some(start), Some(now));
    let hits = search_messages(&messages, &query);
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|m| m.topic.starts_with("edge")));
}

#[test]
fn test_search_payload_is_case_sensitive_literal() {
    let messages = vec![
        Message::publish("a", "Hello world"),
        Message::publish("b", "hello world"),
    ];

    let hits = search_messages(&messages, &SearchQuery::active().with_payload("Hello"));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].topic, "a");
}

#[test]
fn test_search_partitions_are_disjoint() {
    let messages = vec![
        Message::publish("live", "x"),
        Message::publish("old", "x").archived(true),
    ];

    let active = search_messages(&messages, &SearchQuery::active());
    let archived = search_messages(&messages, &SearchQuery::archived());
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].topic, "live");
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].topic, "old");
}
