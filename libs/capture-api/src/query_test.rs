use chrono::{TimeZone, Utc};

use super::*;

#[test]
fn test_parse_empty_line() {
    let query = SearchQuery::parse("").unwrap();
    assert_eq!(query, SearchQuery::default());
}

#[test]
fn test_parse_all_fields() {
    let query = SearchQuery::parse(
        "topic=temp,hum payload=21 start=2024-05-01T10:00:00Z end=2024-05-01T12:00:00+02:00 archived=true",
    )
    .unwrap();

    assert_eq!(query.topics, vec!["temp", "hum"]);
    assert_eq!(query.payload, "21");
    assert_eq!(query.start, Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()));
    assert_eq!(query.end, Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()));
    assert!(query.archived);
}

#[test]
fn test_parse_payload_with_spaces() {
    let query = SearchQuery::parse("payload=door is open topic=garage").unwrap();
    assert_eq!(query.payload, "door is open");
    assert_eq!(query.topics, vec!["garage"]);
}

#[test]
fn test_parse_bare_word_is_topic() {
    let query = SearchQuery::parse("living").unwrap();
    assert_eq!(query.topics, vec!["living"]);
}

#[test]
fn test_parse_rejects_bad_time() {
    let err = SearchQuery::parse("start=yesterday").unwrap_err();
    assert!(matches!(err, QueryError::InvalidTime { field: "start", .. }));
}

#[test]
fn test_parse_rejects_start_after_end() {
    let err = SearchQuery::parse("start=2024-05-02T00:00:00Z end=2024-05-01T00:00:00Z").unwrap_err();
    assert!(matches!(err, QueryError::StartAfterEnd));
}

#[test]
fn test_parse_instant_blank_is_unbounded() {
    assert_eq!(parse_instant("end", "  ").unwrap(), None);
}
