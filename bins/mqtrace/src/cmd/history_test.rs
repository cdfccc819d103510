use capture_api::Kind;
use chrono::{TimeZone, Utc};

use super::*;

fn args() -> HistoryArgs {
    HistoryArgs {
        profile: None,
        query: None,
        topics: Vec::new(),
        payload: String::new(),
        start: String::new(),
        end: String::new(),
        archived: false,
        list_topics: false,
        archive: None,
        delete: None,
    }
}

#[test]
fn test_build_query_from_flags() {
    let query = build_query(&HistoryArgs {
        topics: vec!["temp".into()],
        payload: "21".into(),
        start: "2024-05-01T10:00:00Z".into(),
        archived: true,
        ..args()
    })
    .unwrap();

    assert!(query.archived);
    assert_eq!(query.topics, vec!["temp"]);
    assert_eq!(query.payload, "21");
    assert_eq!(query.start, Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()));
    assert_eq!(query.end, None);
}

#[test]
fn test_build_query_from_query_string() {
    let query = build_query(&HistoryArgs {
        query: Some("topic=living payload=on archived=true".into()),
        ..args()
    })
    .unwrap();
    assert!(query.archived);
    assert_eq!(query.topics, vec!["living"]);
}

#[test]
fn test_build_query_rejects_inverted_window() {
    let err = build_query(&HistoryArgs {
        start: "2024-05-02T00:00:00Z".into(),
        end: "2024-05-01T00:00:00Z".into(),
        ..args()
    })
    .unwrap_err();
    assert!(matches!(err, CliError::Query(QueryError::StartAfterEnd)));
}

#[test]
fn test_format_line() {
    let mut msg = Message::new("home/temp", "21", Kind::Publish)
        .at(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
    msg.id = 7;
    let line = format_line(&msg);
    assert!(line.contains("2024-05-01T10:00:00.000Z"));
    assert!(line.contains("home/temp"));
    assert!(line.ends_with("21"));
    assert!(line.trim_start().starts_with('7'));
}

#[test]
fn test_run_archives_and_searches() {
    let dir = tempfile::tempdir().unwrap();
    let root = DataRoot::new(dir.path());
    {
        let store = FileStore::open(root.clone(), "").unwrap();
        store.append(Message::publish("home/temp", "21")).unwrap();
        store.append(Message::publish("home/hum", "40")).unwrap();
    }

    run(
        root.clone(),
        HistoryArgs {
            archive: Some("home/temp".into()),
            ..args()
        },
    )
    .unwrap();

    let store = FileStore::open(root, "").unwrap();
    assert_eq!(store.count(false).unwrap(), 1);
    assert_eq!(store.count(true).unwrap(), 1);
}
