use super::*;

#[test]
fn test_parse_duration_units() {
    assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
    assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
    assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
    assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    assert!(parse_duration("soon").is_err());
    assert!(parse_duration("5d").is_err());
}

#[test]
fn test_parse_duration_rejects_overflow() {
    let err = parse_duration(&format!("{}h", u64::MAX / 60)).unwrap_err();
    assert!(err.contains("too large"));
    assert!(parse_duration(&format!("{}m", u64::MAX)).is_err());
    assert_eq!(parse_duration(&format!("{}s", u64::MAX)).unwrap(), Duration::from_secs(u64::MAX));
}

#[test]
fn test_load_missing_config_is_default() {
    let dir = tempfile::tempdir().unwrap();
    let app = AppConfig::load(&dir.path().join("config.toml")).unwrap();
    assert!(app.profiles.is_empty());
    assert_eq!(app.default_profile_name(), "default");
    assert_eq!(app.profile(None).unwrap().socket_addr(), "localhost:1883");
}

#[test]
fn test_load_profiles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
default_profile = "lab"
relay_addr = "127.0.0.1:5000"

[[profiles]]
name = "lab"
host = "broker.lab"
port = 8883
schema = "ssl"
client_id = "bench"

[[profiles]]
name = "local"
"#,
    )
    .unwrap();

    let app = AppConfig::load(&path).unwrap();
    assert_eq!(app.relay_addr.as_deref(), Some("127.0.0.1:5000"));

    let lab = app.profile(None).unwrap();
    assert_eq!(lab.broker_url(), "ssl://broker.lab:8883");
    assert_eq!(lab.client_id(), "bench");

    let local = app.profile(Some("local")).unwrap();
    assert_eq!(local.socket_addr(), "localhost:1883");
    assert!(local.client_id().starts_with("mqtrace-"));

    let err = app.profile(Some("nope")).unwrap_err();
    assert!(matches!(err, CliError::Trace(tracer::TraceError::Profile(name)) if name == "nope"));
}

#[test]
fn test_load_rejects_bad_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "profiles = 3").unwrap();
    assert!(matches!(AppConfig::load(&path), Err(CliError::Config { context: "parse", .. })));
}

#[test]
fn test_cli_parses_trace_flags() {
    let cli = Cli::try_parse_from([
        "mqtrace",
        "trace",
        "--key",
        "k1",
        "--topics",
        "a/#,b/+",
        "--timeout",
        "10s",
        "--direct",
    ])
    .unwrap();
    match cli.command {
        Commands::Trace(args) => {
            assert_eq!(args.key, "k1");
            assert_eq!(args.topics, vec!["a/#", "b/+"]);
            assert_eq!(args.timeout, Some(Duration::from_secs(10)));
            assert!(args.direct);
            assert!(args.start.is_empty());
        }
        _ => panic!("expected trace"),
    }
}
