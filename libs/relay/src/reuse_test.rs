use super::*;
use crate::relay::FixedUpstream;

fn upstream() -> Arc<dyn Destination> {
    Arc::new(FixedUpstream("127.0.0.1:1883".into()))
}

#[tokio::test]
async fn test_init_starts_and_records_address() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");

    let (addr, handle) = init(&config, upstream()).await.unwrap();
    let handle = handle.expect("fresh relay expected");
    assert_eq!(handle.addr(), addr);
    assert_eq!(load_relay_addr(&config).unwrap().as_deref(), Some(addr.as_str()));
    assert!(is_dialable(&addr).await);

    handle.stop();
}

#[tokio::test]
async fn test_init_reuses_live_relay() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");

    let (first, handle) = init(&config, upstream()).await.unwrap();
    let handle = handle.unwrap();

    let (second, reused) = init(&config, upstream()).await.unwrap();
    assert_eq!(first, second);
    assert!(reused.is_none());

    handle.stop();
    handle.wait().await;

    let (third, fresh) = init(&config, upstream()).await.unwrap();
    let fresh = fresh.expect("stale address must not be reused");
    assert_eq!(load_relay_addr(&config).unwrap().as_deref(), Some(third.as_str()));
    fresh.stop();
}

#[test]
fn test_save_keeps_other_keys() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("nested").join("config.toml");
    std::fs::create_dir_all(config.parent().unwrap()).unwrap();
    std::fs::write(&config, "default_profile = \"lab\"\n").unwrap();

    save_relay_addr(&config, "127.0.0.1:4000").unwrap();

    let text = std::fs::read_to_string(&config).unwrap();
    assert!(text.contains("default_profile = \"lab\""));
    assert_eq!(load_relay_addr(&config).unwrap().as_deref(), Some("127.0.0.1:4000"));
}

#[test]
fn test_load_missing_or_blank() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    assert_eq!(load_relay_addr(&config).unwrap(), None);

    std::fs::write(&config, "relay_addr = \"  \"\n").unwrap();
    assert_eq!(load_relay_addr(&config).unwrap(), None);
}

#[test]
fn test_load_rejects_broken_toml() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "relay_addr = ").unwrap();
    assert!(matches!(load_relay_addr(&config), Err(RelayError::Config { .. })));
}
