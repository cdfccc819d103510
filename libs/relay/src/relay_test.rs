use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::*;

/// Upstream that echoes every byte back and counts accepted connections.
async fn echo_server() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let (mut r, mut w) = sock.split();
                let _ = tokio::io::copy(&mut r, &mut w).await;
            });
        }
    });
    (addr, accepted)
}

async fn start_relay(upstream: &str) -> (String, RelayHandle) {
    start("", Arc::new(FixedUpstream(upstream.to_string()))).await.unwrap()
}

#[tokio::test]
async fn test_forwards_bytes_both_ways() {
    let (upstream, accepted) = echo_server().await;
    let (addr, handle) = start_relay(&upstream).await;
    assert!(addr.starts_with("127.0.0.1:"));

    let mut client = TcpStream::connect(&addr).await.unwrap();
    client.write_all(b"hello relay").await.unwrap();
    let mut buf = [0u8; 11];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"hello relay");
    assert_eq!(accepted.load(Ordering::SeqCst), 1);

    handle.stop();
}

#[tokio::test]
async fn test_each_inbound_gets_its_own_upstream() {
    let (upstream, accepted) = echo_server().await;
    let (addr, handle) = start_relay(&upstream).await;

    let mut a = TcpStream::connect(&addr).await.unwrap();
    let mut b = TcpStream::connect(&addr).await.unwrap();
    a.write_all(b"a").await.unwrap();
    b.write_all(b"b").await.unwrap();

    let mut one = [0u8; 1];
    a.read_exact(&mut one).await.unwrap();
    assert_eq!(&one, b"a");
    b.read_exact(&mut one).await.unwrap();
    assert_eq!(&one, b"b");
    assert_eq!(accepted.load(Ordering::SeqCst), 2);

    handle.stop();
}

#[tokio::test]
async fn test_liveness_probe_does_not_dial_upstream() {
    let (upstream, accepted) = echo_server().await;
    let (addr, handle) = start_relay(&upstream).await;

    let probe = TcpStream::connect(&addr).await.unwrap();
    drop(probe);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(accepted.load(Ordering::SeqCst), 0);
    handle.stop();
    handle.wait().await;
}

#[tokio::test]
async fn test_stop_closes_active_connections() {
    let (upstream, _) = echo_server().await;
    let (addr, handle) = start_relay(&upstream).await;

    let mut client = TcpStream::connect(&addr).await.unwrap();
    client.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).await.unwrap();

    handle.stop();
    handle.stop();
    tokio::time::timeout(Duration::from_secs(2), handle.wait())
        .await
        .expect("relay tasks did not finish");
    assert!(handle.is_stopped());

    let mut rest = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(2), client.read_to_end(&mut rest))
        .await
        .expect("connection was not closed");
    // EOF or reset, either way the relay side is gone.
    assert!(read.map(|n| n == 0).unwrap_or(true));

    assert!(TcpStream::connect(&addr).await.is_err());
}

#[tokio::test]
async fn test_bind_failure_is_returned() {
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = taken.local_addr().unwrap().to_string();

    let err = start(&addr, Arc::new(FixedUpstream("127.0.0.1:1".into())))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Bind { .. }));
}

#[tokio::test]
async fn test_unreachable_upstream_drops_inbound() {
    let gone = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream = gone.local_addr().unwrap().to_string();
    drop(gone);
    let (addr, handle) = start_relay(&upstream).await;

    let mut client = TcpStream::connect(&addr).await.unwrap();
    client.write_all(b"x").await.unwrap();
    let mut rest = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(2), client.read_to_end(&mut rest))
        .await
        .expect("inbound was not closed");
    assert!(read.map(|n| n == 0).unwrap_or(true));

    handle.stop();
}
