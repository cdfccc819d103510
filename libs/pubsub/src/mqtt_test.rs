use tokio::net::TcpListener;

use super::*;

/// Read one packet off a raw server-side socket.
async fn next_packet(stream: &mut TcpStream, buf: &mut BytesMut) -> Packet {
    loop {
        if let Some(p) = decode_any(buf) {
            return p;
        }
        let n = stream.read_buf(buf).await.unwrap();
        assert!(n > 0, "client closed early");
    }
}

/// The client-side decoder only knows broker-to-client packets, so the
/// fake broker strips frames by header type itself.
fn decode_any(buf: &mut BytesMut) -> Option<Packet> {
    if buf.len() < 2 {
        return None;
    }
    let len = buf[1] as usize;
    if buf.len() < 2 + len {
        return None;
    }
    let frame = buf.split_to(2 + len);
    Some(Packet::Other(frame[0] >> 4))
}

fn options() -> ConnectOptions {
    ConnectOptions {
        client_id: "test".into(),
        keep_alive_secs: 30,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_connect_subscribe_and_receive() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let broker = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = BytesMut::new();

        assert_eq!(next_packet(&mut sock, &mut buf).await, Packet::Other(1));
        sock.write_all(&[0x20, 2, 0, 0]).await.unwrap();

        assert_eq!(next_packet(&mut sock, &mut buf).await, Packet::Other(8));
        // SUBACK for the first packet id the client hands out.
        sock.write_all(&[0x90, 3, 0, 1, 0]).await.unwrap();

        let publish = codec::publish("sensors/a", QoS::AtMostOnce, false, None, b"21");
        sock.write_all(&publish).await.unwrap();
        let publish = codec::publish("other", QoS::AtMostOnce, false, None, b"x");
        sock.write_all(&publish).await.unwrap();
        let publish = codec::publish("sensors/b", QoS::AtMostOnce, true, None, b"22");
        sock.write_all(&publish).await.unwrap();

        // Closing the socket ends the session.
        drop(sock);
    });

    let client = MqttClient::new(addr, options());
    client.connect().await.unwrap();
    let mut sub = client.subscribe(&["sensors/#".to_string()]).await.unwrap();

    let first = sub.recv().await.unwrap();
    assert_eq!(first.topic, "sensors/a");
    assert_eq!(first.payload, b"21");
    let second = sub.recv().await.unwrap();
    assert_eq!(second.topic, "sensors/b");
    assert!(second.retained);

    assert!(sub.recv().await.is_none());
    broker.await.unwrap();
}

#[tokio::test]
async fn test_refused_connack_is_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = BytesMut::new();
        next_packet(&mut sock, &mut buf).await;
        // 5 = not authorized
        sock.write_all(&[0x20, 2, 0, 5]).await.unwrap();
    });

    let client = MqttClient::new(addr, options());
    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, ClientError::Connect { .. }));
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let client = MqttClient::new(addr, options());
    assert!(matches!(client.connect().await, Err(ClientError::Connect { .. })));
}

#[tokio::test]
async fn test_publish_before_connect() {
    let client = MqttClient::new("127.0.0.1:1", options());
    let err = client.publish("a", QoS::AtMostOnce, false, b"x").await.unwrap_err();
    assert!(matches!(err, ClientError::NotConnected));
}
