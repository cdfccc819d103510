use super::*;

#[test]
fn test_connect_minimal() {
    let opts = ConnectOptions {
        client_id: "c1".into(),
        keep_alive_secs: 30,
        ..Default::default()
    };
    let bytes = connect(&opts);
    assert_eq!(
        &bytes[..],
        &[
            0x10, 14, // header, remaining length
            0, 4, b'M', b'Q', b'T', b'T', 4, // protocol name + level
            0x02, // clean session
            0, 30, // keep alive
            0, 2, b'c', b'1',
        ]
    );
}

#[test]
fn test_connect_with_credentials_sets_flags() {
    let opts = ConnectOptions {
        client_id: "c".into(),
        username: Some("u".into()),
        password: Some("p".into()),
        keep_alive_secs: 0,
    };
    let bytes = connect(&opts);
    assert_eq!(bytes[9], 0xc2);
}

#[test]
fn test_subscribe_layout() {
    let bytes = subscribe(7, &["a/#".to_string()], QoS::AtMostOnce);
    assert_eq!(&bytes[..], &[0x82, 8, 0, 7, 0, 3, b'a', b'/', b'#', 0]);
}

#[test]
fn test_decode_connack() {
    let mut buf = BytesMut::from(&[0x20, 2, 0, 0][..]);
    let packet = decode(&mut buf).unwrap();
    assert_eq!(
        packet,
        Some(Packet::ConnAck {
            session_present: false,
            code: 0
        })
    );
    assert!(buf.is_empty());
}

#[test]
fn test_decode_waits_for_full_frame() {
    let full = publish("t", QoS::AtMostOnce, false, None, b"hello");
    let mut buf = BytesMut::from(&full[..full.len() - 2]);
    assert_eq!(decode(&mut buf).unwrap(), None);

    buf.extend_from_slice(&full[full.len() - 2..]);
    match decode(&mut buf).unwrap() {
        Some(Packet::Publish { topic, payload, .. }) => {
            assert_eq!(topic, "t");
            assert_eq!(&payload[..], b"hello");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_decode_publish_with_long_payload_and_qos1() {
    let payload = vec![b'x'; 300];
    let mut buf = publish("sensors/a", QoS::AtLeastOnce, true, Some(42), &payload);
    // 300 bytes of payload need a two-byte remaining length.
    assert_eq!(buf[1] & 0x80, 0x80);

    match decode(&mut buf).unwrap() {
        Some(Packet::Publish {
            topic,
            payload: body,
            qos,
            retain,
            packet_id,
        }) => {
            assert_eq!(topic, "sensors/a");
            assert_eq!(body.len(), 300);
            assert_eq!(qos, QoS::AtLeastOnce);
            assert!(retain);
            assert_eq!(packet_id, Some(42));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_decode_two_packets_back_to_back() {
    let mut buf = BytesMut::from(&[0x90, 3, 0, 5, 0, 0xd0, 0][..]);
    assert_eq!(
        decode(&mut buf).unwrap(),
        Some(Packet::SubAck {
            packet_id: 5,
            codes: vec![0]
        })
    );
    assert_eq!(decode(&mut buf).unwrap(), Some(Packet::PingResp));
    assert_eq!(decode(&mut buf).unwrap(), None);
}

#[test]
fn test_decode_rejects_oversized_length_field() {
    let mut buf = BytesMut::from(&[0x30, 0xff, 0xff, 0xff, 0xff, 0x01][..]);
    assert!(matches!(decode(&mut buf), Err(ClientError::Protocol(_))));
}

#[test]
fn test_decode_rejects_truncated_suback() {
    let mut buf = BytesMut::from(&[0x90, 1, 0][..]);
    assert!(matches!(decode(&mut buf), Err(ClientError::Protocol(_))));
}
