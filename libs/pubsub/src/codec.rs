//! MQTT 3.1.1 packet framing, limited to what a capture client sends and
//! receives.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use capture_api::{ClientError, QoS};

const CONNECT: u8 = 1;
const CONNACK: u8 = 2;
const PUBLISH: u8 = 3;
const PUBACK: u8 = 4;
const SUBSCRIBE: u8 = 8;
const SUBACK: u8 = 9;
const UNSUBSCRIBE: u8 = 10;
const UNSUBACK: u8 = 11;
const PINGREQ: u8 = 12;
const PINGRESP: u8 = 13;
const DISCONNECT: u8 = 14;

/// Largest value the four-byte remaining-length field can carry.
const MAX_REMAINING: usize = 268_435_455;

/// SUBACK return code for a rejected filter.
pub const SUBACK_FAILURE: u8 = 0x80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    ConnAck {
        session_present: bool,
        code: u8,
    },
    Publish {
        topic: String,
        payload: Bytes,
        qos: QoS,
        retain: bool,
        packet_id: Option<u16>,
    },
    PubAck(u16),
    SubAck {
        packet_id: u16,
        codes: Vec<u8>,
    },
    UnsubAck(u16),
    PingResp,
    /// Anything a subscriber-only client has no use for.
    Other(u8),
}

#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u16,
}

// ── Encode ──

pub fn connect(opts: &ConnectOptions) -> BytesMut {
    let mut flags = 0x02; // clean session
    let mut body = BytesMut::new();
    put_str(&mut body, "MQTT");
    body.put_u8(4);
    if opts.username.is_some() {
        flags |= 0x80;
    }
    if opts.password.is_some() {
        flags |= 0x40;
    }
    body.put_u8(flags);
    body.put_u16(opts.keep_alive_secs);
    put_str(&mut body, &opts.client_id);
    if let Some(user) = &opts.username {
        put_str(&mut body, user);
    }
    if let Some(pass) = &opts.password {
        put_str(&mut body, pass);
    }
    frame(CONNECT << 4, body)
}

pub fn publish(topic: &str, qos: QoS, retain: bool, packet_id: Option<u16>, payload: &[u8]) -> BytesMut {
    let mut header = PUBLISH << 4 | (qos as u8) << 1;
    if retain {
        header |= 0x01;
    }
    let mut body = BytesMut::with_capacity(topic.len() + payload.len() + 4);
    put_str(&mut body, topic);
    if qos != QoS::AtMostOnce {
        body.put_u16(packet_id.unwrap_or(1));
    }
    body.put_slice(payload);
    frame(header, body)
}

pub fn puback(packet_id: u16) -> BytesMut {
    let mut body = BytesMut::with_capacity(2);
    body.put_u16(packet_id);
    frame(PUBACK << 4, body)
}

pub fn subscribe(packet_id: u16, filters: &[String], qos: QoS) -> BytesMut {
    let mut body = BytesMut::new();
    body.put_u16(packet_id);
    for filter in filters {
        put_str(&mut body, filter);
        body.put_u8(qos as u8);
    }
    frame(SUBSCRIBE << 4 | 0x02, body)
}

pub fn unsubscribe(packet_id: u16, filters: &[String]) -> BytesMut {
    let mut body = BytesMut::new();
    body.put_u16(packet_id);
    for filter in filters {
        put_str(&mut body, filter);
    }
    frame(UNSUBSCRIBE << 4 | 0x02, body)
}

pub fn pingreq() -> BytesMut {
    frame(PINGREQ << 4, BytesMut::new())
}

pub fn disconnect() -> BytesMut {
    frame(DISCONNECT << 4, BytesMut::new())
}

fn put_str(buf: &mut BytesMut, s: &str) {
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
}

fn frame(header: u8, body: BytesMut) -> BytesMut {
    let mut out = BytesMut::with_capacity(body.len() + 5);
    out.put_u8(header);
    let mut len = body.len();
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.put_u8(byte);
        if len == 0 {
            break;
        }
    }
    out.extend_from_slice(&body);
    out
}

// ── Decode ──

/// Split one complete packet off the front of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed.
pub fn decode(buf: &mut BytesMut) -> Result<Option<Packet>, ClientError> {
    if buf.len() < 2 {
        return Ok(None);
    }

    let mut remaining = 0usize;
    let mut multiplier = 1usize;
    let mut header_len = 1;
    loop {
        let Some(&byte) = buf.get(header_len) else {
            return Ok(None);
        };
        remaining += (byte & 0x7f) as usize * multiplier;
        header_len += 1;
        if byte & 0x80 == 0 {
            break;
        }
        multiplier *= 128;
        if header_len > 4 {
            return Err(ClientError::Protocol("malformed remaining length".into()));
        }
    }
    if remaining > MAX_REMAINING {
        return Err(ClientError::Protocol(format!("packet too large: {remaining}")));
    }
    if buf.len() < header_len + remaining {
        return Ok(None);
    }

    let header = buf[0];
    buf.advance(header_len);
    let body = buf.split_to(remaining).freeze();
    parse(header, body).map(Some)
}

fn parse(header: u8, mut body: Bytes) -> Result<Packet, ClientError> {
    let kind = header >> 4;
    match kind {
        CONNACK => {
            need(&body, 2, "CONNACK")?;
            Ok(Packet::ConnAck {
                session_present: body[0] & 0x01 == 1,
                code: body[1],
            })
        }
        PUBLISH => {
            let qos = QoS::from_u8((header >> 1) & 0x03)
                .ok_or_else(|| ClientError::Protocol("PUBLISH with qos 3".into()))?;
            let topic = take_str(&mut body, "PUBLISH")?;
            let packet_id = if qos == QoS::AtMostOnce {
                None
            } else {
                need(&body, 2, "PUBLISH")?;
                Some(body.get_u16())
            };
            Ok(Packet::Publish {
                topic,
                payload: body,
                qos,
                retain: header & 0x01 == 1,
                packet_id,
            })
        }
        PUBACK => {
            need(&body, 2, "PUBACK")?;
            Ok(Packet::PubAck(body.get_u16()))
        }
        SUBACK => {
            need(&body, 2, "SUBACK")?;
            let packet_id = body.get_u16();
            Ok(Packet::SubAck {
                packet_id,
                codes: body.to_vec(),
            })
        }
        UNSUBACK => {
            need(&body, 2, "UNSUBACK")?;
            Ok(Packet::UnsubAck(body.get_u16()))
        }
        PINGRESP => Ok(Packet::PingResp),
        other => Ok(Packet::Other(other)),
    }
}

fn need(body: &Bytes, n: usize, packet: &str) -> Result<(), ClientError> {
    if body.len() < n {
        return Err(ClientError::Protocol(format!("{packet} truncated")));
    }
    Ok(())
}

fn take_str(body: &mut Bytes, packet: &str) -> Result<String, ClientError> {
    need(body, 2, packet)?;
    let len = body.get_u16() as usize;
    need(body, len, packet)?;
    let raw = body.split_to(len);
    String::from_utf8(raw.to_vec())
        .map_err(|_| ClientError::Protocol(format!("{packet} topic is not utf-8")))
}

#[cfg(test)]
#[path = "codec_test.rs"]
mod tests;
