use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event classification of a captured message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    #[default]
    Publish,
    SubscribeAck,
    Log,
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::Publish => write!(f, "pub"),
            Kind::SubscribeAck => write!(f, "suback"),
            Kind::Log => write!(f, "log"),
        }
    }
}

/// One captured event.
///
/// `timestamp`, `topic` and `kind` never change once the message is stored.
/// `archived` only ever moves from `false` to `true`, and only through
/// [`crate::HistoryStore::archive`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned identifier, `0` until the message is appended to a
    /// history log.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: u64,
    /// Capture/receipt time, not necessarily broker-assigned.
    pub timestamp: DateTime<Utc>,
    pub topic: String,
    #[serde(with = "payload")]
    pub payload: Vec<u8>,
    #[serde(default)]
    pub kind: Kind,
    #[serde(default)]
    pub retained: bool,
    #[serde(default)]
    pub archived: bool,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>, kind: Kind) -> Self {
        Self {
            id: 0,
            timestamp: Utc::now(),
            topic: topic.into(),
            payload: payload.into(),
            kind,
            retained: false,
            archived: false,
        }
    }

    /// A `publish` message received now.
    pub fn publish(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(topic, payload, Kind::Publish)
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn retained(mut self, retained: bool) -> Self {
        self.retained = retained;
        self
    }

    pub fn archived(mut self, archived: bool) -> Self {
        self.archived = archived;
        self
    }

    /// Payload as text, lossy for non UTF-8 bodies.
    pub fn payload_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Payload is written as a plain string when it is valid UTF-8 (the common
/// case, keeps the JSONL files greppable) and as a byte array otherwise.
mod payload {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(bytes) {
            Ok(text) => serializer.serialize_str(text),
            Err(_) => serializer.serialize_bytes(bytes),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Bytes(Vec<u8>),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(text) => text.into_bytes(),
            Repr::Bytes(bytes) => bytes,
        })
    }
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
