//! Shared model for the capture engine.
//!
//! Everything that crosses a crate boundary lives here: the captured
//! [`Message`], the durable [`TracerConfig`], the store traits the tracer and
//! history search are written against, and the narrow publish/subscribe
//! capability the tracer needs from a broker client.

pub mod client;
pub mod error;
pub mod filter;
pub mod message;
pub mod query;
pub mod store;
pub mod trace;

pub use client::{BoxFuture, PubSubClient, QoS, Subscription};
pub use error::{ClientError, QueryError, StoreError};
pub use filter::{fuzzy_match_topic, search_messages, topic_filter_matches};
pub use message::{Kind, Message};
pub use query::{SearchQuery, parse_instant};
pub use store::{HistoryStore, TraceStore};
pub use trace::{DEFAULT_PROFILE, TracerConfig, profile_or_default};
