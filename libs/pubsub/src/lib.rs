//! Broker clients implementing [`capture_api::PubSubClient`].
//!
//! [`MqttClient`] speaks MQTT 3.1.1 over TCP; [`MemoryBroker`] hands out
//! in-process clients for tests and offline runs.

pub mod codec;
mod memory;
mod mqtt;

pub use codec::ConnectOptions;
pub use memory::{MemoryBroker, MemoryClient};
pub use mqtt::MqttClient;
