//! Transparent TCP relay placed between the capture clients and the broker.
//!
//! Bytes are forwarded untouched in both directions; one upstream connection
//! is opened per inbound connection.

mod error;
mod relay;
mod reuse;

pub use error::RelayError;
pub use relay::{Destination, FixedUpstream, RelayHandle, start};
pub use reuse::{RELAY_ADDR_KEY, init, is_dialable, load_relay_addr, save_relay_addr};
