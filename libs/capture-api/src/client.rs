use std::future::Future;
use std::pin::Pin;

use crate::error::ClientError;
use crate::message::Message;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Delivery guarantee requested for a publish or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl QoS {
    pub fn from_u8(level: u8) -> Option<Self> {
        match level {
            0 => Some(QoS::AtMostOnce),
            1 => Some(QoS::AtLeastOnce),
            2 => Some(QoS::ExactlyOnce),
            _ => None,
        }
    }
}

/// Stream of messages delivered for one subscribe call.
///
/// `recv` yields `None` once the underlying session is gone, either because
/// the client disconnected or because the subscription was dropped by the
/// broker side.
pub trait Subscription: Send {
    fn recv(&mut self) -> BoxFuture<'_, Option<Message>>;

    /// A message that is already queued, without waiting for more.
    fn try_recv(&mut self) -> Option<Message>;
}

/// The narrow publish/subscribe surface the capture engine needs from a broker
/// client. Session resumption, retries and will messages are the client's own
/// business.
pub trait PubSubClient: Send + Sync {
    fn connect(&self) -> BoxFuture<'_, Result<(), ClientError>>;

    fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retained: bool,
        payload: &[u8],
    ) -> BoxFuture<'_, Result<(), ClientError>>;

    fn subscribe(&self, filters: &[String]) -> BoxFuture<'_, Result<Box<dyn Subscription>, ClientError>>;

    fn unsubscribe(&self, filters: &[String]) -> BoxFuture<'_, Result<(), ClientError>>;

    fn disconnect(&self) -> BoxFuture<'_, Result<(), ClientError>>;
}
