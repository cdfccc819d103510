use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use capture_api::{
    BoxFuture, ClientError, Kind, Message, PubSubClient, QoS, Subscription, topic_filter_matches,
};
use tokio::sync::mpsc;

// ════════════════════════════════════════════════════════════════
//  MemoryBroker
// ════════════════════════════════════════════════════════════════

/// In-process broker. Clients created from it see each other's publishes
/// and retained messages, with MQTT wildcard routing.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

#[derive(Default)]
struct BrokerInner {
    state: Mutex<BrokerState>,
    next_client: AtomicU64,
}

#[derive(Default)]
struct BrokerState {
    routes: Vec<Route>,
    retained: BTreeMap<String, Message>,
}

struct Route {
    client: u64,
    filters: Vec<String>,
    tx: mpsc::UnboundedSender<Message>,
}

impl BrokerInner {
    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("memory broker lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn route(&self, message: Message) -> usize {
        let mut state = self.lock();
        if message.retained {
            if message.payload.is_empty() {
                state.retained.remove(&message.topic);
            } else {
                state.retained.insert(message.topic.clone(), message.clone());
            }
        }

        let mut delivered = 0;
        state.routes.retain(|route| {
            if !route.filters.iter().any(|f| topic_filter_matches(f, &message.topic)) {
                return !route.tx.is_closed();
            }
            // Live deliveries never carry the retain flag.
            let ok = route.tx.send(message.clone().retained(false)).is_ok();
            delivered += usize::from(ok);
            ok
        });
        delivered
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new, not yet connected client.
    pub fn client(&self) -> MemoryClient {
        MemoryClient {
            id: self.inner.next_client.fetch_add(1, Ordering::Relaxed),
            broker: self.inner.clone(),
            connected: AtomicBool::new(false),
        }
    }

    /// Publish without a client. Returns how many subscriptions got it.
    pub fn publish(&self, topic: &str, payload: &[u8]) -> usize {
        self.inner.route(Message::new(topic, payload, Kind::Publish))
    }

    /// Open subscriptions across all clients.
    pub fn subscription_count(&self) -> usize {
        let mut state = self.inner.lock();
        state.routes.retain(|r| !r.tx.is_closed());
        state.routes.len()
    }
}

// ════════════════════════════════════════════════════════════════
//  MemoryClient
// ════════════════════════════════════════════════════════════════

pub struct MemoryClient {
    id: u64,
    broker: Arc<BrokerInner>,
    connected: AtomicBool,
}

struct MemorySubscription {
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Subscription for MemorySubscription {
    fn recv(&mut self) -> BoxFuture<'_, Option<Message>> {
        Box::pin(self.rx.recv())
    }

    fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

impl MemoryClient {
    fn ensure_connected(&self) -> Result<(), ClientError> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }

    fn drop_routes(&self) {
        let id = self.id;
        self.broker.lock().routes.retain(|r| r.client != id);
    }
}

impl PubSubClient for MemoryClient {
    fn connect(&self) -> BoxFuture<'_, Result<(), ClientError>> {
        self.connected.store(true, Ordering::Release);
        Box::pin(async { Ok(()) })
    }

    fn publish(
        &self,
        topic: &str,
        _qos: QoS,
        retained: bool,
        payload: &[u8],
    ) -> BoxFuture<'_, Result<(), ClientError>> {
        let message = Message::new(topic, payload, Kind::Publish).retained(retained);
        Box::pin(async move {
            self.ensure_connected()?;
            self.broker.route(message);
            Ok(())
        })
    }

    fn subscribe(&self, filters: &[String]) -> BoxFuture<'_, Result<Box<dyn Subscription>, ClientError>> {
        let filters = filters.to_vec();
        Box::pin(async move {
            self.ensure_connected()?;
            let (tx, rx) = mpsc::unbounded_channel();
            let mut state = self.broker.lock();
            for msg in state.retained.values() {
                if filters.iter().any(|f| topic_filter_matches(f, &msg.topic)) {
                    let _ = tx.send(msg.clone());
                }
            }
            state.routes.push(Route {
                client: self.id,
                filters,
                tx,
            });
            Ok(Box::new(MemorySubscription { rx }) as Box<dyn Subscription>)
        })
    }

    fn unsubscribe(&self, filters: &[String]) -> BoxFuture<'_, Result<(), ClientError>> {
        let filters = filters.to_vec();
        Box::pin(async move {
            self.ensure_connected()?;
            let id = self.id;
            self.broker.lock().routes.retain_mut(|route| {
                if route.client == id {
                    route.filters.retain(|f| !filters.contains(f));
                }
                !route.filters.is_empty()
            });
            Ok(())
        })
    }

    fn disconnect(&self) -> BoxFuture<'_, Result<(), ClientError>> {
        self.connected.store(false, Ordering::Release);
        self.drop_routes();
        Box::pin(async { Ok(()) })
    }
}

impl Drop for MemoryClient {
    fn drop(&mut self) {
        self.drop_routes();
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
