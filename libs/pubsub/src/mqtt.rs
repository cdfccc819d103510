use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use capture_api::{
    BoxFuture, ClientError, Kind, Message, PubSubClient, QoS, Subscription, topic_filter_matches,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::codec::{self, ConnectOptions, Packet, SUBACK_FAILURE};

const ACK_TIMEOUT: Duration = Duration::from_secs(10);

// ════════════════════════════════════════════════════════════════
//  MqttClient
// ════════════════════════════════════════════════════════════════

/// Plain-TCP MQTT 3.1.1 client.
///
/// One reader task decodes incoming packets and fans PUBLISH out to every
/// subscription whose filters match; one writer task owns the socket's write
/// half and sends keep-alive pings.
pub struct MqttClient {
    addr: String,
    options: ConnectOptions,
    shared: Arc<Shared>,
    conn: Mutex<Option<Connection>>,
}

struct Connection {
    outbound: mpsc::UnboundedSender<Bytes>,
    cancel: CancellationToken,
    writer: JoinHandle<()>,
}

#[derive(Default)]
struct Shared {
    routes: Mutex<Vec<Route>>,
    pending: Mutex<HashMap<u16, oneshot::Sender<Vec<u8>>>>,
    next_id: AtomicU16,
}

struct Route {
    filters: Vec<String>,
    tx: mpsc::UnboundedSender<Message>,
}

struct MqttSubscription {
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Subscription for MqttSubscription {
    fn recv(&mut self) -> BoxFuture<'_, Option<Message>> {
        Box::pin(self.rx.recv())
    }

    fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => {
            tracing::warn!("mqtt client lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl Shared {
    fn packet_id(&self) -> u16 {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    fn dispatch(&self, message: Message) {
        let mut routes = lock(&self.routes);
        routes.retain(|route| {
            if !route.filters.iter().any(|f| topic_filter_matches(f, &message.topic)) {
                return !route.tx.is_closed();
            }
            route.tx.send(message.clone()).is_ok()
        });
    }

    fn ack(&self, packet_id: u16, codes: Vec<u8>) {
        if let Some(waiter) = lock(&self.pending).remove(&packet_id) {
            let _ = waiter.send(codes);
        }
    }

    /// Drop every route, which ends every open subscription.
    fn close_routes(&self) {
        lock(&self.routes).clear();
        lock(&self.pending).clear();
    }
}

impl MqttClient {
    pub fn new(addr: impl Into<String>, options: ConnectOptions) -> Self {
        Self {
            addr: addr.into(),
            options,
            shared: Arc::new(Shared::default()),
            conn: Mutex::new(None),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn outbound(&self) -> Result<mpsc::UnboundedSender<Bytes>, ClientError> {
        lock(&self.conn)
            .as_ref()
            .map(|c| c.outbound.clone())
            .ok_or(ClientError::NotConnected)
    }

    fn send(&self, packet: BytesMut) -> Result<(), ClientError> {
        self.outbound()?
            .send(packet.freeze())
            .map_err(|_| ClientError::Closed)
    }

    async fn do_connect(&self) -> Result<(), ClientError> {
        if lock(&self.conn).as_ref().is_some_and(|c| !c.cancel.is_cancelled()) {
            return Ok(());
        }

        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| ClientError::Connect {
                addr: self.addr.clone(),
                detail: e.to_string(),
            })?;
        let _ = stream.set_nodelay(true);
        let (mut reader, mut writer) = stream.into_split();

        writer.write_all(&codec::connect(&self.options)).await?;

        let mut buf = BytesMut::with_capacity(4096);
        let connack = tokio::time::timeout(ACK_TIMEOUT, read_packet(&mut reader, &mut buf))
            .await
            .map_err(|_| ClientError::Protocol("timed out waiting for CONNACK".into()))??;
        match connack {
            Packet::ConnAck { code: 0, .. } => {}
            Packet::ConnAck { code, .. } => {
                return Err(ClientError::Connect {
                    addr: self.addr.clone(),
                    detail: format!("broker refused connection, code {code}"),
                });
            }
            other => {
                return Err(ClientError::Protocol(format!("expected CONNACK, got {other:?}")));
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let keep_alive = Duration::from_secs(u64::from(self.options.keep_alive_secs.max(1)));
        let writer = tokio::spawn(write_loop(writer, rx, keep_alive, cancel.clone()));
        tokio::spawn(read_loop(
            reader,
            buf,
            self.shared.clone(),
            tx.clone(),
            cancel.clone(),
        ));

        *lock(&self.conn) = Some(Connection {
            outbound: tx,
            cancel,
            writer,
        });
        tracing::info!(addr = %self.addr, client_id = %self.options.client_id, "mqtt connected");
        Ok(())
    }

    async fn do_subscribe(&self, filters: Vec<String>) -> Result<Box<dyn Subscription>, ClientError> {
        let outbound = self.outbound()?;
        let packet_id = self.shared.packet_id();
        let (ack_tx, ack_rx) = oneshot::channel();
        let (tx, rx) = mpsc::unbounded_channel();

        lock(&self.shared.pending).insert(packet_id, ack_tx);
        lock(&self.shared.routes).push(Route {
            filters: filters.clone(),
            tx,
        });

        outbound
            .send(codec::subscribe(packet_id, &filters, QoS::AtMostOnce).freeze())
            .map_err(|_| ClientError::Closed)?;

        let codes = match tokio::time::timeout(ACK_TIMEOUT, ack_rx).await {
            Ok(Ok(codes)) => codes,
            Ok(Err(_)) => return Err(ClientError::Closed),
            Err(_) => {
                lock(&self.shared.pending).remove(&packet_id);
                return Err(ClientError::Protocol("timed out waiting for SUBACK".into()));
            }
        };
        if codes.contains(&SUBACK_FAILURE) {
            return Err(ClientError::Protocol(format!("broker rejected subscription {filters:?}")));
        }

        tracing::debug!(?filters, packet_id, "subscribed");
        Ok(Box::new(MqttSubscription { rx }))
    }

    async fn do_disconnect(&self) -> Result<(), ClientError> {
        let Some(conn) = lock(&self.conn).take() else {
            return Ok(());
        };
        let _ = conn.outbound.send(codec::disconnect().freeze());
        drop(conn.outbound);
        conn.cancel.cancel();
        let _ = tokio::time::timeout(ACK_TIMEOUT, conn.writer).await;
        self.shared.close_routes();
        tracing::info!(addr = %self.addr, "mqtt disconnected");
        Ok(())
    }
}

impl PubSubClient for MqttClient {
    fn connect(&self) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(self.do_connect())
    }

    fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retained: bool,
        payload: &[u8],
    ) -> BoxFuture<'_, Result<(), ClientError>> {
        let packet_id = (qos != QoS::AtMostOnce).then(|| self.shared.packet_id());
        let packet = codec::publish(topic, qos, retained, packet_id, payload);
        Box::pin(async move { self.send(packet) })
    }

    fn subscribe(&self, filters: &[String]) -> BoxFuture<'_, Result<Box<dyn Subscription>, ClientError>> {
        let filters = filters.to_vec();
        Box::pin(self.do_subscribe(filters))
    }

    fn unsubscribe(&self, filters: &[String]) -> BoxFuture<'_, Result<(), ClientError>> {
        let filters = filters.to_vec();
        Box::pin(async move {
            let packet_id = self.shared.packet_id();
            self.send(codec::unsubscribe(packet_id, &filters))?;
            lock(&self.shared.routes).retain_mut(|route| {
                route.filters.retain(|f| !filters.contains(f));
                !route.filters.is_empty()
            });
            Ok(())
        })
    }

    fn disconnect(&self) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(self.do_disconnect())
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        if let Some(conn) = lock(&self.conn).take() {
            conn.cancel.cancel();
        }
    }
}

// ── Tasks ──

async fn read_packet(reader: &mut OwnedReadHalf, buf: &mut BytesMut) -> Result<Packet, ClientError> {
    loop {
        if let Some(packet) = codec::decode(buf)? {
            return Ok(packet);
        }
        if reader.read_buf(buf).await? == 0 {
            return Err(ClientError::Closed);
        }
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    mut buf: BytesMut,
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<Bytes>,
    cancel: CancellationToken,
) {
    loop {
        let packet = tokio::select! {
            _ = cancel.cancelled() => break,
            res = read_packet(&mut reader, &mut buf) => match res {
                Ok(p) => p,
                Err(ClientError::Closed) => {
                    tracing::info!("mqtt connection closed by broker");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "mqtt read failed");
                    break;
                }
            },
        };

        match packet {
            Packet::Publish {
                topic,
                payload,
                qos,
                retain,
                packet_id,
            } => {
                if let (QoS::AtLeastOnce, Some(id)) = (qos, packet_id) {
                    let _ = outbound.send(codec::puback(id).freeze());
                }
                shared.dispatch(Message::new(topic, payload.to_vec(), Kind::Publish).retained(retain));
            }
            Packet::SubAck { packet_id, codes } => shared.ack(packet_id, codes),
            Packet::PingResp | Packet::PubAck(_) | Packet::UnsubAck(_) => {}
            other => tracing::debug!(?other, "ignoring packet"),
        }
    }
    cancel.cancel();
    shared.close_routes();
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
    keep_alive: Duration,
    cancel: CancellationToken,
) {
    let mut ping = tokio::time::interval_at(tokio::time::Instant::now() + keep_alive, keep_alive);
    loop {
        let bytes = tokio::select! {
            msg = rx.recv() => match msg {
                Some(b) => b,
                None => break,
            },
            _ = ping.tick() => codec::pingreq().freeze(),
            _ = cancel.cancelled() => {
                // Flush what was queued before the cancel, DISCONNECT included.
                while let Ok(b) = rx.try_recv() {
                    if writer.write_all(&b).await.is_err() {
                        break;
                    }
                }
                break;
            }
        };
        if let Err(e) = writer.write_all(&bytes).await {
            tracing::warn!(error = %e, "mqtt write failed");
            cancel.cancel();
            break;
        }
    }
    let _ = writer.shutdown().await;
}

#[cfg(test)]
#[path = "mqtt_test.rs"]
mod tests;
