use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::RelayError;

const FIRST_CHUNK: usize = 8 * 1024;

/// Picks the upstream address for one inbound connection.
pub trait Destination: Send + Sync + 'static {
    fn upstream(&self, peer: SocketAddr) -> Result<String, RelayError>;
}

/// Every connection goes to the same configured upstream.
#[derive(Debug, Clone)]
pub struct FixedUpstream(pub String);

impl Destination for FixedUpstream {
    fn upstream(&self, peer: SocketAddr) -> Result<String, RelayError> {
        if self.0.is_empty() {
            return Err(RelayError::NoDestination(peer.to_string()));
        }
        Ok(self.0.clone())
    }
}

// ════════════════════════════════════════════════════════════════
//  Relay
// ════════════════════════════════════════════════════════════════

/// Control handle of a running relay.
///
/// Dropping the handle does not stop the relay; call [`stop`](Self::stop).
#[derive(Debug, Clone)]
pub struct RelayHandle {
    addr: String,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl RelayHandle {
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Close the listener and every relayed connection. Idempotent.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!(addr = %self.addr, "relay stopping");
        }
        self.cancel.cancel();
        self.tracker.close();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the accept loop and every connection task have exited.
    /// Only returns after [`stop`](Self::stop).
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }
}

/// Bind a transparent TCP relay and start accepting.
///
/// An empty `bind_hint` binds an ephemeral port on loopback. Returns the bound
/// address together with the control handle.
pub async fn start(
    bind_hint: &str,
    destination: Arc<dyn Destination>,
) -> Result<(String, RelayHandle), RelayError> {
    let bind = if bind_hint.trim().is_empty() {
        "127.0.0.1:0"
    } else {
        bind_hint.trim()
    };
    let listener = TcpListener::bind(bind).await.map_err(|e| RelayError::Bind {
        addr: bind.to_string(),
        source: e,
    })?;
    let addr = listener.local_addr()?.to_string();
    tracing::info!(addr = %addr, "relay listening");

    let handle = RelayHandle {
        addr: addr.clone(),
        cancel: CancellationToken::new(),
        tracker: TaskTracker::new(),
    };
    handle.tracker.spawn(accept_loop(
        listener,
        destination,
        handle.cancel.clone(),
        handle.tracker.clone(),
    ));
    Ok((addr, handle))
}

async fn accept_loop(
    listener: TcpListener,
    destination: Arc<dyn Destination>,
    cancel: CancellationToken,
    tracker: TaskTracker,
) {
    loop {
        let (stream, peer) = tokio::select! {
            _ = cancel.cancelled() => break,
            res = listener.accept() => match res {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "relay accept failed");
                    continue;
                }
            },
        };

        let destination = destination.clone();
        let cancel = cancel.clone();
        tracker.spawn(async move {
            match relay_connection(stream, peer, destination.as_ref(), cancel).await {
                Ok(Some((up, down))) => {
                    tracing::debug!(peer = %peer, bytes_up = up, bytes_down = down, "relay connection closed");
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(peer = %peer, error = %e, "relay connection failed"),
            }
        });
    }
    tracing::debug!("relay listener closed");
}

/// Forward one inbound connection. `Ok(None)` is a liveness probe: the peer
/// closed before sending anything and no upstream was dialed.
///
/// The upstream is dialed only after the client's first bytes arrive. That
/// fits MQTT, where the client always opens with CONNECT. A protocol whose
/// server speaks first would stall here until the client writes.
async fn relay_connection(
    mut inbound: TcpStream,
    peer: SocketAddr,
    destination: &dyn Destination,
    cancel: CancellationToken,
) -> Result<Option<(u64, u64)>, RelayError> {
    let mut first = vec![0u8; FIRST_CHUNK];
    let n = tokio::select! {
        _ = cancel.cancelled() => return Ok(None),
        res = inbound.read(&mut first) => res?,
    };
    if n == 0 {
        tracing::trace!(peer = %peer, "relay liveness probe");
        return Ok(None);
    }

    let upstream = destination.upstream(peer)?;
    let mut outbound = TcpStream::connect(&upstream)
        .await
        .map_err(|e| RelayError::Dial {
            addr: upstream.clone(),
            source: e,
        })?;
    let _ = outbound.set_nodelay(true);
    outbound.write_all(&first[..n]).await?;
    tracing::debug!(peer = %peer, upstream = %upstream, "relay connection opened");

    tokio::select! {
        _ = cancel.cancelled() => Ok(None),
        res = tokio::io::copy_bidirectional(&mut inbound, &mut outbound) => {
            let (up, down) = res?;
            Ok(Some((up + n as u64, down)))
        }
    }
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;
