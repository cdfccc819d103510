use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use capture_api::{Message, PubSubClient, Subscription, TraceStore, TracerConfig};
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::TracerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Starting,
    Running,
    Stopped,
}

// ════════════════════════════════════════════════════════════════
//  Tracer
// ════════════════════════════════════════════════════════════════

/// One bounded capture session.
///
/// `Created → Running → Stopped`. A stopped tracer stays stopped; start a new
/// one for the next run.
pub struct Tracer {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    config: TracerConfig,
    store: Arc<dyn TraceStore>,
    client: Arc<dyn PubSubClient>,
    phase: Mutex<Phase>,
    running: AtomicBool,
    session_closed: AtomicBool,
    counts: Mutex<HashMap<String, u64>>,
    cancel: CancellationToken,
    finished: CancellationToken,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => {
            tracing::warn!("tracer lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl Inner {
    fn finish(&self) {
        *lock(&self.phase) = Phase::Stopped;
        self.running.store(false, Ordering::Release);
        self.finished.cancel();
    }

    fn record(&self, message: Message) {
        let topic = message.topic.clone();
        match self
            .store
            .append(self.config.profile_name(), &self.config.key, message)
        {
            Ok(()) => *lock(&self.counts).entry(topic).or_default() += 1,
            Err(e) => tracing::error!(
                key = %self.config.key,
                topic = %topic,
                error = %e,
                "trace append failed"
            ),
        }
    }
}

impl Tracer {
    /// Build a tracer in the `Created` state, seeding its counters from what
    /// the store already holds for the partition.
    pub fn new(
        config: TracerConfig,
        store: Arc<dyn TraceStore>,
        client: Arc<dyn PubSubClient>,
    ) -> Result<Self, TracerError> {
        let counts = store.load_counts(config.profile_name(), &config.key, &config.topics)?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                store,
                client,
                phase: Mutex::new(Phase::Created),
                running: AtomicBool::new(false),
                session_closed: AtomicBool::new(false),
                counts: Mutex::new(counts),
                cancel: CancellationToken::new(),
                finished: CancellationToken::new(),
            }),
            task: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &TracerConfig {
        &self.inner.config
    }

    /// Subscribe and begin recording.
    ///
    /// The partition must be empty: existing data fails with
    /// [`TracerError::DataExists`] before anything is subscribed.
    pub async fn start(&self) -> Result<(), TracerError> {
        {
            let mut phase = lock(&self.inner.phase);
            match *phase {
                Phase::Created => *phase = Phase::Starting,
                Phase::Starting | Phase::Running => return Err(TracerError::AlreadyRunning),
                Phase::Stopped => return Err(TracerError::Stopped),
            }
        }

        let subscription = match self.subscribe().await {
            Ok(sub) => sub,
            Err(e) => {
                let mut phase = lock(&self.inner.phase);
                if *phase == Phase::Starting {
                    *phase = Phase::Created;
                }
                return Err(e);
            }
        };

        {
            let mut phase = lock(&self.inner.phase);
            if *phase != Phase::Starting {
                // Stopped while subscribing.
                return Err(TracerError::Stopped);
            }
            *phase = Phase::Running;
            self.inner.running.store(true, Ordering::Release);
        }

        let cfg = &self.inner.config;
        tracing::info!(
            profile = %cfg.profile_name(),
            key = %cfg.key,
            topics = ?cfg.subscription_filters(),
            "tracer started"
        );
        let handle = tokio::spawn(receive_loop(self.inner.clone(), subscription));
        *lock(&self.task) = Some(handle);
        Ok(())
    }

    async fn subscribe(&self) -> Result<Box<dyn Subscription>, TracerError> {
        let cfg = &self.inner.config;
        if self.inner.store.has_data(cfg.profile_name(), &cfg.key)? {
            return Err(TracerError::DataExists {
                profile: cfg.profile_name().to_string(),
                key: cfg.key.clone(),
            });
        }
        Ok(self.inner.client.subscribe(&cfg.subscription_filters()).await?)
    }

    /// Unsubscribe, close the session and move to `Stopped`. Idempotent.
    pub async fn stop(&self) -> Result<(), TracerError> {
        let previous = {
            let mut phase = lock(&self.inner.phase);
            std::mem::replace(&mut *phase, Phase::Stopped)
        };
        self.inner.running.store(false, Ordering::Release);
        self.inner.cancel.cancel();

        let task = lock(&self.task).take();
        if let Some(task) = task {
            let _ = task.await;
        }

        if previous != Phase::Created && !self.inner.session_closed.swap(true, Ordering::AcqRel) {
            let filters = self.inner.config.subscription_filters();
            if let Err(e) = self.inner.client.unsubscribe(&filters).await {
                tracing::warn!(key = %self.inner.config.key, error = %e, "unsubscribe failed");
            }
            if let Err(e) = self.inner.client.disconnect().await {
                tracing::warn!(key = %self.inner.config.key, error = %e, "disconnect failed");
            }
            tracing::info!(key = %self.inner.config.key, "tracer stopped");
        }
        self.inner.finished.cancel();
        Ok(())
    }

    pub fn running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Resolves once the tracer has stopped, for whatever reason.
    pub async fn wait(&self) {
        self.inner.finished.cancelled().await;
    }

    /// Per-topic message counts recorded so far.
    pub fn counts(&self) -> HashMap<String, u64> {
        lock(&self.inner.counts).clone()
    }

    /// Everything persisted for this trace. Safe to call while running.
    pub fn messages(&self) -> Result<Vec<Message>, TracerError> {
        let cfg = &self.inner.config;
        Ok(self.inner.store.messages(cfg.profile_name(), &cfg.key)?)
    }
}

async fn receive_loop(inner: Arc<Inner>, mut subscription: Box<dyn Subscription>) {
    let deadline = inner.config.end.map(|end| {
        let left = (end - Utc::now()).to_std().unwrap_or_default();
        Instant::now() + left
    });

    loop {
        let message = tokio::select! {
            biased;
            msg = subscription.recv() => match msg {
                Some(m) => m,
                None => {
                    tracing::info!(key = %inner.config.key, "subscription closed");
                    break;
                }
            },
            _ = inner.cancel.cancelled() => {
                drain(&inner, subscription.as_mut());
                break;
            }
            _ = sleep_until(deadline) => {
                tracing::info!(key = %inner.config.key, "trace end reached");
                drain(&inner, subscription.as_mut());
                break;
            }
        };

        if inner.config.precedes_start(message.timestamp) {
            continue;
        }
        if inner.config.is_expired(Utc::now()) {
            if !past_end(&inner.config, &message) {
                inner.record(message);
            }
            drain(&inner, subscription.as_mut());
            break;
        }
        inner.record(message);
    }
    inner.finish();
}

/// Record whatever the subscription already holds, stopping at the end of the
/// window.
fn drain(inner: &Inner, subscription: &mut dyn Subscription) {
    let mut drained = 0usize;
    while let Some(message) = subscription.try_recv() {
        if inner.config.precedes_start(message.timestamp) || past_end(&inner.config, &message) {
            continue;
        }
        inner.record(message);
        drained += 1;
    }
    if drained > 0 {
        tracing::debug!(key = %inner.config.key, drained, "queued messages recorded");
    }
}

fn past_end(config: &TracerConfig, message: &Message) -> bool {
    config.end.is_some_and(|end| message.timestamp > end)
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "tracer_test.rs"]
mod tests;
