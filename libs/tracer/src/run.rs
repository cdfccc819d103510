use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use capture_api::{PubSubClient, QueryError, TraceStore, TracerConfig, parse_instant};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::TraceError;
use crate::tracer::Tracer;

/// Parameters of one `trace` invocation.
#[derive(Debug, Clone, Default)]
pub struct TraceOptions {
    pub profile: String,
    pub key: String,
    pub topics: Vec<String>,
    /// RFC 3339, blank for no lower bound.
    pub start: String,
    /// RFC 3339, blank to run until stopped.
    pub end: String,
    pub timeout: Option<Duration>,
}

impl TraceOptions {
    /// Validate times and build the durable config. Touches nothing.
    pub fn to_config(&self) -> Result<TracerConfig, TraceError> {
        let key = self.key.trim();
        if key.is_empty() {
            return Err(TraceError::MissingKey);
        }
        let start = parse_instant("start", &self.start)?;
        let end = parse_instant("end", &self.end)?;

        let mut cfg = TracerConfig::new(self.profile.trim(), key).with_topics(self.topics.iter().cloned());
        if let Some(end) = end {
            if end <= Utc::now() {
                return Err(TraceError::EndInPast(end));
            }
            cfg = cfg.with_end(end);
        }
        if let Some(start) = start {
            if cfg.end.is_some_and(|end| start > end) {
                return Err(QueryError::StartAfterEnd.into());
            }
            cfg = cfg.with_start(start);
        }
        Ok(cfg)
    }
}

/// Run one capture session to completion.
///
/// Order matters: times are validated before the store is touched, and an
/// existing partition fails before the client connects. The session ends when
/// `end` is reached, the broker closes the subscription, `shutdown` fires or
/// the timeout elapses; the last case is reported as
/// [`TraceError::DeadlineExceeded`] after the tracer has been stopped.
///
/// Returns the final per-topic counts.
pub async fn run_trace(
    opts: TraceOptions,
    store: Arc<dyn TraceStore>,
    client: Arc<dyn PubSubClient>,
    shutdown: CancellationToken,
) -> Result<HashMap<String, u64>, TraceError> {
    let cfg = opts.to_config()?;
    let profile = cfg.profile_name().to_string();

    if store.has_data(&profile, &cfg.key)? {
        return Err(TraceError::DataExists {
            profile,
            key: cfg.key,
        });
    }
    store.add_trace(cfg.clone())?;

    client.connect().await?;
    let tracer = Tracer::new(cfg, store, client)?;
    tracer.start().await?;

    let waited = async {
        tokio::select! {
            _ = tracer.wait() => {}
            _ = shutdown.cancelled() => tracing::info!("trace interrupted"),
        }
    };
    let outcome = match opts.timeout {
        Some(limit) => tokio::time::timeout(limit, waited)
            .await
            .map_err(|_| TraceError::DeadlineExceeded(limit)),
        None => {
            waited.await;
            Ok(())
        }
    };

    tracer.stop().await?;
    let counts = tracer.counts();
    let mut topics: Vec<_> = counts.iter().collect();
    topics.sort();
    for (topic, count) in topics {
        tracing::info!(key = %tracer.config().key, topic = %topic, count, "trace count");
    }

    outcome.map(|()| counts)
}

#[cfg(test)]
#[path = "run_test.rs"]
mod tests;
