use std::time::Duration;

use capture_api::{ClientError, QueryError, StoreError};
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum TracerError {
    #[error("tracer is already running")]
    AlreadyRunning,

    #[error("tracer was stopped and cannot be restarted")]
    Stopped,

    #[error("trace '{key}' already has data for profile '{profile}'")]
    DataExists { profile: String, key: String },

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("client: {0}")]
    Client(#[from] ClientError),
}

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error(transparent)]
    InvalidTime(#[from] QueryError),

    #[error("trace key is required")]
    MissingKey,

    #[error("end time {0} is in the past")]
    EndInPast(DateTime<Utc>),

    #[error("trace '{key}' already has data for profile '{profile}'")]
    DataExists { profile: String, key: String },

    #[error("trace did not finish within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("profile '{0}' not found")]
    Profile(String),

    #[error(transparent)]
    Tracer(TracerError),

    #[error("store: {0}")]
    Store(StoreError),

    #[error("client: {0}")]
    Client(#[from] ClientError),
}

impl From<TracerError> for TraceError {
    fn from(e: TracerError) -> Self {
        match e {
            TracerError::DataExists { profile, key } => TraceError::DataExists { profile, key },
            other => TraceError::Tracer(other),
        }
    }
}

impl From<StoreError> for TraceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::TraceExists { profile, key } => TraceError::DataExists { profile, key },
            other => TraceError::Store(other),
        }
    }
}
