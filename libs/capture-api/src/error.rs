#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store is closed")]
    Closed,

    #[error("io ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("format ({context}): {detail}")]
    Format { context: String, detail: String },

    #[error("trace '{key}' already has data for profile '{profile}'")]
    TraceExists { profile: String, key: String },

    #[error("trace '{0}' not found")]
    TraceNotFound(String),

    #[error("invalid partition name '{0}'")]
    InvalidName(String),
}

impl StoreError {
    pub fn io(context: impl std::fmt::Display, source: std::io::Error) -> Self {
        StoreError::Io {
            context: context.to_string(),
            source,
        }
    }

    pub fn format(context: impl std::fmt::Display, detail: impl std::fmt::Display) -> Self {
        StoreError::Format {
            context: context.to_string(),
            detail: detail.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connect {addr}: {detail}")]
    Connect { addr: String, detail: String },

    #[error("protocol: {0}")]
    Protocol(String),

    #[error("client is not connected")]
    NotConnected,

    #[error("connection closed")]
    Closed,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid {field} time '{value}': {detail}")]
    InvalidTime {
        field: &'static str,
        value: String,
        detail: String,
    },

    #[error("end must be after start")]
    StartAfterEnd,
}
