#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Trace(#[from] tracer::TraceError),

    #[error("store: {0}")]
    Store(#[from] capture_api::StoreError),

    #[error("query: {0}")]
    Query(#[from] capture_api::QueryError),

    #[error("client: {0}")]
    Client(#[from] capture_api::ClientError),

    #[error("relay: {0}")]
    Relay(#[from] relay::RelayError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}
