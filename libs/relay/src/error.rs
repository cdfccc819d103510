#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dial upstream {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no upstream for peer {0}")]
    NoDestination(String),

    #[error("config ({context}): {detail}")]
    Config { context: String, detail: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
