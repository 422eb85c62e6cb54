#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("secrets ({context}): {detail}")]
    Secrets { context: &'static str, detail: String },

    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("payment client: {0}")]
    Payment(#[from] payments::PaymentError),

    #[error("http server: {0}")]
    Serve(std::io::Error),

    #[error("api task: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}
