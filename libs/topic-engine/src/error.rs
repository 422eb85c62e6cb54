use std::path::PathBuf;

/// Failures of the on-disk record log.
///
/// Open and decode failures are separate variants: the first means the log
/// could not be reached at all, the second that its contents cannot be trusted.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("decode {}:{line}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },

    #[error("encode record: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum TopicError {
    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("publish task: {0}")]
    Publish(#[source] tokio::task::JoinError),

    #[error(transparent)]
    Log(#[from] LogError),
}

/// Why a record could not be handed to a live subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("subscriber disconnected")]
    Disconnected,

    #[error("subscriber queue full")]
    Lagging,
}

/// A write to, or read from, a subscriber's connection failed.
#[derive(Debug, thiserror::Error)]
#[error("transport: {0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
