use thiserror::Error;

/// Common error types used across the pipeline.
///
/// None of these are retried locally. The producer and consumer loops log
/// them and move on to the next attempt or message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unsupported notification type: {0}")]
    UnsupportedType(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Publish timed out after {0}s")]
    Timeout(u64),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Classify a broker error raised while opening a connection or channel.
    pub fn connection(err: lapin::Error) -> Self {
        AppError::Connection(err.to_string())
    }

    /// Classify a broker error raised while declaring a queue or publishing.
    pub fn publish(err: lapin::Error) -> Self {
        AppError::Publish(err.to_string())
    }
}
