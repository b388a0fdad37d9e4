//! Error types for valawai-channel

use thiserror::Error;

/// Errors that can occur while talking to the message broker
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Could not open (or reopen) the broker connection
    #[error("Broker connection failed: {0}")]
    Connection(String),

    /// Could not subscribe a consumer to a topic
    #[error("Subscription to '{topic}' failed: {reason}")]
    Subscribe { topic: String, reason: String },

    /// Could not publish a payload to a topic
    #[error("Publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    /// A handler is already bound to the topic
    #[error("Topic '{topic}' already has a consumer")]
    DuplicateSubscription { topic: String },

    /// The channel has been closed
    #[error("Channel is closed")]
    Closed,

    /// `start_consuming` was called while the loop is already running
    #[error("Consumer loop already started")]
    AlreadyConsuming,

    /// Payload could not be encoded
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ChannelError {
    fn from(err: serde_json::Error) -> Self {
        ChannelError::Serialization(err.to_string())
    }
}

/// Result type for channel operations
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;
