//! Error taxonomy for the component protocol.

use valawai_channel::ChannelError;

use crate::schema::ValidationError;

/// Errors raised by the lifecycle protocol.
#[derive(Debug, thiserror::Error)]
pub enum MovError {
    /// The AsyncAPI document does not declare a usable control/registered
    /// topic, so the component cannot know its own name. Fatal at startup.
    #[error("malformed interface specification: {0}")]
    MalformedSpec(String),

    #[error("invalid component name '{0}': expected c[0-2]_[a-z0-9_]+")]
    InvalidName(String),

    #[error("invalid component version '{0}': expected MAJOR.MINOR.PATCH")]
    InvalidVersion(String),

    /// The MOV sent something the protocol does not allow.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("registration not acknowledged within {0:?}")]
    RegistrationTimeout(std::time::Duration),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, MovError>;

/// Failure reported by a payload handler's domain logic.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Why a delivery was dropped by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The body is not JSON. Logged locally only.
    #[error("malformed message: {0}")]
    MalformedMessage(serde_json::Error),

    /// The body is JSON but does not satisfy the payload schema. Forwarded
    /// to the MOV as an ERROR log entry.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("handler failed: {0}")]
    Handler(#[from] HandlerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mov_error_display() {
        let err = MovError::MalformedSpec("no control/registered topic".to_string());
        assert!(err.to_string().contains("malformed interface specification"));

        let err = MovError::InvalidName("C1_Echo".to_string());
        assert!(err.to_string().contains("C1_Echo"));
    }

    #[test]
    fn test_channel_error_converts() {
        let err: MovError = ChannelError::Closed.into();
        assert!(matches!(err, MovError::Channel(ChannelError::Closed)));
    }

    #[test]
    fn test_validation_error_converts_to_dispatch_error() {
        let err: DispatchError = ValidationError::MissingField {
            field: "content".to_string(),
        }
        .into();
        assert!(err.to_string().contains("content"));
    }
}
