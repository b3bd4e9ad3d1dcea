use thiserror::Error;

/// Core error types for labrelay domain operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    #[error("Malformed bundle: {message}")]
    MalformedBundle { message: String },

    #[error("Invalid receiver configuration for {receiver}: {message}")]
    InvalidReceiver { receiver: String, message: String },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("UUID error: {0}")]
    UuidError(#[from] uuid::Error),
}

impl CoreError {
    /// Create a new MalformedBundle error
    pub fn malformed_bundle(message: impl Into<String>) -> Self {
        Self::MalformedBundle {
            message: message.into(),
        }
    }

    /// Create a new InvalidReceiver error
    pub fn invalid_receiver(receiver: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidReceiver {
            receiver: receiver.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
