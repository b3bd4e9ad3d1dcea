use labrelay_core::CoreError;
use labrelay_rules::RuleError;
use labrelay_store::StoreError;
use thiserror::Error;

/// Error taxonomy for one stage run.
///
/// Filter failures are NOT represented here; a filtered-out receiver is an
/// expected outcome carried in [`crate::filter::FilterOutcome`]. Errors mean
/// the message itself cannot be processed: configuration drift, corrupt
/// data, or collaborator failure.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Consistency violation between fan-out time and filter time, or an
    /// invalid receiver/topic configuration. Fatal: dead-letter the message.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Upstream data corruption. Fatal for this message.
    #[error("Malformed bundle: {0}")]
    MalformedBundle(String),

    /// Rule expression could not be resolved, parsed, or evaluated on the
    /// given tree. Fatal: indicates misconfiguration or corruption, not a
    /// legitimate eligibility decision.
    #[error("Rule evaluation error: {0}")]
    Rule(#[from] RuleError),

    /// Collaborator failure; retryable when the backend says so.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn malformed_bundle(message: impl Into<String>) -> Self {
        Self::MalformedBundle(message.into())
    }

    /// Whether redelivering the message may succeed. The stage performs no
    /// partial commit, so the whole run re-executes on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<CoreError> for PipelineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MalformedBundle { message } => Self::MalformedBundle(message),
            other => Self::Configuration(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(PipelineError::from(StoreError::unavailable("queue down")).is_retryable());
        assert!(!PipelineError::configuration("unknown receiver").is_retryable());
        assert!(!PipelineError::malformed_bundle("dangling reference").is_retryable());
    }

    #[test]
    fn test_core_malformed_maps_to_malformed() {
        let err: PipelineError = CoreError::malformed_bundle("dup fullUrl").into();
        assert!(matches!(err, PipelineError::MalformedBundle(_)));
    }
}
