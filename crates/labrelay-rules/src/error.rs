use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Invalid expression: {0}")]
    Parse(String),

    #[error("Expression exceeds limit: {0}")]
    LimitExceeded(String),

    #[error("Unknown shorthand variable: %{0}")]
    UnknownShorthand(String),

    #[error("Shorthand resolution did not terminate (cycle through %{0}?)")]
    ShorthandCycle(String),

    #[error("Type mismatch evaluating '{path} {op} {value}': {found}")]
    TypeMismatch {
        path: String,
        op: String,
        value: String,
        found: String,
    },
}

impl RuleError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn limit(message: impl Into<String>) -> Self {
        Self::LimitExceeded(message.into())
    }
}
