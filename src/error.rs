//! Error types shared across the crate.

use thiserror::Error;

/// Result alias used throughout quarry.
pub type Result<T> = std::result::Result<T, QuarryError>;

/// Errors raised by index reconciliation, upsert merging and configuration.
#[derive(Debug, Error)]
pub enum QuarryError {
    /// A table, schema or index setting cannot be honoured.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A requested partial-upsert strategy has no implementation.
    #[error("unsupported merge strategy: {0}")]
    MergeStrategy(String),

    /// An index artifact is missing, truncated or fails validation.
    #[error("index error: {0}")]
    Index(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QuarryError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        QuarryError::InvalidConfig(msg.into())
    }

    pub fn merge_strategy(msg: impl Into<String>) -> Self {
        QuarryError::MergeStrategy(msg.into())
    }

    pub fn index(msg: impl Into<String>) -> Self {
        QuarryError::Index(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        QuarryError::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        QuarryError::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        QuarryError::Internal(msg.into())
    }

    /// Returns true for configuration problems that retrying cannot fix.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            QuarryError::InvalidConfig(_) | QuarryError::MergeStrategy(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_classified() {
        assert!(QuarryError::invalid_config("bad column").is_config_error());
        assert!(QuarryError::merge_strategy("NOPE").is_config_error());
        assert!(!QuarryError::index("truncated").is_config_error());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: QuarryError = io.into();
        assert!(matches!(err, QuarryError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }
}
