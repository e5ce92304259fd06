use std::time::Duration;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store endpoint cannot be reached.
    #[error("store unreachable at {endpoint}: {reason}")]
    Unreachable { endpoint: String, reason: String },

    /// An operation did not complete within the configured deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// The key holds a value of a different kind.
    #[error("key {key} holds a {found}, not a {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A counter operation hit a value that is not an integer.
    #[error("value at {key} is not an integer")]
    NotAnInteger { key: String },

    /// A sorted-set score that is not a number.
    #[error("score for {key} is NaN")]
    InvalidScore { key: String },

    /// An administrative command was issued without admin rights.
    #[error("administrative commands are disabled for this connection")]
    AdminDisabled,

    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Backend-internal failure, such as a poisoned lock.
    #[error("backend error: {0}")]
    Backend(String),

    /// I/O error while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unreachable { .. } | StoreError::Timeout { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_errors_are_retryable() {
        let unreachable = StoreError::Unreachable {
            endpoint: "redis://x".into(),
            reason: "refused".into(),
        };
        let timeout = StoreError::Timeout {
            operation: "get".into(),
            after: Duration::from_secs(1),
        };
        assert!(unreachable.is_retryable());
        assert!(timeout.is_retryable());
        assert!(!StoreError::AdminDisabled.is_retryable());
        assert!(!StoreError::WrongType {
            key: "k".into(),
            expected: "list",
            found: "set"
        }
        .is_retryable());
    }
}
