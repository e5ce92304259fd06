use thiserror::Error;

/// Errors produced when a [`Value`](crate::Value) does not fit a domain.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("value of kind {found} cannot be stored in domain {expected}")]
    DomainMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("value {value} is out of range for domain {domain}")]
    OutOfRange { domain: &'static str, value: String },

    #[error("domain {0} has no fixed-width encoding")]
    NotFixedWidth(&'static str),
}
