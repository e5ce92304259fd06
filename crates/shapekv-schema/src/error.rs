//! Error types for shape registration.

use thiserror::Error;

/// Errors raised while classifying a shape's declarations.
///
/// All of these are fatal: a shape that fails registration cannot be used,
/// and retrying the same declaration fails the same way.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("shape {shape} declares no id property")]
    MissingId { shape: String },

    #[error("shape {shape} declares a second id property {property}")]
    DuplicateId { shape: String, property: String },

    #[error("shape {shape} cannot use {domain} as its id domain")]
    InvalidIdDomain { shape: String, domain: String },

    #[error("shape {shape} declares property {property} twice")]
    DuplicateProperty { shape: String, property: String },

    #[error("{shape}.{property}: unsupported domain {domain}")]
    UnsupportedDomain {
        shape: String,
        property: String,
        domain: String,
    },

    #[error("{shape}.{property}: {domain} is not fixed-width and cannot join a compact group")]
    NotFixedWidth {
        shape: String,
        property: String,
        domain: String,
    },

    #[error("{shape}.{property}: {reason}")]
    InvalidDeclaration {
        shape: String,
        property: String,
        reason: String,
    },

    #[error("shape {shape} maps two properties to physical name {alias}")]
    AliasCollision { shape: String, alias: String },

    #[error("invalid alias {alias:?}: {reason}")]
    InvalidAlias { alias: String, reason: String },

    #[error("shape alias {alias} is already registered to shape {existing}")]
    ShapeAliasTaken { alias: String, existing: String },

    #[error("registry error: {0}")]
    Internal(String),
}

/// Convenience alias for registration results.
pub type RegistrationResult<T> = Result<T, RegistrationError>;
