use shapekv_codec::{CodecError, DecodeError};
use shapekv_schema::RegistrationError;
use shapekv_store::StoreError;
use shapekv_types::TypeError;

/// Errors from entity and collection operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backing store failed. Connectivity failures are retryable.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The shape could not be registered.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Stored bytes did not match the declared codec.
    #[error("cannot decode value at {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: DecodeError,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Type(#[from] TypeError),

    /// A property token names no declared property.
    #[error("shape {shape} has no property {property}")]
    UnknownProperty {
        shape: &'static str,
        property: &'static str,
    },

    /// A property token disagrees with the property's declaration.
    #[error("{shape}.{property}: {reason}")]
    PropertyMismatch {
        shape: &'static str,
        property: &'static str,
        reason: String,
    },

    /// A decoded value has the wrong kind for the requested Rust type.
    #[error("expected a {expected} value, found {found}")]
    ValueMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("unknown discriminant {value} for enum {name}")]
    UnknownDiscriminant { name: &'static str, value: i64 },

    /// The id counter produced a value the shape's id type cannot hold, or
    /// one too large to order exactly in the enumeration index.
    #[error("id counter for {shape} reached {value}, which the id type cannot represent")]
    IdExhausted { shape: &'static str, value: i64 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A non-blocking operation was started outside a Tokio runtime.
    #[error("no async runtime available: {0}")]
    NoRuntime(String),

    /// A background operation panicked or was aborted.
    #[error("background task failed: {0}")]
    Task(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the caller may retry the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Store(e) if e.is_retryable())
    }

    /// Attach the key a codec failure happened at.
    pub(crate) fn codec_at(key: &shapekv_types::Key, err: CodecError) -> Self {
        match err {
            CodecError::Decode(source) => Error::Decode {
                key: key.to_string(),
                source,
            },
            other => Error::Codec(other),
        }
    }
}

/// Result alias for entity operations.
pub type Result<T> = std::result::Result<T, Error>;
