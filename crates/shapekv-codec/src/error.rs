use shapekv_types::TypeError;

/// Errors raised when stored bytes cannot be turned back into a value.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Stored bytes are not valid UTF-8 where text was expected.
    #[error("invalid UTF-8 for domain {domain}")]
    InvalidUtf8 { domain: &'static str },

    /// Stored text does not parse as the expected number.
    #[error("cannot parse {raw:?} as {domain}")]
    InvalidNumber { domain: &'static str, raw: String },

    /// The parsed value does not fit the declared domain.
    #[error("value {value} is out of range for {domain}")]
    OutOfRange { domain: &'static str, value: String },

    /// Stored bytes have the wrong length for a fixed-size encoding.
    #[error("expected {expected} bytes for {domain}, found {actual}")]
    InvalidLength {
        domain: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A compact blob whose size does not match the group layout.
    #[error("compact blob has {actual} bytes but the layout needs {expected}")]
    LayoutMismatch { expected: usize, actual: usize },

    /// An enum discriminant with no matching variant.
    #[error("unknown discriminant {value} for enum {name}")]
    UnknownDiscriminant { name: &'static str, value: i64 },

    /// Bit decoding requested for a variable-width domain.
    #[error("domain {domain} has no bit representation")]
    NotFixedWidth { domain: &'static str },
}

/// Errors from encoding and compact layout operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// No codec exists for the declared domain.
    #[error("unsupported domain: {domain}")]
    Unsupported { domain: String },

    /// A compact group member index past the end of the layout.
    #[error("compact member {index} out of range (group has {len} members)")]
    MemberOutOfRange { index: usize, len: usize },

    /// Packing received a different number of values than the layout has members.
    #[error("expected {expected} compact values, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },
}

pub type DecodeResult<T> = Result<T, DecodeError>;

pub type CodecResult<T> = Result<T, CodecError>;
