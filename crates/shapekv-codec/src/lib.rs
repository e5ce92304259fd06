//! Value codecs for shapekv.
//!
//! Every declared [`Domain`](shapekv_types::Domain) maps to exactly one
//! [`DomainCodec`], selected once at shape registration through the
//! [`CodecRegistry`]. Codecs convert between dynamic
//! [`Value`](shapekv_types::Value)s and the byte strings kept in the store.
//!
//! # Encodings
//!
//! - Scalars (integers, floats, enum discriminants, timestamps) are ASCII
//!   decimal so that server-side counters and human inspection both work.
//! - Booleans are `1` / `0`.
//! - Text is UTF-8, blobs are raw, UUIDs are their 16 raw bytes.
//!
//! Fixed-width domains additionally expose a bit representation used by the
//! [`CompactEncoder`] to pack several properties into one store value.

pub mod codecs;
pub mod compact;
pub mod error;
pub mod registry;

pub use codecs::DomainCodec;
pub use compact::{CompactEncoder, MemberLayout};
pub use error::{CodecError, CodecResult, DecodeError, DecodeResult};
pub use registry::CodecRegistry;
