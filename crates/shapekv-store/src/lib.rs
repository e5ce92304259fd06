//! Key-value store primitives for shapekv.
//!
//! Entity proxies never talk to a server directly. Every read and write they
//! perform is expressed as one of the primitive operations of the
//! [`KeyValueStore`] trait: string get/set, counters, sets, lists, hashes,
//! sorted sets, approximate cardinality counters, expiry, and one scripted
//! id allocation.
//!
//! # Backends
//!
//! - [`InMemoryStore`] -- `HashMap`-based store for tests and embedding
//!
//! Network transports implement the same trait outside this crate.
//!
//! # Design Rules
//!
//! 1. Every trait method is atomic on its own; sequences are not.
//! 2. Missing keys read as absent or empty, never as errors.
//! 3. Connectivity failures are retryable; type errors are not.

pub mod config;
pub mod error;
pub mod hll;
pub mod memory;
pub mod traits;

pub use config::{StoreConfig, MEMORY_ENDPOINT};
pub use error::{StoreError, StoreResult};
pub use hll::HyperLogLog;
pub use memory::InMemoryStore;
pub use traits::{KeyValueStore, ListEnd, ScoreBound, When};
