//! Foundation types for shapekv.
//!
//! Every other shapekv crate depends on `shapekv-types`. It defines the
//! vocabulary shared by the codec layer, the store backends, and the entity
//! proxies:
//!
//! - [`Key`] -- a binary-safe store key with the `:`-separated derivation helpers
//! - [`Domain`] -- the declared value domain of a property or collection element
//! - [`IdDomain`] -- the subset of domains that may identify an entity
//! - [`Value`] -- a dynamically typed value moving between codecs and typed handles

pub mod domain;
pub mod error;
pub mod key;
pub mod value;

pub use domain::{Domain, IdDomain};
pub use error::TypeError;
pub use key::{Key, KEY_SEPARATOR};
pub use value::Value;
