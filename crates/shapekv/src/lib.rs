//! # shapekv
//!
//! Typed entities persisted transparently in a key-value store.
//!
//! A [`Shape`] declares an entity's properties once. The [`Store`] classifies
//! each declaration into a storage strategy, derives deterministic keys from
//! short physical aliases, and hands out [`Entity`] handles whose reads and
//! writes go straight to the backend. No property values are cached.
//!
//! # Storage strategies
//!
//! - **Scalar**: one string key per property, `<Shape>:<Id>:<Alias>`.
//! - **Compact**: small fixed-width properties bit-packed into one blob per
//!   group, with a presence bitmap for nullable members.
//! - **Reference**: the target entity's id, resolved to a live handle on read.
//! - **Collections**: sets, lists, hashes, sorted sets and cardinality
//!   estimators mapped onto the matching store primitives.
//! - **Paged arrays**: sparse indexable arrays split across hash pages.
//!
//! # Design Rules
//!
//! - The key layout is a compatibility contract; see [`shapekv_schema::keys`].
//! - Handles compare by shape and id. Live handles for one id share an
//!   allocation within a store.
//! - Non-blocking operations return [`Pending`] and never block the caller.

pub mod array;
pub mod collections;
pub mod entity;
pub mod enumerate;
pub mod error;
mod identity;
pub mod pending;
pub mod property;
pub mod shape;
pub mod store;
pub mod value;

#[cfg(test)]
mod testing;

pub use array::PagedArray;
pub use collections::{
    CardinalityHandle, Collection, CollectionAdapter, HashHandle, ListHandle, SetHandle,
    SortedSetHandle, Ttl,
};
pub use entity::Entity;
pub use enumerate::Enumeration;
pub use error::{Error, Result};
pub use pending::Pending;
pub use property::{
    ArrayProp, AsyncProp, Blocking, CollectionProp, CompactProp, Readable, RefProp, ScalarProp,
    Writable,
};
pub use shape::{Shape, ShapeDecl};
pub use store::{Store, MAX_EXACT_ID};
pub use value::{AllocatableId, FieldValue, IdValue, Storable, StorableEnum};

pub use shapekv_schema::{ShapeDescriptor, DEFAULT_PAGE_SIZE};
pub use shapekv_store::{InMemoryStore, KeyValueStore, ScoreBound, StoreConfig, StoreError};
pub use shapekv_types::{Domain, IdDomain, Key, Value};
