//! Typed views over store-native collections.
//!
//! Each collection kind is a thin typed wrapper around a shared
//! [`CollectionAdapter`], which owns the key and the element codecs. The
//! wrappers only add the operations their store primitive supports.

mod cardinality;
mod hash;
mod list;
mod set;
mod sorted_set;

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use shapekv_codec::DomainCodec;
use shapekv_schema::CollectionKind;
use shapekv_store::KeyValueStore;
use shapekv_types::{Domain, Key};

use crate::error::{Error, Result};
use crate::store::Store;
use crate::value::{decode_element, encode_element, Storable};

pub use cardinality::CardinalityHandle;
pub use hash::HashHandle;
pub use list::ListHandle;
pub use set::SetHandle;
pub use sorted_set::SortedSetHandle;

/// The key and codecs behind one bound collection.
#[derive(Clone)]
pub struct CollectionAdapter {
    store: Store,
    key: Key,
    element: &'static dyn DomainCodec,
    field: Option<&'static dyn DomainCodec>,
}

impl CollectionAdapter {
    pub(crate) fn new(
        store: Store,
        key: Key,
        element: &'static dyn DomainCodec,
        field: Option<&'static dyn DomainCodec>,
    ) -> Self {
        Self {
            store,
            key,
            element,
            field,
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn backend(&self) -> &dyn KeyValueStore {
        self.store.backend()
    }

    pub(crate) fn encode<V: Storable>(&self, value: &V) -> Result<Bytes> {
        encode_element(self.element, value)
    }

    pub(crate) fn encode_all<V: Storable>(&self, values: &[V]) -> Result<Vec<Bytes>> {
        values.iter().map(|v| self.encode(v)).collect()
    }

    pub(crate) fn decode<V: Storable>(&self, raw: &[u8]) -> Result<V> {
        decode_element(&self.store, self.element, &self.key, raw)
    }

    pub(crate) fn decode_all<V: Storable>(&self, raw: Vec<Bytes>) -> Result<Vec<V>> {
        raw.iter().map(|b| self.decode(b)).collect()
    }

    fn field_codec(&self) -> Result<&'static dyn DomainCodec> {
        self.field
            .ok_or_else(|| Error::Internal(format!("{} has no field codec", self.key)))
    }

    pub(crate) fn encode_field<K: Storable>(&self, field: &K) -> Result<Bytes> {
        encode_element(self.field_codec()?, field)
    }

    pub(crate) fn decode_field<K: Storable>(&self, raw: &[u8]) -> Result<K> {
        decode_element(&self.store, self.field_codec()?, &self.key, raw)
    }

    pub fn ttl(&self) -> Ttl {
        Ttl {
            store: self.store.clone(),
            key: self.key.clone(),
        }
    }

    /// Delete the collection. Returns whether it existed.
    pub fn clear(&self) -> Result<bool> {
        Ok(self.backend().delete(&self.key)?)
    }
}

impl fmt::Debug for CollectionAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionAdapter")
            .field("key", &self.key)
            .field("element", &self.element.name())
            .field("field", &self.field.map(|c| c.name()))
            .finish()
    }
}

/// A collection type bindable to a property or a naked key.
pub trait Collection: Sized + Send + Sync + 'static {
    const KIND: CollectionKind;

    /// Domain of the stored elements; the value domain for hashes.
    fn element_domain() -> Domain;

    /// Domain of hash fields. `None` for every other kind.
    fn key_domain() -> Option<Domain> {
        None
    }

    fn bind(adapter: CollectionAdapter) -> Self;

    fn adapter(&self) -> &CollectionAdapter;

    fn key(&self) -> &Key {
        self.adapter().key()
    }

    fn ttl(&self) -> Ttl {
        self.adapter().ttl()
    }

    fn clear(&self) -> Result<bool> {
        self.adapter().clear()
    }
}

/// Expiry controls for one collection key.
#[derive(Clone, Debug)]
pub struct Ttl {
    store: Store,
    key: Key,
}

impl Ttl {
    /// Remaining time to live; `None` without an expiry or without the key.
    pub fn get(&self) -> Result<Option<Duration>> {
        Ok(self.store.backend().ttl(&self.key)?)
    }

    /// Expire the key after `ttl`. Returns whether the key exists.
    pub fn expire(&self, ttl: Duration) -> Result<bool> {
        Ok(self.store.backend().expire(&self.key, ttl)?)
    }

    /// Remove any expiry. Returns whether one was removed.
    pub fn persist(&self) -> Result<bool> {
        Ok(self.store.backend().persist(&self.key)?)
    }
}

/// Implements the boilerplate shared by every single-element collection.
macro_rules! element_collection {
    ($handle:ident, $kind:expr) => {
        impl<V: Storable> $crate::collections::Collection for $handle<V> {
            const KIND: shapekv_schema::CollectionKind = $kind;

            fn element_domain() -> shapekv_types::Domain {
                V::domain()
            }

            fn bind(adapter: $crate::collections::CollectionAdapter) -> Self {
                Self {
                    adapter,
                    _element: std::marker::PhantomData,
                }
            }

            fn adapter(&self) -> &$crate::collections::CollectionAdapter {
                &self.adapter
            }
        }

        impl<V> Clone for $handle<V> {
            fn clone(&self) -> Self {
                Self {
                    adapter: self.adapter.clone(),
                    _element: std::marker::PhantomData,
                }
            }
        }

        impl<V> std::fmt::Debug for $handle<V> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($handle))
                    .field("key", self.adapter.key())
                    .finish()
            }
        }
    };
}

pub(crate) use element_collection;
