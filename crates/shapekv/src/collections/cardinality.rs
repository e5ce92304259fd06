use std::marker::PhantomData;

use shapekv_schema::CollectionKind;

use super::{element_collection, CollectionAdapter};
use crate::error::Result;
use crate::value::Storable;

/// An approximate distinct-count estimator. Elements cannot be read back.
pub struct CardinalityHandle<V> {
    adapter: CollectionAdapter,
    _element: PhantomData<fn() -> V>,
}

element_collection!(CardinalityHandle, CollectionKind::Cardinality);

impl<V: Storable> CardinalityHandle<V> {
    /// Returns whether the estimate changed.
    pub fn add(&self, value: &V) -> Result<bool> {
        self.add_many(std::slice::from_ref(value))
    }

    pub fn add_many(&self, values: &[V]) -> Result<bool> {
        let encoded = self.adapter.encode_all(values)?;
        Ok(self
            .adapter
            .backend()
            .cardinality_add(self.adapter.key(), &encoded)?)
    }

    /// Estimated number of distinct elements added.
    pub fn count(&self) -> Result<u64> {
        Ok(self.adapter.backend().cardinality_count(self.adapter.key())?)
    }
}
