use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use shapekv_schema::CollectionKind;
use shapekv_store::When;
use shapekv_types::Domain;

use super::{Collection, CollectionAdapter};
use crate::error::Result;
use crate::value::Storable;

/// A map from typed fields to typed values under one key.
pub struct HashHandle<K, V> {
    adapter: CollectionAdapter,
    _entry: PhantomData<fn() -> (K, V)>,
}

impl<K: Storable, V: Storable> Collection for HashHandle<K, V> {
    const KIND: CollectionKind = CollectionKind::Hash;

    fn element_domain() -> Domain {
        V::domain()
    }

    fn key_domain() -> Option<Domain> {
        Some(K::domain())
    }

    fn bind(adapter: CollectionAdapter) -> Self {
        Self {
            adapter,
            _entry: PhantomData,
        }
    }

    fn adapter(&self) -> &CollectionAdapter {
        &self.adapter
    }
}

impl<K, V> Clone for HashHandle<K, V> {
    fn clone(&self) -> Self {
        Self {
            adapter: self.adapter.clone(),
            _entry: PhantomData,
        }
    }
}

impl<K, V> fmt::Debug for HashHandle<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashHandle")
            .field("key", self.adapter.key())
            .finish()
    }
}

impl<K: Storable, V: Storable> HashHandle<K, V> {
    /// Set a field. Returns whether it was new.
    pub fn insert(&self, field: &K, value: &V) -> Result<bool> {
        self.write(field, value, When::Always)
    }

    /// Set a field only if it is absent. Returns whether it was written.
    pub fn insert_if_absent(&self, field: &K, value: &V) -> Result<bool> {
        self.write(field, value, When::NotExists)
    }

    fn write(&self, field: &K, value: &V, when: When) -> Result<bool> {
        let field = self.adapter.encode_field(field)?;
        let value = self.adapter.encode(value)?;
        Ok(self
            .adapter
            .backend()
            .hash_set(self.adapter.key(), field, value, when)?)
    }

    pub fn get(&self, field: &K) -> Result<Option<V>> {
        let field = self.adapter.encode_field(field)?;
        let raw: Option<Bytes> = self.adapter.backend().hash_get(self.adapter.key(), &field)?;
        raw.map(|b| self.adapter.decode(&b)).transpose()
    }

    pub fn remove(&self, field: &K) -> Result<bool> {
        let field = self.adapter.encode_field(field)?;
        Ok(self.adapter.backend().hash_delete(self.adapter.key(), &field)?)
    }

    pub fn contains(&self, field: &K) -> Result<bool> {
        let field = self.adapter.encode_field(field)?;
        Ok(self.adapter.backend().hash_exists(self.adapter.key(), &field)?)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.adapter.backend().hash_len(self.adapter.key())?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn keys(&self) -> Result<Vec<K>> {
        self.raw_entries()?
            .into_iter()
            .map(|(field, _)| self.adapter.decode_field(&field))
            .collect()
    }

    pub fn values(&self) -> Result<Vec<V>> {
        self.raw_entries()?
            .into_iter()
            .map(|(_, value)| self.adapter.decode(&value))
            .collect()
    }

    pub fn entries(&self) -> Result<Vec<(K, V)>> {
        self.raw_entries()?
            .into_iter()
            .map(|(field, value)| {
                Ok((self.adapter.decode_field(&field)?, self.adapter.decode(&value)?))
            })
            .collect()
    }

    fn raw_entries(&self) -> Result<Vec<(Bytes, Bytes)>> {
        Ok(self.adapter.backend().hash_entries(self.adapter.key())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use std::collections::HashMap;

    fn meta(store: &Store) -> HashHandle<String, i64> {
        store.collection("meta").unwrap()
    }

    #[test]
    fn insert_get_remove() {
        let store = Store::in_memory();
        let hash = meta(&store);
        assert!(hash.insert(&"views".into(), &10).unwrap());
        assert!(!hash.insert(&"views".into(), &11).unwrap());
        assert_eq!(hash.get(&"views".into()).unwrap(), Some(11));
        assert!(hash.contains(&"views".into()).unwrap());
        assert!(hash.remove(&"views".into()).unwrap());
        assert_eq!(hash.get(&"views".into()).unwrap(), None);
    }

    #[test]
    fn insert_if_absent_keeps_existing() {
        let store = Store::in_memory();
        let hash = meta(&store);
        assert!(hash.insert_if_absent(&"a".into(), &1).unwrap());
        assert!(!hash.insert_if_absent(&"a".into(), &2).unwrap());
        assert_eq!(hash.get(&"a".into()).unwrap(), Some(1));
    }

    #[test]
    fn typed_fields_decode() {
        let store = Store::in_memory();
        let hash: HashHandle<u32, bool> = store.collection("flags").unwrap();
        hash.insert(&7, &true).unwrap();
        hash.insert(&9, &false).unwrap();
        let entries: HashMap<u32, bool> = hash.entries().unwrap().into_iter().collect();
        assert_eq!(entries, HashMap::from([(7, true), (9, false)]));
        let mut keys = hash.keys().unwrap();
        keys.sort_unstable();
        assert_eq!(keys, vec![7, 9]);
        assert_eq!(hash.values().unwrap().len(), 2);
        assert_eq!(hash.len().unwrap(), 2);
    }
}
