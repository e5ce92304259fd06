use std::marker::PhantomData;

use shapekv_schema::CollectionKind;

use super::{element_collection, CollectionAdapter};
use crate::error::Result;
use crate::value::Storable;

/// An unordered set of distinct elements.
pub struct SetHandle<V> {
    adapter: CollectionAdapter,
    _element: PhantomData<fn() -> V>,
}

element_collection!(SetHandle, CollectionKind::Set);

impl<V: Storable> SetHandle<V> {
    /// Returns whether the element was new.
    pub fn add(&self, value: &V) -> Result<bool> {
        Ok(self.add_many(std::slice::from_ref(value))? == 1)
    }

    /// Returns how many elements were new.
    pub fn add_many(&self, values: &[V]) -> Result<usize> {
        if values.is_empty() {
            return Ok(0);
        }
        let members = self.adapter.encode_all(values)?;
        Ok(self.adapter.backend().set_add(self.adapter.key(), &members)?)
    }

    pub fn remove(&self, value: &V) -> Result<bool> {
        let member = self.adapter.encode(value)?;
        Ok(self.adapter.backend().set_remove(self.adapter.key(), &member)?)
    }

    pub fn contains(&self, value: &V) -> Result<bool> {
        let member = self.adapter.encode(value)?;
        Ok(self.adapter.backend().set_contains(self.adapter.key(), &member)?)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.adapter.backend().set_len(self.adapter.key())?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Every element, in no particular order.
    pub fn members(&self) -> Result<Vec<V>> {
        let raw = self.adapter.backend().set_members(self.adapter.key())?;
        self.adapter.decode_all(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::Collection;
    use crate::store::Store;
    use std::collections::HashSet;

    fn tags(store: &Store) -> SetHandle<String> {
        store.collection("tags").unwrap()
    }

    #[test]
    fn add_reports_novelty() {
        let store = Store::in_memory();
        let set = tags(&store);
        assert!(set.add(&"rust".to_string()).unwrap());
        assert!(!set.add(&"rust".to_string()).unwrap());
        assert_eq!(set.len().unwrap(), 1);
    }

    #[test]
    fn members_decode() {
        let store = Store::in_memory();
        let set: SetHandle<u16> = store.collection("ports").unwrap();
        assert_eq!(set.add_many(&[80, 443, 80]).unwrap(), 2);
        let members: HashSet<u16> = set.members().unwrap().into_iter().collect();
        assert_eq!(members, HashSet::from([80, 443]));
        assert!(set.contains(&443).unwrap());
        assert!(set.remove(&443).unwrap());
        assert!(!set.contains(&443).unwrap());
    }

    #[test]
    fn clear_removes_key() {
        let store = Store::in_memory();
        let set = tags(&store);
        set.add(&"a".to_string()).unwrap();
        assert!(set.clear().unwrap());
        assert!(set.is_empty().unwrap());
        assert!(!store.backend().exists(set.key()).unwrap());
    }

    #[test]
    fn empty_add_is_a_no_op() {
        let store = Store::in_memory();
        assert_eq!(tags(&store).add_many(&[]).unwrap(), 0);
    }
}
