use std::marker::PhantomData;

use bytes::Bytes;
use shapekv_schema::CollectionKind;
use shapekv_store::ListEnd;

use super::{element_collection, CollectionAdapter};
use crate::error::Result;
use crate::pending::Pending;
use crate::value::Storable;

/// An ordered list with cheap access at both ends.
pub struct ListHandle<V> {
    adapter: CollectionAdapter,
    _element: PhantomData<fn() -> V>,
}

element_collection!(ListHandle, CollectionKind::List);

impl<V: Storable> ListHandle<V> {
    /// Push to the front. Returns the new length.
    pub fn push_head(&self, value: &V) -> Result<usize> {
        self.push(ListEnd::Head, std::slice::from_ref(value))
    }

    /// Push to the back. Returns the new length.
    pub fn push_tail(&self, value: &V) -> Result<usize> {
        self.push(ListEnd::Tail, std::slice::from_ref(value))
    }

    /// Push each value to the front in turn, so the last ends up first.
    pub fn push_head_many(&self, values: &[V]) -> Result<usize> {
        self.push(ListEnd::Head, values)
    }

    pub fn push_tail_many(&self, values: &[V]) -> Result<usize> {
        self.push(ListEnd::Tail, values)
    }

    fn push(&self, end: ListEnd, values: &[V]) -> Result<usize> {
        if values.is_empty() {
            return self.len();
        }
        let encoded = self.adapter.encode_all(values)?;
        Ok(self.adapter.backend().list_push(self.adapter.key(), end, &encoded)?)
    }

    pub fn push_head_async(&self, value: V) -> Pending<usize> {
        let list = self.clone();
        self.adapter
            .store()
            .spawn("list push", move || list.push_head(&value))
    }

    pub fn push_tail_async(&self, value: V) -> Pending<usize> {
        let list = self.clone();
        self.adapter
            .store()
            .spawn("list push", move || list.push_tail(&value))
    }

    pub fn pop_head(&self) -> Result<Option<V>> {
        self.pop(ListEnd::Head)
    }

    pub fn pop_tail(&self) -> Result<Option<V>> {
        self.pop(ListEnd::Tail)
    }

    fn pop(&self, end: ListEnd) -> Result<Option<V>> {
        let raw = self.adapter.backend().list_pop(self.adapter.key(), end)?;
        self.decode_opt(raw)
    }

    pub fn pop_head_async(&self) -> Pending<Option<V>> {
        let list = self.clone();
        self.adapter.store().spawn("list pop", move || list.pop_head())
    }

    pub fn pop_tail_async(&self) -> Pending<Option<V>> {
        let list = self.clone();
        self.adapter.store().spawn("list pop", move || list.pop_tail())
    }

    /// Element at `index`; negative indices count from the back.
    pub fn get(&self, index: i64) -> Result<Option<V>> {
        let raw = self.adapter.backend().list_index(self.adapter.key(), index)?;
        self.decode_opt(raw)
    }

    pub fn head(&self) -> Result<Option<V>> {
        self.get(0)
    }

    pub fn tail(&self) -> Result<Option<V>> {
        self.get(-1)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.adapter.backend().list_len(self.adapter.key())?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Elements from `start` to `stop` inclusive; negative indices count
    /// from the back.
    pub fn range(&self, start: i64, stop: i64) -> Result<Vec<V>> {
        let raw = self
            .adapter
            .backend()
            .list_range(self.adapter.key(), start, stop)?;
        self.adapter.decode_all(raw)
    }

    pub fn all(&self) -> Result<Vec<V>> {
        self.range(0, -1)
    }

    pub fn all_async(&self) -> Pending<Vec<V>> {
        let list = self.clone();
        self.adapter.store().spawn("list range", move || list.all())
    }

    fn decode_opt(&self, raw: Option<Bytes>) -> Result<Option<V>> {
        raw.map(|b| self.adapter.decode(&b)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn list(store: &Store) -> ListHandle<i64> {
        store.collection("answers").unwrap()
    }

    #[test]
    fn both_ends() {
        let store = Store::in_memory();
        let list = list(&store);
        list.push_tail(&2).unwrap();
        list.push_tail(&3).unwrap();
        assert_eq!(list.push_head(&1).unwrap(), 3);
        assert_eq!(list.all().unwrap(), vec![1, 2, 3]);
        assert_eq!(list.head().unwrap(), Some(1));
        assert_eq!(list.tail().unwrap(), Some(3));
        assert_eq!(list.pop_tail().unwrap(), Some(3));
        assert_eq!(list.pop_head().unwrap(), Some(1));
        assert_eq!(list.len().unwrap(), 1);
    }

    #[test]
    fn head_many_reverses() {
        let store = Store::in_memory();
        let list = list(&store);
        list.push_head_many(&[1, 2, 3]).unwrap();
        assert_eq!(list.all().unwrap(), vec![3, 2, 1]);
        assert_eq!(list.range(1, 1).unwrap(), vec![2]);
        assert_eq!(list.get(-1).unwrap(), Some(1));
        assert_eq!(list.get(10).unwrap(), None);
    }

    #[test]
    fn pop_on_missing_list() {
        let store = Store::in_memory();
        assert_eq!(list(&store).pop_head().unwrap(), None);
        assert!(list(&store).is_empty().unwrap());
    }

    #[tokio::test]
    async fn async_push_and_pop() {
        let store = Store::in_memory();
        let list = list(&store);
        assert_eq!(list.push_tail_async(5).await.unwrap(), 1);
        assert_eq!(list.push_tail_async(6).await.unwrap(), 2);
        assert_eq!(list.all_async().await.unwrap(), vec![5, 6]);
        assert_eq!(list.pop_head_async().await.unwrap(), Some(5));
        assert_eq!(list.pop_tail_async().await.unwrap(), Some(6));
        assert_eq!(list.pop_tail_async().await.unwrap(), None);
    }
}
