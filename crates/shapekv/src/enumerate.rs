//! Batched iteration over a shape's enumeration index.

use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use shapekv_schema::ShapeDescriptor;
use shapekv_store::ScoreBound;
use shapekv_types::Key;
use tracing::debug;

use crate::entity::Entity;
use crate::error::Result;
use crate::shape::Shape;
use crate::store::Store;
use crate::value::decode_element;

/// Iterator over every created entity of `S`, in ascending id order.
///
/// Ids are fetched `batch` at a time, resuming after the last score seen, so
/// entities created during iteration with larger ids are still visited.
pub struct Enumeration<S: Shape> {
    store: Store,
    descriptor: Arc<ShapeDescriptor>,
    index: Key,
    batch: usize,
    cursor: ScoreBound,
    buffer: VecDeque<(Bytes, f64)>,
    exhausted: bool,
    _shape: PhantomData<fn() -> S>,
}

impl<S: Shape> Enumeration<S> {
    pub(crate) fn new(store: Store, descriptor: Arc<ShapeDescriptor>, batch: usize) -> Self {
        let index = descriptor.keys().index();
        Self {
            store,
            descriptor,
            index,
            batch: batch.max(1),
            cursor: ScoreBound::Unbounded,
            buffer: VecDeque::new(),
            exhausted: false,
            _shape: PhantomData,
        }
    }

    fn fetch(&mut self) -> Result<()> {
        let page = self.store.backend().sorted_range_by_score(
            &self.index,
            self.cursor,
            ScoreBound::Unbounded,
            Some(self.batch),
        )?;
        debug!(index = %self.index, fetched = page.len(), "enumeration page");
        if page.len() < self.batch {
            self.exhausted = true;
        }
        self.buffer.extend(page);
        Ok(())
    }

    fn resolve(&self, member: &[u8]) -> Result<Entity<S>> {
        let id = decode_element::<S::Id>(&self.store, self.descriptor.id().codec(), &self.index, member)?;
        self.store.get(id)
    }
}

impl<S: Shape> Iterator for Enumeration<S> {
    type Item = Result<Entity<S>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fetch() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        let (member, score) = self.buffer.pop_front()?;
        self.cursor = ScoreBound::Exclusive(score);
        Some(self.resolve(&member))
    }
}

impl<S: Shape> fmt::Debug for Enumeration<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enumeration")
            .field("index", &self.index)
            .field("batch", &self.batch)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}
