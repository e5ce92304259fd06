use std::marker::PhantomData;

use shapekv_schema::CollectionKind;
use shapekv_store::ScoreBound;

use super::{element_collection, CollectionAdapter};
use crate::error::Result;
use crate::value::Storable;

/// Distinct elements ordered by an `f64` score.
pub struct SortedSetHandle<V> {
    adapter: CollectionAdapter,
    _element: PhantomData<fn() -> V>,
}

element_collection!(SortedSetHandle, CollectionKind::SortedSet);

impl<V: Storable> SortedSetHandle<V> {
    /// Add or rescore an element. Returns whether it was new.
    pub fn insert(&self, value: &V, score: f64) -> Result<bool> {
        let member = self.adapter.encode(value)?;
        Ok(self
            .adapter
            .backend()
            .sorted_add(self.adapter.key(), member, score)?)
    }

    /// Add `delta` to the element's score, inserting it at `delta` if absent.
    pub fn increment(&self, value: &V, delta: f64) -> Result<f64> {
        let member = self.adapter.encode(value)?;
        Ok(self
            .adapter
            .backend()
            .sorted_increment(self.adapter.key(), member, delta)?)
    }

    pub fn score(&self, value: &V) -> Result<Option<f64>> {
        let member = self.adapter.encode(value)?;
        Ok(self.adapter.backend().sorted_score(self.adapter.key(), &member)?)
    }

    pub fn remove(&self, value: &V) -> Result<bool> {
        let member = self.adapter.encode(value)?;
        Ok(self.adapter.backend().sorted_remove(self.adapter.key(), &member)?)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.adapter.backend().sorted_len(self.adapter.key())?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Elements ranked `start..=stop` by ascending score; negative ranks
    /// count from the highest.
    pub fn by_rank(&self, start: i64, stop: i64) -> Result<Vec<V>> {
        Ok(self
            .with_ranks_between(start, stop)?
            .into_iter()
            .map(|(v, _)| v)
            .collect())
    }

    pub fn with_ranks_between(&self, start: i64, stop: i64) -> Result<Vec<(V, f64)>> {
        let raw = self
            .adapter
            .backend()
            .sorted_range_by_rank(self.adapter.key(), start, stop)?;
        raw.into_iter()
            .map(|(member, score)| Ok((self.adapter.decode(&member)?, score)))
            .collect()
    }

    /// Elements with scores between the bounds, ascending, at most `limit`.
    pub fn with_scores_between(
        &self,
        min: ScoreBound,
        max: ScoreBound,
        limit: Option<usize>,
    ) -> Result<Vec<(V, f64)>> {
        let raw = self
            .adapter
            .backend()
            .sorted_range_by_score(self.adapter.key(), min, max, limit)?;
        raw.into_iter()
            .map(|(member, score)| Ok((self.adapter.decode(&member)?, score)))
            .collect()
    }

    /// Every element in ascending score order.
    pub fn members(&self) -> Result<Vec<V>> {
        self.by_rank(0, -1)
    }
}
