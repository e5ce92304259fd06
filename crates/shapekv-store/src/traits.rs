use std::time::Duration;

use bytes::Bytes;
use shapekv_types::Key;

use crate::error::StoreResult;

/// Which end of a list an operation applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListEnd {
    Head,
    Tail,
}

/// Condition for writing a hash field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum When {
    #[default]
    Always,
    NotExists,
}

/// One end of a sorted-set score interval.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScoreBound {
    Unbounded,
    Inclusive(f64),
    Exclusive(f64),
}

impl ScoreBound {
    /// Whether `score` lies on the permitted side of this bound used as a minimum.
    pub fn admits_above(&self, score: f64) -> bool {
        match *self {
            ScoreBound::Unbounded => true,
            ScoreBound::Inclusive(min) => score >= min,
            ScoreBound::Exclusive(min) => score > min,
        }
    }

    /// Whether `score` lies on the permitted side of this bound used as a maximum.
    pub fn admits_below(&self, score: f64) -> bool {
        match *self {
            ScoreBound::Unbounded => true,
            ScoreBound::Inclusive(max) => score <= max,
            ScoreBound::Exclusive(max) => score < max,
        }
    }
}

/// The primitive operations of a remote key-value store.
///
/// Implementations must satisfy these invariants:
/// - Every key holds at most one kind of value; using a key as another kind
///   fails with [`StoreError::WrongType`](crate::StoreError::WrongType).
/// - Reading a missing key is not an error: strings read as `None`,
///   collections read as empty.
/// - A collection emptied by removals disappears, as if deleted.
/// - Each method is atomic on its own. Sequences of calls are not.
/// - Expired keys behave exactly like missing keys.
pub trait KeyValueStore: Send + Sync {
    // ---- Keys and strings ----

    /// Read a string value.
    fn get(&self, key: &Key) -> StoreResult<Option<Bytes>>;

    /// Write a string value, replacing whatever the key held and clearing
    /// any expiry.
    fn set(&self, key: &Key, value: Bytes) -> StoreResult<()>;

    /// Delete a key of any kind. Returns `true` if it existed.
    fn delete(&self, key: &Key) -> StoreResult<bool>;

    fn exists(&self, key: &Key) -> StoreResult<bool>;

    /// Add `delta` to the ASCII decimal integer at `key`, treating a missing
    /// key as zero. Returns the new value.
    fn incr_by(&self, key: &Key, delta: i64) -> StoreResult<i64>;

    /// Set a time-to-live. Returns `false` if the key does not exist.
    fn expire(&self, key: &Key, ttl: Duration) -> StoreResult<bool>;

    /// Remove a time-to-live. Returns `true` if one was removed.
    fn persist(&self, key: &Key) -> StoreResult<bool>;

    /// Remaining time-to-live, or `None` for missing or persistent keys.
    fn ttl(&self, key: &Key) -> StoreResult<Option<Duration>>;

    /// All keys starting with `prefix`, in byte order.
    fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<Vec<Key>>;

    // ---- Sets ----

    /// Add members. Returns how many were not already present.
    fn set_add(&self, key: &Key, members: &[Bytes]) -> StoreResult<usize>;

    fn set_remove(&self, key: &Key, member: &[u8]) -> StoreResult<bool>;

    fn set_contains(&self, key: &Key, member: &[u8]) -> StoreResult<bool>;

    fn set_len(&self, key: &Key) -> StoreResult<usize>;

    /// Members in unspecified order.
    fn set_members(&self, key: &Key) -> StoreResult<Vec<Bytes>>;

    // ---- Lists ----

    /// Push values one at a time onto `end`. Returns the new length.
    fn list_push(&self, key: &Key, end: ListEnd, values: &[Bytes]) -> StoreResult<usize>;

    fn list_pop(&self, key: &Key, end: ListEnd) -> StoreResult<Option<Bytes>>;

    /// Element at `index`; negative indices count from the tail.
    fn list_index(&self, key: &Key, index: i64) -> StoreResult<Option<Bytes>>;

    fn list_len(&self, key: &Key) -> StoreResult<usize>;

    /// Elements from `start` to `stop` inclusive; negative indices count from
    /// the tail.
    fn list_range(&self, key: &Key, start: i64, stop: i64) -> StoreResult<Vec<Bytes>>;

    // ---- Hashes ----

    /// Write a field. With [`When::Always`] returns `true` if the field is
    /// new; with [`When::NotExists`] returns `true` if the write happened.
    fn hash_set(&self, key: &Key, field: Bytes, value: Bytes, when: When) -> StoreResult<bool>;

    fn hash_get(&self, key: &Key, field: &[u8]) -> StoreResult<Option<Bytes>>;

    fn hash_delete(&self, key: &Key, field: &[u8]) -> StoreResult<bool>;

    fn hash_exists(&self, key: &Key, field: &[u8]) -> StoreResult<bool> {
        Ok(self.hash_get(key, field)?.is_some())
    }

    fn hash_len(&self, key: &Key) -> StoreResult<usize>;

    /// Field/value pairs in unspecified order.
    fn hash_entries(&self, key: &Key) -> StoreResult<Vec<(Bytes, Bytes)>>;

    // ---- Sorted sets ----

    /// Insert or rescore a member. Returns `true` if the member is new.
    fn sorted_add(&self, key: &Key, member: Bytes, score: f64) -> StoreResult<bool>;

    /// Add `delta` to a member's score, inserting it at zero first if absent.
    fn sorted_increment(&self, key: &Key, member: Bytes, delta: f64) -> StoreResult<f64>;

    fn sorted_score(&self, key: &Key, member: &[u8]) -> StoreResult<Option<f64>>;

    fn sorted_remove(&self, key: &Key, member: &[u8]) -> StoreResult<bool>;

    fn sorted_len(&self, key: &Key) -> StoreResult<usize>;

    /// Members ranked `start` to `stop` inclusive, ascending by score then
    /// member bytes. Negative ranks count from the highest.
    fn sorted_range_by_rank(&self, key: &Key, start: i64, stop: i64)
        -> StoreResult<Vec<(Bytes, f64)>>;

    /// Members with scores inside `[min, max]`, ascending, at most `limit`.
    fn sorted_range_by_score(
        &self,
        key: &Key,
        min: ScoreBound,
        max: ScoreBound,
        limit: Option<usize>,
    ) -> StoreResult<Vec<(Bytes, f64)>>;

    // ---- Approximate cardinality ----

    /// Observe elements. Returns `true` if the estimate may have changed.
    fn cardinality_add(&self, key: &Key, elements: &[Bytes]) -> StoreResult<bool>;

    /// Approximate number of distinct elements observed.
    fn cardinality_count(&self, key: &Key) -> StoreResult<u64>;

    // ---- Scripted ----

    /// Atomically increment the integer counter at `counter` and add the new
    /// value to the sorted set at `index`, as its ASCII decimal member scored
    /// by its own value. Returns the new value.
    ///
    /// A value above `ceiling` still advances the counter but is not added to
    /// `index`.
    fn allocate_id(&self, counter: &Key, index: &Key, ceiling: i64) -> StoreResult<i64>;

    // ---- Server ----

    /// Approximate bytes held: keys, fields, members, and values.
    fn footprint(&self) -> StoreResult<u64>;

    /// Delete every key. Requires administrative rights.
    fn flush_all(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_bounds() {
        assert!(ScoreBound::Unbounded.admits_above(f64::MIN));
        assert!(ScoreBound::Inclusive(1.0).admits_above(1.0));
        assert!(!ScoreBound::Exclusive(1.0).admits_above(1.0));
        assert!(ScoreBound::Inclusive(1.0).admits_below(1.0));
        assert!(!ScoreBound::Exclusive(1.0).admits_below(1.0));
        assert!(ScoreBound::Exclusive(1.0).admits_below(0.5));
    }
}
