use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::ops::Bound;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use shapekv_types::Key;
use tracing::info;

use crate::config::{StoreConfig, MEMORY_ENDPOINT};
use crate::error::{StoreError, StoreResult};
use crate::hll::HyperLogLog;
use crate::traits::{KeyValueStore, ListEnd, ScoreBound, When};

/// Score with a total order, so it can key a `BTreeSet`.
#[derive(Clone, Copy, Debug)]
struct Score(f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Default)]
struct SortedSet {
    scores: HashMap<Bytes, f64>,
    order: BTreeSet<(Score, Bytes)>,
}

impl SortedSet {
    fn insert(&mut self, member: Bytes, score: f64) -> bool {
        let is_new = match self.scores.insert(member.clone(), score) {
            Some(old) => {
                self.order.remove(&(Score(old), member.clone()));
                false
            }
            None => true,
        };
        self.order.insert((Score(score), member));
        is_new
    }

    fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove(member) {
            Some(old) => {
                self.order
                    .remove(&(Score(old), Bytes::copy_from_slice(member)));
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.scores.len()
    }

    /// Entries at or above `min`, ascending.
    fn from_min(&self, min: ScoreBound) -> impl Iterator<Item = &(Score, Bytes)> {
        let start = match min {
            ScoreBound::Unbounded => Bound::Unbounded,
            ScoreBound::Inclusive(s) | ScoreBound::Exclusive(s) => {
                Bound::Included((Score(s), Bytes::new()))
            }
        };
        self.order
            .range::<(Score, Bytes), _>((start, Bound::Unbounded))
            .skip_while(move |(score, _)| !min.admits_above(score.0))
    }
}

#[derive(Debug)]
enum Data {
    Str(Bytes),
    Set(HashSet<Bytes>),
    List(VecDeque<Bytes>),
    Hash(HashMap<Bytes, Bytes>),
    Sorted(SortedSet),
    Cardinality(HyperLogLog),
}

impl Data {
    fn kind(&self) -> &'static str {
        match self {
            Data::Str(_) => "string",
            Data::Set(_) => "set",
            Data::List(_) => "list",
            Data::Hash(_) => "hash",
            Data::Sorted(_) => "sorted set",
            Data::Cardinality(_) => "cardinality counter",
        }
    }

    fn is_empty_collection(&self) -> bool {
        match self {
            Data::Str(_) | Data::Cardinality(_) => false,
            Data::Set(s) => s.is_empty(),
            Data::List(l) => l.is_empty(),
            Data::Hash(h) => h.is_empty(),
            Data::Sorted(z) => z.len() == 0,
        }
    }

    fn footprint(&self) -> u64 {
        let bytes = match self {
            Data::Str(v) => v.len(),
            Data::Set(s) => s.iter().map(Bytes::len).sum(),
            Data::List(l) => l.iter().map(Bytes::len).sum(),
            Data::Hash(h) => h.iter().map(|(f, v)| f.len() + v.len()).sum(),
            Data::Sorted(z) => z.scores.keys().map(|m| m.len() + 8).sum(),
            Data::Cardinality(h) => h.size_bytes(),
        };
        bytes as u64
    }
}

#[derive(Debug)]
struct Entry {
    data: Data,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(data: Data) -> Self {
        Self {
            data,
            expires_at: None,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |t| t > now)
    }
}

type Entries = HashMap<Key, Entry>;

fn poisoned<T>(e: PoisonError<T>) -> StoreError {
    StoreError::Backend(format!("lock poisoned: {e}"))
}

fn wrong_type(key: &Key, expected: &'static str, found: &Data) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}

fn live<'a>(map: &'a Entries, key: &Key) -> Option<&'a Entry> {
    map.get(key).filter(|e| e.is_live(Instant::now()))
}

fn purge_expired(map: &mut Entries, key: &Key) {
    if map.get(key).is_some_and(|e| !e.is_live(Instant::now())) {
        map.remove(key);
    }
}

fn drop_if_empty(map: &mut Entries, key: &Key) {
    if map.get(key).is_some_and(|e| e.data.is_empty_collection()) {
        map.remove(key);
    }
}

/// Generates typed accessors over one `Data` variant:
/// `$read` borrows a live value, `$create` borrows or creates it, and
/// `$existing` mutably borrows it only if present.
macro_rules! access {
    ($variant:ident, $ty:ty, $name:literal, read = $read:ident) => {
        fn $read<'a>(map: &'a Entries, key: &Key) -> StoreResult<Option<&'a $ty>> {
            match live(map, key).map(|e| &e.data) {
                None => Ok(None),
                Some(Data::$variant(v)) => Ok(Some(v)),
                Some(other) => Err(wrong_type(key, $name, other)),
            }
        }
    };
    ($variant:ident, $ty:ty, $name:literal, create = $create:ident) => {
        fn $create<'a>(map: &'a mut Entries, key: &Key) -> StoreResult<&'a mut $ty> {
            purge_expired(map, key);
            let entry = map
                .entry(key.clone())
                .or_insert_with(|| Entry::new(Data::$variant(Default::default())));
            match &mut entry.data {
                Data::$variant(v) => Ok(v),
                other => Err(wrong_type(key, $name, other)),
            }
        }
    };
    ($variant:ident, $ty:ty, $name:literal, existing = $existing:ident) => {
        fn $existing<'a>(map: &'a mut Entries, key: &Key) -> StoreResult<Option<&'a mut $ty>> {
            purge_expired(map, key);
            match map.get_mut(key).map(|e| &mut e.data) {
                None => Ok(None),
                Some(Data::$variant(v)) => Ok(Some(v)),
                Some(other) => Err(wrong_type(key, $name, other)),
            }
        }
    };
}

access!(Set, HashSet<Bytes>, "set", read = set_ref);
access!(Set, HashSet<Bytes>, "set", create = set_create);
access!(Set, HashSet<Bytes>, "set", existing = set_existing);
access!(List, VecDeque<Bytes>, "list", read = list_ref);
access!(List, VecDeque<Bytes>, "list", create = list_create);
access!(List, VecDeque<Bytes>, "list", existing = list_existing);
access!(Hash, HashMap<Bytes, Bytes>, "hash", read = hash_ref);
access!(Hash, HashMap<Bytes, Bytes>, "hash", create = hash_create);
access!(Hash, HashMap<Bytes, Bytes>, "hash", existing = hash_existing);
access!(Sorted, SortedSet, "sorted set", read = sorted_ref);
access!(Sorted, SortedSet, "sorted set", create = sorted_create);
access!(Sorted, SortedSet, "sorted set", existing = sorted_existing);
access!(Cardinality, HyperLogLog, "cardinality counter", read = cardinality_ref);
access!(Cardinality, HyperLogLog, "cardinality counter", create = cardinality_create);

fn parse_int(key: &Key, raw: &[u8]) -> StoreResult<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| StoreError::NotAnInteger {
            key: key.to_string(),
        })
}

fn increment(map: &mut Entries, key: &Key, delta: i64) -> StoreResult<i64> {
    purge_expired(map, key);
    let entry = map
        .entry(key.clone())
        .or_insert_with(|| Entry::new(Data::Str(Bytes::from_static(b"0"))));
    let current = match &entry.data {
        Data::Str(raw) => parse_int(key, raw)?,
        other => return Err(wrong_type(key, "string", other)),
    };
    let next = current
        .checked_add(delta)
        .ok_or_else(|| StoreError::NotAnInteger {
            key: key.to_string(),
        })?;
    entry.data = Data::Str(Bytes::from(next.to_string()));
    Ok(next)
}

/// Resolve an inclusive `[start, stop]` range with negative indices counting
/// from the end. Returns `None` for an empty range.
fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len || stop < 0 {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

fn check_score(key: &Key, score: f64) -> StoreResult<()> {
    if score.is_nan() {
        return Err(StoreError::InvalidScore {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// In-process key-value store.
///
/// Intended for tests and embedding. Every kind of value the remote store
/// offers is held in one `HashMap` behind a `RwLock`; each trait method runs
/// under a single lock acquisition, so each is atomic. Expired keys are
/// removed lazily when next touched.
pub struct InMemoryStore {
    entries: RwLock<Entries>,
    allow_admin: bool,
}

impl InMemoryStore {
    /// Create an empty store without administrative rights.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            allow_admin: false,
        }
    }

    /// Create an empty store that permits administrative commands.
    pub fn with_admin() -> Self {
        Self {
            allow_admin: true,
            ..Self::new()
        }
    }

    /// Open a store for `config`.
    ///
    /// Only `memory://` endpoints are served in-process; any other endpoint
    /// is reported as unreachable.
    pub fn connect(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        if !config.endpoint.starts_with(MEMORY_ENDPOINT) {
            return Err(StoreError::Unreachable {
                endpoint: config.endpoint.clone(),
                reason: "only memory:// endpoints are served in-process".into(),
            });
        }
        info!(endpoint = %config.endpoint, allow_admin = config.allow_admin, "in-memory store opened");
        Ok(Self {
            entries: RwLock::new(HashMap::new()),
            allow_admin: config.allow_admin,
        })
    }

    /// Number of live keys.
    pub fn len(&self) -> StoreResult<usize> {
        self.read(|map| {
            let now = Instant::now();
            Ok(map.values().filter(|e| e.is_live(now)).count())
        })
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn read<T>(&self, f: impl FnOnce(&Entries) -> StoreResult<T>) -> StoreResult<T> {
        let map = self.entries.read().map_err(poisoned)?;
        f(&map)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Entries) -> StoreResult<T>) -> StoreResult<T> {
        let mut map = self.entries.write().map_err(poisoned)?;
        f(&mut map)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys = self.entries.read().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("InMemoryStore")
            .field("keys", &keys)
            .field("allow_admin", &self.allow_admin)
            .finish()
    }
}

impl KeyValueStore for InMemoryStore {
    // ---- Keys and strings ----

    fn get(&self, key: &Key) -> StoreResult<Option<Bytes>> {
        self.read(|map| match live(map, key).map(|e| &e.data) {
            None => Ok(None),
            Some(Data::Str(v)) => Ok(Some(v.clone())),
            Some(other) => Err(wrong_type(key, "string", other)),
        })
    }

    fn set(&self, key: &Key, value: Bytes) -> StoreResult<()> {
        self.write(|map| {
            map.insert(key.clone(), Entry::new(Data::Str(value)));
            Ok(())
        })
    }

    fn delete(&self, key: &Key) -> StoreResult<bool> {
        self.write(|map| {
            purge_expired(map, key);
            Ok(map.remove(key).is_some())
        })
    }

    fn exists(&self, key: &Key) -> StoreResult<bool> {
        self.read(|map| Ok(live(map, key).is_some()))
    }

    fn incr_by(&self, key: &Key, delta: i64) -> StoreResult<i64> {
        self.write(|map| increment(map, key, delta))
    }

    fn expire(&self, key: &Key, ttl: Duration) -> StoreResult<bool> {
        self.write(|map| {
            purge_expired(map, key);
            match map.get_mut(key) {
                Some(entry) => {
                    entry.expires_at = Instant::now().checked_add(ttl);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn persist(&self, key: &Key) -> StoreResult<bool> {
        self.write(|map| {
            purge_expired(map, key);
            Ok(map
                .get_mut(key)
                .is_some_and(|entry| entry.expires_at.take().is_some()))
        })
    }

    fn ttl(&self, key: &Key) -> StoreResult<Option<Duration>> {
        self.read(|map| {
            Ok(live(map, key)
                .and_then(|e| e.expires_at)
                .map(|t| t.saturating_duration_since(Instant::now())))
        })
    }

    fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<Vec<Key>> {
        self.read(|map| {
            let now = Instant::now();
            let mut keys: Vec<Key> = map
                .iter()
                .filter(|(k, e)| k.starts_with(prefix) && e.is_live(now))
                .map(|(k, _)| k.clone())
                .collect();
            keys.sort();
            Ok(keys)
        })
    }

    // ---- Sets ----

    fn set_add(&self, key: &Key, members: &[Bytes]) -> StoreResult<usize> {
        self.write(|map| {
            let set = set_create(map, key)?;
            let added = members.iter().filter(|m| set.insert((*m).clone())).count();
            drop_if_empty(map, key);
            Ok(added)
        })
    }

    fn set_remove(&self, key: &Key, member: &[u8]) -> StoreResult<bool> {
        self.write(|map| {
            let removed = match set_existing(map, key)? {
                Some(set) => set.remove(member),
                None => false,
            };
            drop_if_empty(map, key);
            Ok(removed)
        })
    }

    fn set_contains(&self, key: &Key, member: &[u8]) -> StoreResult<bool> {
        self.read(|map| Ok(set_ref(map, key)?.is_some_and(|s| s.contains(member))))
    }

    fn set_len(&self, key: &Key) -> StoreResult<usize> {
        self.read(|map| Ok(set_ref(map, key)?.map_or(0, HashSet::len)))
    }

    fn set_members(&self, key: &Key) -> StoreResult<Vec<Bytes>> {
        self.read(|map| {
            Ok(set_ref(map, key)?
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default())
        })
    }

    // ---- Lists ----

    fn list_push(&self, key: &Key, end: ListEnd, values: &[Bytes]) -> StoreResult<usize> {
        self.write(|map| {
            let list = list_create(map, key)?;
            for value in values {
                match end {
                    ListEnd::Head => list.push_front(value.clone()),
                    ListEnd::Tail => list.push_back(value.clone()),
                }
            }
            let len = list.len();
            drop_if_empty(map, key);
            Ok(len)
        })
    }

    fn list_pop(&self, key: &Key, end: ListEnd) -> StoreResult<Option<Bytes>> {
        self.write(|map| {
            let popped = match list_existing(map, key)? {
                Some(list) => match end {
                    ListEnd::Head => list.pop_front(),
                    ListEnd::Tail => list.pop_back(),
                },
                None => None,
            };
            drop_if_empty(map, key);
            Ok(popped)
        })
    }

    fn list_index(&self, key: &Key, index: i64) -> StoreResult<Option<Bytes>> {
        self.read(|map| {
            let Some(list) = list_ref(map, key)? else {
                return Ok(None);
            };
            let len = list.len() as i64;
            let resolved = if index < 0 { len + index } else { index };
            if resolved < 0 || resolved >= len {
                return Ok(None);
            }
            Ok(list.get(resolved as usize).cloned())
        })
    }

    fn list_len(&self, key: &Key) -> StoreResult<usize> {
        self.read(|map| Ok(list_ref(map, key)?.map_or(0, VecDeque::len)))
    }

    fn list_range(&self, key: &Key, start: i64, stop: i64) -> StoreResult<Vec<Bytes>> {
        self.read(|map| {
            let Some(list) = list_ref(map, key)? else {
                return Ok(Vec::new());
            };
            Ok(match resolve_range(list.len(), start, stop) {
                Some((from, to)) => list.range(from..=to).cloned().collect(),
                None => Vec::new(),
            })
        })
    }

    // ---- Hashes ----

    fn hash_set(&self, key: &Key, field: Bytes, value: Bytes, when: When) -> StoreResult<bool> {
        self.write(|map| {
            let hash = hash_create(map, key)?;
            let written = match when {
                When::Always => hash.insert(field, value).is_none(),
                When::NotExists => {
                    if hash.contains_key(&field) {
                        false
                    } else {
                        hash.insert(field, value);
                        true
                    }
                }
            };
            Ok(written)
        })
    }

    fn hash_get(&self, key: &Key, field: &[u8]) -> StoreResult<Option<Bytes>> {
        self.read(|map| Ok(hash_ref(map, key)?.and_then(|h| h.get(field).cloned())))
    }

    fn hash_delete(&self, key: &Key, field: &[u8]) -> StoreResult<bool> {
        self.write(|map| {
            let removed = match hash_existing(map, key)? {
                Some(hash) => hash.remove(field).is_some(),
                None => false,
            };
            drop_if_empty(map, key);
            Ok(removed)
        })
    }

    fn hash_len(&self, key: &Key) -> StoreResult<usize> {
        self.read(|map| Ok(hash_ref(map, key)?.map_or(0, HashMap::len)))
    }

    fn hash_entries(&self, key: &Key) -> StoreResult<Vec<(Bytes, Bytes)>> {
        self.read(|map| {
            Ok(hash_ref(map, key)?
                .map(|h| h.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
                .unwrap_or_default())
        })
    }

    // ---- Sorted sets ----

    fn sorted_add(&self, key: &Key, member: Bytes, score: f64) -> StoreResult<bool> {
        check_score(key, score)?;
        self.write(|map| Ok(sorted_create(map, key)?.insert(member, score)))
    }

    fn sorted_increment(&self, key: &Key, member: Bytes, delta: f64) -> StoreResult<f64> {
        self.write(|map| {
            let sorted = sorted_create(map, key)?;
            let next = sorted.scores.get(&member).copied().unwrap_or(0.0) + delta;
            if let Err(e) = check_score(key, next) {
                drop_if_empty(map, key);
                return Err(e);
            }
            sorted.insert(member, next);
            Ok(next)
        })
    }

    fn sorted_score(&self, key: &Key, member: &[u8]) -> StoreResult<Option<f64>> {
        self.read(|map| Ok(sorted_ref(map, key)?.and_then(|z| z.scores.get(member).copied())))
    }

    fn sorted_remove(&self, key: &Key, member: &[u8]) -> StoreResult<bool> {
        self.write(|map| {
            let removed = match sorted_existing(map, key)? {
                Some(sorted) => sorted.remove(member),
                None => false,
            };
            drop_if_empty(map, key);
            Ok(removed)
        })
    }

    fn sorted_len(&self, key: &Key) -> StoreResult<usize> {
        self.read(|map| Ok(sorted_ref(map, key)?.map_or(0, SortedSet::len)))
    }

    fn sorted_range_by_rank(
        &self,
        key: &Key,
        start: i64,
        stop: i64,
    ) -> StoreResult<Vec<(Bytes, f64)>> {
        self.read(|map| {
            let Some(sorted) = sorted_ref(map, key)? else {
                return Ok(Vec::new());
            };
            Ok(match resolve_range(sorted.len(), start, stop) {
                Some((from, to)) => sorted
                    .order
                    .iter()
                    .skip(from)
                    .take(to - from + 1)
                    .map(|(score, member)| (member.clone(), score.0))
                    .collect(),
                None => Vec::new(),
            })
        })
    }

    fn sorted_range_by_score(
        &self,
        key: &Key,
        min: ScoreBound,
        max: ScoreBound,
        limit: Option<usize>,
    ) -> StoreResult<Vec<(Bytes, f64)>> {
        self.read(|map| {
            let Some(sorted) = sorted_ref(map, key)? else {
                return Ok(Vec::new());
            };
            Ok(sorted
                .from_min(min)
                .take_while(|(score, _)| max.admits_below(score.0))
                .take(limit.unwrap_or(usize::MAX))
                .map(|(score, member)| (member.clone(), score.0))
                .collect())
        })
    }

    // ---- Approximate cardinality ----

    fn cardinality_add(&self, key: &Key, elements: &[Bytes]) -> StoreResult<bool> {
        self.write(|map| {
            let hll = cardinality_create(map, key)?;
            let mut changed = false;
            for element in elements {
                changed |= hll.insert(element);
            }
            Ok(changed)
        })
    }

    fn cardinality_count(&self, key: &Key) -> StoreResult<u64> {
        self.read(|map| Ok(cardinality_ref(map, key)?.map_or(0, HyperLogLog::count)))
    }

    // ---- Scripted ----

    fn allocate_id(&self, counter: &Key, index: &Key, ceiling: i64) -> StoreResult<i64> {
        self.write(|map| {
            // Check the index kind before touching the counter so a failure
            // leaves both untouched.
            sorted_create(map, index)?;
            let next = match increment(map, counter, 1) {
                Ok(next) => next,
                Err(e) => {
                    drop_if_empty(map, index);
                    return Err(e);
                }
            };
            if next > ceiling {
                drop_if_empty(map, index);
                return Ok(next);
            }
            sorted_create(map, index)?.insert(Bytes::from(next.to_string()), next as f64);
            Ok(next)
        })
    }

    // ---- Server ----

    fn footprint(&self) -> StoreResult<u64> {
        self.read(|map| {
            let now = Instant::now();
            Ok(map
                .iter()
                .filter(|(_, e)| e.is_live(now))
                .map(|(k, e)| k.len() as u64 + e.data.footprint())
                .sum())
        })
    }

    fn flush_all(&self) -> StoreResult<()> {
        if !self.allow_admin {
            return Err(StoreError::AdminDisabled);
        }
        self.write(|map| {
            let removed = map.len();
            map.clear();
            info!(removed, "in-memory store flushed");
            Ok(())
        })
    }
}
