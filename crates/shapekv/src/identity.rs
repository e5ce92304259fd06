//! Canonical handle cache.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use bytes::Bytes;
use tracing::debug;

use crate::error::{Error, Result};

type Slot = Weak<dyn Any + Send + Sync>;

fn poisoned<T>(e: PoisonError<T>) -> Error {
    Error::Internal(format!("lock poisoned: {e}"))
}

struct Inner {
    entries: HashMap<(TypeId, Bytes), Slot>,
    high_water: usize,
}

/// Maps `(shape, encoded id)` to the live handle allocation, if any.
///
/// Entries hold weak references, so the map never keeps a handle alive. Dead
/// entries are swept when the map outgrows its high-water mark; the mark
/// doubles whenever more than half the entries survive a sweep.
pub(crate) struct IdentityMap {
    capacity: usize,
    inner: RwLock<Inner>,
}

impl IdentityMap {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                high_water: capacity,
            }),
        }
    }

    /// Return the live allocation for the key, or store the one `make` builds.
    pub(crate) fn get_or_insert<T, F>(&self, shape: TypeId, id: Bytes, make: F) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let key = (shape, id);
        {
            let inner = self.inner.read().map_err(poisoned)?;
            if let Some(found) = lookup::<T>(&inner.entries, &key) {
                return Ok(found);
            }
        }

        let mut inner = self.inner.write().map_err(poisoned)?;
        if let Some(found) = lookup::<T>(&inner.entries, &key) {
            return Ok(found);
        }
        let fresh = Arc::new(make());
        let erased: Arc<dyn Any + Send + Sync> = fresh.clone();
        inner.entries.insert(key, Arc::downgrade(&erased));
        if inner.entries.len() > inner.high_water {
            self.sweep(&mut inner);
        }
        Ok(fresh)
    }

    fn sweep(&self, inner: &mut Inner) {
        let before = inner.entries.len();
        inner.entries.retain(|_, slot| slot.strong_count() > 0);
        let live = inner.entries.len();
        if live * 2 > inner.high_water {
            inner.high_water *= 2;
        } else {
            inner.high_water = self.capacity.max(inner.high_water / 2);
        }
        debug!(
            before,
            live,
            high_water = inner.high_water,
            "identity map swept"
        );
    }

    /// Number of tracked entries, dead or alive.
    pub(crate) fn len(&self) -> usize {
        self.inner.read().map(|i| i.entries.len()).unwrap_or(0)
    }
}

fn lookup<T: Send + Sync + 'static>(
    entries: &HashMap<(TypeId, Bytes), Slot>,
    key: &(TypeId, Bytes),
) -> Option<Arc<T>> {
    entries
        .get(key)
        .and_then(Weak::upgrade)
        .and_then(|live| live.downcast::<T>().ok())
}

impl fmt::Debug for IdentityMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityMap")
            .field("capacity", &self.capacity)
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> Bytes {
        Bytes::from(n.to_string())
    }

    #[test]
    fn live_entries_are_shared() {
        let map = IdentityMap::new(16);
        let a = map.get_or_insert(TypeId::of::<u8>(), id(1), || 1u32).unwrap();
        let b = map
            .get_or_insert(TypeId::of::<u8>(), id(1), || unreachable!("already live"))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn shapes_do_not_collide() {
        let map = IdentityMap::new(16);
        let a = map.get_or_insert(TypeId::of::<u8>(), id(1), || 1u32).unwrap();
        let b = map.get_or_insert(TypeId::of::<u16>(), id(1), || 2u32).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn dropped_entries_are_rebuilt() {
        let map = IdentityMap::new(16);
        drop(map.get_or_insert(TypeId::of::<u8>(), id(1), || 1u32).unwrap());
        let again = map.get_or_insert(TypeId::of::<u8>(), id(1), || 7u32).unwrap();
        assert_eq!(*again, 7);
    }

    #[test]
    fn sweep_discards_dead_entries() {
        let map = IdentityMap::new(4);
        for n in 0..4 {
            drop(map.get_or_insert(TypeId::of::<u8>(), id(n), || n).unwrap());
        }
        let _keep = map.get_or_insert(TypeId::of::<u8>(), id(99), || 99u32).unwrap();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn high_water_grows_with_live_entries() {
        let map = IdentityMap::new(2);
        let held: Vec<_> = (0..8)
            .map(|n| map.get_or_insert(TypeId::of::<u8>(), id(n), || n).unwrap())
            .collect();
        assert_eq!(map.len(), 8);
        assert_eq!(held.len(), 8);
    }
}
