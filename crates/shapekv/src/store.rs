//! The store facade: configuration, registry, identity map and backend.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use shapekv_codec::CodecRegistry;
use shapekv_schema::{field_key, CollectionKind, ShapeDescriptor, Strategy};
use shapekv_store::{InMemoryStore, KeyValueStore, StoreConfig, StoreError};
use shapekv_types::Key;
use tracing::{debug, info, warn};

use crate::array::{delete_pages, PagedArray};
use crate::collections::{Collection, CollectionAdapter};
use crate::entity::{Entity, HandleCore};
use crate::enumerate::Enumeration;
use crate::error::{Error, Result};
use crate::identity::IdentityMap;
use crate::pending::Pending;
use crate::shape::{Shape, ShapeDecl};
use crate::value::{encode_element, AllocatableId, FieldValue, Storable};

/// Largest id the enumeration index orders exactly; its scores are `f64`.
pub const MAX_EXACT_ID: i64 = 1 << 53;

struct StoreInner {
    backend: Arc<dyn KeyValueStore>,
    config: StoreConfig,
    registry: shapekv_schema::TypeRegistry,
    identity: IdentityMap,
}

/// Entry point for typed access to a key-value backend.
///
/// `Store` is cheap to clone; clones share the backend, the shape registry
/// and the identity map.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Wrap a backend with the default configuration.
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self::build(backend, StoreConfig::default())
    }

    /// Wrap a backend with a validated configuration.
    pub fn with_config(backend: Arc<dyn KeyValueStore>, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(backend, config))
    }

    /// A store over a fresh in-memory backend.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    /// Connect to the backend named by `config.endpoint`.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let backend = InMemoryStore::connect(&config)?;
        Ok(Self::build(Arc::new(backend), config))
    }

    fn build(backend: Arc<dyn KeyValueStore>, config: StoreConfig) -> Self {
        info!(
            endpoint = %config.endpoint,
            allow_admin = config.allow_admin,
            "store opened"
        );
        let identity = IdentityMap::new(config.identity_cache_capacity);
        Self {
            inner: Arc::new(StoreInner {
                backend,
                config,
                registry: shapekv_schema::TypeRegistry::new(),
                identity,
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn backend(&self) -> &dyn KeyValueStore {
        self.inner.backend.as_ref()
    }

    /// The classified descriptor of `S`, registering it on first use.
    pub fn descriptor<S: Shape>(&self) -> Result<Arc<ShapeDescriptor>> {
        Ok(self
            .inner
            .registry
            .register(TypeId::of::<S>(), ShapeDecl::<S>::collect)?)
    }

    /// A handle to the entity with `id`. No I/O happens.
    ///
    /// Handles for the same id share one allocation while any of them is alive.
    pub fn get<S: Shape>(&self, id: S::Id) -> Result<Entity<S>> {
        let descriptor = self.descriptor::<S>()?;
        let encoded = encode_element(descriptor.id().codec(), &id)?;
        let core = self.inner.identity.get_or_insert(
            TypeId::of::<S>(),
            encoded.clone(),
            || HandleCore {
                key: descriptor.keys().primary(&encoded),
                id,
                descriptor: Arc::clone(&descriptor),
            },
        )?;
        Ok(Entity::from_core(self.clone(), core))
    }

    /// Allocate the next id and register it in the enumeration index.
    ///
    /// Fails with [`Error::IdExhausted`] past `2^53` or past the id type's
    /// range. The counter advances regardless; the index does not.
    pub fn create<S>(&self) -> Result<Entity<S>>
    where
        S: Shape,
        S::Id: AllocatableId,
    {
        let descriptor = self.descriptor::<S>()?;
        let keys = descriptor.keys();
        let ceiling = MAX_EXACT_ID.min(S::Id::MAX);
        let next = self
            .backend()
            .allocate_id(&keys.counter(), &keys.index(), ceiling)?;
        let exhausted = Error::IdExhausted {
            shape: S::NAME,
            value: next,
        };
        if next > ceiling {
            warn!(shape = S::NAME, value = next, "id space exhausted");
            return Err(exhausted);
        }
        debug!(shape = S::NAME, id = next, "id allocated");
        let id = S::Id::from_allocated(next).ok_or(exhausted)?;
        self.get(id)
    }

    pub fn create_async<S>(&self) -> Pending<Entity<S>>
    where
        S: Shape,
        S::Id: AllocatableId,
    {
        let store = self.clone();
        self.spawn("create", move || store.create::<S>())
    }

    /// Every created entity of `S`, in id order, fetched in batches.
    pub fn enumerate<S: Shape>(&self) -> Result<Enumeration<S>> {
        let descriptor = self.descriptor::<S>()?;
        Ok(Enumeration::new(
            self.clone(),
            descriptor,
            self.inner.config.enumeration_batch,
        ))
    }

    /// Number of created entities of `S`.
    pub fn count<S: Shape>(&self) -> Result<usize> {
        let descriptor = self.descriptor::<S>()?;
        Ok(self.backend().sorted_len(&descriptor.keys().index())?)
    }

    /// Delete every key derived from the entity and drop it from the index.
    pub fn remove<S: Shape>(&self, entity: &Entity<S>) -> Result<()> {
        let descriptor = entity.descriptor();
        let backend = self.backend();
        let primary = entity.key();

        for spec in descriptor.properties() {
            match spec.strategy() {
                Strategy::Id | Strategy::CompactMember => {}
                Strategy::Collection(CollectionKind::Array { .. }) => {
                    delete_pages(self, &field_key(primary, spec.alias()))?;
                }
                _ => {
                    backend.delete(&field_key(primary, spec.alias()))?;
                }
            }
        }
        for group in descriptor.groups() {
            backend.delete(&field_key(primary, group.alias()))?;
        }
        backend.delete(primary)?;

        let encoded = encode_element(descriptor.id().codec(), entity.id())?;
        backend.sorted_remove(&descriptor.keys().index(), &encoded)?;
        debug!(key = %primary, "entity removed");
        Ok(())
    }

    /// Bind a collection to an arbitrary key, outside any entity.
    pub fn collection<C: Collection>(&self, key: impl Into<Key>) -> Result<C> {
        let element = CodecRegistry::resolve(C::element_domain())?;
        let field = C::key_domain().map(CodecRegistry::resolve).transpose()?;
        Ok(C::bind(CollectionAdapter::new(
            self.clone(),
            key.into(),
            element,
            field,
        )))
    }

    /// Bind a paged array to an arbitrary key, outside any entity.
    pub fn array<V: FieldValue>(&self, key: impl Into<Key>, page_size: u32) -> Result<PagedArray<V>> {
        if page_size == 0 {
            return Err(Error::InvalidArgument("array page size must be positive".into()));
        }
        let codec = CodecRegistry::resolve(V::Element::domain())?;
        Ok(PagedArray::new(self.clone(), key.into(), page_size, codec))
    }

    /// Approximate bytes held by the backend.
    pub fn footprint(&self) -> Result<u64> {
        Ok(self.backend().footprint()?)
    }

    /// Remove every key. Requires `allow_admin`.
    pub fn flush_all(&self) -> Result<()> {
        if !self.inner.config.allow_admin {
            return Err(StoreError::AdminDisabled.into());
        }
        self.backend().flush_all()?;
        info!("store flushed");
        Ok(())
    }

    pub(crate) fn spawn<T, F>(&self, operation: &'static str, work: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        Pending::spawn(operation, self.inner.config.sync_timeout, work)
    }

    #[cfg(test)]
    pub(crate) fn identity_len(&self) -> usize {
        self.inner.identity.len()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("endpoint", &self.inner.config.endpoint)
            .field("shapes", &self.inner.registry.len())
            .field("identity", &self.inner.identity)
            .finish()
    }
}
