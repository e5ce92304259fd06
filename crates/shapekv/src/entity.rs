//! Entity handles.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use shapekv_schema::{field_key, ShapeDescriptor, Strategy};
use shapekv_types::{Domain, Key, Value};

use crate::array::PagedArray;
use crate::collections::{Collection, CollectionAdapter};
use crate::error::Result;
use crate::pending::Pending;
use crate::property::{resolve, ArrayProp, Blocking, CollectionProp, Readable, Writable};
use crate::shape::Shape;
use crate::store::Store;
use crate::value::{FieldValue, IdValue, Storable};

/// State shared by every live handle to one entity.
pub(crate) struct HandleCore<I> {
    pub(crate) id: I,
    pub(crate) key: Key,
    pub(crate) descriptor: Arc<ShapeDescriptor>,
}

/// A handle to one stored entity of shape `S`.
///
/// Handles are cheap to clone and hold no property values: every read and
/// write goes to the store. Two handles are equal when their shape and id are
/// equal; within one [`Store`], live handles to the same entity also share
/// their allocation.
pub struct Entity<S: Shape> {
    core: Arc<HandleCore<S::Id>>,
    store: Store,
    _shape: PhantomData<fn() -> S>,
}

impl<S: Shape> Entity<S> {
    pub(crate) fn from_core(store: Store, core: Arc<HandleCore<S::Id>>) -> Self {
        Self {
            core,
            store,
            _shape: PhantomData,
        }
    }

    pub fn id(&self) -> &S::Id {
        &self.core.id
    }

    /// The primary key, `<ShapeAlias>:<Id>`.
    pub fn key(&self) -> &Key {
        &self.core.key
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn descriptor(&self) -> &ShapeDescriptor {
        &self.core.descriptor
    }

    /// Whether both handles share one allocation.
    pub fn same_handle(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    /// Read a property. Absent non-nullable fields read as their default.
    pub fn get<P: Readable<S> + Blocking>(&self, property: P) -> Result<P::Output> {
        property.read(self)
    }

    /// Write a property. Writing `None` to a nullable property removes it.
    pub fn set<P: Writable<S> + Blocking>(&self, property: P, value: P::Input) -> Result<()> {
        property.write(self, value)
    }

    /// Read a property on the blocking pool.
    pub fn get_async<P: Readable<S>>(&self, property: P) -> Pending<P::Output> {
        let entity = self.clone();
        self.store.spawn("get", move || property.read(&entity))
    }

    /// Write a property on the blocking pool.
    pub fn set_async<P: Writable<S>>(&self, property: P, value: P::Input) -> Pending<()> {
        let entity = self.clone();
        self.store
            .spawn("set", move || property.write(&entity, value))
    }

    /// Bind a collection property. No I/O happens until the collection is used.
    pub fn collection<C: Collection>(&self, property: CollectionProp<S, C>) -> Result<C> {
        let kind = C::KIND;
        let spec = resolve(self, property.name(), C::element_domain(), kind.name(), |s| {
            matches!(s, Strategy::Collection(k) if k.same_kind(&kind))
        })?;
        let adapter = CollectionAdapter::new(
            self.store.clone(),
            field_key(self.key(), spec.alias()),
            spec.codec(),
            spec.key_codec(),
        );
        Ok(C::bind(adapter))
    }

    /// Bind an array property, using the declared page size.
    pub fn array<V: FieldValue>(&self, property: ArrayProp<S, V>) -> Result<PagedArray<V>> {
        let spec = resolve(self, property.name(), V::Element::domain(), "array", |s| {
            matches!(s, Strategy::Collection(shapekv_schema::CollectionKind::Array { .. }))
        })?;
        let page_size = match spec.strategy() {
            Strategy::Collection(shapekv_schema::CollectionKind::Array { page_size }) => page_size,
            _ => property.page_size_value(),
        };
        Ok(PagedArray::new(
            self.store.clone(),
            field_key(self.key(), spec.alias()),
            page_size,
            spec.codec(),
        ))
    }
}

impl<S: Shape> Clone for Entity<S> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            store: self.store.clone(),
            _shape: PhantomData,
        }
    }
}

impl<S: Shape> PartialEq for Entity<S> {
    fn eq(&self, other: &Self) -> bool {
        self.same_handle(other) || self.core.id == other.core.id
    }
}

impl<S: Shape> Eq for Entity<S> {}

impl<S: Shape> Hash for Entity<S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        TypeId::of::<S>().hash(state);
        self.core.id.hash(state);
    }
}

impl<S: Shape> fmt::Debug for Entity<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("shape", &S::NAME)
            .field("id", &self.core.id)
            .finish()
    }
}

impl<S: Shape> fmt::Display for Entity<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.core.key)
    }
}

/// Entities are stored by id, so they can be referenced from properties and
/// collections.
impl<T: Shape> Storable for Entity<T> {
    fn domain() -> Domain {
        Domain::Reference {
            shape: T::NAME,
            id: T::Id::ID_DOMAIN,
        }
    }

    fn to_value(&self) -> Value {
        self.core.id.to_value()
    }

    fn from_value(value: Value, store: &Store) -> Result<Self> {
        let id = T::Id::from_value(value, store)?;
        store.get::<T>(id)
    }
}
