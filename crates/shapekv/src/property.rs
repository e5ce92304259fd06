//! Typed property tokens and the access paths behind them.
//!
//! A token names a property and carries its Rust value type. Access through a
//! token is checked against the registered declaration, so a token used with
//! the wrong shape declaration fails instead of misreading bytes.

use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use shapekv_schema::{field_key, CompactGroup, CompactSlot, PropertySpec, Strategy, DEFAULT_PAGE_SIZE};
use shapekv_types::{Domain, Key};
use tracing::debug;

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::shape::Shape;
use crate::value::{decode_element, decode_stored, encode_element, FieldValue, Storable};

macro_rules! property_token {
    ($(#[$doc:meta])* $token:ident<$s:ident, $v:ident> { $($field:ident: $fty:ty = $default:expr),* }) => {
        $(#[$doc])*
        pub struct $token<$s, $v> {
            name: &'static str,
            alias: Option<&'static str>,
            $($field: $fty,)*
            _marker: PhantomData<fn() -> ($s, $v)>,
        }

        impl<$s, $v> $token<$s, $v> {
            pub const fn new(name: &'static str) -> Self {
                Self {
                    name,
                    alias: None,
                    $($field: $default,)*
                    _marker: PhantomData,
                }
            }

            /// Override the physical name used in keys.
            pub const fn alias(self, alias: &'static str) -> Self {
                Self {
                    name: self.name,
                    alias: Some(alias),
                    $($field: self.$field,)*
                    _marker: PhantomData,
                }
            }

            pub const fn name(&self) -> &'static str {
                self.name
            }

            pub const fn physical_alias(&self) -> Option<&'static str> {
                self.alias
            }
        }

        impl<$s, $v> Clone for $token<$s, $v> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<$s, $v> Copy for $token<$s, $v> {}

        impl<$s, $v> fmt::Debug for $token<$s, $v> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($token))
                    .field("name", &self.name)
                    .field("alias", &self.alias)
                    .finish()
            }
        }
    };
}

property_token!(
    /// A property stored under its own key.
    ScalarProp<S, V> {}
);

property_token!(
    /// A scalar reached only through [`Entity::get_async`] and
    /// [`Entity::set_async`].
    AsyncProp<S, V> {}
);

property_token!(
    /// A fixed-width property bit-packed with its group's other members.
    CompactProp<S, V> { group: Option<&'static str> = None }
);

property_token!(
    /// A nullable link to another entity, stored as the target's id.
    RefProp<S, T> {}
);

property_token!(
    /// A store-native collection owned by the entity.
    CollectionProp<S, C> {}
);

property_token!(
    /// A sparse array split across hash pages.
    ArrayProp<S, V> { page_size: u32 = DEFAULT_PAGE_SIZE }
);

impl<S, V> CompactProp<S, V> {
    /// Place the member in a named group instead of the default one.
    pub const fn group(self, tag: &'static str) -> Self {
        Self {
            name: self.name,
            alias: self.alias,
            group: Some(tag),
            _marker: PhantomData,
        }
    }

    pub const fn group_tag(&self) -> Option<&'static str> {
        self.group
    }
}

impl<S, V> ArrayProp<S, V> {
    pub const fn page_size(self, page_size: u32) -> Self {
        Self {
            name: self.name,
            alias: self.alias,
            page_size,
            _marker: PhantomData,
        }
    }

    pub const fn page_size_value(&self) -> u32 {
        self.page_size
    }
}

// ---- Access traits ----

/// A token that can be read from an entity.
pub trait Readable<S: Shape>: Copy + Send + 'static {
    type Output: Send + 'static;

    fn read(self, entity: &Entity<S>) -> Result<Self::Output>;
}

/// A token that can be written to an entity.
pub trait Writable<S: Shape>: Copy + Send + 'static {
    type Input: Send + 'static;

    fn write(self, entity: &Entity<S>, value: Self::Input) -> Result<()>;
}

/// Marks tokens that permit blocking access. Async scalars do not.
pub trait Blocking {}

impl<S, V> Blocking for ScalarProp<S, V> {}
impl<S, V> Blocking for CompactProp<S, V> {}
impl<S, T> Blocking for RefProp<S, T> {}

/// Look up `name` and check its declaration against the token's expectation.
pub(crate) fn resolve<'e, S: Shape>(
    entity: &'e Entity<S>,
    name: &'static str,
    domain: Domain,
    accessed_as: &str,
    accepts: impl Fn(Strategy) -> bool,
) -> Result<&'e PropertySpec> {
    let spec = entity
        .descriptor()
        .property(name)
        .ok_or(Error::UnknownProperty {
            shape: S::NAME,
            property: name,
        })?;
    if !accepts(spec.strategy()) {
        return Err(Error::PropertyMismatch {
            shape: S::NAME,
            property: name,
            reason: format!("declared as {:?}, accessed as {accessed_as}", spec.strategy()),
        });
    }
    if spec.domain() != domain {
        return Err(Error::PropertyMismatch {
            shape: S::NAME,
            property: name,
            reason: format!("declared domain {}, accessed as {domain}", spec.domain()),
        });
    }
    Ok(spec)
}

fn is_scalar(strategy: Strategy) -> bool {
    matches!(strategy, Strategy::Scalar | Strategy::NullableScalar)
}

fn read_field<S: Shape, V: FieldValue>(entity: &Entity<S>, spec: &PropertySpec) -> Result<V> {
    let key = field_key(entity.key(), spec.alias());
    let raw = entity.store().backend().get(&key)?;
    decode_stored(entity.store(), spec.codec(), &key, raw)
}

fn write_field<S: Shape, V: FieldValue>(
    entity: &Entity<S>,
    spec: &PropertySpec,
    value: V,
) -> Result<()> {
    let key = field_key(entity.key(), spec.alias());
    let backend = entity.store().backend();
    match value.into_stored() {
        Some(element) => backend.set(&key, encode_element(spec.codec(), &element)?)?,
        None => {
            backend.delete(&key)?;
        }
    }
    Ok(())
}

impl<S: Shape, V: FieldValue> Readable<S> for ScalarProp<S, V> {
    type Output = V;

    fn read(self, entity: &Entity<S>) -> Result<V> {
        let spec = resolve(entity, self.name, V::Element::domain(), "scalar", is_scalar)?;
        read_field(entity, spec)
    }
}

impl<S: Shape, V: FieldValue> Writable<S> for ScalarProp<S, V> {
    type Input = V;

    fn write(self, entity: &Entity<S>, value: V) -> Result<()> {
        let spec = resolve(entity, self.name, V::Element::domain(), "scalar", is_scalar)?;
        write_field(entity, spec, value)
    }
}

fn is_async(strategy: Strategy) -> bool {
    strategy == Strategy::AsyncScalar
}

impl<S: Shape, V: FieldValue> Readable<S> for AsyncProp<S, V> {
    type Output = V;

    fn read(self, entity: &Entity<S>) -> Result<V> {
        let spec = resolve(entity, self.name, V::Element::domain(), "async scalar", is_async)?;
        read_field(entity, spec)
    }
}

impl<S: Shape, V: FieldValue> Writable<S> for AsyncProp<S, V> {
    type Input = V;

    fn write(self, entity: &Entity<S>, value: V) -> Result<()> {
        let spec = resolve(entity, self.name, V::Element::domain(), "async scalar", is_async)?;
        write_field(entity, spec, value)
    }
}

// ---- Compact members ----

fn compact_member<'e, S: Shape>(
    entity: &'e Entity<S>,
    name: &'static str,
    domain: Domain,
) -> Result<(&'e CompactGroup, CompactSlot, Key)> {
    let spec = resolve(entity, name, domain, "compact member", |s| {
        s == Strategy::CompactMember
    })?;
    let slot = spec
        .compact_slot()
        .and_then(|slot| entity.descriptor().group(slot.group).map(|g| (g, slot)));
    let (group, slot) = slot.ok_or_else(|| Error::PropertyMismatch {
        shape: S::NAME,
        property: name,
        reason: "compact member without a group".into(),
    })?;
    let key = field_key(entity.key(), group.alias());
    Ok((group, slot, key))
}

impl<S: Shape, V: FieldValue> Readable<S> for CompactProp<S, V> {
    type Output = V;

    fn read(self, entity: &Entity<S>) -> Result<V> {
        let (group, slot, key) = compact_member(entity, self.name, V::Element::domain())?;
        let raw = entity.store().backend().get(&key)?;
        let value = group
            .encoder()
            .read(raw.as_deref(), slot.member)
            .map_err(|e| Error::codec_at(&key, e))?;
        let element = value
            .map(|v| V::Element::from_value(v, entity.store()))
            .transpose()?;
        Ok(V::from_stored(element))
    }
}

impl<S: Shape, V: FieldValue> Writable<S> for CompactProp<S, V> {
    type Input = V;

    /// Read-modify-write of the whole group blob. Concurrent writers to
    /// different members of one group can lose updates.
    fn write(self, entity: &Entity<S>, value: V) -> Result<()> {
        let (group, slot, key) = compact_member(entity, self.name, V::Element::domain())?;
        let backend = entity.store().backend();
        let raw = backend.get(&key)?;
        let value = value.into_stored().map(|e| e.to_value());
        let blob = group
            .encoder()
            .patch(raw.as_deref(), slot.member, value.as_ref())
            .map_err(|e| Error::codec_at(&key, e))?;
        backend.set(&key, Bytes::from(blob))?;
        debug!(key = %key, member = slot.member, "compact member patched");
        Ok(())
    }
}

// ---- References ----

fn is_reference(strategy: Strategy) -> bool {
    strategy == Strategy::Reference
}

impl<S: Shape, T: Shape> Readable<S> for RefProp<S, T> {
    type Output = Option<Entity<T>>;

    fn read(self, entity: &Entity<S>) -> Result<Option<Entity<T>>> {
        let spec = resolve(entity, self.name, Entity::<T>::domain(), "reference", is_reference)?;
        let key = field_key(entity.key(), spec.alias());
        let store = entity.store();
        match store.backend().get(&key)? {
            None => Ok(None),
            Some(raw) => {
                let id = decode_element::<T::Id>(store, spec.codec(), &key, &raw)?;
                store.get::<T>(id).map(Some)
            }
        }
    }
}

impl<S: Shape, T: Shape> Writable<S> for RefProp<S, T> {
    type Input = Option<Entity<T>>;

    fn write(self, entity: &Entity<S>, target: Option<Entity<T>>) -> Result<()> {
        let spec = resolve(entity, self.name, Entity::<T>::domain(), "reference", is_reference)?;
        write_field(entity, spec, target)
    }
}
