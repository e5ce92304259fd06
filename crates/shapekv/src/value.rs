//! Conversions between Rust values and store-level [`Value`]s.

use std::fmt;
use std::hash::Hash;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use shapekv_codec::DomainCodec;
use shapekv_types::{Domain, IdDomain, Key, TypeError, Value};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::Store;

/// A Rust type with a declared store domain.
///
/// `from_value` receives the store so references can resolve to live handles.
pub trait Storable: Sized + Send + Sync + 'static {
    fn domain() -> Domain;

    fn to_value(&self) -> Value;

    fn from_value(value: Value, store: &Store) -> Result<Self>;
}

/// The Rust type a property reads and writes.
///
/// Non-nullable types read their `Default` when the field is absent. `Option<T>`
/// is the nullable form: `None` removes the field.
pub trait FieldValue: Sized + Send + Sync + 'static {
    type Element: Storable;

    const NULLABLE: bool;

    fn from_stored(stored: Option<Self::Element>) -> Self;

    fn into_stored(self) -> Option<Self::Element>;
}

impl<T: Storable> FieldValue for Option<T> {
    type Element = T;

    const NULLABLE: bool = true;

    fn from_stored(stored: Option<T>) -> Self {
        stored
    }

    fn into_stored(self) -> Option<T> {
        self
    }
}

/// A type usable as a shape's identifier.
pub trait IdValue: Storable + Clone + Eq + Hash + fmt::Debug {
    const ID_DOMAIN: IdDomain;
}

/// An id type the store's counter can allocate.
pub trait AllocatableId: IdValue {
    /// Largest counter value the type can hold.
    const MAX: i64;

    /// `None` when the counter value does not fit.
    fn from_allocated(counter: i64) -> Option<Self>;
}

/// A fieldless enum stored by its discriminant.
///
/// `Default` must be the variant whose discriminant is zero: an absent field
/// reads as `Default`, and an unwritten compact member decodes to zero.
/// Implement this trait, then invoke [`storable_enum!`](crate::storable_enum).
pub trait StorableEnum: Copy + Default + Send + Sync + 'static {
    const NAME: &'static str;

    /// Width of the underlying representation: 8, 16, 32 or 64.
    const BITS: u8 = 32;

    fn to_repr(self) -> i64;

    fn from_repr(repr: i64) -> Option<Self>;
}

/// Implement [`Storable`] and [`FieldValue`] for a [`StorableEnum`].
#[macro_export]
macro_rules! storable_enum {
    ($ty:ty) => {
        impl $crate::Storable for $ty {
            fn domain() -> $crate::Domain {
                $crate::Domain::Enum {
                    name: <$ty as $crate::StorableEnum>::NAME,
                    bits: <$ty as $crate::StorableEnum>::BITS,
                }
            }

            fn to_value(&self) -> $crate::Value {
                $crate::Value::Int($crate::StorableEnum::to_repr(*self))
            }

            fn from_value(value: $crate::Value, _store: &$crate::Store) -> $crate::Result<Self> {
                $crate::value::enum_from_value::<$ty>(value)
            }
        }

        impl $crate::FieldValue for $ty {
            type Element = Self;

            const NULLABLE: bool = false;

            fn from_stored(stored: Option<Self>) -> Self {
                stored.unwrap_or_default()
            }

            fn into_stored(self) -> Option<Self> {
                Some(self)
            }
        }
    };
}

#[doc(hidden)]
pub fn enum_from_value<E: StorableEnum>(value: Value) -> Result<E> {
    match value {
        Value::Int(repr) => E::from_repr(repr).ok_or(Error::UnknownDiscriminant {
            name: E::NAME,
            value: repr,
        }),
        other => Err(mismatch(E::NAME, &other)),
    }
}

fn mismatch(expected: &'static str, found: &Value) -> Error {
    Error::ValueMismatch {
        expected,
        found: found.kind(),
    }
}

fn out_of_range(domain: &'static str, value: impl fmt::Display) -> Error {
    Error::Type(TypeError::OutOfRange {
        domain,
        value: value.to_string(),
    })
}

// ---- Primitive impls ----

macro_rules! storable_int {
    ($variant:ident: $($ty:ty => $domain:ident),*) => {$(
        impl Storable for $ty {
            fn domain() -> Domain {
                Domain::$domain
            }

            fn to_value(&self) -> Value {
                Value::$variant((*self).into())
            }

            fn from_value(value: Value, _store: &Store) -> Result<Self> {
                match value {
                    Value::$variant(n) => {
                        <$ty>::try_from(n).map_err(|_| out_of_range(stringify!($ty), n))
                    }
                    other => Err(mismatch(stringify!($ty), &other)),
                }
            }
        }
    )*};
}

storable_int!(Int: i8 => I8, i16 => I16, i32 => I32, i64 => I64);
storable_int!(UInt: u8 => U8, u16 => U16, u32 => U32, u64 => U64);

macro_rules! storable_simple {
    ($($ty:ty => $domain:ident / $variant:ident),*) => {$(
        impl Storable for $ty {
            fn domain() -> Domain {
                Domain::$domain
            }

            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }

            fn from_value(value: Value, _store: &Store) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(mismatch(stringify!($ty), &other)),
                }
            }
        }
    )*};
}

storable_simple!(
    bool => Bool / Bool,
    f32 => F32 / F32,
    f64 => F64 / F64,
    char => Char / Char,
    String => Text / Text,
    DateTime<Utc> => Timestamp / Timestamp,
    Uuid => Uuid / Uuid
);

impl Storable for Vec<u8> {
    fn domain() -> Domain {
        Domain::Blob
    }

    fn to_value(&self) -> Value {
        Value::Blob(Bytes::copy_from_slice(self))
    }

    fn from_value(value: Value, _store: &Store) -> Result<Self> {
        match value {
            Value::Blob(b) => Ok(b.to_vec()),
            other => Err(mismatch("Vec<u8>", &other)),
        }
    }
}

macro_rules! non_nullable {
    ($($ty:ty),*) => {$(
        impl FieldValue for $ty {
            type Element = Self;

            const NULLABLE: bool = false;

            fn from_stored(stored: Option<Self>) -> Self {
                stored.unwrap_or_default()
            }

            fn into_stored(self) -> Option<Self> {
                Some(self)
            }
        }
    )*};
}

non_nullable!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, char, Uuid, DateTime<Utc>);

macro_rules! id_value {
    ($($ty:ty => $domain:ident),*) => {$(
        impl IdValue for $ty {
            const ID_DOMAIN: IdDomain = IdDomain::$domain;
        }
    )*};
}

id_value!(i32 => I32, i64 => I64, u32 => U32, u64 => U64, String => Text, Vec<u8> => Blob, Uuid => Uuid);

impl AllocatableId for i32 {
    const MAX: i64 = i32::MAX as i64;

    fn from_allocated(counter: i64) -> Option<Self> {
        i32::try_from(counter).ok()
    }
}

impl AllocatableId for i64 {
    const MAX: i64 = i64::MAX;

    fn from_allocated(counter: i64) -> Option<Self> {
        Some(counter)
    }
}

impl AllocatableId for u32 {
    const MAX: i64 = u32::MAX as i64;

    fn from_allocated(counter: i64) -> Option<Self> {
        u32::try_from(counter).ok()
    }
}

impl AllocatableId for u64 {
    const MAX: i64 = i64::MAX;

    fn from_allocated(counter: i64) -> Option<Self> {
        u64::try_from(counter).ok()
    }
}

// ---- Codec bridging ----

pub(crate) fn encode_element<T: Storable>(codec: &dyn DomainCodec, element: &T) -> Result<Bytes> {
    Ok(codec.encode(&element.to_value())?)
}

pub(crate) fn decode_element<T: Storable>(
    store: &Store,
    codec: &dyn DomainCodec,
    key: &Key,
    bytes: &[u8],
) -> Result<T> {
    let value = codec.decode(bytes).map_err(|source| Error::Decode {
        key: key.to_string(),
        source,
    })?;
    T::from_value(value, store)
}

/// Decode an optional stored payload into a field value.
pub(crate) fn decode_stored<V: FieldValue>(
    store: &Store,
    codec: &dyn DomainCodec,
    key: &Key,
    raw: Option<Bytes>,
) -> Result<V> {
    let element = raw
        .map(|bytes| decode_element::<V::Element>(store, codec, key, &bytes))
        .transpose()?;
    Ok(V::from_stored(element))
}
