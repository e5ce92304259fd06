//! Classified, immutable shape metadata.

use std::collections::HashMap;
use std::fmt;

use shapekv_codec::{CompactEncoder, DomainCodec};
use shapekv_types::Domain;

use crate::keys::KeySpace;

/// Default tag of a compact member declared without one.
pub const DEFAULT_GROUP: &str = "compact";

/// Default page capacity of an array property.
pub const DEFAULT_PAGE_SIZE: u32 = 1024;

/// The native collection a collection-valued property binds to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Set,
    List,
    Hash,
    SortedSet,
    Cardinality,
    Array { page_size: u32 },
}

impl CollectionKind {
    pub fn name(&self) -> &'static str {
        match self {
            CollectionKind::Set => "set",
            CollectionKind::List => "list",
            CollectionKind::Hash => "hash",
            CollectionKind::SortedSet => "sorted set",
            CollectionKind::Cardinality => "cardinality counter",
            CollectionKind::Array { .. } => "array",
        }
    }

    /// Whether two kinds bind the same way, ignoring array page sizes.
    pub fn same_kind(&self, other: &CollectionKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Storage strategy chosen for a property at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Embedded in the primary key, never stored as a field.
    Id,
    Scalar,
    /// A scalar whose "no value" deletes the field.
    NullableScalar,
    /// Bits inside a compact group's shared field.
    CompactMember,
    /// The target entity's id, stored in a field.
    Reference,
    Collection(CollectionKind),
    /// A scalar reached through non-blocking operations only.
    AsyncScalar,
}

/// Location of a compact member.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompactSlot {
    pub group: usize,
    pub member: usize,
}

/// A classified property.
#[derive(Clone)]
pub struct PropertySpec {
    pub(crate) name: String,
    pub(crate) alias: String,
    pub(crate) domain: Domain,
    pub(crate) nullable: bool,
    pub(crate) strategy: Strategy,
    pub(crate) codec: &'static dyn DomainCodec,
    pub(crate) key_codec: Option<&'static dyn DomainCodec>,
    pub(crate) slot: Option<CompactSlot>,
}

impl PropertySpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical name used in field keys.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Codec for the value, or for each element of a collection.
    pub fn codec(&self) -> &'static dyn DomainCodec {
        self.codec
    }

    /// Codec for hash fields.
    pub fn key_codec(&self) -> Option<&'static dyn DomainCodec> {
        self.key_codec
    }

    pub fn compact_slot(&self) -> Option<CompactSlot> {
        self.slot
    }
}

impl fmt::Debug for PropertySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertySpec")
            .field("name", &self.name)
            .field("alias", &self.alias)
            .field("domain", &self.domain)
            .field("nullable", &self.nullable)
            .field("strategy", &self.strategy)
            .field("slot", &self.slot)
            .finish()
    }
}

/// Compact members sharing one physical field.
#[derive(Clone, Debug)]
pub struct CompactGroup {
    pub(crate) alias: String,
    pub(crate) members: Vec<usize>,
    pub(crate) encoder: CompactEncoder,
}

impl CompactGroup {
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Indices into [`ShapeDescriptor::properties`], in packing order.
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn encoder(&self) -> &CompactEncoder {
        &self.encoder
    }
}

/// Everything known about a registered shape.
#[derive(Clone, Debug)]
pub struct ShapeDescriptor {
    pub(crate) name: String,
    pub(crate) alias: String,
    pub(crate) id: usize,
    pub(crate) properties: Vec<PropertySpec>,
    pub(crate) by_name: HashMap<String, usize>,
    pub(crate) groups: Vec<CompactGroup>,
}

impl ShapeDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn keys(&self) -> KeySpace<'_> {
        KeySpace::new(&self.alias)
    }

    pub fn id(&self) -> &PropertySpec {
        &self.properties[self.id]
    }

    /// Every property in declaration order, the id included.
    pub fn properties(&self) -> &[PropertySpec] {
        &self.properties
    }

    /// Look up a property by logical name.
    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.by_name.get(name).map(|&i| &self.properties[i])
    }

    pub fn groups(&self) -> &[CompactGroup] {
        &self.groups
    }

    pub fn group(&self, index: usize) -> Option<&CompactGroup> {
        self.groups.get(index)
    }
}
