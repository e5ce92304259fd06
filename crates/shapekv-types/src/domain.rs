use std::fmt;

/// The declared value domain of a property, collection element, or hash key.
///
/// A domain fixes both the textual store encoding and, for fixed-width
/// domains, the bit width used inside compact groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Char,
    Text,
    Blob,
    Timestamp,
    Uuid,
    /// A user enumeration stored by its integer discriminant.
    Enum { name: &'static str, bits: u8 },
    /// A reference to another entity, stored as the target's id.
    Reference { shape: &'static str, id: IdDomain },
}

impl Domain {
    /// Short lowercase name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Domain::Bool => "bool",
            Domain::I8 => "i8",
            Domain::I16 => "i16",
            Domain::I32 => "i32",
            Domain::I64 => "i64",
            Domain::U8 => "u8",
            Domain::U16 => "u16",
            Domain::U32 => "u32",
            Domain::U64 => "u64",
            Domain::F32 => "f32",
            Domain::F64 => "f64",
            Domain::Char => "char",
            Domain::Text => "text",
            Domain::Blob => "blob",
            Domain::Timestamp => "timestamp",
            Domain::Uuid => "uuid",
            Domain::Enum { name, .. } => *name,
            Domain::Reference { shape, .. } => *shape,
        }
    }

    /// The domain the value is physically stored as.
    ///
    /// References store their target's id; everything else stores itself.
    pub fn storage(self) -> Domain {
        match self {
            Domain::Reference { id, .. } => id.domain(),
            other => other,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Domain::Reference { .. })
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Enum { name, bits } => write!(f, "enum {name} (repr {bits} bits)"),
            Domain::Reference { shape, id } => write!(f, "reference to {shape} by {}", id.domain().name()),
            other => f.write_str(other.name()),
        }
    }
}

/// Domains permitted for entity ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdDomain {
    I32,
    I64,
    U32,
    U64,
    Text,
    Blob,
    Uuid,
}

impl IdDomain {
    pub fn domain(self) -> Domain {
        match self {
            IdDomain::I32 => Domain::I32,
            IdDomain::I64 => Domain::I64,
            IdDomain::U32 => Domain::U32,
            IdDomain::U64 => Domain::U64,
            IdDomain::Text => Domain::Text,
            IdDomain::Blob => Domain::Blob,
            IdDomain::Uuid => Domain::Uuid,
        }
    }

    /// Look up the id domain corresponding to a value domain, if any.
    pub fn from_domain(domain: Domain) -> Option<IdDomain> {
        match domain {
            Domain::I32 => Some(IdDomain::I32),
            Domain::I64 => Some(IdDomain::I64),
            Domain::U32 => Some(IdDomain::U32),
            Domain::U64 => Some(IdDomain::U64),
            Domain::Text => Some(IdDomain::Text),
            Domain::Blob => Some(IdDomain::Blob),
            Domain::Uuid => Some(IdDomain::Uuid),
            _ => None,
        }
    }

    /// Integer id domains are the only ones the store can allocate.
    pub fn is_integer(self) -> bool {
        matches!(self, IdDomain::I32 | IdDomain::I64 | IdDomain::U32 | IdDomain::U64)
    }
}
