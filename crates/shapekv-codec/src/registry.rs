use shapekv_types::Domain;

use crate::codecs::{
    BlobCodec, BoolCodec, CharCodec, DomainCodec, F32Codec, F64Codec, SignedCodec, TextCodec,
    TimestampCodec, UnsignedCodec, UuidCodec,
};
use crate::error::{CodecError, CodecResult};

static BOOL: BoolCodec = BoolCodec;
static I8: SignedCodec = SignedCodec::new("i8", 8);
static I16: SignedCodec = SignedCodec::new("i16", 16);
static I32: SignedCodec = SignedCodec::new("i32", 32);
static I64: SignedCodec = SignedCodec::new("i64", 64);
static U8: UnsignedCodec = UnsignedCodec::new("u8", 8);
static U16: UnsignedCodec = UnsignedCodec::new("u16", 16);
static U32: UnsignedCodec = UnsignedCodec::new("u32", 32);
static U64: UnsignedCodec = UnsignedCodec::new("u64", 64);
static F32: F32Codec = F32Codec;
static F64: F64Codec = F64Codec;
static CHAR: CharCodec = CharCodec;
static TEXT: TextCodec = TextCodec;
static BLOB: BlobCodec = BlobCodec;
static TIMESTAMP: TimestampCodec = TimestampCodec;
static UUID: UuidCodec = UuidCodec;

/// Maps each declared domain to its codec.
///
/// Codecs are stateless statics, so a resolved codec can be stored in a
/// shape descriptor and used for the life of the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodecRegistry;

impl CodecRegistry {
    /// Resolve the codec for a domain.
    ///
    /// Enums resolve to the signed codec of their representation width and
    /// references to the codec of their target's id domain. An enum whose
    /// representation is not 8, 16, 32, or 64 bits is unsupported.
    pub fn resolve(domain: Domain) -> CodecResult<&'static dyn DomainCodec> {
        let codec: &'static dyn DomainCodec = match domain {
            Domain::Bool => &BOOL,
            Domain::I8 => &I8,
            Domain::I16 => &I16,
            Domain::I32 => &I32,
            Domain::I64 => &I64,
            Domain::U8 => &U8,
            Domain::U16 => &U16,
            Domain::U32 => &U32,
            Domain::U64 => &U64,
            Domain::F32 => &F32,
            Domain::F64 => &F64,
            Domain::Char => &CHAR,
            Domain::Text => &TEXT,
            Domain::Blob => &BLOB,
            Domain::Timestamp => &TIMESTAMP,
            Domain::Uuid => &UUID,
            Domain::Enum { bits, .. } => match bits {
                8 => &I8,
                16 => &I16,
                32 => &I32,
                64 => &I64,
                _ => {
                    return Err(CodecError::Unsupported {
                        domain: domain.to_string(),
                    })
                }
            },
            Domain::Reference { id, .. } => return Self::resolve(id.domain()),
        };
        Ok(codec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapekv_types::{IdDomain, Value};

    #[test]
    fn every_primitive_resolves() {
        for domain in [
            Domain::Bool,
            Domain::I8,
            Domain::I16,
            Domain::I32,
            Domain::I64,
            Domain::U8,
            Domain::U16,
            Domain::U32,
            Domain::U64,
            Domain::F32,
            Domain::F64,
            Domain::Char,
            Domain::Text,
            Domain::Blob,
            Domain::Timestamp,
            Domain::Uuid,
        ] {
            let codec = CodecRegistry::resolve(domain).unwrap();
            assert_eq!(codec.name(), domain.name());
        }
    }

    #[test]
    fn enum_uses_repr_width() {
        let codec = CodecRegistry::resolve(Domain::Enum { name: "Color", bits: 16 }).unwrap();
        assert_eq!(codec.fixed_bits(), Some(16));
        assert_eq!(&codec.encode(&Value::Int(3)).unwrap()[..], b"3");
    }

    #[test]
    fn odd_enum_width_is_unsupported() {
        let err = CodecRegistry::resolve(Domain::Enum { name: "Odd", bits: 12 }).unwrap_err();
        assert!(matches!(err, CodecError::Unsupported { .. }));
    }

    #[test]
    fn reference_uses_id_codec() {
        let codec = CodecRegistry::resolve(Domain::Reference {
            shape: "Question",
            id: IdDomain::Uuid,
        })
        .unwrap();
        assert_eq!(codec.name(), "uuid");
    }
}
