//! Bit-packed storage of several fixed-width properties in one value.
//!
//! A compact blob is laid out as a presence bitmap (one bit per nullable
//! member, rounded up to whole bytes) followed by every member's bits in
//! declaration order. Bits are numbered least-significant first within each
//! byte, and each member's value is written least-significant bit first.

use std::fmt;

use shapekv_types::{TypeError, Value};

use crate::codecs::DomainCodec;
use crate::error::{CodecError, CodecResult, DecodeError, DecodeResult};

/// Position of one member inside a compact blob.
#[derive(Clone, Copy)]
pub struct MemberLayout {
    codec: &'static dyn DomainCodec,
    bits: u32,
    offset: u32,
    presence_bit: Option<u32>,
}

impl MemberLayout {
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// First bit of the member's value, counted from the start of the blob.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Bit within the presence bitmap, for nullable members.
    pub fn presence_bit(&self) -> Option<u32> {
        self.presence_bit
    }

    pub fn codec(&self) -> &'static dyn DomainCodec {
        self.codec
    }
}

impl fmt::Debug for MemberLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberLayout")
            .field("domain", &self.codec.name())
            .field("bits", &self.bits)
            .field("offset", &self.offset)
            .field("presence_bit", &self.presence_bit)
            .finish()
    }
}

/// Encoder for one compact group.
///
/// Writing a single member is a read-modify-write of the whole blob carried
/// out by the caller: fetch the blob, [`patch`](Self::patch) it, store it
/// back. The store performs no locking, so two writers updating different
/// members of the same group concurrently can lose one of the updates.
#[derive(Clone, Debug)]
pub struct CompactEncoder {
    members: Vec<MemberLayout>,
    bitmap_bytes: usize,
    total_bits: u32,
}

impl CompactEncoder {
    /// Lay out a group from its members' codecs and nullability, in
    /// declaration order. Every codec must be fixed-width.
    pub fn new(members: &[(&'static dyn DomainCodec, bool)]) -> CodecResult<Self> {
        let nullable = members.iter().filter(|(_, nullable)| *nullable).count();
        let bitmap_bytes = nullable.div_ceil(8);
        let mut offset = (bitmap_bytes * 8) as u32;
        let mut next_presence = 0u32;
        let mut layout = Vec::with_capacity(members.len());

        for &(codec, nullable) in members {
            let bits = codec
                .fixed_bits()
                .ok_or(TypeError::NotFixedWidth(codec.name()))?;
            let presence_bit = nullable.then(|| {
                let bit = next_presence;
                next_presence += 1;
                bit
            });
            layout.push(MemberLayout {
                codec,
                bits,
                offset,
                presence_bit,
            });
            offset += bits;
        }

        Ok(Self {
            members: layout,
            bitmap_bytes,
            total_bits: offset,
        })
    }

    pub fn members(&self) -> &[MemberLayout] {
        &self.members
    }

    pub fn bitmap_bytes(&self) -> usize {
        self.bitmap_bytes
    }

    /// Exact size of every blob for this group.
    pub fn byte_len(&self) -> usize {
        (self.total_bits as usize).div_ceil(8)
    }

    /// Read one member.
    ///
    /// `None` means the member has no stored value: the blob is absent or the
    /// member is nullable and its presence bit is clear. Callers substitute
    /// the domain default.
    pub fn read(&self, blob: Option<&[u8]>, index: usize) -> CodecResult<Option<Value>> {
        let member = self.member(index)?;
        let Some(blob) = blob else {
            return Ok(None);
        };
        self.check_len(blob)?;
        Ok(read_member(member, blob)?)
    }

    /// Return a copy of `blob` with one member replaced.
    ///
    /// An absent blob starts as all zeroes. Writing `None` clears a nullable
    /// member's presence bit; for a non-nullable member it stores zero bits.
    pub fn patch(
        &self,
        blob: Option<&[u8]>,
        index: usize,
        value: Option<&Value>,
    ) -> CodecResult<Vec<u8>> {
        let member = *self.member(index)?;
        let mut buf = match blob {
            Some(existing) => {
                self.check_len(existing)?;
                existing.to_vec()
            }
            None => vec![0; self.byte_len()],
        };
        write_member(&member, &mut buf, value)?;
        Ok(buf)
    }

    /// Pack every member at once.
    pub fn pack(&self, values: &[Option<Value>]) -> CodecResult<Vec<u8>> {
        if values.len() != self.members.len() {
            return Err(CodecError::ArityMismatch {
                expected: self.members.len(),
                actual: values.len(),
            });
        }
        let mut buf = vec![0; self.byte_len()];
        for (member, value) in self.members.iter().zip(values) {
            write_member(member, &mut buf, value.as_ref())?;
        }
        Ok(buf)
    }

    /// Unpack every member at once.
    pub fn unpack(&self, blob: &[u8]) -> DecodeResult<Vec<Option<Value>>> {
        self.check_len(blob)?;
        self.members
            .iter()
            .map(|member| read_member(member, blob))
            .collect()
    }

    fn member(&self, index: usize) -> CodecResult<&MemberLayout> {
        self.members.get(index).ok_or(CodecError::MemberOutOfRange {
            index,
            len: self.members.len(),
        })
    }

    fn check_len(&self, blob: &[u8]) -> DecodeResult<()> {
        if blob.len() != self.byte_len() {
            return Err(DecodeError::LayoutMismatch {
                expected: self.byte_len(),
                actual: blob.len(),
            });
        }
        Ok(())
    }
}

fn read_member(member: &MemberLayout, blob: &[u8]) -> DecodeResult<Option<Value>> {
    if let Some(bit) = member.presence_bit {
        if read_bits(blob, bit, 1) == 0 {
            return Ok(None);
        }
    }
    member
        .codec
        .from_bits(read_bits(blob, member.offset, member.bits))
        .map(Some)
}

fn write_member(member: &MemberLayout, buf: &mut [u8], value: Option<&Value>) -> CodecResult<()> {
    let bits = match value {
        Some(v) => member.codec.to_bits(v)?,
        None => 0,
    };
    if let Some(bit) = member.presence_bit {
        write_bits(buf, bit, 1, u128::from(value.is_some()));
    }
    write_bits(buf, member.offset, member.bits, bits);
    Ok(())
}

fn read_bits(buf: &[u8], offset: u32, width: u32) -> u128 {
    let mut out = 0u128;
    for i in 0..width {
        let pos = (offset + i) as usize;
        if (buf[pos / 8] >> (pos % 8)) & 1 == 1 {
            out |= 1 << i;
        }
    }
    out
}

fn write_bits(buf: &mut [u8], offset: u32, width: u32, value: u128) {
    for i in 0..width {
        let pos = (offset + i) as usize;
        let mask = 1u8 << (pos % 8);
        if (value >> i) & 1 == 1 {
            buf[pos / 8] |= mask;
        } else {
            buf[pos / 8] &= !mask;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CodecRegistry;
    use shapekv_types::Domain;

    fn codec(domain: Domain) -> &'static dyn DomainCodec {
        CodecRegistry::resolve(domain).unwrap()
    }

    /// bool, i8, nullable u16, nullable i32
    fn mixed() -> CompactEncoder {
        CompactEncoder::new(&[
            (codec(Domain::Bool), false),
            (codec(Domain::I8), false),
            (codec(Domain::U16), true),
            (codec(Domain::I32), true),
        ])
        .unwrap()
    }

    #[test]
    fn layout_offsets() {
        let enc = mixed();
        assert_eq!(enc.bitmap_bytes(), 1);
        let offsets: Vec<u32> = enc.members().iter().map(|m| m.offset()).collect();
        assert_eq!(offsets, vec![8, 9, 17, 33]);
        assert_eq!(enc.members()[2].presence_bit(), Some(0));
        assert_eq!(enc.members()[3].presence_bit(), Some(1));
        assert_eq!(enc.members()[0].presence_bit(), None);
        // 8 + 1 + 8 + 16 + 32 = 65 bits
        assert_eq!(enc.byte_len(), 9);
    }

    #[test]
    fn no_nullable_members_means_no_bitmap() {
        let enc = CompactEncoder::new(&[(codec(Domain::Bool), false); 3]).unwrap();
        assert_eq!(enc.bitmap_bytes(), 0);
        assert_eq!(enc.byte_len(), 1);
    }

    #[test]
    fn bits_are_lsb_first() {
        let enc = CompactEncoder::new(&[(codec(Domain::Bool), false), (codec(Domain::U8), false)])
            .unwrap();
        let blob = enc
            .pack(&[Some(Value::Bool(true)), Some(Value::UInt(0b1000_0001))])
            .unwrap();
        // bool at bit 0, u8 at bits 1..9
        assert_eq!(blob, vec![0b0000_0011, 0b0000_0001]);
    }

    #[test]
    fn boundary_values_survive() {
        let enc = mixed();
        let values = vec![
            Some(Value::Bool(true)),
            Some(Value::Int(-128)),
            Some(Value::UInt(u16::MAX as u64)),
            Some(Value::Int(i32::MIN as i64)),
        ];
        let blob = enc.pack(&values).unwrap();
        assert_eq!(enc.unpack(&blob).unwrap(), values);

        let values = vec![
            Some(Value::Bool(false)),
            Some(Value::Int(127)),
            None,
            Some(Value::Int(i32::MAX as i64)),
        ];
        let blob = enc.pack(&values).unwrap();
        assert_eq!(enc.unpack(&blob).unwrap(), values);
    }

    #[test]
    fn absent_blob_reads_as_no_value() {
        let enc = mixed();
        for i in 0..4 {
            assert_eq!(enc.read(None, i).unwrap(), None);
        }
    }

    #[test]
    fn patch_leaves_other_members_intact() {
        let enc = mixed();
        let blob = enc.patch(None, 1, Some(&Value::Int(-5))).unwrap();
        let blob = enc.patch(Some(&blob), 3, Some(&Value::Int(77))).unwrap();
        let blob = enc.patch(Some(&blob), 0, Some(&Value::Bool(true))).unwrap();

        assert_eq!(enc.read(Some(&blob), 0).unwrap(), Some(Value::Bool(true)));
        assert_eq!(enc.read(Some(&blob), 1).unwrap(), Some(Value::Int(-5)));
        assert_eq!(enc.read(Some(&blob), 2).unwrap(), None);
        assert_eq!(enc.read(Some(&blob), 3).unwrap(), Some(Value::Int(77)));
    }

    #[test]
    fn writing_none_clears_presence() {
        let enc = mixed();
        let blob = enc.patch(None, 2, Some(&Value::UInt(9))).unwrap();
        assert_eq!(enc.read(Some(&blob), 2).unwrap(), Some(Value::UInt(9)));
        let blob = enc.patch(Some(&blob), 2, None).unwrap();
        assert_eq!(enc.read(Some(&blob), 2).unwrap(), None);
    }

    #[test]
    fn nullable_zero_is_distinct_from_absent() {
        let enc = mixed();
        let blob = enc.patch(None, 3, Some(&Value::Int(0))).unwrap();
        assert_eq!(enc.read(Some(&blob), 3).unwrap(), Some(Value::Int(0)));
        assert_eq!(enc.read(Some(&blob), 2).unwrap(), None);
    }

    #[test]
    fn wrong_length_is_a_decode_error() {
        let enc = mixed();
        let err = enc.read(Some(&[0u8; 3]), 0).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Decode(DecodeError::LayoutMismatch { expected: 9, actual: 3 })
        ));
        assert!(enc.patch(Some(&[0u8; 10]), 0, None).is_err());
    }

    #[test]
    fn variable_width_member_is_rejected() {
        let err = CompactEncoder::new(&[(codec(Domain::Text), true)]).unwrap_err();
        assert!(matches!(err, CodecError::Type(TypeError::NotFixedWidth("text"))));
    }

    #[test]
    fn member_index_is_checked() {
        let enc = mixed();
        assert!(matches!(
            enc.read(None, 4),
            Err(CodecError::MemberOutOfRange { index: 4, len: 4 })
        ));
        assert!(matches!(
            enc.pack(&[None]),
            Err(CodecError::ArityMismatch { expected: 4, actual: 1 })
        ));
    }

    #[test]
    fn wide_members_pack() {
        let enc = CompactEncoder::new(&[
            (codec(Domain::Uuid), true),
            (codec(Domain::Timestamp), false),
            (codec(Domain::Char), false),
        ])
        .unwrap();
        let id = uuid::Uuid::from_u128(u128::MAX - 7);
        let t = chrono::DateTime::<chrono::Utc>::from_timestamp(1_234_567_890, 42).unwrap();
        let values = vec![
            Some(Value::Uuid(id)),
            Some(Value::Timestamp(t)),
            Some(Value::Char('\u{1F600}')),
        ];
        let blob = enc.pack(&values).unwrap();
        assert_eq!(blob.len(), (8 + 128 + 96 + 21usize).div_ceil(8));
        assert_eq!(enc.unpack(&blob).unwrap(), values);
    }
}
