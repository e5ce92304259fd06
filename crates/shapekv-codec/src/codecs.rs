//! One codec per value domain.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use shapekv_types::{TypeError, Value};
use uuid::Uuid;

use crate::error::{DecodeError, DecodeResult};

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Converts values of a single domain to and from their stored form.
///
/// Encoding is total for values of the codec's domain; handing a codec a
/// value of another kind is a [`TypeError`]. Decoding is strict and reports
/// out-of-range or malformed input instead of truncating.
pub trait DomainCodec: Send + Sync + fmt::Debug {
    /// Domain name, used in error messages.
    fn name(&self) -> &'static str;

    /// Encode a value into its store representation.
    fn encode(&self, value: &Value) -> Result<Bytes, TypeError>;

    /// Decode a store representation back into a value.
    fn decode(&self, bytes: &[u8]) -> DecodeResult<Value>;

    /// Bit width inside a compact group, or `None` for variable-width domains.
    fn fixed_bits(&self) -> Option<u32> {
        None
    }

    /// The value as an unsigned integer of [`fixed_bits`](Self::fixed_bits) width.
    fn to_bits(&self, value: &Value) -> Result<u128, TypeError> {
        let _ = value;
        Err(TypeError::NotFixedWidth(self.name()))
    }

    /// Inverse of [`to_bits`](Self::to_bits).
    fn from_bits(&self, bits: u128) -> DecodeResult<Value> {
        let _ = bits;
        Err(DecodeError::NotFixedWidth { domain: self.name() })
    }
}

fn mismatch(expected: &'static str, found: &Value) -> TypeError {
    TypeError::DomainMismatch {
        expected,
        found: found.kind(),
    }
}

fn ascii<'a>(domain: &'static str, bytes: &'a [u8]) -> DecodeResult<&'a str> {
    std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { domain })
}

fn parse<T: FromStr>(domain: &'static str, bytes: &[u8]) -> DecodeResult<T> {
    let text = ascii(domain, bytes)?;
    text.parse().map_err(|_| DecodeError::InvalidNumber {
        domain,
        raw: text.to_owned(),
    })
}

fn mask(width: u32) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

// ---- Bool ----

#[derive(Debug)]
pub struct BoolCodec;

impl DomainCodec for BoolCodec {
    fn name(&self) -> &'static str {
        "bool"
    }

    fn encode(&self, value: &Value) -> Result<Bytes, TypeError> {
        match value {
            Value::Bool(true) => Ok(Bytes::from_static(b"1")),
            Value::Bool(false) => Ok(Bytes::from_static(b"0")),
            other => Err(mismatch(self.name(), other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> DecodeResult<Value> {
        match bytes {
            b"1" => Ok(Value::Bool(true)),
            b"0" => Ok(Value::Bool(false)),
            other => Err(DecodeError::InvalidNumber {
                domain: self.name(),
                raw: String::from_utf8_lossy(other).into_owned(),
            }),
        }
    }

    fn fixed_bits(&self) -> Option<u32> {
        Some(1)
    }

    fn to_bits(&self, value: &Value) -> Result<u128, TypeError> {
        match value {
            Value::Bool(b) => Ok(u128::from(*b)),
            other => Err(mismatch(self.name(), other)),
        }
    }

    fn from_bits(&self, bits: u128) -> DecodeResult<Value> {
        Ok(Value::Bool(bits & 1 == 1))
    }
}

// ---- Integers ----

/// Signed integers of 8 to 64 bits. Also carries enum discriminants.
#[derive(Debug)]
pub struct SignedCodec {
    name: &'static str,
    bits: u32,
}

impl SignedCodec {
    pub const fn new(name: &'static str, bits: u32) -> Self {
        Self { name, bits }
    }

    fn min(&self) -> i64 {
        if self.bits >= 64 {
            i64::MIN
        } else {
            -(1i64 << (self.bits - 1))
        }
    }

    fn max(&self) -> i64 {
        if self.bits >= 64 {
            i64::MAX
        } else {
            (1i64 << (self.bits - 1)) - 1
        }
    }

    fn checked(&self, value: &Value) -> Result<i64, TypeError> {
        match value {
            Value::Int(n) if (self.min()..=self.max()).contains(n) => Ok(*n),
            Value::Int(n) => Err(TypeError::OutOfRange {
                domain: self.name,
                value: n.to_string(),
            }),
            other => Err(mismatch(self.name, other)),
        }
    }
}

impl DomainCodec for SignedCodec {
    fn name(&self) -> &'static str {
        self.name
    }

    fn encode(&self, value: &Value) -> Result<Bytes, TypeError> {
        Ok(Bytes::from(self.checked(value)?.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> DecodeResult<Value> {
        let n: i64 = parse(self.name, bytes)?;
        if !(self.min()..=self.max()).contains(&n) {
            return Err(DecodeError::OutOfRange {
                domain: self.name,
                value: n.to_string(),
            });
        }
        Ok(Value::Int(n))
    }

    fn fixed_bits(&self) -> Option<u32> {
        Some(self.bits)
    }

    fn to_bits(&self, value: &Value) -> Result<u128, TypeError> {
        let n = self.checked(value)?;
        Ok(u128::from(n as u64) & mask(self.bits))
    }

    fn from_bits(&self, bits: u128) -> DecodeResult<Value> {
        let shift = 128 - self.bits;
        let n = (((bits & mask(self.bits)) as i128) << shift) >> shift;
        Ok(Value::Int(n as i64))
    }
}

#[derive(Debug)]
pub struct UnsignedCodec {
    name: &'static str,
    bits: u32,
}

impl UnsignedCodec {
    pub const fn new(name: &'static str, bits: u32) -> Self {
        Self { name, bits }
    }

    fn max(&self) -> u64 {
        if self.bits >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }

    fn checked(&self, value: &Value) -> Result<u64, TypeError> {
        match value {
            Value::UInt(n) if *n <= self.max() => Ok(*n),
            Value::UInt(n) => Err(TypeError::OutOfRange {
                domain: self.name,
                value: n.to_string(),
            }),
            other => Err(mismatch(self.name, other)),
        }
    }
}

impl DomainCodec for UnsignedCodec {
    fn name(&self) -> &'static str {
        self.name
    }

    fn encode(&self, value: &Value) -> Result<Bytes, TypeError> {
        Ok(Bytes::from(self.checked(value)?.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> DecodeResult<Value> {
        let n: u64 = parse(self.name, bytes)?;
        if n > self.max() {
            return Err(DecodeError::OutOfRange {
                domain: self.name,
                value: n.to_string(),
            });
        }
        Ok(Value::UInt(n))
    }

    fn fixed_bits(&self) -> Option<u32> {
        Some(self.bits)
    }

    fn to_bits(&self, value: &Value) -> Result<u128, TypeError> {
        Ok(u128::from(self.checked(value)?))
    }

    fn from_bits(&self, bits: u128) -> DecodeResult<Value> {
        Ok(Value::UInt((bits & mask(self.bits)) as u64))
    }
}

// ---- Floats ----

/// Floats are written in the shortest decimal form that parses back to the
/// same bits.
#[derive(Debug)]
pub struct F32Codec;

impl DomainCodec for F32Codec {
    fn name(&self) -> &'static str {
        "f32"
    }

    fn encode(&self, value: &Value) -> Result<Bytes, TypeError> {
        match value {
            Value::F32(v) => Ok(Bytes::from(v.to_string())),
            other => Err(mismatch(self.name(), other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> DecodeResult<Value> {
        parse(self.name(), bytes).map(Value::F32)
    }

    fn fixed_bits(&self) -> Option<u32> {
        Some(32)
    }

    fn to_bits(&self, value: &Value) -> Result<u128, TypeError> {
        match value {
            Value::F32(v) => Ok(u128::from(v.to_bits())),
            other => Err(mismatch(self.name(), other)),
        }
    }

    fn from_bits(&self, bits: u128) -> DecodeResult<Value> {
        Ok(Value::F32(f32::from_bits(bits as u32)))
    }
}

#[derive(Debug)]
pub struct F64Codec;

impl DomainCodec for F64Codec {
    fn name(&self) -> &'static str {
        "f64"
    }

    fn encode(&self, value: &Value) -> Result<Bytes, TypeError> {
        match value {
            Value::F64(v) => Ok(Bytes::from(v.to_string())),
            other => Err(mismatch(self.name(), other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> DecodeResult<Value> {
        parse(self.name(), bytes).map(Value::F64)
    }

    fn fixed_bits(&self) -> Option<u32> {
        Some(64)
    }

    fn to_bits(&self, value: &Value) -> Result<u128, TypeError> {
        match value {
            Value::F64(v) => Ok(u128::from(v.to_bits())),
            other => Err(mismatch(self.name(), other)),
        }
    }

    fn from_bits(&self, bits: u128) -> DecodeResult<Value> {
        Ok(Value::F64(f64::from_bits(bits as u64)))
    }
}

// ---- Char ----

/// A single Unicode scalar value. Stored as its UTF-8 bytes, packed in
/// 21 bits.
#[derive(Debug)]
pub struct CharCodec;

impl DomainCodec for CharCodec {
    fn name(&self) -> &'static str {
        "char"
    }

    fn encode(&self, value: &Value) -> Result<Bytes, TypeError> {
        match value {
            Value::Char(c) => {
                let mut buf = [0u8; 4];
                Ok(Bytes::copy_from_slice(c.encode_utf8(&mut buf).as_bytes()))
            }
            other => Err(mismatch(self.name(), other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> DecodeResult<Value> {
        let text = ascii(self.name(), bytes)?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Value::Char(c)),
            _ => Err(DecodeError::InvalidLength {
                domain: self.name(),
                expected: 1,
                actual: text.chars().count(),
            }),
        }
    }

    fn fixed_bits(&self) -> Option<u32> {
        Some(21)
    }

    fn to_bits(&self, value: &Value) -> Result<u128, TypeError> {
        match value {
            Value::Char(c) => Ok(u128::from(u32::from(*c))),
            other => Err(mismatch(self.name(), other)),
        }
    }

    fn from_bits(&self, bits: u128) -> DecodeResult<Value> {
        let raw = (bits & mask(21)) as u32;
        char::from_u32(raw)
            .map(Value::Char)
            .ok_or_else(|| DecodeError::OutOfRange {
                domain: self.name(),
                value: format!("{raw:#x}"),
            })
    }
}

// ---- Text and blobs ----

#[derive(Debug)]
pub struct TextCodec;

impl DomainCodec for TextCodec {
    fn name(&self) -> &'static str {
        "text"
    }

    fn encode(&self, value: &Value) -> Result<Bytes, TypeError> {
        match value {
            Value::Text(s) => Ok(Bytes::copy_from_slice(s.as_bytes())),
            other => Err(mismatch(self.name(), other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> DecodeResult<Value> {
        ascii(self.name(), bytes).map(|s| Value::Text(s.to_owned()))
    }
}

#[derive(Debug)]
pub struct BlobCodec;

impl DomainCodec for BlobCodec {
    fn name(&self) -> &'static str {
        "blob"
    }

    fn encode(&self, value: &Value) -> Result<Bytes, TypeError> {
        match value {
            Value::Blob(b) => Ok(b.clone()),
            other => Err(mismatch(self.name(), other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> DecodeResult<Value> {
        Ok(Value::Blob(Bytes::copy_from_slice(bytes)))
    }
}

// ---- Timestamps ----

/// UTC instants. Text form is signed nanoseconds since the Unix epoch; the
/// bit form is 64 bits of seconds followed by 32 bits of sub-second nanos.
///
/// Leap-second instants (sub-second nanos of one billion or more) have no
/// text form and are rejected by both forms.
#[derive(Debug)]
pub struct TimestampCodec;

impl TimestampCodec {
    fn instant(&self, value: &Value) -> Result<DateTime<Utc>, TypeError> {
        match value {
            Value::Timestamp(t) if i128::from(t.timestamp_subsec_nanos()) >= NANOS_PER_SEC => {
                Err(TypeError::OutOfRange {
                    domain: self.name(),
                    value: t.to_rfc3339(),
                })
            }
            Value::Timestamp(t) => Ok(*t),
            other => Err(mismatch(self.name(), other)),
        }
    }
}

impl DomainCodec for TimestampCodec {
    fn name(&self) -> &'static str {
        "timestamp"
    }

    fn encode(&self, value: &Value) -> Result<Bytes, TypeError> {
        let t = self.instant(value)?;
        let nanos = i128::from(t.timestamp()) * NANOS_PER_SEC + i128::from(t.timestamp_subsec_nanos());
        Ok(Bytes::from(nanos.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> DecodeResult<Value> {
        let nanos: i128 = parse(self.name(), bytes)?;
        let secs = nanos.div_euclid(NANOS_PER_SEC);
        let sub = nanos.rem_euclid(NANOS_PER_SEC) as u32;
        i64::try_from(secs)
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, sub))
            .map(Value::Timestamp)
            .ok_or_else(|| DecodeError::OutOfRange {
                domain: self.name(),
                value: nanos.to_string(),
            })
    }

    fn fixed_bits(&self) -> Option<u32> {
        Some(96)
    }

    fn to_bits(&self, value: &Value) -> Result<u128, TypeError> {
        let t = self.instant(value)?;
        Ok(u128::from(t.timestamp() as u64) | (u128::from(t.timestamp_subsec_nanos()) << 64))
    }

    fn from_bits(&self, bits: u128) -> DecodeResult<Value> {
        let secs = bits as u64 as i64;
        let sub = (bits >> 64) as u32;
        DateTime::<Utc>::from_timestamp(secs, sub)
            .map(Value::Timestamp)
            .ok_or_else(|| DecodeError::OutOfRange {
                domain: self.name(),
                value: format!("{secs}s+{sub}ns"),
            })
    }
}

// ---- UUIDs ----

#[derive(Debug)]
pub struct UuidCodec;

impl DomainCodec for UuidCodec {
    fn name(&self) -> &'static str {
        "uuid"
    }

    fn encode(&self, value: &Value) -> Result<Bytes, TypeError> {
        match value {
            Value::Uuid(u) => Ok(Bytes::copy_from_slice(u.as_bytes())),
            other => Err(mismatch(self.name(), other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> DecodeResult<Value> {
        Uuid::from_slice(bytes)
            .map(Value::Uuid)
            .map_err(|_| DecodeError::InvalidLength {
                domain: self.name(),
                expected: 16,
                actual: bytes.len(),
            })
    }

    fn fixed_bits(&self) -> Option<u32> {
        Some(128)
    }

    fn to_bits(&self, value: &Value) -> Result<u128, TypeError> {
        match value {
            Value::Uuid(u) => Ok(u.as_u128()),
            other => Err(mismatch(self.name(), other)),
        }
    }

    fn from_bits(&self, bits: u128) -> DecodeResult<Value> {
        Ok(Value::Uuid(Uuid::from_u128(bits)))
    }
}
