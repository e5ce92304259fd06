use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Separator between key segments: `<ShapeAlias>:<Id>:<PropertyAlias>`.
pub const KEY_SEPARATOR: u8 = b':';

/// A binary-safe key in the backing store.
///
/// Keys are plain byte strings. Entity ids may be arbitrary bytes, so a key is
/// not guaranteed to be valid UTF-8; [`fmt::Display`] falls back to hex for
/// such keys.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key(Bytes);

impl Key {
    /// Create a key from raw bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Derive `<self>:<segment>`.
    pub fn child(&self, segment: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(self.0.len() + 1 + segment.len());
        buf.put_slice(&self.0);
        buf.put_u8(KEY_SEPARATOR);
        buf.put_slice(segment);
        Self(buf.freeze())
    }

    /// Derive `<self><suffix>` with no separator.
    pub fn suffixed(&self, suffix: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(self.0.len() + suffix.len());
        buf.put_slice(&self.0);
        buf.put_slice(suffix);
        Self(buf.freeze())
    }

    /// The prefix shared by every key derived from this one with [`Key::child`].
    pub fn child_prefix(&self) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(self.0.len() + 1);
        prefix.extend_from_slice(&self.0);
        prefix.push(KEY_SEPARATOR);
        prefix
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_bytes(&self) -> Bytes {
        self.0.clone()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({self})")
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

impl From<&[u8]> for Key {
    fn from(b: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(b))
    }
}

impl From<Vec<u8>> for Key {
    fn from(b: Vec<u8>) -> Self {
        Self(Bytes::from(b))
    }
}

impl From<Bytes> for Key {
    fn from(b: Bytes) -> Self {
        Self(b)
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_inserts_separator() {
        let key = Key::from("Question").child(b"42").child(b"Title");
        assert_eq!(key.as_bytes(), b"Question:42:Title");
    }

    #[test]
    fn suffixed_has_no_separator() {
        let key = Key::from("Question").suffixed(b"#seq");
        assert_eq!(key.to_string(), "Question#seq");
    }

    #[test]
    fn child_prefix_matches_children() {
        let parent = Key::from("q:1");
        let child = parent.child(b"t");
        assert!(child.starts_with(&parent.child_prefix()));
        assert!(!Key::from("q:10").starts_with(&parent.child_prefix()));
    }

    #[test]
    fn display_falls_back_to_hex() {
        let key = Key::from(vec![0xff, 0x00, 0x01]);
        assert_eq!(key.to_string(), "0xff0001");
        assert_eq!(Key::from("plain").to_string(), "plain");
    }

    #[test]
    fn binary_segments_are_preserved() {
        let key = Key::from("Blob").child(&[1, 2, 3, 4]);
        assert_eq!(key.as_bytes(), &[b'B', b'l', b'o', b'b', b':', 1, 2, 3, 4]);
        assert_eq!(key.len(), 9);
    }

    #[test]
    fn serde_roundtrip() {
        let key = Key::from("a:b");
        let json = serde_json::to_string(&key).unwrap();
        let parsed: Key = serde_json::from_str(&json).unwrap();
        assert_eq!(key, parsed);
    }
}
