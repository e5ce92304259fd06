//! Deterministic store key derivation.
//!
//! Key layout, shared with every other implementation reading the same data:
//!
//! | key | layout |
//! |---|---|
//! | primary | `<ShapeAlias>:<Id>` |
//! | field | `<ShapeAlias>:<Id>:<PropertyAlias>` |
//! | compact group | `<ShapeAlias>:<Id>:<GroupAlias>` |
//! | id counter | `<ShapeAlias>#seq` |
//! | enumeration index | `<ShapeAlias>#all` |
//! | array page | `<ParentKey>:<PropertyAlias>:<PageId>` |

use shapekv_types::Key;

const COUNTER_SUFFIX: &[u8] = b"#seq";
const INDEX_SUFFIX: &[u8] = b"#all";

/// Key derivation for one shape.
#[derive(Clone, Copy, Debug)]
pub struct KeySpace<'a> {
    shape_alias: &'a str,
}

impl<'a> KeySpace<'a> {
    pub fn new(shape_alias: &'a str) -> Self {
        Self { shape_alias }
    }

    /// `<ShapeAlias>:<Id>`, where `id` is the id codec's encoding.
    pub fn primary(&self, id: &[u8]) -> Key {
        Key::from(self.shape_alias).child(id)
    }

    pub fn counter(&self) -> Key {
        Key::from(self.shape_alias).suffixed(COUNTER_SUFFIX)
    }

    pub fn index(&self) -> Key {
        Key::from(self.shape_alias).suffixed(INDEX_SUFFIX)
    }
}

/// `<primary>:<alias>`, for properties and compact groups alike.
pub fn field_key(primary: &Key, alias: &str) -> Key {
    primary.child(alias.as_bytes())
}

/// `<base>:<page>`. For an array property `base` is its field key; for a
/// naked array it is the key the array was bound to.
pub fn page_key(base: &Key, page: u64) -> Key {
    base.child(page.to_string().as_bytes())
}

/// Whether `key` is a page of the array at `base`: the remainder after
/// `<base>:` must be a decimal page id. Keys of other entities can share the
/// prefix when ids contain the separator.
pub fn is_page_key(base: &Key, key: &[u8]) -> bool {
    let prefix = base.child_prefix();
    key.strip_prefix(prefix.as_slice())
        .is_some_and(|page| !page.is_empty() && page.iter().all(u8::is_ascii_digit))
}

/// Page id and in-page offset of a logical array index.
pub fn page_of(index: u64, page_size: u32) -> (u64, u64) {
    let size = u64::from(page_size);
    (index / size, index % size)
}
