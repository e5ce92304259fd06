//! Sparse arrays spread over fixed-size hash pages.
//!
//! Logical index `i` lives in page `i / P` under field `i % P` (ASCII
//! decimal), where `P` is the page size. A page is a hash at
//! `<base>:<page>`; unwritten slots read as the element's default.

use std::fmt;
use std::marker::PhantomData;

use shapekv_codec::DomainCodec;
use shapekv_schema::{is_page_key, page_key, page_of};
use shapekv_store::When;
use shapekv_types::Key;

use crate::error::Result;
use crate::pending::Pending;
use crate::store::Store;
use crate::value::{decode_stored, encode_element, FieldValue};

pub struct PagedArray<V> {
    store: Store,
    base: Key,
    page_size: u32,
    codec: &'static dyn DomainCodec,
    _element: PhantomData<fn() -> V>,
}

impl<V: FieldValue> PagedArray<V> {
    pub(crate) fn new(store: Store, base: Key, page_size: u32, codec: &'static dyn DomainCodec) -> Self {
        Self {
            store,
            base,
            page_size,
            codec,
            _element: PhantomData,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn base(&self) -> &Key {
        &self.base
    }

    /// Page key and in-page field for a logical index.
    pub fn locate(&self, index: u64) -> (Key, Vec<u8>) {
        let (page, offset) = page_of(index, self.page_size);
        (page_key(&self.base, page), offset.to_string().into_bytes())
    }

    pub fn get(&self, index: u64) -> Result<V> {
        let (page, field) = self.locate(index);
        let raw = self.store.backend().hash_get(&page, &field)?;
        decode_stored(&self.store, self.codec, &page, raw)
    }

    /// Write one slot. A `None` on a nullable array clears the slot.
    pub fn set(&self, index: u64, value: V) -> Result<()> {
        let (page, field) = self.locate(index);
        let backend = self.store.backend();
        match value.into_stored() {
            Some(element) => {
                let raw = encode_element(self.codec, &element)?;
                backend.hash_set(&page, field.into(), raw, When::Always)?;
            }
            None => {
                backend.hash_delete(&page, &field)?;
            }
        }
        Ok(())
    }

    pub fn get_async(&self, index: u64) -> Pending<V> {
        let array = self.clone();
        self.store.spawn("array get", move || array.get(index))
    }

    pub fn set_async(&self, index: u64, value: V) -> Pending<()> {
        let array = self.clone();
        self.store
            .spawn("array set", move || array.set(index, value))
    }

    /// Delete every page. Returns how many pages existed.
    pub fn clear(&self) -> Result<usize> {
        delete_pages(&self.store, &self.base)
    }
}

/// Delete the pages under `base`, skipping keys that merely share its prefix.
pub(crate) fn delete_pages(store: &Store, base: &Key) -> Result<usize> {
    let backend = store.backend();
    let mut deleted = 0;
    for key in backend.scan_prefix(&base.child_prefix())? {
        if is_page_key(base, key.as_bytes()) {
            backend.delete(&key)?;
            deleted += 1;
        }
    }
    Ok(deleted)
}

impl<V> Clone for PagedArray<V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            base: self.base.clone(),
            page_size: self.page_size,
            codec: self.codec,
            _element: PhantomData,
        }
    }
}

impl<V> fmt::Debug for PagedArray<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagedArray")
            .field("base", &self.base)
            .field("page_size", &self.page_size)
            .field("element", &self.codec.name())
            .finish()
    }
}
