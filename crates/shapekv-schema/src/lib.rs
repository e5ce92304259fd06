//! Shape registration for shapekv.
//!
//! A shape is declared once as a list of [`PropertyDecl`]s. Registration
//! classifies every declaration into a [`Strategy`], resolves its codec,
//! lays out compact groups, and freezes the result as a [`ShapeDescriptor`].
//! Every registration problem surfaces here, before any store I/O.
//!
//! # Modules
//!
//! - [`decl`] -- raw declarations and the [`ShapeBuilder`]
//! - [`descriptor`] -- classified shapes, properties, and compact groups
//! - [`registry`] -- classification and the per-type [`TypeRegistry`] cache
//! - [`keys`] -- deterministic key derivation

pub mod decl;
pub mod descriptor;
pub mod error;
pub mod keys;
pub mod registry;

pub use decl::{DeclKind, PropertyDecl, ShapeBuilder};
pub use descriptor::{
    CollectionKind, CompactGroup, CompactSlot, PropertySpec, ShapeDescriptor, Strategy,
    DEFAULT_GROUP, DEFAULT_PAGE_SIZE,
};
pub use error::{RegistrationError, RegistrationResult};
pub use keys::{field_key, is_page_key, page_key, page_of, KeySpace};
pub use registry::TypeRegistry;
