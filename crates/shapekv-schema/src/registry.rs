//! Classification of declarations into storage strategies, and the
//! process-wide cache of classified shapes.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use shapekv_codec::{CodecRegistry, CompactEncoder, DomainCodec};
use shapekv_types::{Domain, IdDomain};
use tracing::info;

use crate::decl::{DeclKind, PropertyDecl, ShapeBuilder};
use crate::descriptor::{
    CollectionKind, CompactGroup, CompactSlot, PropertySpec, ShapeDescriptor, Strategy,
    DEFAULT_GROUP,
};
use crate::error::{RegistrationError, RegistrationResult};

const ASYNC_SUFFIX: &str = "Async";

fn validate_alias(alias: &str, is_shape: bool) -> RegistrationResult<()> {
    let reason = if alias.is_empty() {
        Some("alias is empty")
    } else if alias.contains(':') {
        Some("alias contains the key separator ':'")
    } else if is_shape && alias.contains('#') {
        Some("shape alias contains '#'")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(RegistrationError::InvalidAlias {
            alias: alias.to_owned(),
            reason: reason.to_owned(),
        }),
        None => Ok(()),
    }
}

/// Physical name when none is declared. Async scalars drop a trailing
/// `Async` so they share storage with the plain scalar of the same name.
fn default_alias(decl: &PropertyDecl) -> String {
    if decl.kind == DeclKind::AsyncScalar {
        if let Some(stem) = decl.name.strip_suffix(ASYNC_SUFFIX) {
            if !stem.is_empty() {
                return stem.to_owned();
            }
        }
    }
    decl.name.clone()
}

struct Classifier {
    shape: String,
    /// Physical names claimed so far. `Some(domain)` marks a plain value
    /// field that a scalar of the same domain may share.
    physical: HashMap<String, Option<Domain>>,
}

impl Classifier {
    fn resolve(&self, property: &str, domain: Domain) -> RegistrationResult<&'static dyn DomainCodec> {
        CodecRegistry::resolve(domain).map_err(|_| RegistrationError::UnsupportedDomain {
            shape: self.shape.clone(),
            property: property.to_owned(),
            domain: domain.to_string(),
        })
    }

    fn invalid(&self, property: &str, reason: &str) -> RegistrationError {
        RegistrationError::InvalidDeclaration {
            shape: self.shape.clone(),
            property: property.to_owned(),
            reason: reason.to_owned(),
        }
    }

    fn claim(&mut self, alias: &str, shareable: Option<Domain>) -> RegistrationResult<()> {
        match self.physical.get(alias) {
            None => {
                self.physical.insert(alias.to_owned(), shareable);
                Ok(())
            }
            Some(existing) if existing.is_some() && *existing == shareable => Ok(()),
            Some(_) => Err(RegistrationError::AliasCollision {
                shape: self.shape.clone(),
                alias: alias.to_owned(),
            }),
        }
    }
}

/// Classify every declaration of a shape.
pub(crate) fn classify(builder: ShapeBuilder) -> RegistrationResult<ShapeDescriptor> {
    let ShapeBuilder {
        name,
        alias,
        properties: decls,
    } = builder;
    let shape_alias = alias.unwrap_or_else(|| name.clone());
    validate_alias(&shape_alias, true)?;

    let mut classifier = Classifier {
        shape: name.clone(),
        physical: HashMap::new(),
    };
    let mut properties: Vec<PropertySpec> = Vec::with_capacity(decls.len());
    let mut by_name = HashMap::new();
    let mut id = None;
    let mut group_tags: Vec<String> = Vec::new();
    let mut group_members: Vec<Vec<usize>> = Vec::new();

    for decl in decls {
        let index = properties.len();
        if by_name.insert(decl.name.clone(), index).is_some() {
            return Err(RegistrationError::DuplicateProperty {
                shape: name,
                property: decl.name,
            });
        }

        let codec = classifier.resolve(&decl.name, decl.domain)?;
        let alias = decl.alias.clone().unwrap_or_else(|| default_alias(&decl));
        let mut key_codec = None;
        let mut slot = None;

        let strategy = match &decl.kind {
            DeclKind::Id => {
                if id.is_some() {
                    return Err(RegistrationError::DuplicateId {
                        shape: name,
                        property: decl.name,
                    });
                }
                if decl.nullable || IdDomain::from_domain(decl.domain).is_none() {
                    return Err(RegistrationError::InvalidIdDomain {
                        shape: name,
                        domain: decl.domain.to_string(),
                    });
                }
                id = Some(index);
                Strategy::Id
            }
            DeclKind::Scalar if decl.nullable => Strategy::NullableScalar,
            DeclKind::Scalar => Strategy::Scalar,
            DeclKind::AsyncScalar => Strategy::AsyncScalar,
            DeclKind::Compact { group } => {
                if decl.domain.is_reference() || codec.fixed_bits().is_none() {
                    return Err(RegistrationError::NotFixedWidth {
                        shape: name,
                        property: decl.name,
                        domain: decl.domain.to_string(),
                    });
                }
                let tag = group.as_deref().unwrap_or(DEFAULT_GROUP);
                let group = match group_tags.iter().position(|t| t == tag) {
                    Some(g) => g,
                    None => {
                        validate_alias(tag, false)?;
                        group_tags.push(tag.to_owned());
                        group_members.push(Vec::new());
                        group_tags.len() - 1
                    }
                };
                slot = Some(CompactSlot {
                    group,
                    member: group_members[group].len(),
                });
                group_members[group].push(index);
                Strategy::CompactMember
            }
            DeclKind::Reference => {
                if !decl.domain.is_reference() {
                    return Err(classifier.invalid(&decl.name, "reference property needs a reference domain"));
                }
                Strategy::Reference
            }
            DeclKind::Collection { kind, key_domain } => {
                match (kind, key_domain) {
                    (CollectionKind::Hash, Some(key_domain)) => {
                        key_codec = Some(classifier.resolve(&decl.name, *key_domain)?);
                    }
                    (CollectionKind::Hash, None) => {
                        return Err(classifier.invalid(&decl.name, "hash property needs a key domain"));
                    }
                    (CollectionKind::Array { page_size: 0 }, _) => {
                        return Err(classifier.invalid(&decl.name, "array page size must be positive"));
                    }
                    _ => {}
                }
                Strategy::Collection(*kind)
            }
        };

        match strategy {
            Strategy::Id | Strategy::CompactMember => {}
            Strategy::Scalar | Strategy::NullableScalar | Strategy::AsyncScalar => {
                validate_alias(&alias, false)?;
                classifier.claim(&alias, Some(decl.domain))?;
            }
            Strategy::Reference | Strategy::Collection(_) => {
                validate_alias(&alias, false)?;
                classifier.claim(&alias, None)?;
            }
        }

        properties.push(PropertySpec {
            name: decl.name,
            alias,
            domain: decl.domain,
            nullable: decl.nullable,
            strategy,
            codec,
            key_codec,
            slot,
        });
    }

    let id = id.ok_or_else(|| RegistrationError::MissingId {
        shape: name.clone(),
    })?;

    let mut groups = Vec::with_capacity(group_tags.len());
    for (tag, members) in group_tags.into_iter().zip(group_members) {
        classifier.claim(&tag, None)?;
        let layout: Vec<(&'static dyn DomainCodec, bool)> = members
            .iter()
            .map(|&i| (properties[i].codec, properties[i].nullable))
            .collect();
        let encoder = CompactEncoder::new(&layout)
            .map_err(|e| classifier.invalid(&tag, &e.to_string()))?;
        groups.push(CompactGroup {
            alias: tag,
            members,
            encoder,
        });
    }

    Ok(ShapeDescriptor {
        name,
        alias: shape_alias,
        id,
        properties,
        by_name,
        groups,
    })
}

#[derive(Default)]
struct Inner {
    by_type: HashMap<TypeId, Arc<ShapeDescriptor>>,
    by_alias: HashMap<String, TypeId>,
}

fn poisoned<T>(e: PoisonError<T>) -> RegistrationError {
    RegistrationError::Internal(format!("lock poisoned: {e}"))
}

/// Cache of classified shapes, keyed by the shape's Rust type.
///
/// Each shape is classified once, on first use. Two different types may not
/// claim the same shape alias, since their keys would collide.
#[derive(Default)]
pub struct TypeRegistry {
    inner: RwLock<Inner>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, shape: TypeId) -> RegistrationResult<Option<Arc<ShapeDescriptor>>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.by_type.get(&shape).cloned())
    }

    /// Return the descriptor for `shape`, classifying `declare()` on first use.
    pub fn register(
        &self,
        shape: TypeId,
        declare: impl FnOnce() -> ShapeBuilder,
    ) -> RegistrationResult<Arc<ShapeDescriptor>> {
        if let Some(descriptor) = self.get(shape)? {
            return Ok(descriptor);
        }

        let descriptor = declare().build()?;

        let mut inner = self.inner.write().map_err(poisoned)?;
        if let Some(existing) = inner.by_type.get(&shape) {
            return Ok(Arc::clone(existing));
        }
        if let Some(owner) = inner.by_alias.get(descriptor.alias()) {
            let existing = inner
                .by_type
                .get(owner)
                .map(|d| d.name().to_owned())
                .unwrap_or_default();
            return Err(RegistrationError::ShapeAliasTaken {
                alias: descriptor.alias().to_owned(),
                existing,
            });
        }

        let descriptor = Arc::new(descriptor);
        inner.by_alias.insert(descriptor.alias().to_owned(), shape);
        inner.by_type.insert(shape, Arc::clone(&descriptor));
        info!(
            shape = descriptor.name(),
            alias = descriptor.alias(),
            properties = descriptor.properties().len(),
            groups = descriptor.groups().len(),
            "shape registered"
        );
        Ok(descriptor)
    }

    /// Number of registered shapes.
    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.by_type.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("shapes", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn question() -> ShapeBuilder {
        ShapeBuilder::new("Question")
            .with(PropertyDecl::id("Id", Domain::I32))
            .with(PropertyDecl::scalar("Title", Domain::Text, true))
            .with(PropertyDecl::scalar("Score", Domain::I32, false))
            .with(PropertyDecl::async_scalar("ScoreAsync", Domain::I32, false))
            .with(PropertyDecl::compact("IsClosed", Domain::Bool, false, None))
            .with(PropertyDecl::compact("Views", Domain::U16, true, None))
            .with(PropertyDecl::reference(
                "Author",
                Domain::Reference {
                    shape: "User",
                    id: IdDomain::I64,
                },
            ))
            .with(PropertyDecl::collection("Tags", CollectionKind::Set, Domain::Text, None))
    }

    // ---- Classification ----

    #[test]
    fn strategies_follow_declarations() {
        let d = question().build().unwrap();
        let strategy = |n: &str| d.property(n).unwrap().strategy();
        assert_eq!(strategy("Id"), Strategy::Id);
        assert_eq!(strategy("Title"), Strategy::NullableScalar);
        assert_eq!(strategy("Score"), Strategy::Scalar);
        assert_eq!(strategy("ScoreAsync"), Strategy::AsyncScalar);
        assert_eq!(strategy("IsClosed"), Strategy::CompactMember);
        assert_eq!(strategy("Author"), Strategy::Reference);
        assert_eq!(strategy("Tags"), Strategy::Collection(CollectionKind::Set));
        assert_eq!(d.id().name(), "Id");
        assert_eq!(d.properties().len(), 8);
    }

    #[test]
    fn aliases_default_to_names() {
        let d = question().build().unwrap();
        assert_eq!(d.alias(), "Question");
        assert_eq!(d.property("Title").unwrap().alias(), "Title");
    }

    #[test]
    fn async_alias_drops_suffix() {
        let d = question().build().unwrap();
        assert_eq!(d.property("ScoreAsync").unwrap().alias(), "Score");

        let d = ShapeBuilder::new("S")
            .with(PropertyDecl::id("Id", Domain::I32))
            .with(PropertyDecl::async_scalar("Async", Domain::I32, false))
            .build()
            .unwrap();
        assert_eq!(d.property("Async").unwrap().alias(), "Async");
    }

    #[test]
    fn explicit_aliases_apply() {
        let d = ShapeBuilder::new("QuestionWithLongName")
            .alias("q")
            .with(PropertyDecl::id("Id", Domain::I32))
            .with(PropertyDecl::scalar("Title", Domain::Text, true).with_alias(Some("t")))
            .build()
            .unwrap();
        assert_eq!(d.alias(), "q");
        assert_eq!(d.property("Title").unwrap().alias(), "t");
        assert_eq!(d.keys().primary(b"7").as_bytes(), b"q:7");
    }

    #[test]
    fn reference_codec_is_target_id_codec() {
        let d = question().build().unwrap();
        assert_eq!(d.property("Author").unwrap().codec().name(), "i64");
        assert!(d.property("Author").unwrap().is_nullable());
    }

    // ---- Compact groups ----

    #[test]
    fn compact_members_share_default_group() {
        let d = question().build().unwrap();
        assert_eq!(d.groups().len(), 1);
        let group = &d.groups()[0];
        assert_eq!(group.alias(), DEFAULT_GROUP);
        assert_eq!(group.members().len(), 2);
        assert_eq!(
            d.property("Views").unwrap().compact_slot(),
            Some(CompactSlot { group: 0, member: 1 })
        );
        // bitmap byte + 1 + 16 bits
        assert_eq!(group.encoder().byte_len(), 4);
    }

    #[test]
    fn explicit_tags_form_separate_groups() {
        let d = ShapeBuilder::new("Flags")
            .with(PropertyDecl::id("Id", Domain::U64))
            .with(PropertyDecl::compact("A", Domain::Bool, false, Some("x")))
            .with(PropertyDecl::compact("B", Domain::Bool, false, Some("y")))
            .with(PropertyDecl::compact("C", Domain::F64, false, Some("x")))
            .build()
            .unwrap();
        let aliases: Vec<&str> = d.groups().iter().map(|g| g.alias()).collect();
        assert_eq!(aliases, vec!["x", "y"]);
        assert_eq!(d.groups()[0].members(), &[1, 3]);
    }

    #[test]
    fn variable_width_cannot_be_compact() {
        for domain in [Domain::Text, Domain::Blob] {
            let err = ShapeBuilder::new("Bad")
                .with(PropertyDecl::id("Id", Domain::I32))
                .with(PropertyDecl::compact("Name", domain, true, None))
                .build()
                .unwrap_err();
            assert!(matches!(err, RegistrationError::NotFixedWidth { .. }));
        }
    }

    #[test]
    fn references_cannot_be_compact() {
        let err = ShapeBuilder::new("Bad")
            .with(PropertyDecl::id("Id", Domain::I32))
            .with(PropertyDecl::compact(
                "Other",
                Domain::Reference {
                    shape: "Bad",
                    id: IdDomain::I32,
                },
                true,
                None,
            ))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::NotFixedWidth { .. }));
    }

    // ---- Failures ----

    #[test]
    fn id_is_mandatory_and_unique() {
        let err = ShapeBuilder::new("NoId")
            .with(PropertyDecl::scalar("X", Domain::I32, false))
            .build()
            .unwrap_err();
        assert_eq!(err, RegistrationError::MissingId { shape: "NoId".into() });

        let err = ShapeBuilder::new("TwoIds")
            .with(PropertyDecl::id("Id", Domain::I32))
            .with(PropertyDecl::id("Other", Domain::I32))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateId { .. }));
    }

    #[test]
    fn id_domain_must_be_identifying() {
        let err = ShapeBuilder::new("FloatId")
            .with(PropertyDecl::id("Id", Domain::F64))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidIdDomain { .. }));
    }

    #[test]
    fn unsupported_enum_width() {
        let err = ShapeBuilder::new("E")
            .with(PropertyDecl::id("Id", Domain::I32))
            .with(PropertyDecl::scalar("Mode", Domain::Enum { name: "Mode", bits: 3 }, false))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::UnsupportedDomain { .. }));
    }

    #[test]
    fn alias_collisions_are_rejected() {
        let err = ShapeBuilder::new("C")
            .with(PropertyDecl::id("Id", Domain::I32))
            .with(PropertyDecl::scalar("A", Domain::I32, false).with_alias(Some("x")))
            .with(PropertyDecl::collection("B", CollectionKind::List, Domain::I32, None).with_alias(Some("x")))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::AliasCollision { .. }));

        let err = ShapeBuilder::new("C")
            .with(PropertyDecl::id("Id", Domain::I32))
            .with(PropertyDecl::scalar("compact", Domain::I32, false))
            .with(PropertyDecl::compact("Flag", Domain::Bool, false, None))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::AliasCollision { .. }));
    }

    #[test]
    fn async_and_scalar_must_agree_on_domain() {
        let err = ShapeBuilder::new("C")
            .with(PropertyDecl::id("Id", Domain::I32))
            .with(PropertyDecl::scalar("Score", Domain::I32, false))
            .with(PropertyDecl::async_scalar("ScoreAsync", Domain::Text, true))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::AliasCollision { .. }));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = ShapeBuilder::new("C")
            .with(PropertyDecl::id("Id", Domain::I32))
            .with(PropertyDecl::scalar("A", Domain::I32, false))
            .with(PropertyDecl::scalar("A", Domain::I64, false))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateProperty { .. }));
    }

    #[test]
    fn invalid_aliases() {
        let err = ShapeBuilder::new("a:b")
            .with(PropertyDecl::id("Id", Domain::I32))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidAlias { .. }));

        let err = ShapeBuilder::new("S")
            .with(PropertyDecl::id("Id", Domain::I32))
            .with(PropertyDecl::scalar("A", Domain::I32, false).with_alias(Some("")))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidAlias { .. }));
    }

    #[test]
    fn hash_needs_key_domain_and_arrays_need_pages() {
        let err = ShapeBuilder::new("S")
            .with(PropertyDecl::id("Id", Domain::I32))
            .with(PropertyDecl::collection("H", CollectionKind::Hash, Domain::I32, None))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidDeclaration { .. }));

        let err = ShapeBuilder::new("S")
            .with(PropertyDecl::id("Id", Domain::I32))
            .with(PropertyDecl::collection(
                "A",
                CollectionKind::Array { page_size: 0 },
                Domain::I32,
                None,
            ))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidDeclaration { .. }));
    }

    // ---- Registry ----

    struct QuestionShape;
    struct OtherShape;

    #[test]
    fn registry_classifies_once() {
        let registry = TypeRegistry::new();
        let calls = Cell::new(0);
        let declare = || {
            calls.set(calls.get() + 1);
            question()
        };
        let a = registry.register(TypeId::of::<QuestionShape>(), declare).unwrap();
        let b = registry
            .register(TypeId::of::<QuestionShape>(), || {
                calls.set(calls.get() + 1);
                question()
            })
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.get(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_rejects_alias_reuse() {
        let registry = TypeRegistry::new();
        registry.register(TypeId::of::<QuestionShape>(), question).unwrap();
        let err = registry
            .register(TypeId::of::<OtherShape>(), question)
            .unwrap_err();
        assert!(matches!(err, RegistrationError::ShapeAliasTaken { .. }));
        assert!(registry.get(TypeId::of::<OtherShape>()).unwrap().is_none());
    }

    #[test]
    fn failed_registration_is_not_cached() {
        let registry = TypeRegistry::new();
        let bad = || ShapeBuilder::new("Bad");
        assert!(registry.register(TypeId::of::<OtherShape>(), bad).is_err());
        assert!(registry.is_empty());
    }
}
