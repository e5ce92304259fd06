//! Shape declarations.

use std::marker::PhantomData;

use shapekv_schema::{CollectionKind, PropertyDecl, ShapeBuilder};

use crate::collections::Collection;
use crate::entity::Entity;
use crate::property::{ArrayProp, AsyncProp, CollectionProp, CompactProp, RefProp, ScalarProp};
use crate::value::{FieldValue, IdValue, Storable};

/// A type whose instances persist in the store.
///
/// A shape is a marker type: it owns no data. Its properties are typed tokens,
/// usually associated constants, that are listed once in [`Shape::declare`].
///
/// ```ignore
/// struct Question;
///
/// impl Question {
///     const TITLE: ScalarProp<Self, Option<String>> = ScalarProp::new("Title").alias("t");
///     const VIEWS: CompactProp<Self, u32> = CompactProp::new("Views");
/// }
///
/// impl Shape for Question {
///     type Id = i32;
///     const NAME: &'static str = "Question";
///
///     fn declare(shape: &mut ShapeDecl<Self>) {
///         shape.scalar(Self::TITLE).compact(Self::VIEWS);
///     }
/// }
/// ```
pub trait Shape: Sized + Send + Sync + 'static {
    type Id: IdValue;

    /// Logical name; also the key prefix unless [`Shape::ALIAS`] is set.
    const NAME: &'static str;

    /// Short physical name used in keys.
    const ALIAS: Option<&'static str> = None;

    /// Name of the identifier property.
    const ID_NAME: &'static str = "Id";

    fn declare(shape: &mut ShapeDecl<Self>);
}

/// Collects a shape's property declarations.
pub struct ShapeDecl<S> {
    builder: ShapeBuilder,
    _shape: PhantomData<fn() -> S>,
}

impl<S: Shape> ShapeDecl<S> {
    /// Run `S::declare` and return the unclassified declarations.
    pub(crate) fn collect() -> ShapeBuilder {
        let mut builder = ShapeBuilder::new(S::NAME);
        builder
            .set_alias(S::ALIAS)
            .property(PropertyDecl::id(S::ID_NAME, S::Id::domain()));
        let mut decl = ShapeDecl {
            builder,
            _shape: PhantomData,
        };
        S::declare(&mut decl);
        decl.builder
    }

    fn push(&mut self, decl: PropertyDecl, alias: Option<&str>) -> &mut Self {
        self.builder.property(decl.with_alias(alias));
        self
    }

    pub fn scalar<V: FieldValue>(&mut self, property: ScalarProp<S, V>) -> &mut Self {
        let decl = PropertyDecl::scalar(property.name(), V::Element::domain(), V::NULLABLE);
        self.push(decl, property.physical_alias())
    }

    /// A scalar reached only through non-blocking access. Its default
    /// physical name drops a trailing `Async` from the property name.
    pub fn async_scalar<V: FieldValue>(&mut self, property: AsyncProp<S, V>) -> &mut Self {
        let decl = PropertyDecl::async_scalar(property.name(), V::Element::domain(), V::NULLABLE);
        self.push(decl, property.physical_alias())
    }

    pub fn compact<V: FieldValue>(&mut self, property: CompactProp<S, V>) -> &mut Self {
        let decl = PropertyDecl::compact(
            property.name(),
            V::Element::domain(),
            V::NULLABLE,
            property.group_tag(),
        );
        self.push(decl, property.physical_alias())
    }

    pub fn reference<T: Shape>(&mut self, property: RefProp<S, T>) -> &mut Self {
        let decl = PropertyDecl::reference(property.name(), Entity::<T>::domain());
        self.push(decl, property.physical_alias())
    }

    pub fn collection<C: Collection>(&mut self, property: CollectionProp<S, C>) -> &mut Self {
        let decl = PropertyDecl::collection(
            property.name(),
            C::KIND,
            C::element_domain(),
            C::key_domain(),
        );
        self.push(decl, property.physical_alias())
    }

    pub fn array<V: FieldValue>(&mut self, property: ArrayProp<S, V>) -> &mut Self {
        let kind = CollectionKind::Array {
            page_size: property.page_size_value(),
        };
        let decl = PropertyDecl::collection(property.name(), kind, V::Element::domain(), None);
        self.push(decl, property.physical_alias())
    }
}
