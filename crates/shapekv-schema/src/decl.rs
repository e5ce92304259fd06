//! Declarations of a shape's properties, before classification.

use shapekv_types::Domain;

use crate::descriptor::{CollectionKind, ShapeDescriptor};
use crate::error::RegistrationResult;
use crate::registry::classify;

/// How a property was declared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclKind {
    Id,
    Scalar,
    /// A scalar accessed only through non-blocking operations.
    AsyncScalar,
    /// A member of a compact group; `None` selects the default group.
    Compact { group: Option<String> },
    Reference,
    /// A collection. `key_domain` is the field domain of a hash.
    Collection {
        kind: CollectionKind,
        key_domain: Option<Domain>,
    },
}

/// One declared property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyDecl {
    pub name: String,
    pub alias: Option<String>,
    /// Value domain; the element domain for collections.
    pub domain: Domain,
    pub nullable: bool,
    pub kind: DeclKind,
}

impl PropertyDecl {
    fn new(name: impl Into<String>, domain: Domain, nullable: bool, kind: DeclKind) -> Self {
        Self {
            name: name.into(),
            alias: None,
            domain,
            nullable,
            kind,
        }
    }

    pub fn id(name: impl Into<String>, domain: Domain) -> Self {
        Self::new(name, domain, false, DeclKind::Id)
    }

    pub fn scalar(name: impl Into<String>, domain: Domain, nullable: bool) -> Self {
        Self::new(name, domain, nullable, DeclKind::Scalar)
    }

    pub fn async_scalar(name: impl Into<String>, domain: Domain, nullable: bool) -> Self {
        Self::new(name, domain, nullable, DeclKind::AsyncScalar)
    }

    pub fn compact(
        name: impl Into<String>,
        domain: Domain,
        nullable: bool,
        group: Option<&str>,
    ) -> Self {
        let group = group.map(str::to_owned);
        Self::new(name, domain, nullable, DeclKind::Compact { group })
    }

    /// References are always nullable.
    pub fn reference(name: impl Into<String>, domain: Domain) -> Self {
        Self::new(name, domain, true, DeclKind::Reference)
    }

    pub fn collection(
        name: impl Into<String>,
        kind: CollectionKind,
        element: Domain,
        key_domain: Option<Domain>,
    ) -> Self {
        Self::new(
            name,
            element,
            false,
            DeclKind::Collection { kind, key_domain },
        )
    }

    /// Override the physical name.
    pub fn with_alias(mut self, alias: Option<&str>) -> Self {
        self.alias = alias.map(str::to_owned);
        self
    }
}

/// Collects a shape's declarations for classification.
#[derive(Clone, Debug)]
pub struct ShapeBuilder {
    pub(crate) name: String,
    pub(crate) alias: Option<String>,
    pub(crate) properties: Vec<PropertyDecl>,
}

impl ShapeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            properties: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn set_alias(&mut self, alias: Option<&str>) -> &mut Self {
        self.alias = alias.map(str::to_owned);
        self
    }

    pub fn property(&mut self, decl: PropertyDecl) -> &mut Self {
        self.properties.push(decl);
        self
    }

    pub fn with(mut self, decl: PropertyDecl) -> Self {
        self.properties.push(decl);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Classify every declaration and freeze the result.
    pub fn build(self) -> RegistrationResult<ShapeDescriptor> {
        classify(self)
    }
}
