//! Relationship metadata for LinkModel Rust.
//!
//! Relations are declared statically on each [`EntityInfo`]. A relation names
//! its target entity, its cardinality, and the attribute pairs that join the
//! two sides, optionally through a junction entity. Higher layers (relation
//! loading, embedded attributes, membership reconciliation) read this
//! metadata instead of reflecting over live objects.

use crate::entity::{EntityInfo, Record};
use crate::error::{Error, RelationShapeErrorKind, Result};

/// The type of relationship between two entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RelationshipKind {
    /// One-to-one: `User` has one `Profile`.
    OneToOne,
    /// Many-to-one: many `Post`s belong to one `User`.
    #[default]
    ManyToOne,
    /// One-to-many: one `Post` has many `Label`s.
    OneToMany,
    /// Many-to-many: `Post`s have many `Tag`s via a junction entity.
    ManyToMany,
}

impl RelationshipKind {
    /// Whether the relation resolves to a collection.
    pub const fn is_to_many(self) -> bool {
        matches!(self, RelationshipKind::OneToMany | RelationshipKind::ManyToMany)
    }
}

/// Junction entity for many-to-many relationships.
///
/// `link` pairs are `(junction_attribute, owner_attribute)`: the junction
/// rows belonging to an owner are those whose junction attributes equal the
/// owner's attributes.
#[derive(Debug, Clone, Copy)]
pub struct LinkTableInfo {
    /// The junction entity (e.g. `post_tag`).
    pub entity: fn() -> &'static EntityInfo,

    /// `(junction_attribute, owner_attribute)` pairs.
    pub link: &'static [(&'static str, &'static str)],
}

impl LinkTableInfo {
    /// Create a junction definition.
    #[must_use]
    pub const fn new(
        entity: fn() -> &'static EntityInfo,
        link: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self { entity, link }
    }

    /// The junction entity metadata.
    pub fn entity_info(&self) -> &'static EntityInfo {
        (self.entity)()
    }
}

/// Metadata about a relationship between entities.
///
/// `link` pairs are `(target_attribute, local_attribute)`. Without a junction
/// the local side is the owner; with a junction (`via`) the local side is the
/// junction entity.
#[derive(Debug, Clone, Copy)]
pub struct RelationshipInfo {
    /// Name of the relationship, e.g. `"tags"`.
    pub name: &'static str,

    /// The related entity.
    pub target: fn() -> &'static EntityInfo,

    /// Kind of relationship.
    pub kind: RelationshipKind,

    /// `(target_attribute, local_attribute)` pairs.
    pub link: &'static [(&'static str, &'static str)],

    /// Junction entity for many-to-many relationships.
    pub via: Option<LinkTableInfo>,

    /// Default ordering attribute for related items.
    pub order_by: Option<&'static str>,
}

impl RelationshipInfo {
    /// Create a new relationship with required fields.
    #[must_use]
    pub const fn new(
        name: &'static str,
        target: fn() -> &'static EntityInfo,
        kind: RelationshipKind,
    ) -> Self {
        Self {
            name,
            target,
            kind,
            link: &[],
            via: None,
            order_by: None,
        }
    }

    /// Set the `(target_attribute, local_attribute)` join pairs.
    #[must_use]
    pub const fn link(mut self, link: &'static [(&'static str, &'static str)]) -> Self {
        self.link = link;
        self
    }

    /// Route the relation through a junction entity.
    #[must_use]
    pub const fn via(mut self, info: LinkTableInfo) -> Self {
        self.via = Some(info);
        self
    }

    /// Set default ordering for related items.
    #[must_use]
    pub const fn order_by(mut self, attribute: &'static str) -> Self {
        self.order_by = Some(attribute);
        self
    }

    /// The related entity metadata.
    pub fn target_info(&self) -> &'static EntityInfo {
        (self.target)()
    }

    /// Whether this relation resolves to a collection.
    pub const fn is_to_many(&self) -> bool {
        self.kind.is_to_many()
    }

    /// The entity whose rows carry the owner's key: the junction when there
    /// is one, the target otherwise.
    pub fn owner_side_entity(&self) -> &'static EntityInfo {
        match &self.via {
            Some(via) => via.entity_info(),
            None => self.target_info(),
        }
    }

    /// `(attribute, owner_attribute)` pairs on [`Self::owner_side_entity`]
    /// that identify the owner.
    pub fn owner_link(&self) -> &'static [(&'static str, &'static str)] {
        match &self.via {
            Some(via) => via.link,
            None => self.link,
        }
    }
}

impl PartialEq for RelationshipInfo {
    fn eq(&self, other: &Self) -> bool {
        // Function pointers are not compared; the target is identified by name.
        self.name == other.name
            && self.target_info().name == other.target_info().name
            && self.kind == other.kind
            && self.link == other.link
            && self.via.map(|v| v.entity_info().name) == other.via.map(|v| v.entity_info().name)
            && self.order_by == other.order_by
    }
}

/// The resolved value of a relation on one owner instance.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationValue {
    /// A to-one relation; `None` if nothing is related.
    One(Option<Record>),
    /// A to-many relation.
    Many(Vec<Record>),
}

impl RelationValue {
    /// Expect a to-one value; a collection is a shape error.
    pub fn into_single(self, relation: &str) -> Result<Option<Record>> {
        match self {
            RelationValue::One(record) => Ok(record),
            RelationValue::Many(records) => Err(Error::relation_shape(
                RelationShapeErrorKind::ExpectedSingle,
                relation,
                format!(
                    "relation returned a collection of {} entities, a single entity was expected",
                    records.len()
                ),
            )),
        }
    }

    /// Expect a to-many value; a single entity is a shape error.
    pub fn into_collection(self, relation: &str) -> Result<Vec<Record>> {
        match self {
            RelationValue::Many(records) => Ok(records),
            RelationValue::One(_) => Err(Error::relation_shape(
                RelationShapeErrorKind::ExpectedCollection,
                relation,
                "relation does not return a collection",
            )),
        }
    }
}

/// How the membership of a to-many relation is persisted.
#[derive(Debug, Clone, Copy)]
pub enum RelationBinding {
    /// Membership rows live in a junction entity holding
    /// `(owner key, target identifier)`; identifiers are target primary keys.
    Junction {
        /// The junction entity.
        link_entity: &'static EntityInfo,
    },
    /// Membership is carried by rows of the target entity itself, which hold
    /// the owner's key; identifiers are values of `attribute`.
    DirectAttribute {
        /// Identifier attribute on the target entity.
        attribute: &'static str,
    },
}

impl RelationBinding {
    /// Short name of the binding kind, as used in configuration documents.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            RelationBinding::Junction { .. } => "junction",
            RelationBinding::DirectAttribute { .. } => "attribute",
        }
    }
}

/// Format `entity.relation` for diagnostics.
pub fn relation_label(owner: &EntityInfo, relation: &RelationshipInfo) -> String {
    format!("{}.{}", owner.name, relation.name)
}
