//! Flattened attributes of related entities.
//!
//! [`EmbeddedRelations`] is a per-entity-type dispatch table mapping each
//! flattened attribute name to `(relation, target attribute)`. It is built
//! once, validated eagerly, and shared by every [`Embedded`] instance of that
//! entity type.
//!
//! [`Embedded`] wraps an owner entity and resolves flattened names lazily:
//! the first access to any attribute of a relation loads the related entity
//! once and populates every attribute mapped to that relation. Writes are
//! tracked so callers can see which flattened attributes changed.

use linkmodel_core::{
    Entity, EntityInfo, Error, RelationshipInfo, Result, Value, relation_label,
};
use linkmodel_query::RelationAccessor;
use std::collections::HashMap;
use std::sync::Arc;

/// One flattened attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedField {
    /// Flattened name exposed on the owner.
    pub name: &'static str,
    /// Relation the value is stored behind.
    pub relation: &'static str,
    /// Native attribute on the relation's target entity.
    pub attribute: &'static str,
}

/// Dispatch table of flattened attributes for one owner entity type.
#[derive(Debug)]
pub struct EmbeddedRelations {
    owner: &'static EntityInfo,
    relations: Vec<&'static RelationshipInfo>,
    /// Fields in registration order, each with its index into `relations`.
    fields: Vec<(EmbeddedField, usize)>,
    index: HashMap<&'static str, usize>,
}

impl EmbeddedRelations {
    /// Start an empty table for `owner`.
    pub fn new(owner: &'static EntityInfo) -> Self {
        Self {
            owner,
            relations: Vec::new(),
            fields: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a table flattening every attribute of each named relation.
    pub fn configure(owner: &'static EntityInfo, relations: &[&str]) -> Result<Arc<Self>> {
        let mut table = Self::new(owner);
        for relation in relations {
            table = table.embed(relation)?;
        }
        Ok(Arc::new(table))
    }

    /// Flatten every native attribute of `relation`'s target entity, except
    /// those the owner already has under the same name.
    pub fn embed(self, relation: &str) -> Result<Self> {
        let info = self.lookup(relation)?;
        let attributes: Vec<&str> = info
            .target_info()
            .attributes
            .iter()
            .copied()
            .filter(|a| !self.owner.has_attribute(a))
            .collect();
        self.embed_attributes(relation, &attributes)
    }

    /// Flatten the listed attributes of `relation`'s target entity.
    ///
    /// A name already registered by another relation, or native to the
    /// owner, is a configuration error.
    pub fn embed_attributes(mut self, relation: &str, attributes: &[&str]) -> Result<Self> {
        let info = self.lookup(relation)?;
        let target = info.target_info();

        let slot = match self.relations.iter().position(|r| r.name == info.name) {
            Some(slot) => slot,
            None => {
                self.relations.push(info);
                self.relations.len() - 1
            }
        };

        for attribute in attributes {
            let name = target.static_attribute(attribute).ok_or_else(|| {
                Error::config(format!(
                    "relation '{}' target '{}' has no attribute '{attribute}'",
                    relation_label(self.owner, info),
                    target.name
                ))
            })?;

            if self.owner.has_attribute(name) {
                return Err(Error::config(format!(
                    "flattened attribute '{name}' of relation '{}' shadows a native attribute of '{}'",
                    info.name, self.owner.name
                )));
            }

            if let Some(&existing) = self.index.get(name) {
                let (field, _) = self.fields[existing];
                return Err(Error::config(format!(
                    "flattened attribute '{name}' of relation '{}' is already registered by relation '{}'",
                    info.name, field.relation
                )));
            }

            self.index.insert(name, self.fields.len());
            self.fields.push((
                EmbeddedField {
                    name,
                    relation: info.name,
                    attribute: name,
                },
                slot,
            ));
        }

        tracing::debug!(
            owner = self.owner.name,
            relation = info.name,
            fields = self.fields.len(),
            "Registered embedded relation"
        );
        Ok(self)
    }

    fn lookup(&self, relation: &str) -> Result<&'static RelationshipInfo> {
        self.owner.relation(relation).ok_or_else(|| {
            Error::config(format!(
                "entity '{}' has no relation '{relation}'",
                self.owner.name
            ))
        })
    }

    /// The owner entity type.
    pub fn owner(&self) -> &'static EntityInfo {
        self.owner
    }

    /// Look up a flattened attribute.
    pub fn field(&self, name: &str) -> Option<&EmbeddedField> {
        self.index.get(name).map(|&i| &self.fields[i].0)
    }

    /// Every flattened attribute, in registration order.
    pub fn fields(&self) -> impl Iterator<Item = &EmbeddedField> {
        self.fields.iter().map(|(field, _)| field)
    }

    /// Whether `name` is a flattened attribute.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum VirtualValue {
    Unloaded,
    Clean(Value),
    Dirty(Value),
}

impl VirtualValue {
    fn value(&self) -> Value {
        match self {
            VirtualValue::Unloaded => Value::Null,
            VirtualValue::Clean(v) | VirtualValue::Dirty(v) => v.clone(),
        }
    }
}

/// An owner entity with flattened related attributes.
#[derive(Debug)]
pub struct Embedded<E: Entity> {
    owner: E,
    table: Arc<EmbeddedRelations>,
    slots: Vec<VirtualValue>,
    /// Per relation: whether a load has completed.
    resolved: Vec<bool>,
    loads: usize,
}

impl<E: Entity> Embedded<E> {
    /// Wrap `owner`; fails if `table` was built for another entity type.
    pub fn new(owner: E, table: Arc<EmbeddedRelations>) -> Result<Self> {
        if owner.entity_info() != table.owner {
            return Err(Error::config(format!(
                "embedded relations configured for '{}' cannot wrap '{}'",
                table.owner.name,
                owner.entity_info().name
            )));
        }
        let slots = vec![VirtualValue::Unloaded; table.fields.len()];
        let resolved = vec![false; table.relations.len()];
        Ok(Self {
            owner,
            table,
            slots,
            resolved,
            loads: 0,
        })
    }

    /// Read an attribute, flattened or native.
    pub fn get<A>(&mut self, accessor: &A, name: &str) -> Result<Value>
    where
        A: RelationAccessor + ?Sized,
    {
        match self.table.index.get(name).copied() {
            Some(i) => {
                self.load(accessor, self.table.fields[i].1)?;
                Ok(self.slots[i].value())
            }
            None => self
                .owner
                .attribute(name)
                .ok_or_else(|| Error::unknown_attribute(self.owner.entity_info().name, name)),
        }
    }

    /// Write an attribute, flattened or native.
    ///
    /// A flattened attribute becomes dirty on the first write that differs
    /// from its loaded value and stays dirty afterwards.
    pub fn set<A>(&mut self, accessor: &A, name: &str, value: Value) -> Result<()>
    where
        A: RelationAccessor + ?Sized,
    {
        let Some(i) = self.table.index.get(name).copied() else {
            return self.owner.set_attribute(name, value);
        };

        self.load(accessor, self.table.fields[i].1)?;
        let slot = &mut self.slots[i];
        let dirty = matches!(slot, VirtualValue::Dirty(_)) || !slot.value().same_as(&value);
        if dirty && !matches!(slot, VirtualValue::Dirty(_)) {
            tracing::trace!(attribute = name, "Embedded attribute marked dirty");
        }
        *slot = if dirty {
            VirtualValue::Dirty(value)
        } else {
            VirtualValue::Clean(value)
        };
        Ok(())
    }

    /// Flattened attributes written with a changed value, in registration
    /// order.
    pub fn changed_attributes(&self) -> Vec<&'static str> {
        self.table
            .fields
            .iter()
            .zip(&self.slots)
            .filter(|(_, slot)| matches!(slot, VirtualValue::Dirty(_)))
            .map(|((field, _), _)| field.name)
            .collect()
    }

    /// Whether `name` can be read.
    pub fn can_get(&self, name: &str) -> bool {
        self.table.contains(name) || self.owner.entity_info().has_attribute(name)
    }

    /// Whether `name` can be written.
    pub fn can_set(&self, name: &str) -> bool {
        self.can_get(name)
    }

    /// Whether `relation` has been loaded on this instance.
    pub fn is_loaded(&self, relation: &str) -> bool {
        self.table
            .relations
            .iter()
            .position(|r| r.name == relation)
            .is_some_and(|i| self.resolved[i])
    }

    /// Number of relation loads performed on this instance.
    pub fn load_count(&self) -> usize {
        self.loads
    }

    pub fn owner(&self) -> &E {
        &self.owner
    }

    pub fn owner_mut(&mut self) -> &mut E {
        &mut self.owner
    }

    pub fn into_inner(self) -> E {
        self.owner
    }

    /// Load relation `slot` unless it already was.
    ///
    /// A shape error leaves the instance untouched. A relation that resolves
    /// to nothing counts as loaded and its attributes read as NULL.
    fn load<A>(&mut self, accessor: &A, slot: usize) -> Result<()>
    where
        A: RelationAccessor + ?Sized,
    {
        if self.resolved[slot] {
            return Ok(());
        }

        let relation = self.table.relations[slot];
        let label = relation_label(self.table.owner, relation);
        let related = accessor.related(&self.owner, relation)?.into_single(&label)?;
        self.loads += 1;

        match &related {
            Some(record) => {
                for ((field, rel), value) in self.table.fields.iter().zip(self.slots.iter_mut()) {
                    if *rel == slot && *value == VirtualValue::Unloaded {
                        *value =
                            VirtualValue::Clean(record.attribute(field.attribute).unwrap_or(Value::Null));
                    }
                }
                tracing::debug!(relation = %label, "Loaded embedded relation");
            }
            None => tracing::debug!(relation = %label, "Embedded relation resolved to nothing"),
        }

        self.resolved[slot] = true;
        Ok(())
    }
}

/// Native attributes pass through to the owner, so an `Embedded` can itself
/// be wrapped (e.g. by a `Membership`). Flattened attributes need an
/// accessor and are only reachable through [`Embedded::get`] and
/// [`Embedded::set`].
impl<E: Entity> Entity for Embedded<E> {
    fn entity_info(&self) -> &'static EntityInfo {
        self.owner.entity_info()
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.owner.attribute(name)
    }

    fn set_attribute(&mut self, name: &str, value: Value) -> Result<()> {
        self.owner.set_attribute(name, value)
    }
}
