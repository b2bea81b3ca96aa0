//! Set-valued relation membership.
//!
//! A [`MembershipConfig`] binds to-many relations of one entity type to the
//! way their membership is stored ([`RelationBinding`]). [`Membership`]
//! wraps an owner entity, exposes one collection attribute per bound
//! relation (`relation + suffix`, e.g. `tagsList`), and reconciles the
//! desired identifiers against the stored ones with the minimal set of
//! inserts and deletes, inside a single transaction.

use linkmodel_core::{
    Entity, EntityInfo, Error, PersistenceOp, Record, RelationBinding, RelationShapeErrorKind,
    RelationshipInfo, Result, Value, ValueKey, relation_label,
};
use linkmodel_query::{Connection, Executor, Expr, RelationAccessor, Select, TransactionOps};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Default suffix appended to a relation name to form its collection
/// attribute.
pub const DEFAULT_ATTRIBUTE_SUFFIX: &str = "List";

/// One bound relation.
#[derive(Debug, Clone, Copy)]
pub struct BoundRelation {
    pub relation: &'static RelationshipInfo,
    pub binding: RelationBinding,
}

impl BoundRelation {
    /// Entity whose rows record membership.
    pub fn link_entity(&self) -> &'static EntityInfo {
        match self.binding {
            RelationBinding::Junction { link_entity } => link_entity,
            RelationBinding::DirectAttribute { .. } => self.relation.target_info(),
        }
    }

    /// Attribute on [`Self::link_entity`] holding the member identifier.
    pub fn identifier_attribute(&self) -> &'static str {
        match self.binding {
            // Validated to be exactly one `(target, junction)` pair.
            RelationBinding::Junction { .. } => self.relation.link[0].1,
            RelationBinding::DirectAttribute { attribute } => attribute,
        }
    }
}

/// Relation bindings for one owner entity type.
#[derive(Debug, Clone)]
pub struct MembershipConfig {
    owner: &'static EntityInfo,
    suffix: String,
    relations: Vec<BoundRelation>,
}

impl MembershipConfig {
    /// Start an empty configuration for `owner`.
    pub fn new(owner: &'static EntityInfo) -> Self {
        Self {
            owner,
            suffix: DEFAULT_ATTRIBUTE_SUFFIX.to_string(),
            relations: Vec::new(),
        }
    }

    /// Set the suffix used to derive collection attribute names.
    #[must_use]
    pub fn attribute_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Bind `relation` to rows of the junction entity `link_entity`.
    pub fn junction(self, relation: &str, link_entity: &'static EntityInfo) -> Result<Self> {
        self.bind(relation, RelationBinding::Junction { link_entity })
    }

    /// Bind `relation` to `attribute` on its target entity.
    pub fn direct_attribute(self, relation: &str, attribute: &str) -> Result<Self> {
        let info = self.lookup(relation)?;
        let target = info.target_info();
        let attribute = target.static_attribute(attribute).ok_or_else(|| {
            Error::config(format!(
                "relation '{}' target '{}' has no attribute '{attribute}'",
                relation_label(self.owner, info),
                target.name
            ))
        })?;
        self.bind(relation, RelationBinding::DirectAttribute { attribute })
    }

    /// Bind `relation` with an explicit binding, validating it against the
    /// relation metadata.
    pub fn bind(mut self, relation: &str, binding: RelationBinding) -> Result<Self> {
        let info = self.lookup(relation)?;
        let label = relation_label(self.owner, info);

        if !info.is_to_many() {
            return Err(Error::config(format!(
                "relation '{label}' is not a to-many relation"
            )));
        }
        if self.relations.iter().any(|r| r.relation.name == info.name) {
            return Err(Error::config(format!("relation '{label}' is bound twice")));
        }

        match binding {
            RelationBinding::Junction { link_entity } => {
                let Some(via) = info.via else {
                    return Err(Error::config(format!(
                        "relation '{label}' has no junction entity"
                    )));
                };
                if via.entity_info() != link_entity {
                    return Err(Error::config(format!(
                        "relation '{label}' goes through '{}', not '{}'",
                        via.entity_info().name,
                        link_entity.name
                    )));
                }
                let [(_, identifier)] = info.link else {
                    return Err(Error::config(format!(
                        "relation '{label}' must link the junction to the target by one attribute"
                    )));
                };
                if info.target_info().simple_key().is_none() {
                    return Err(Error::config(format!(
                        "relation '{label}' target '{}' has a composite primary key",
                        info.target_info().name
                    )));
                }
                if !link_entity.has_attribute(identifier) {
                    return Err(Error::config(format!(
                        "junction '{}' has no attribute '{identifier}'",
                        link_entity.name
                    )));
                }
            }
            RelationBinding::DirectAttribute { attribute } => {
                if info.via.is_some() {
                    return Err(Error::config(format!(
                        "relation '{label}' goes through a junction; bind it as a junction"
                    )));
                }
                if !info.target_info().has_attribute(attribute) {
                    return Err(Error::config(format!(
                        "relation '{label}' target has no attribute '{attribute}'"
                    )));
                }
            }
        }

        let owner_link = info.owner_link();
        if owner_link.is_empty() {
            return Err(Error::config(format!(
                "relation '{label}' declares no owner link"
            )));
        }
        let side = info.owner_side_entity();
        for (side_attr, owner_attr) in owner_link {
            if !side.has_attribute(side_attr) || !self.owner.has_attribute(owner_attr) {
                return Err(Error::config(format!(
                    "relation '{label}' links unknown attributes '{}.{side_attr}' / '{}.{owner_attr}'",
                    side.name, self.owner.name
                )));
            }
        }

        tracing::debug!(relation = %label, kind = binding.kind_name(), "Bound membership relation");
        self.relations.push(BoundRelation {
            relation: info,
            binding,
        });
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

    pub fn owner(&self) -> &'static EntityInfo {
        self.owner
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Bound relations, in configuration order.
    pub fn relations(&self) -> &[BoundRelation] {
        &self.relations
    }

    /// Collection attribute name of a bound relation.
    pub fn attribute_name(&self, relation: &str) -> String {
        format!("{relation}{}", self.suffix)
    }

    /// Index of the bound relation exposed as attribute `name`.
    fn position_of_attribute(&self, name: &str) -> Option<usize> {
        let relation = name.strip_suffix(self.suffix.as_str())?;
        self.position_of(relation)
    }

    fn position_of(&self, relation: &str) -> Option<usize> {
        self.relations
            .iter()
            .position(|r| r.relation.name == relation)
    }
}

/// A link written or removed during reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkOp {
    /// A membership row was inserted.
    Link {
        entity: &'static str,
        identifier: Value,
    },
    /// A membership row was deleted.
    Unlink {
        entity: &'static str,
        identifier: Value,
    },
}

impl LinkOp {
    pub fn entity(&self) -> &'static str {
        match self {
            LinkOp::Link { entity, .. } | LinkOp::Unlink { entity, .. } => entity,
        }
    }

    pub fn identifier(&self) -> &Value {
        match self {
            LinkOp::Link { identifier, .. } | LinkOp::Unlink { identifier, .. } => identifier,
        }
    }

    /// Check if this is a link (insert) operation.
    pub fn is_link(&self) -> bool {
        matches!(self, LinkOp::Link { .. })
    }

    /// Check if this is an unlink (delete) operation.
    pub fn is_unlink(&self) -> bool {
        matches!(self, LinkOp::Unlink { .. })
    }
}

/// Operations applied to one relation.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDelta {
    pub relation: &'static str,
    pub ops: Vec<LinkOp>,
}

impl RelationDelta {
    /// Identifiers that were linked.
    pub fn linked(&self) -> Vec<&Value> {
        self.ops
            .iter()
            .filter(|op| op.is_link())
            .map(LinkOp::identifier)
            .collect()
    }

    /// Identifiers that were unlinked (one entry per deleted row).
    pub fn unlinked(&self) -> Vec<&Value> {
        self.ops
            .iter()
            .filter(|op| op.is_unlink())
            .map(LinkOp::identifier)
            .collect()
    }
}

/// Result of one [`Membership::synchronize`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub relations: Vec<RelationDelta>,
}

impl SyncReport {
    /// Total rows inserted.
    pub fn inserts(&self) -> usize {
        self.relations.iter().map(|d| d.linked().len()).sum()
    }

    /// Total rows deleted.
    pub fn deletes(&self) -> usize {
        self.relations.iter().map(|d| d.unlinked().len()).sum()
    }

    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.relations.iter().all(|d| d.ops.is_empty())
    }

    /// Delta of one relation.
    pub fn delta(&self, relation: &str) -> Option<&RelationDelta> {
        self.relations.iter().find(|d| d.relation == relation)
    }
}

/// Work for one relation, computed before the transaction opens.
struct RelationPlan {
    bound: BoundRelation,
    owner_pairs: Vec<(&'static str, Value)>,
    desired: Vec<Value>,
}

/// An owner entity with collection attributes for its bound relations.
#[derive(Debug)]
pub struct Membership<E: Entity> {
    owner: E,
    config: Arc<MembershipConfig>,
    /// Per bound relation: the desired identifiers, `None` while unset.
    lists: Vec<Option<Vec<Value>>>,
}

impl<E: Entity> Membership<E> {
    /// Wrap `owner`; fails if `config` was built for another entity type.
    pub fn new(owner: E, config: Arc<MembershipConfig>) -> Result<Self> {
        if owner.entity_info() != config.owner {
            return Err(Error::config(format!(
                "membership configured for '{}' cannot wrap '{}'",
                config.owner.name,
                owner.entity_info().name
            )));
        }
        let lists = vec![None; config.relations.len()];
        Ok(Self {
            owner,
            config,
            lists,
        })
    }

    /// Read an attribute; collection attributes load lazily.
    pub fn get<A>(&mut self, accessor: &A, name: &str) -> Result<Value>
    where
        A: RelationAccessor + ?Sized,
    {
        match self.config.position_of_attribute(name) {
            Some(i) => Ok(Value::Array(self.list_at(accessor, i)?.to_vec())),
            None => self
                .owner
                .attribute(name)
                .ok_or_else(|| Error::unknown_attribute(self.owner.entity_info().name, name)),
        }
    }

    /// Write an attribute. A collection attribute takes an array of
    /// identifiers, or NULL to unset it.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let Some(i) = self.config.position_of_attribute(name) else {
            return self.owner.set_attribute(name, value);
        };
        self.lists[i] = match value {
            Value::Null => None,
            Value::Array(items) => Some(items),
            other => {
                return Err(Error::relation_shape(
                    RelationShapeErrorKind::InvalidIdentifier,
                    relation_label(self.config.owner, self.config.relations[i].relation),
                    format!(
                        "collection attribute '{name}' expects an array, got {}",
                        other.type_name()
                    ),
                ));
            }
        };
        Ok(())
    }

    /// The desired identifiers of `relation`, loading the stored ones if
    /// none were set.
    pub fn list<A>(&mut self, accessor: &A, relation: &str) -> Result<&[Value]>
    where
        A: RelationAccessor + ?Sized,
    {
        let i = self.position(relation)?;
        self.list_at(accessor, i)
    }

    /// Replace the desired identifiers of `relation`.
    pub fn set_list<I, V>(&mut self, relation: &str, identifiers: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let i = self.position(relation)?;
        self.lists[i] = Some(identifiers.into_iter().map(Into::into).collect());
        Ok(())
    }

    /// Whether `name` can be read.
    pub fn can_get(&self, name: &str) -> bool {
        self.config.position_of_attribute(name).is_some()
            || self.owner.entity_info().has_attribute(name)
    }

    /// Whether `name` can be written.
    pub fn can_set(&self, name: &str) -> bool {
        self.can_get(name)
    }

    pub fn owner(&self) -> &E {
        &self.owner
    }

    pub fn owner_mut(&mut self) -> &mut E {
        &mut self.owner
    }

    pub fn config(&self) -> &MembershipConfig {
        &self.config
    }

    pub fn into_inner(self) -> E {
        self.owner
    }

    fn position(&self, relation: &str) -> Result<usize> {
        self.config.position_of(relation).ok_or_else(|| {
            Error::config(format!(
                "relation '{relation}' of '{}' is not bound for membership",
                self.config.owner.name
            ))
        })
    }

    fn list_at<A>(&mut self, accessor: &A, i: usize) -> Result<&[Value]>
    where
        A: RelationAccessor + ?Sized,
    {
        if self.lists[i].is_none() {
            let loaded = self.load_list(accessor, i)?;
            self.lists[i] = Some(loaded);
        }
        Ok(self.lists[i].as_deref().unwrap_or_default())
    }

    fn load_list<A>(&self, accessor: &A, i: usize) -> Result<Vec<Value>>
    where
        A: RelationAccessor + ?Sized,
    {
        let bound = self.config.relations[i];
        let label = relation_label(self.config.owner, bound.relation);
        let records = accessor
            .related(&self.owner, bound.relation)?
            .into_collection(&label)?;

        let values = match bound.binding {
            RelationBinding::Junction { .. } => records
                .iter()
                .map(|record| match record.primary_key_value().as_slice() {
                    [key] if !key.is_null() => Ok(key.clone()),
                    [_] | [] => Err(Error::relation_shape(
                        RelationShapeErrorKind::MissingKey,
                        &label,
                        format!("related '{}' has no primary key value", record.entity_name()),
                    )),
                    _ => Err(Error::relation_shape(
                        RelationShapeErrorKind::CompositeKey,
                        &label,
                        format!("related '{}' has a composite primary key", record.entity_name()),
                    )),
                })
                .collect::<Result<Vec<_>>>()?,
            RelationBinding::DirectAttribute { attribute } => records
                .iter()
                .map(|record| record.attribute(attribute).unwrap_or(Value::Null))
                .collect(),
        };

        tracing::debug!(relation = %label, count = values.len(), "Loaded membership list");
        Ok(values)
    }

    /// Reconcile every bound relation against the store.
    ///
    /// Runs after the owner's own row is saved. All relations are applied in
    /// one transaction: any failure rolls back every relation of this call.
    /// Inserts are applied before deletes within a relation.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = self.config.owner.name))]
    pub fn synchronize<C: Connection>(&self, conn: &C) -> Result<SyncReport> {
        // Shape and key problems surface before anything is written.
        let plans = self.plan()?;

        let tx = conn.begin()?;
        match apply(&tx, &plans) {
            Ok(report) => {
                tx.commit()?;
                tracing::info!(
                    inserts = report.inserts(),
                    deletes = report.deletes(),
                    "Membership synchronized"
                );
                Ok(report)
            }
            Err(err) => {
                tracing::debug!(error = %err, "Membership synchronization failed, rolling back");
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!(error = %rollback_err, "Rollback after failed synchronization failed");
                }
                Err(err)
            }
        }
    }

    fn plan(&self) -> Result<Vec<RelationPlan>> {
        let mut plans = Vec::with_capacity(self.config.relations.len());
        for (bound, list) in self.config.relations.iter().zip(&self.lists) {
            let label = relation_label(self.config.owner, bound.relation);

            let mut owner_pairs = Vec::new();
            for (side_attr, owner_attr) in bound.relation.owner_link() {
                let value = self.owner.attribute(owner_attr).unwrap_or(Value::Null);
                if value.is_null() {
                    return Err(Error::relation_shape(
                        RelationShapeErrorKind::MissingKey,
                        &label,
                        format!("owner attribute '{owner_attr}' has no value; save the owner first"),
                    ));
                }
                owner_pairs.push((*side_attr, value));
            }

            let mut seen = HashSet::new();
            let mut desired = Vec::new();
            for identifier in list.as_deref().unwrap_or_default() {
                if matches!(identifier, Value::Null | Value::Array(_)) {
                    return Err(Error::relation_shape(
                        RelationShapeErrorKind::InvalidIdentifier,
                        &label,
                        format!("identifier of type {} cannot be stored", identifier.type_name()),
                    ));
                }
                if seen.insert(identifier.key()) {
                    desired.push(identifier.clone());
                }
            }

            plans.push(RelationPlan {
                bound: *bound,
                owner_pairs,
                desired,
            });
        }
        Ok(plans)
    }
}

impl<E: Entity> Entity for Membership<E> {
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

impl Membership<Record> {
    /// Save the owner record, then synchronize its memberships.
    pub fn save<C: Connection>(&mut self, conn: &C) -> Result<SyncReport> {
        let entity = self.owner.entity_name();
        conn.save(&mut self.owner)
            .map_err(|e| e.into_persistence(PersistenceOp::Save, entity))?;
        self.synchronize(conn)
    }
}

fn apply<X: Executor>(exec: &X, plans: &[RelationPlan]) -> Result<SyncReport> {
    let mut report = SyncReport::default();
    for plan in plans {
        report.relations.push(apply_relation(exec, plan)?);
    }
    Ok(report)
}

fn apply_relation<X: Executor>(exec: &X, plan: &RelationPlan) -> Result<RelationDelta> {
    let link_entity = plan.bound.link_entity();
    let identifier_attr = plan.bound.identifier_attribute();
    let mut ops = Vec::new();

    let mut query = Select::new(link_entity);
    if let Some(owner_filter) = Expr::matching(plan.owner_pairs.iter().map(|(a, v)| (*a, v.clone())))
    {
        query = query.filter(owner_filter);
    }

    // Stored rows grouped by identifier, in first-seen order.
    let mut order: Vec<ValueKey> = Vec::new();
    let mut current: HashMap<ValueKey, Vec<Record>> = HashMap::new();
    for row in exec.all(&query)? {
        let key = row.get(identifier_attr).map(Value::key).unwrap_or(ValueKey::Null);
        let rows = current.entry(key.clone()).or_default();
        if rows.is_empty() {
            order.push(key);
        }
        rows.push(row);
    }

    let mut surplus = Vec::new();
    for identifier in &plan.desired {
        if let Some(mut rows) = current.remove(&identifier.key()) {
            surplus.extend(rows.drain(1..));
            continue;
        }

        let mut link = Record::new(link_entity);
        for (attr, value) in &plan.owner_pairs {
            link.set_attribute(attr, value.clone())?;
        }
        link.set_attribute(identifier_attr, identifier.clone())?;
        exec.save(&mut link)
            .map_err(|e| e.into_persistence(PersistenceOp::Save, link_entity.name))?;
        tracing::trace!(entity = link_entity.name, identifier = ?identifier, "Linked");
        ops.push(LinkOp::Link {
            entity: link_entity.name,
            identifier: identifier.clone(),
        });
    }

    let stale = order
        .iter()
        .filter_map(|key| current.remove(key))
        .flatten()
        .chain(surplus);
    for row in stale {
        exec.delete(&row)
            .map_err(|e| e.into_persistence(PersistenceOp::Delete, link_entity.name))?;
        let identifier = row.get(identifier_attr).cloned().unwrap_or(Value::Null);
        tracing::trace!(entity = link_entity.name, identifier = ?identifier, "Unlinked");
        ops.push(LinkOp::Unlink {
            entity: link_entity.name,
            identifier,
        });
    }

    tracing::debug!(
        relation = plan.bound.relation.name,
        ops = ops.len(),
        "Relation reconciled"
    );
    Ok(RelationDelta {
        relation: plan.bound.relation.name,
        ops,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkmodel_core::{LinkTableInfo, RelationValue, RelationshipKind};
    use linkmodel_memory::MemoryConnection;

    fn tag_info() -> &'static EntityInfo {
        &TAG
    }

    fn post_tag_info() -> &'static EntityInfo {
        &POST_TAG
    }

    fn label_info() -> &'static EntityInfo {
        &LABEL
    }

    fn author_info() -> &'static EntityInfo {
        &AUTHOR
    }

    static TAG: EntityInfo = EntityInfo::new("tag", &["id"], &["id", "name"]);
    static POST_TAG: EntityInfo = EntityInfo::new("post_tag", &[], &["post_id", "tag_id"]);
    static LABEL: EntityInfo =
        EntityInfo::new("label", &["id"], &["id", "post_id", "name"]).auto_increment(true);
    static AUTHOR: EntityInfo = EntityInfo::new("author", &["id"], &["id", "name"]);
    static POST_RELATIONS: [RelationshipInfo; 3] = [
        RelationshipInfo::new("tags", tag_info, RelationshipKind::ManyToMany)
            .link(&[("id", "tag_id")])
            .via(LinkTableInfo::new(post_tag_info, &[("post_id", "id")])),
        RelationshipInfo::new("labels", label_info, RelationshipKind::OneToMany)
            .link(&[("post_id", "id")]),
        RelationshipInfo::new("author", author_info, RelationshipKind::ManyToOne)
            .link(&[("id", "author_id")]),
    ];
    static POST: EntityInfo = EntityInfo::new("post", &["id"], &["id", "author_id", "title"])
        .auto_increment(true)
        .relations(&POST_RELATIONS);

    fn config() -> Arc<MembershipConfig> {
        Arc::new(
            MembershipConfig::new(&POST)
                .junction("tags", &POST_TAG)
                .unwrap()
                .direct_attribute("labels", "name")
                .unwrap(),
        )
    }

    fn saved_post(conn: &MemoryConnection) -> Record {
        let mut post = Record::new(&POST).with("title", "hello").unwrap();
        conn.save(&mut post).unwrap();
        post
    }

    fn seed_tags(conn: &MemoryConnection, ids: &[i64]) {
        for id in ids {
            let mut tag = Record::from_pairs(
                &TAG,
                [("id", Value::BigInt(*id)), ("name", Value::from(format!("t{id}")))],
            )
            .unwrap();
            conn.save(&mut tag).unwrap();
        }
    }

    fn link(conn: &MemoryConnection, post: &Record, tag: i64) {
        let mut row = Record::from_pairs(
            &POST_TAG,
            [("post_id", post.attribute("id").unwrap()), ("tag_id", Value::BigInt(tag))],
        )
        .unwrap();
        conn.save(&mut row).unwrap();
    }

    fn stored_tags(conn: &MemoryConnection) -> Vec<i64> {
        let mut ids: Vec<i64> = conn
            .rows(&POST_TAG)
            .iter()
            .filter_map(|r| r.get("tag_id").and_then(Value::as_i64))
            .collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn config_rejects_bad_bindings() {
        assert!(MembershipConfig::new(&POST).junction("missing", &POST_TAG).unwrap_err().is_config());
        assert!(MembershipConfig::new(&POST).junction("author", &POST_TAG).unwrap_err().is_config());
        assert!(MembershipConfig::new(&POST).junction("tags", &LABEL).unwrap_err().is_config());
        assert!(MembershipConfig::new(&POST)
            .direct_attribute("labels", "nope")
            .unwrap_err()
            .is_config());
        assert!(MembershipConfig::new(&POST)
            .direct_attribute("tags", "name")
            .unwrap_err()
            .is_config());
        let twice = MembershipConfig::new(&POST)
            .junction("tags", &POST_TAG)
            .unwrap()
            .junction("tags", &POST_TAG);
        assert!(twice.unwrap_err().is_config());
    }

    #[test]
    fn collection_attribute_names_use_suffix() {
        let config = MembershipConfig::new(&POST)
            .attribute_suffix("Ids")
            .junction("tags", &POST_TAG)
            .unwrap();
        assert_eq!(config.attribute_name("tags"), "tagsIds");
        let post = Membership::new(Record::new(&POST), Arc::new(config)).unwrap();
        assert!(post.can_get("tagsIds"));
        assert!(post.can_set("title"));
        assert!(!post.can_get("tagsList"));
    }

    #[test]
    fn reconcile_inserts_and_deletes_minimal_delta() {
        let conn = MemoryConnection::new();
        seed_tags(&conn, &[1, 2, 3, 4]);
        let post = saved_post(&conn);
        for tag in [2, 3, 4] {
            link(&conn, &post, tag);
        }

        let mut membership = Membership::new(post, config()).unwrap();
        membership.set_list("tags", [1_i64, 2, 3]).unwrap();
        let report = membership.synchronize(&conn).unwrap();

        let delta = report.delta("tags").unwrap();
        assert_eq!(delta.linked(), vec![&Value::BigInt(1)]);
        assert_eq!(delta.unlinked(), vec![&Value::BigInt(4)]);
        assert_eq!(stored_tags(&conn), vec![1, 2, 3]);
        assert!(!conn.in_transaction());
    }

    #[test]
    fn second_synchronize_is_a_no_op() {
        let conn = MemoryConnection::new();
        seed_tags(&conn, &[1, 2]);
        let post = saved_post(&conn);
        let mut membership = Membership::new(post, config()).unwrap();
        membership.set_list("tags", [1_i64, 2]).unwrap();
        membership.synchronize(&conn).unwrap();

        let before = conn.stats();
        let report = membership.synchronize(&conn).unwrap();
        let after = conn.stats();
        assert!(report.is_empty());
        assert_eq!(after.inserts, before.inserts);
        assert_eq!(after.deletes, before.deletes);
    }

    #[test]
    fn duplicate_identifiers_collapse() {
        let conn = MemoryConnection::new();
        seed_tags(&conn, &[5, 6]);
        let post = saved_post(&conn);
        let mut membership = Membership::new(post, config()).unwrap();
        membership.set_list("tags", [5_i64, 5, 6]).unwrap();
        let report = membership.synchronize(&conn).unwrap();
        assert_eq!(report.inserts(), 2);
        assert_eq!(stored_tags(&conn), vec![5, 6]);
    }

    #[test]
    fn stored_duplicates_are_removed() {
        let conn = MemoryConnection::new();
        seed_tags(&conn, &[7]);
        let post = saved_post(&conn);
        link(&conn, &post, 7);
        link(&conn, &post, 7);

        let mut membership = Membership::new(post, config()).unwrap();
        membership.set_list("tags", [7_i64]).unwrap();
        let report = membership.synchronize(&conn).unwrap();
        assert_eq!(report.inserts(), 0);
        assert_eq!(report.deletes(), 1);
        assert_eq!(stored_tags(&conn), vec![7]);
    }

    #[test]
    fn unset_list_means_empty() {
        let conn = MemoryConnection::new();
        seed_tags(&conn, &[1]);
        let post = saved_post(&conn);
        link(&conn, &post, 1);

        let membership = Membership::new(post, config()).unwrap();
        let report = membership.synchronize(&conn).unwrap();
        assert_eq!(report.deletes(), 1);
        assert!(conn.is_empty(&POST_TAG));
    }

    #[test]
    fn direct_attribute_rows_follow_desired_values() {
        let conn = MemoryConnection::new();
        let post = saved_post(&conn);
        let mut membership = Membership::new(post, config()).unwrap();
        membership.set("labelsList", Value::Array(vec!["a".into(), "b".into()])).unwrap();
        membership.synchronize(&conn).unwrap();

        membership.set("labelsList", Value::Array(vec!["b".into(), "c".into()])).unwrap();
        let report = membership.synchronize(&conn).unwrap();
        let delta = report.delta("labels").unwrap();
        assert_eq!(delta.linked(), vec![&Value::from("c")]);
        assert_eq!(delta.unlinked(), vec![&Value::from("a")]);

        let mut names: Vec<String> = conn
            .rows(&LABEL)
            .iter()
            .filter_map(|r| r.get("name").and_then(Value::as_str).map(str::to_string))
            .collect();
        names.sort();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn lazy_list_reads_stored_membership() {
        let conn = MemoryConnection::new();
        seed_tags(&conn, &[3, 8]);
        let post = saved_post(&conn);
        link(&conn, &post, 8);
        link(&conn, &post, 3);

        let mut membership = Membership::new(post, config()).unwrap();
        let value = membership.get(&conn, "tagsList").unwrap();
        let mut ids: Vec<i64> = value
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_i64)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![3, 8]);
        assert_eq!(membership.get(&conn, "title").unwrap(), Value::from("hello"));
    }

    #[test]
    fn invalid_identifiers_abort_before_writing() {
        let conn = MemoryConnection::new();
        let post = saved_post(&conn);
        let mut membership = Membership::new(post, config()).unwrap();
        membership.set_list("tags", [Value::Null]).unwrap();
        conn.reset_stats();

        let err = membership.synchronize(&conn).unwrap_err();
        assert_eq!(
            err.relation_shape_kind(),
            Some(RelationShapeErrorKind::InvalidIdentifier)
        );
        assert_eq!(conn.stats().begins, 0);

        assert!(membership.set("tagsList", Value::BigInt(1)).unwrap_err().is_relation_shape());
    }

    #[test]
    fn unsaved_owner_is_missing_key() {
        let conn = MemoryConnection::new();
        let membership = Membership::new(Record::new(&POST), config()).unwrap();
        let err = membership.synchronize(&conn).unwrap_err();
        assert_eq!(err.relation_shape_kind(), Some(RelationShapeErrorKind::MissingKey));
    }

    #[test]
    fn non_collection_relation_value_is_shape_error() {
        struct Single;
        impl RelationAccessor for Single {
            fn related(&self, _: &dyn Entity, _: &RelationshipInfo) -> Result<RelationValue> {
                Ok(RelationValue::One(None))
            }
        }

        let mut membership = Membership::new(Record::new(&POST), config()).unwrap();
        let err = membership.get(&Single, "tagsList").unwrap_err();
        assert_eq!(
            err.relation_shape_kind(),
            Some(RelationShapeErrorKind::ExpectedCollection)
        );
    }

    #[test]
    fn save_persists_owner_then_links() {
        let conn = MemoryConnection::new();
        seed_tags(&conn, &[1]);
        let mut membership = Membership::new(Record::new(&POST), config()).unwrap();
        membership.set_list("tags", [1_i64]).unwrap();
        let report = membership.save(&conn).unwrap();

        assert_eq!(report.inserts(), 1);
        assert!(!membership.owner().is_new());
        assert_eq!(stored_tags(&conn), vec![1]);
    }
}
