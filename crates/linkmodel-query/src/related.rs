//! Relation loading.
//!
//! Resolves a named relation of an owner entity to the related records,
//! following either a direct link (target rows hold the owner's key) or a
//! junction entity (`via`).

use crate::clause::OrderBy;
use crate::connection::Executor;
use crate::expr::Expr;
use crate::select::Select;
use linkmodel_core::{
    Entity, Error, Record, RelationValue, RelationshipInfo, Result, Value, relation_label,
};
use std::collections::HashSet;

/// Resolves relations of an owner entity.
///
/// Every [`Executor`] is a `RelationAccessor` through [`load_related`].
pub trait RelationAccessor {
    /// Load `relation` for `owner`.
    fn related(&self, owner: &dyn Entity, relation: &RelationshipInfo) -> Result<RelationValue>;
}

impl<T: Executor + ?Sized> RelationAccessor for T {
    fn related(&self, owner: &dyn Entity, relation: &RelationshipInfo) -> Result<RelationValue> {
        load_related(self, owner, relation)
    }
}

/// Load the records related to `owner` through `relation`.
///
/// To-one relations yield [`RelationValue::One`], to-many relations
/// [`RelationValue::Many`]. An owner whose link attributes are NULL has
/// nothing related.
#[tracing::instrument(level = "debug", skip_all, fields(relation = relation.name))]
pub fn load_related<E: Executor + ?Sized>(
    exec: &E,
    owner: &dyn Entity,
    relation: &RelationshipInfo,
) -> Result<RelationValue> {
    let owner_info = owner.entity_info();
    if relation.link.is_empty() || relation.owner_link().is_empty() {
        return Err(Error::config(format!(
            "relation '{}' declares no link attributes",
            relation_label(owner_info, relation)
        )));
    }

    let records = match owner_predicate(owner, relation.owner_link())? {
        None => Vec::new(),
        Some(owner_filter) => match &relation.via {
            None => {
                let query = ordered(Select::new(relation.target_info()).filter(owner_filter), relation);
                tracing::trace!(query = %query, "Loading direct relation");
                exec.all(&query)?
            }
            Some(via) => {
                let junction = Select::new(via.entity_info()).filter(owner_filter);
                let junction_rows = exec.all(&junction)?;
                tracing::trace!(
                    junction = via.entity_info().name,
                    rows = junction_rows.len(),
                    "Loaded junction rows"
                );

                match target_filter(relation.link, &junction_rows) {
                    None => Vec::new(),
                    Some(target_filter) => {
                        let query = ordered(
                            Select::new(relation.target_info()).filter(target_filter),
                            relation,
                        );
                        exec.all(&query)?
                    }
                }
            }
        },
    };

    tracing::debug!(
        owner = owner_info.name,
        count = records.len(),
        "Resolved relation"
    );

    if relation.is_to_many() {
        Ok(RelationValue::Many(records))
    } else {
        Ok(RelationValue::One(records.into_iter().next()))
    }
}

/// `attribute = owner value` for each link pair; `None` when any owner
/// value is NULL.
fn owner_predicate(
    owner: &dyn Entity,
    link: &'static [(&'static str, &'static str)],
) -> Result<Option<Expr>> {
    let mut pairs = Vec::with_capacity(link.len());
    for (side_attr, owner_attr) in link {
        let value = owner
            .attribute(owner_attr)
            .ok_or_else(|| Error::unknown_attribute(owner.entity_info().name, *owner_attr))?;
        if value.is_null() {
            return Ok(None);
        }
        pairs.push((*side_attr, value));
    }
    Ok(Expr::matching(pairs))
}

/// Predicate selecting the targets referenced by `junction_rows`.
///
/// A single link pair becomes one `IN` over the distinct values; composite
/// links become a balanced OR of per-row conjunctions. Rows with a NULL
/// link value reference nothing.
fn target_filter(
    link: &'static [(&'static str, &'static str)],
    junction_rows: &[Record],
) -> Option<Expr> {
    if let [(target_attr, local_attr)] = link {
        let mut seen = HashSet::new();
        let values: Vec<Value> = junction_rows
            .iter()
            .filter_map(|row| row.get(local_attr))
            .filter(|v| !v.is_null() && seen.insert(v.key()))
            .cloned()
            .collect();
        return (!values.is_empty()).then(|| Expr::col(*target_attr).in_list(values));
    }

    Expr::any(junction_rows.iter().filter_map(|row| {
        let pairs: Option<Vec<(&str, Value)>> = link
            .iter()
            .map(|(target_attr, local_attr)| {
                row.get(local_attr)
                    .filter(|v| !v.is_null())
                    .map(|v| (*target_attr, v.clone()))
            })
            .collect();
        pairs.and_then(Expr::matching)
    }))
}

fn ordered(query: Select, relation: &RelationshipInfo) -> Select {
    match relation.order_by {
        Some(attribute) => query.order_by(OrderBy::asc(attribute)),
        None => query,
    }
}
