//! Declarative configuration.
//!
//! A [`Settings`] document names entities, the relations to flatten, the
//! to-many relations to reconcile and the default batch size. It is parsed
//! with serde and bound against an [`EntityRegistry`] of static metadata;
//! every name is checked at that point so nothing fails later at query time.
//!
//! ```json
//! {
//!   "batch": { "batch_size": 100 },
//!   "entities": [
//!     { "entity": "post",
//!       "embedded": ["profile"],
//!       "membership": {
//!         "attribute_suffix": "List",
//!         "relations": [
//!           { "relation": "tags", "kind": "junction", "link_entity": "post_tag" },
//!           { "relation": "labels", "kind": "attribute", "attribute": "name" }
//!         ] } }
//!   ]
//! }
//! ```

use crate::batch::{BatchCursor, DEFAULT_BATCH_SIZE};
use crate::embedded::EmbeddedRelations;
use crate::membership::{DEFAULT_ATTRIBUTE_SUFFIX, MembershipConfig};
use linkmodel_core::{EntityInfo, Error, Result};
use linkmodel_query::Select;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub batch: BatchSettings,
    #[serde(default)]
    pub entities: Vec<EntitySettings>,
}

/// Batched iteration defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

fn default_batch_size() -> u64 {
    DEFAULT_BATCH_SIZE
}

/// Configuration of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySettings {
    pub entity: String,
    /// Relations whose target attributes are flattened onto the entity.
    #[serde(default)]
    pub embedded: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membership: Option<MembershipSettings>,
}

/// Reconciled to-many relations of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipSettings {
    #[serde(default = "default_attribute_suffix")]
    pub attribute_suffix: String,
    /// Bindings, in the order relations are reconciled.
    #[serde(default)]
    pub relations: Vec<RelationSettings>,
}

fn default_attribute_suffix() -> String {
    DEFAULT_ATTRIBUTE_SUFFIX.to_string()
}

/// One relation binding.
///
/// `kind` is kept as text so an unrecognized kind is reported as a
/// configuration error naming the relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSettings {
    pub relation: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

/// Lookup of static entity metadata by name.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: HashMap<&'static str, &'static EntityInfo>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity; a later registration of the same name wins.
    #[must_use]
    pub fn register(mut self, info: &'static EntityInfo) -> Self {
        self.entities.insert(info.name, info);
        self
    }

    pub fn get(&self, name: &str) -> Option<&'static EntityInfo> {
        self.entities.get(name).copied()
    }

    fn require(&self, name: &str) -> Result<&'static EntityInfo> {
        self.get(name)
            .ok_or_else(|| Error::config(format!("unknown entity '{name}'")))
    }
}

/// An entity's configuration bound to its metadata.
#[derive(Debug, Clone)]
pub struct ResolvedEntity {
    pub info: &'static EntityInfo,
    pub embedded: Option<Arc<EmbeddedRelations>>,
    pub membership: Option<Arc<MembershipConfig>>,
}

impl Settings {
    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Render as pretty JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// A cursor over `query` using the configured batch size.
    pub fn cursor(&self, query: Select) -> BatchCursor {
        BatchCursor::new(query).batch_size(self.batch.batch_size)
    }

    /// Bind every entity section against `registry`.
    pub fn resolve(&self, registry: &EntityRegistry) -> Result<Vec<ResolvedEntity>> {
        if self.batch.batch_size == 0 {
            return Err(Error::config("batch size must be at least 1"));
        }

        let mut resolved: Vec<ResolvedEntity> = Vec::with_capacity(self.entities.len());
        for section in &self.entities {
            let info = registry.require(&section.entity)?;
            if resolved.iter().any(|r| r.info == info) {
                return Err(Error::config(format!(
                    "entity '{}' is configured twice",
                    info.name
                )));
            }

            let embedded = if section.embedded.is_empty() {
                None
            } else {
                let names: Vec<&str> = section.embedded.iter().map(String::as_str).collect();
                Some(EmbeddedRelations::configure(info, &names)?)
            };

            let membership = match &section.membership {
                Some(settings) => Some(Arc::new(settings.resolve(info, registry)?)),
                None => None,
            };

            tracing::debug!(
                entity = info.name,
                embedded = embedded.is_some(),
                membership = membership.is_some(),
                "Resolved entity configuration"
            );
            resolved.push(ResolvedEntity {
                info,
                embedded,
                membership,
            });
        }
        Ok(resolved)
    }
}

impl MembershipSettings {
    fn resolve(
        &self,
        owner: &'static EntityInfo,
        registry: &EntityRegistry,
    ) -> Result<MembershipConfig> {
        let mut config = MembershipConfig::new(owner).attribute_suffix(self.attribute_suffix.as_str());
        for binding in &self.relations {
            let relation = binding.relation.as_str();
            config = match binding.kind.as_str() {
                "junction" => {
                    let name = binding.link_entity.as_deref().ok_or_else(|| {
                        Error::config(format!(
                            "junction relation '{relation}' needs a link_entity"
                        ))
                    })?;
                    config.junction(relation, registry.require(name)?)?
                }
                "attribute" => {
                    let attribute = binding.attribute.as_deref().ok_or_else(|| {
                        Error::config(format!(
                            "attribute relation '{relation}' needs an attribute"
                        ))
                    })?;
                    config.direct_attribute(relation, attribute)?
                }
                other => {
                    return Err(Error::config(format!(
                        "relation '{relation}' has unknown binding kind '{other}'"
                    )));
                }
            };
        }
        Ok(config)
    }
}
