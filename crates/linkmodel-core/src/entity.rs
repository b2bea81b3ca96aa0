//! Entity metadata and records.
//!
//! `EntityInfo` is static metadata describing one persisted entity type
//! (name, primary key, native attributes, relations). It is declared once in
//! a `static` and referenced everywhere by `&'static EntityInfo`.
//!
//! [`Entity`] is the instance-level contract: attribute access by name plus
//! identity. [`Record`] is the dynamic implementation used by stores.

use crate::error::{Error, Result};
use crate::relationship::RelationshipInfo;
use crate::value::Value;
use std::fmt;

/// Static description of a persisted entity type.
#[derive(Debug)]
pub struct EntityInfo {
    /// Entity (table) name, e.g. `"post"`.
    pub name: &'static str,

    /// Primary key attribute name(s). More than one means a composite key.
    pub primary_key: &'static [&'static str],

    /// Native attribute names, in storage order. Includes the key attributes.
    pub attributes: &'static [&'static str],

    /// Whether a single-column integer key is assigned by the store on insert.
    pub auto_increment: bool,

    /// Named relations to other entities.
    pub relations: &'static [RelationshipInfo],
}

impl EntityInfo {
    /// Create entity metadata with no relations.
    #[must_use]
    pub const fn new(
        name: &'static str,
        primary_key: &'static [&'static str],
        attributes: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            primary_key,
            attributes,
            auto_increment: false,
            relations: &[],
        }
    }

    /// Let the store assign the key on insert.
    #[must_use]
    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }

    /// Attach relation metadata.
    #[must_use]
    pub const fn relations(mut self, relations: &'static [RelationshipInfo]) -> Self {
        self.relations = relations;
        self
    }

    /// Find a relation by name.
    pub fn relation(&self, name: &str) -> Option<&'static RelationshipInfo> {
        let relations: &'static [RelationshipInfo] = self.relations;
        relations.iter().find(|r| r.name == name)
    }

    /// Position of an attribute in storage order.
    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| *a == name)
    }

    /// Whether `name` is a native attribute of this entity.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute_index(name).is_some()
    }

    /// The single key attribute, or `None` for composite (or missing) keys.
    pub fn simple_key(&self) -> Option<&'static str> {
        match self.primary_key {
            [key] => Some(key),
            _ => None,
        }
    }

    /// Resolve an attribute name to its `'static` spelling.
    pub fn static_attribute(&self, name: &str) -> Option<&'static str> {
        self.attributes.iter().copied().find(|a| *a == name)
    }
}

impl PartialEq for EntityInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for EntityInfo {}

/// Instance-level access to a persisted record.
///
/// `attribute` returns `None` only for names the entity does not have; an
/// attribute that exists but holds no value is `Some(Value::Null)`.
pub trait Entity {
    /// Static metadata for this entity's type.
    fn entity_info(&self) -> &'static EntityInfo;

    /// Read a native attribute.
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Write a native attribute.
    fn set_attribute(&mut self, name: &str, value: Value) -> Result<()>;

    /// Values of the primary key attribute(s), in key order.
    fn primary_key_value(&self) -> Vec<Value> {
        self.entity_info()
            .primary_key
            .iter()
            .map(|key| self.attribute(key).unwrap_or(Value::Null))
            .collect()
    }

    /// Whether this record has not been stored yet (no key value).
    fn is_new(&self) -> bool {
        self.primary_key_value().iter().all(Value::is_null)
    }
}

/// A dynamically-typed entity instance.
///
/// Values are aligned with [`EntityInfo::attributes`]; unset attributes are
/// `Value::Null`.
#[derive(Clone, PartialEq)]
pub struct Record {
    info: &'static EntityInfo,
    values: Vec<Value>,
}

impl Record {
    /// Create a record with every attribute NULL.
    pub fn new(info: &'static EntityInfo) -> Self {
        Self {
            info,
            values: vec![Value::Null; info.attributes.len()],
        }
    }

    /// Create a record from `(attribute, value)` pairs.
    ///
    /// Fails on attribute names the entity does not declare.
    pub fn from_pairs<I, K, V>(info: &'static EntityInfo, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut record = Self::new(info);
        for (name, value) in pairs {
            record.set_attribute(name.as_ref(), value.into())?;
        }
        Ok(record)
    }

    /// Builder-style attribute assignment.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set_attribute(name, value.into())?;
        Ok(self)
    }

    /// Borrow an attribute value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.info
            .attribute_index(name)
            .and_then(|i| self.values.get(i))
    }

    /// Attribute values in storage order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Iterate `(attribute, value)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.info.attributes.iter().copied().zip(self.values.iter())
    }

    /// The entity name of this record.
    pub fn entity_name(&self) -> &'static str {
        self.info.name
    }
}

impl Entity for Record {
    fn entity_info(&self) -> &'static EntityInfo {
        self.info
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }

    fn set_attribute(&mut self, name: &str, value: Value) -> Result<()> {
        let index = self
            .info
            .attribute_index(name)
            .ok_or_else(|| Error::unknown_attribute(self.info.name, name))?;
        self.values[index] = value;
        Ok(())
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in self.iter() {
            map.entry(&name, value);
        }
        map.finish()?;
        write!(f, " @{}", self.info.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static USER: EntityInfo = EntityInfo::new("user", &["id"], &["id", "name"]);
    static MEMBERSHIP: EntityInfo =
        EntityInfo::new("membership", &["org_id", "user_id"], &["org_id", "user_id"]);

    #[test]
    fn record_defaults_to_null() {
        let record = Record::new(&USER);
        assert_eq!(record.get("name"), Some(&Value::Null));
        assert!(record.is_new());
        assert_eq!(record.attribute("missing"), None);
    }

    #[test]
    fn set_unknown_attribute_fails() {
        let mut record = Record::new(&USER);
        let err = record
            .set_attribute("nope", Value::Int(1))
            .expect_err("unknown attribute");
        assert!(matches!(err, Error::Attribute(_)));
    }

    #[test]
    fn from_pairs_and_primary_key() {
        let record = Record::from_pairs(&USER, [("id", Value::BigInt(7)), ("name", "Ann".into())])
            .expect("valid record");
        assert_eq!(record.primary_key_value(), vec![Value::BigInt(7)]);
        assert!(!record.is_new());
        assert_eq!(record.entity_name(), "user");
    }

    #[test]
    fn simple_key_detection() {
        assert_eq!(USER.simple_key(), Some("id"));
        assert_eq!(MEMBERSHIP.simple_key(), None);
        assert_eq!(MEMBERSHIP.static_attribute("user_id"), Some("user_id"));
    }
}
