//! Core types and traits for LinkModel Rust.
//!
//! This crate provides the foundational abstractions shared by every layer:
//!
//! - `Value` / `ValueKey` for dynamically-typed attribute values
//! - `EntityInfo`, the `Entity` trait and the dynamic `Record`
//! - `RelationshipInfo` / `LinkTableInfo` relation metadata
//! - `RelationBinding` describing how set-valued relations are persisted
//! - the `Error` taxonomy

pub mod entity;
pub mod error;
pub mod relationship;
pub mod value;

pub use entity::{Entity, EntityInfo, Record};
pub use error::{
    AttributeError, ConfigError, Error, PersistenceError, PersistenceOp, QueryError,
    QueryErrorKind, RelationShapeError, RelationShapeErrorKind, Result, TransactionError,
    TransactionErrorKind,
};
pub use relationship::{
    LinkTableInfo, RelationBinding, RelationValue, RelationshipInfo, RelationshipKind,
    relation_label,
};
pub use value::{Value, ValueKey};
