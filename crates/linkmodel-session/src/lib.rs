//! Relation virtualization for LinkModel Rust.
//!
//! `linkmodel-session` sits on top of the persistence contract in
//! `linkmodel-query` and adds three behaviours to records:
//!
//! - **Embedded relations**: attributes of a to-one related entity read and
//!   written as if they were the owner's own, loaded at most once.
//! - **Membership**: a to-many relation exposed as a plain list of
//!   identifiers and reconciled against the store with the minimal set of
//!   link inserts and deletes, inside one transaction.
//! - **Batched iteration**: large result sets streamed in fixed-size pages
//!   from a single read-only transaction that is always rolled back.
//!
//! All three are configured up front, either in code or from a
//! [`config::Settings`] document; misconfiguration is reported before any
//! query runs.
//!
//! # Example
//!
//! ```ignore
//! let config = Arc::new(MembershipConfig::new(&POST).junction("tags", &POST_TAG)?);
//! let mut post = Membership::new(record, config)?;
//! post.set("tagsList", Value::Array(vec![Value::Int(2), Value::Int(3)]))?;
//! let report = post.synchronize(&conn)?;
//! assert_eq!(report.inserts(), 2);
//! ```

pub mod batch;
pub mod config;
pub mod embedded;
pub mod membership;

pub use batch::{BatchCursor, BatchIter, BatchMode, DEFAULT_BATCH_SIZE};
pub use config::{
    BatchSettings, EntityRegistry, EntitySettings, MembershipSettings, RelationSettings,
    ResolvedEntity, Settings,
};
pub use embedded::{Embedded, EmbeddedField, EmbeddedRelations};
pub use membership::{
    BoundRelation, DEFAULT_ATTRIBUTE_SUFFIX, LinkOp, Membership, MembershipConfig, RelationDelta,
    SyncReport,
};
