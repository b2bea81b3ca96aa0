//! LinkModel Rust - relation virtualization over a persistence layer.
//!
//! LinkModel Rust lets records present their relations as plain attributes:
//!
//! - Attributes of a to-one relation read and written through the owner
//! - To-many relations edited as identifier lists and reconciled with the
//!   minimal set of link inserts and deletes
//! - Large result sets iterated in fixed-size batches inside one read-only
//!   transaction
//! - Declarative configuration validated before any query runs
//!
//! # Quick Start
//!
//! ```ignore
//! use linkmodel::prelude::*;
//! use linkmodel::memory::MemoryConnection;
//!
//! let conn = MemoryConnection::new();
//! let config = std::sync::Arc::new(MembershipConfig::new(&POST).junction("tags", &POST_TAG)?);
//!
//! let mut post = Membership::new(Record::new(&POST).with("id", 1_i64)?, config)?;
//! post.set_list("tags", [1_i64, 2, 3])?;
//! post.save(&conn)?;
//!
//! for row in BatchCursor::new(select!(&POST)).batch_size(100).iterate(&conn)? {
//!     let row = row?;
//!     // ...
//! }
//! ```
//!
//! # Features
//!
//! - `memory`: the in-process reference store, re-exported as [`memory`].

pub use linkmodel_core::{
    AttributeError, ConfigError, Entity, EntityInfo, Error, LinkTableInfo, PersistenceError,
    PersistenceOp, QueryError, QueryErrorKind, Record, RelationBinding, RelationShapeError,
    RelationShapeErrorKind, RelationValue, RelationshipInfo, RelationshipKind, Result,
    TransactionError, TransactionErrorKind, Value, ValueKey, relation_label,
};

pub use linkmodel_query::{
    BinaryOp, Connection, Executor, Expr, IsolationLevel, Limit, Offset, OrderBy, OrderDirection,
    RelationAccessor, Select, TransactionOps, UnaryOp, Where, load_related, select,
};

pub use linkmodel_session::{
    BatchCursor, BatchIter, BatchMode, BatchSettings, BoundRelation, DEFAULT_ATTRIBUTE_SUFFIX,
    DEFAULT_BATCH_SIZE, Embedded, EmbeddedField, EmbeddedRelations, EntityRegistry,
    EntitySettings, LinkOp, Membership, MembershipConfig, MembershipSettings, RelationDelta,
    RelationSettings, ResolvedEntity, Settings, SyncReport,
};

/// In-process reference store.
#[cfg(feature = "memory")]
pub mod memory {
    pub use linkmodel_memory::{MemoryConnection, MemoryStats, MemoryTransaction};
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        // Batched iteration
        BatchCursor,
        // Contract
        Connection,
        // Virtual attributes
        Embedded,
        EmbeddedRelations,
        // Core types
        Entity,
        EntityInfo,
        Error,
        Executor,
        // Query building
        Expr,
        LinkTableInfo,
        Membership,
        MembershipConfig,
        OrderBy,
        Record,
        RelationAccessor,
        RelationshipInfo,
        RelationshipKind,
        Result,
        Select,
        // Configuration
        Settings,
        TransactionOps,
        Value,
        select,
    };
}
