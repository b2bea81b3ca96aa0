//! Query description and persistence contract for LinkModel Rust.
//!
//! `linkmodel-query` is the **store-facing layer**. It describes reads as
//! [`Select`] values built from an [`Expr`] predicate DSL, and defines the
//! traits a store implements to run them.
//!
//! # Role In The Architecture
//!
//! - **Expression DSL**: `Expr` builds WHERE predicates without string SQL.
//! - **Persistence contract**: `Executor`, `TransactionOps`, `Connection`.
//! - **Relation loading**: `load_related` / `RelationAccessor` resolve a
//!   relation declared on `EntityInfo` to the related records.
//!
//! Stores (such as `linkmodel-memory`) implement the contract; the session
//! layer only ever talks to these traits.

pub mod clause;
pub mod connection;
pub mod expr;
pub mod related;
pub mod select;

pub use clause::{Limit, Offset, OrderBy, OrderDirection, Where};
pub use connection::{Connection, Executor, IsolationLevel, TransactionOps};
pub use expr::{BinaryOp, Expr, UnaryOp};
pub use related::{RelationAccessor, load_related};
pub use select::Select;

/// Create a SELECT query for an entity.
///
/// # Example
///
/// ```ignore
/// let posts = select!(&POST)
///     .filter(Expr::col("views").gt(100_i64))
///     .order_by(OrderBy::asc("id"))
///     .all(&conn)?;
/// ```
#[macro_export]
macro_rules! select {
    ($entity:expr) => {
        $crate::Select::new($entity)
    };
}
