//! In-process reference driver for LinkModel Rust.
//!
//! `linkmodel-memory` implements the `Connection` contract over plain
//! in-memory tables. It evaluates `Expr` predicates with SQL null semantics,
//! supports snapshot transactions, and exposes operation counters and
//! fault injection so callers can observe exactly what was written.
//!
//! # Example
//!
//! ```ignore
//! let conn = MemoryConnection::new();
//! let mut post = Record::new(&POST).with("title", "hello")?;
//! conn.save(&mut post)?;
//! assert_eq!(conn.stats().inserts, 1);
//! ```

pub mod connection;
mod eval;

pub use connection::{MemoryConnection, MemoryStats, MemoryTransaction};
