//! Persistence contract.
//!
//! - [`Executor`] - reads and writes against a store
//! - [`TransactionOps`] - an open transaction that must be finished explicitly
//! - [`Connection`] - a handle that can open transactions
//!
//! The handle is always passed explicitly; nothing in LinkModel reaches for
//! a global connection.

use crate::select::Select;
use linkmodel_core::{Entity, Record, Result, Value};

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Transactions can see uncommitted changes from others.
    ReadUncommitted,

    /// Transactions only see committed changes from others.
    #[default]
    ReadCommitted,

    /// Transactions see a consistent snapshot of the database.
    RepeatableRead,

    /// Transactions appear to execute sequentially.
    Serializable,
}

impl IsolationLevel {
    /// Get the SQL syntax for this isolation level.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Reads and writes against a store.
pub trait Executor {
    /// Fetch every record matching `select`.
    fn all(&self, select: &Select) -> Result<Vec<Record>>;

    /// Count records matching `select`, after its limit/offset.
    fn count(&self, select: &Select) -> Result<u64>;

    /// Fetch one attribute of every record matching `select`.
    fn column(&self, select: &Select, attribute: &str) -> Result<Vec<Value>> {
        let entity = select.entity();
        if !entity.has_attribute(attribute) {
            return Err(linkmodel_core::Error::unknown_attribute(
                entity.name,
                attribute,
            ));
        }
        Ok(self
            .all(select)?
            .into_iter()
            .map(|record| record.attribute(attribute).unwrap_or(Value::Null))
            .collect())
    }

    /// Insert or update a record.
    ///
    /// A store-assigned key is written back into `record`.
    fn save(&self, record: &mut Record) -> Result<()>;

    /// Delete a stored record.
    fn delete(&self, record: &Record) -> Result<()>;
}

impl<E: Executor + ?Sized> Executor for &E {
    fn all(&self, select: &Select) -> Result<Vec<Record>> {
        (**self).all(select)
    }

    fn count(&self, select: &Select) -> Result<u64> {
        (**self).count(select)
    }

    fn column(&self, select: &Select, attribute: &str) -> Result<Vec<Value>> {
        (**self).column(select, attribute)
    }

    fn save(&self, record: &mut Record) -> Result<()> {
        (**self).save(record)
    }

    fn delete(&self, record: &Record) -> Result<()> {
        (**self).delete(record)
    }
}

/// An open transaction.
///
/// Dropping an unfinished transaction rolls it back.
pub trait TransactionOps: Executor {
    /// Commit the transaction, making all changes permanent.
    fn commit(self) -> Result<()>;

    /// Rollback the transaction, discarding all changes.
    fn rollback(self) -> Result<()>;
}

/// A store handle that can open transactions.
pub trait Connection: Executor {
    /// The transaction type returned by this connection.
    type Tx<'conn>: TransactionOps
    where
        Self: 'conn;

    /// Begin a transaction with the default isolation level.
    fn begin(&self) -> Result<Self::Tx<'_>> {
        self.begin_with(IsolationLevel::default())
    }

    /// Begin a transaction with a specific isolation level.
    fn begin_with(&self, isolation: IsolationLevel) -> Result<Self::Tx<'_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolation_level_default() {
        assert_eq!(IsolationLevel::default(), IsolationLevel::ReadCommitted);
    }

    #[test]
    fn isolation_level_as_sql() {
        assert_eq!(IsolationLevel::ReadUncommitted.as_sql(), "READ UNCOMMITTED");
        assert_eq!(IsolationLevel::RepeatableRead.as_sql(), "REPEATABLE READ");
        assert_eq!(IsolationLevel::Serializable.as_sql(), "SERIALIZABLE");
    }
}
