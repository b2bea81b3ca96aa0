//! In-memory connection implementing the `linkmodel_query` contract.
//!
//! Records are kept per entity in insertion order behind a mutex. A
//! transaction snapshots every table on begin; rollback restores the
//! snapshot and commit discards it.

use crate::eval;
use linkmodel_core::{
    Entity, EntityInfo, Error, PersistenceError, PersistenceOp, QueryError, QueryErrorKind,
    Record, Result, TransactionError, TransactionErrorKind, Value,
};
use linkmodel_query::{Connection, Executor, IsolationLevel, Select, TransactionOps};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Operation counters, for asserting what a caller did to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub queries: u64,
    pub begins: u64,
    pub commits: u64,
    pub rollbacks: u64,
}

#[derive(Debug, Clone, Default)]
struct Table {
    rows: Vec<Record>,
    /// Highest integer key handed out or seen.
    last_id: i64,
}

#[derive(Debug, Default)]
struct Faults {
    saves: HashSet<String>,
    deletes: HashSet<String>,
    /// Queries still allowed to succeed; `None` means unlimited.
    queries_left: Option<u64>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    tables: HashMap<&'static str, Table>,
    snapshot: Option<HashMap<&'static str, Table>>,
    stats: MemoryStats,
    faults: Faults,
}

/// An in-process store.
///
/// Implements [`Connection`] so the session layer can run against it
/// exactly as against a database driver.
#[derive(Debug, Default)]
pub struct MemoryConnection {
    inner: Mutex<MemoryInner>,
}

impl MemoryConnection {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every stored record of `entity`, in insertion order.
    pub fn rows(&self, entity: &EntityInfo) -> Vec<Record> {
        self.lock()
            .tables
            .get(entity.name)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Number of stored records of `entity`.
    pub fn len(&self, entity: &EntityInfo) -> usize {
        self.lock().tables.get(entity.name).map_or(0, |t| t.rows.len())
    }

    /// Whether no records of `entity` are stored.
    pub fn is_empty(&self, entity: &EntityInfo) -> bool {
        self.len(entity) == 0
    }

    /// Operation counters so far.
    pub fn stats(&self) -> MemoryStats {
        self.lock().stats
    }

    /// Zero the operation counters.
    pub fn reset_stats(&self) {
        self.lock().stats = MemoryStats::default();
    }

    /// Whether a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.lock().snapshot.is_some()
    }

    /// Make every save of `entity` fail.
    pub fn fail_saves_for(&self, entity: &str) {
        self.lock().faults.saves.insert(entity.to_string());
    }

    /// Make every delete of `entity` fail.
    pub fn fail_deletes_for(&self, entity: &str) {
        self.lock().faults.deletes.insert(entity.to_string());
    }

    /// Let `n` more queries succeed, then fail every query.
    pub fn fail_queries_after(&self, n: u64) {
        self.lock().faults.queries_left = Some(n);
    }

    /// Remove all injected failures.
    pub fn clear_faults(&self) {
        self.lock().faults = Faults::default();
    }

    fn run_query(&self, select: &Select) -> Result<Vec<Record>> {
        let mut inner = self.lock();

        if let Some(left) = inner.faults.queries_left.as_mut() {
            if *left == 0 {
                return Err(query_error(
                    QueryErrorKind::Database,
                    select,
                    "injected query failure",
                ));
            }
            *left -= 1;
        }
        inner.stats.queries += 1;
        tracing::trace!(query = %select, "Executing query");

        let Some(table) = inner.tables.get(select.entity().name) else {
            return Ok(Vec::new());
        };

        let filter = select.where_clause().map(|clause| eval::Filter::new(clause.expr()));
        let mut rows = Vec::new();
        for record in &table.rows {
            let keep = match &filter {
                Some(filter) => filter.matches(record).map_err(|e| match e {
                    Error::Query(mut q) => {
                        q.query = Some(select.to_string());
                        Error::Query(q)
                    }
                    other => other,
                })?,
                None => true,
            };
            if keep {
                rows.push(record.clone());
            }
        }

        if !select.order_terms().is_empty() {
            rows.sort_by(|a, b| eval::order(select.order_terms(), a, b));
        }

        let offset = usize::try_from(select.offset_value().unwrap_or(0)).unwrap_or(usize::MAX);
        let rows = rows.into_iter().skip(offset);
        Ok(match select.limit_value() {
            Some(limit) => rows
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect(),
            None => rows.collect(),
        })
    }

    fn begin_sync(&self, isolation: IsolationLevel) -> Result<()> {
        let mut inner = self.lock();
        if inner.snapshot.is_some() {
            return Err(transaction_error(
                TransactionErrorKind::NestedNotSupported,
                "a transaction is already open on this connection",
            ));
        }
        inner.snapshot = Some(inner.tables.clone());
        inner.stats.begins += 1;
        tracing::debug!(isolation = isolation.as_sql(), "BEGIN");
        Ok(())
    }

    fn commit_sync(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.snapshot.take().is_none() {
            return Err(transaction_error(
                TransactionErrorKind::NotActive,
                "no transaction to commit",
            ));
        }
        inner.stats.commits += 1;
        tracing::debug!("COMMIT");
        Ok(())
    }

    fn rollback_sync(&self) -> Result<()> {
        let mut inner = self.lock();
        let Some(snapshot) = inner.snapshot.take() else {
            return Err(transaction_error(
                TransactionErrorKind::NotActive,
                "no transaction to roll back",
            ));
        };
        inner.tables = snapshot;
        inner.stats.rollbacks += 1;
        tracing::debug!("ROLLBACK");
        Ok(())
    }
}

impl Executor for MemoryConnection {
    fn all(&self, select: &Select) -> Result<Vec<Record>> {
        self.run_query(select)
    }

    fn count(&self, select: &Select) -> Result<u64> {
        let rows = self.run_query(select)?;
        Ok(rows.len() as u64)
    }

    fn save(&self, record: &mut Record) -> Result<()> {
        let info = record.entity_info();
        let mut guard = self.lock();
        let inner = &mut *guard;

        if inner.faults.saves.contains(info.name) {
            return Err(persistence_error(
                PersistenceOp::Save,
                info.name,
                "injected save failure",
            ));
        }

        let table = inner.tables.entry(info.name).or_default();

        if !info.primary_key.is_empty() {
            let key = record.primary_key_value();
            if key.iter().any(Value::is_null) {
                match info.simple_key() {
                    Some(pk) if info.auto_increment => {
                        table.last_id += 1;
                        record.set_attribute(pk, Value::BigInt(table.last_id))?;
                    }
                    _ => {
                        return Err(persistence_error(
                            PersistenceOp::Save,
                            info.name,
                            "primary key is NULL",
                        ));
                    }
                }
            } else if let Some(existing) = table
                .rows
                .iter_mut()
                .find(|row| has_key(row, info.primary_key, &key))
            {
                *existing = record.clone();
                inner.stats.updates += 1;
                tracing::trace!(entity = info.name, "Updated record");
                return Ok(());
            } else if let (Some(_), Some(id)) =
                (info.simple_key(), key.first().and_then(Value::as_i64))
            {
                table.last_id = table.last_id.max(id);
            }
        }

        table.rows.push(record.clone());
        inner.stats.inserts += 1;
        tracing::trace!(entity = info.name, "Inserted record");
        Ok(())
    }

    fn delete(&self, record: &Record) -> Result<()> {
        let info = record.entity_info();
        let mut inner = self.lock();

        if inner.faults.deletes.contains(info.name) {
            return Err(persistence_error(
                PersistenceOp::Delete,
                info.name,
                "injected delete failure",
            ));
        }

        let position = inner.tables.get(info.name).and_then(|table| {
            if info.primary_key.is_empty() {
                table.rows.iter().position(|row| {
                    row.values()
                        .iter()
                        .zip(record.values())
                        .all(|(a, b)| a.same_as(b))
                })
            } else {
                let key = record.primary_key_value();
                table
                    .rows
                    .iter()
                    .position(|row| has_key(row, info.primary_key, &key))
            }
        });

        let Some(position) = position else {
            return Err(persistence_error(
                PersistenceOp::Delete,
                info.name,
                "no stored row matches the record",
            ));
        };

        if let Some(table) = inner.tables.get_mut(info.name) {
            table.rows.remove(position);
        }
        inner.stats.deletes += 1;
        tracing::trace!(entity = info.name, "Deleted record");
        Ok(())
    }
}

impl Connection for MemoryConnection {
    type Tx<'conn> = MemoryTransaction<'conn>;

    fn begin_with(&self, isolation: IsolationLevel) -> Result<Self::Tx<'_>> {
        self.begin_sync(isolation)?;
        Ok(MemoryTransaction::new(self))
    }
}

// ── Transaction ───────────────────────────────────────────────────────────

/// A transaction on a [`MemoryConnection`].
///
/// Dropped without commit or rollback, it rolls back.
#[derive(Debug)]
pub struct MemoryTransaction<'conn> {
    conn: &'conn MemoryConnection,
    finished: bool,
}

impl<'conn> MemoryTransaction<'conn> {
    fn new(conn: &'conn MemoryConnection) -> Self {
        Self {
            conn,
            finished: false,
        }
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(err) = self.conn.rollback_sync() {
                tracing::warn!(error = %err, "Rollback of dropped transaction failed");
            }
        }
    }
}

impl Executor for MemoryTransaction<'_> {
    fn all(&self, select: &Select) -> Result<Vec<Record>> {
        self.conn.all(select)
    }

    fn count(&self, select: &Select) -> Result<u64> {
        self.conn.count(select)
    }

    fn save(&self, record: &mut Record) -> Result<()> {
        self.conn.save(record)
    }

    fn delete(&self, record: &Record) -> Result<()> {
        self.conn.delete(record)
    }
}

impl TransactionOps for MemoryTransaction<'_> {
    fn commit(mut self) -> Result<()> {
        self.finished = true;
        self.conn.commit_sync()
    }

    fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.conn.rollback_sync()
    }
}

fn has_key(row: &Record, attributes: &[&str], key: &[Value]) -> bool {
    attributes
        .iter()
        .zip(key)
        .all(|(name, value)| row.get(name).is_some_and(|stored| stored.same_as(value)))
}

fn query_error(kind: QueryErrorKind, select: &Select, message: &str) -> Error {
    Error::Query(QueryError {
        kind,
        query: Some(select.to_string()),
        message: message.to_string(),
    })
}

fn persistence_error(op: PersistenceOp, entity: &str, message: &str) -> Error {
    Error::Persistence(PersistenceError {
        op,
        entity: entity.to_string(),
        message: message.to_string(),
        source: None,
    })
}

fn transaction_error(kind: TransactionErrorKind, message: &str) -> Error {
    Error::Transaction(TransactionError {
        kind,
        message: message.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkmodel_query::{Expr, OrderBy};

    static ITEM: EntityInfo =
        EntityInfo::new("item", &["id"], &["id", "name"]).auto_increment(true);
    static PAIR: EntityInfo = EntityInfo::new("pair", &[], &["a", "b"]);

    fn item(name: &str) -> Record {
        Record::new(&ITEM).with("name", name).expect("valid item")
    }

    #[test]
    fn save_assigns_auto_increment_keys() {
        let conn = MemoryConnection::new();
        let mut first = item("a");
        let mut second = item("b");
        conn.save(&mut first).unwrap();
        conn.save(&mut second).unwrap();
        assert_eq!(first.get("id"), Some(&Value::BigInt(1)));
        assert_eq!(second.get("id"), Some(&Value::BigInt(2)));
        assert_eq!(conn.stats().inserts, 2);
    }

    #[test]
    fn save_with_existing_key_updates() {
        let conn = MemoryConnection::new();
        let mut record = item("a");
        conn.save(&mut record).unwrap();
        let mut renamed = record.clone().with("name", "z").unwrap();
        conn.save(&mut renamed).unwrap();
        let rows = conn.rows(&ITEM);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::from("z")));
        assert_eq!(conn.stats().updates, 1);
    }

    #[test]
    fn null_key_without_auto_increment_is_rejected() {
        static FIXED: EntityInfo = EntityInfo::new("fixed", &["code"], &["code"]);
        let conn = MemoryConnection::new();
        let err = conn.save(&mut Record::new(&FIXED)).unwrap_err();
        assert!(err.is_persistence());
    }

    #[test]
    fn keyless_entities_keep_duplicates() {
        let conn = MemoryConnection::new();
        let pair = Record::from_pairs(&PAIR, [("a", 1_i64), ("b", 2_i64)]).unwrap();
        conn.save(&mut pair.clone()).unwrap();
        conn.save(&mut pair.clone()).unwrap();
        assert_eq!(conn.len(&PAIR), 2);
        conn.delete(&pair).unwrap();
        assert_eq!(conn.len(&PAIR), 1);
        conn.delete(&pair).unwrap();
        assert!(conn.delete(&pair).unwrap_err().is_persistence());
    }

    #[test]
    fn query_filters_orders_and_pages() {
        let conn = MemoryConnection::new();
        for name in ["d", "b", "a", "c"] {
            conn.save(&mut item(name)).unwrap();
        }
        let query = Select::new(&ITEM)
            .filter(Expr::col("name").ne("c"))
            .order_by(OrderBy::asc("name"))
            .offset(1)
            .limit(5);
        let names: Vec<Value> = conn.column(&query, "name").unwrap();
        assert_eq!(names, vec![Value::from("b"), Value::from("d")]);
        assert_eq!(conn.count(&query).unwrap(), 2);
        assert_eq!(conn.count(&Select::new(&ITEM)).unwrap(), 4);
    }

    #[test]
    fn rollback_restores_snapshot() {
        let conn = MemoryConnection::new();
        conn.save(&mut item("kept")).unwrap();

        let tx = conn.begin().unwrap();
        tx.save(&mut item("discarded")).unwrap();
        assert_eq!(conn.len(&ITEM), 2);
        tx.rollback().unwrap();

        assert_eq!(conn.len(&ITEM), 1);
        assert!(!conn.in_transaction());
        assert_eq!(conn.stats().rollbacks, 1);
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let conn = MemoryConnection::new();
        {
            let tx = conn.begin().unwrap();
            tx.save(&mut item("gone")).unwrap();
        }
        assert!(conn.is_empty(&ITEM));
        assert_eq!(conn.stats().rollbacks, 1);
    }

    #[test]
    fn failed_rollback_on_drop_is_logged_not_raised() {
        let conn = MemoryConnection::new();
        {
            let tx = conn.begin().unwrap();
            tx.save(&mut item("kept out")).unwrap();
            // End the transaction underneath the handle.
            conn.rollback_sync().unwrap();
        }
        assert!(!conn.in_transaction());
        assert!(conn.is_empty(&ITEM));
        assert_eq!(conn.stats().rollbacks, 1);
    }

    #[test]
    fn commit_keeps_changes_and_nesting_fails() {
        let conn = MemoryConnection::new();
        let tx = conn.begin().unwrap();
        let err = conn.begin().unwrap_err();
        assert!(matches!(
            err,
            Error::Transaction(TransactionError {
                kind: TransactionErrorKind::NestedNotSupported,
                ..
            })
        ));
        tx.save(&mut item("x")).unwrap();
        tx.commit().unwrap();
        assert_eq!(conn.len(&ITEM), 1);
        assert_eq!(conn.stats().commits, 1);
    }

    #[test]
    fn injected_faults() {
        let conn = MemoryConnection::new();
        conn.fail_saves_for("item");
        assert!(conn.save(&mut item("x")).unwrap_err().is_persistence());
        conn.clear_faults();
        conn.save(&mut item("x")).unwrap();

        conn.fail_queries_after(1);
        assert!(conn.all(&Select::new(&ITEM)).is_ok());
        assert!(conn.all(&Select::new(&ITEM)).is_err());
    }
}
