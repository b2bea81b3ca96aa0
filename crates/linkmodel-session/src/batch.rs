//! Batched iteration over large query results.
//!
//! [`BatchCursor`] walks a query's result in fixed-size batches inside a
//! read-only transaction, so memory stays bounded and every batch sees the
//! same snapshot. The transaction is always rolled back, never committed,
//! whether iteration completes, is abandoned, or fails.
//!
//! Two traversal modes:
//!
//! - **Keyset**: the entity has a single-column key and the query has no
//!   explicit ordering or limit. Each batch orders by the key and resumes
//!   after the last key yielded, so rows come out in strictly ascending key
//!   order and gaps in the key space do not matter.
//! - **Offset**: everything else. Batch `i` reads `batch_size` rows at offset
//!   `batch_size * (i - 1)`. Correct only while the underlying rows do not
//!   change during iteration.

use linkmodel_core::{Error, Record, Result, Value};
use linkmodel_query::{Connection, Executor, Expr, OrderBy, Select, TransactionOps};
use std::collections::VecDeque;

/// Default number of rows fetched per batch.
pub const DEFAULT_BATCH_SIZE: u64 = 100;

/// How a cursor advances between batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// Resume after the last key seen.
    Keyset {
        /// The entity's single key attribute.
        key: &'static str,
    },
    /// Page with LIMIT/OFFSET.
    Offset,
}

/// A reusable description of a batched traversal.
#[derive(Debug, Clone)]
pub struct BatchCursor {
    query: Select,
    batch_size: u64,
}

impl BatchCursor {
    /// Traverse `query` with the default batch size.
    pub fn new(query: Select) -> Self {
        Self {
            query,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the number of rows fetched per batch. Zero is rejected when
    /// iteration starts.
    #[must_use]
    pub fn batch_size(mut self, size: u64) -> Self {
        self.batch_size = size;
        self
    }

    pub fn query(&self) -> &Select {
        &self.query
    }

    pub fn size(&self) -> u64 {
        self.batch_size
    }

    /// The traversal mode this cursor will use.
    pub fn mode(&self) -> BatchMode {
        match self.query.entity().simple_key() {
            Some(key)
                if self.query.order_terms().is_empty() && self.query.limit_value().is_none() =>
            {
                BatchMode::Keyset { key }
            }
            _ => BatchMode::Offset,
        }
    }

    /// Open the snapshot transaction and start iterating.
    ///
    /// The batch count is computed once, here, from the snapshot.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = self.query.entity().name, batch_size = self.batch_size))]
    pub fn iterate<'c, C: Connection>(&self, conn: &'c C) -> Result<BatchIter<'c, C>> {
        if self.batch_size == 0 {
            return Err(Error::config("batch size must be at least 1"));
        }

        let tx = conn.begin()?;
        let count = match tx.count(&self.query) {
            Ok(count) => count,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!(error = %rollback_err, "Cursor rollback failed");
                }
                return Err(err);
            }
        };

        let mode = self.mode();
        let total_batches = count.div_ceil(self.batch_size);
        tracing::debug!(rows = count, total_batches, ?mode, "Batch cursor opened");

        Ok(BatchIter {
            tx: Some(tx),
            query: self.query.clone(),
            batch_size: self.batch_size,
            mode,
            total_batches,
            fetched: 0,
            buffer: VecDeque::new(),
            last_key: None,
            done: false,
        })
    }
}

/// A single-use iterator over the rows of a [`BatchCursor`].
///
/// Yields `Err` at most once, after which it is exhausted. Dropping it at
/// any point rolls the snapshot transaction back.
pub struct BatchIter<'c, C: Connection + 'c> {
    tx: Option<C::Tx<'c>>,
    query: Select,
    batch_size: u64,
    mode: BatchMode,
    total_batches: u64,
    fetched: u64,
    buffer: VecDeque<Record>,
    last_key: Option<Value>,
    done: bool,
}

impl<'c, C: Connection + 'c> BatchIter<'c, C> {
    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    /// Number of batches computed when iteration started.
    pub fn total_batches(&self) -> u64 {
        self.total_batches
    }

    /// Number of batches fetched so far.
    pub fn batches_fetched(&self) -> u64 {
        self.fetched
    }

    /// Whether the snapshot transaction is still open.
    pub fn is_open(&self) -> bool {
        self.tx.is_some()
    }

    fn batch_query(&self) -> Select {
        let index = self.fetched;
        match self.mode {
            BatchMode::Keyset { key } => {
                let mut query = self
                    .query
                    .clone()
                    .order_by(OrderBy::asc(key))
                    .limit(self.batch_size);
                if let Some(last) = &self.last_key {
                    // The base offset only applies before the first key.
                    query = query
                        .clear_offset()
                        .filter(Expr::qualified(self.query.entity().name, key).gt(last));
                }
                query
            }
            BatchMode::Offset => {
                let skipped = self.batch_size.saturating_mul(index);
                let base_offset = self.query.offset_value().unwrap_or(0);
                let limit = match self.query.limit_value() {
                    Some(base_limit) => self.batch_size.min(base_limit.saturating_sub(skipped)),
                    None => self.batch_size,
                };
                let query = self.query.clone().limit(limit);
                match base_offset.saturating_add(skipped) {
                    0 => query.clear_offset(),
                    offset => query.offset(offset),
                }
            }
        }
    }

    fn fetch(&mut self) -> Result<Vec<Record>> {
        let query = self.batch_query();
        tracing::debug!(batch = self.fetched + 1, query = %query, "Fetching batch");
        let Some(tx) = self.tx.as_ref() else {
            return Ok(Vec::new());
        };
        tx.all(&query)
    }

    fn finish(&mut self) {
        self.done = true;
        self.buffer.clear();
        if let Some(tx) = self.tx.take() {
            match tx.rollback() {
                Ok(()) => tracing::debug!(batches = self.fetched, "Batch cursor closed"),
                Err(err) => tracing::warn!(error = %err, "Cursor rollback failed"),
            }
        }
    }
}

impl<'c, C: Connection + 'c> Iterator for BatchIter<'c, C> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            if let Some(record) = self.buffer.pop_front() {
                if let BatchMode::Keyset { key } = self.mode {
                    if let Some(value) = record.get(key).filter(|v| !v.is_null()) {
                        tracing::trace!(key = ?value, "Keyset advanced");
                        self.last_key = Some(value.clone());
                    }
                }
                return Some(Ok(record));
            }

            if self.fetched >= self.total_batches {
                self.finish();
                return None;
            }

            match self.fetch() {
                Ok(rows) => {
                    self.fetched += 1;
                    if rows.is_empty() {
                        self.finish();
                        return None;
                    }
                    self.buffer.extend(rows);
                }
                Err(err) => {
                    self.finish();
                    return Some(Err(err));
                }
            }
        }
    }
}

impl<'c, C: Connection + 'c> Drop for BatchIter<'c, C> {
    fn drop(&mut self) {
        self.finish();
    }
}
