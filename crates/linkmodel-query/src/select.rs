//! SELECT query description.

use crate::clause::{Limit, Offset, OrderBy, Where};
use crate::connection::Executor;
use crate::expr::Expr;
use linkmodel_core::{EntityInfo, Record, Result, Value};
use std::fmt;

/// A SELECT over one entity.
///
/// `Select` only describes the query; an [`Executor`] runs it. Cloning is
/// cheap enough to derive per-batch queries from a base query.
#[derive(Debug, Clone)]
pub struct Select {
    /// Entity being selected
    entity: &'static EntityInfo,
    /// WHERE clause conditions
    where_clause: Option<Where>,
    /// ORDER BY clauses
    order_by: Vec<OrderBy>,
    /// LIMIT clause
    limit: Option<Limit>,
    /// OFFSET clause
    offset: Option<Offset>,
}

impl Select {
    /// Create a new SELECT over all rows of `entity`.
    pub fn new(entity: &'static EntityInfo) -> Self {
        Self {
            entity,
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Add a WHERE condition (AND with existing conditions).
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(expr),
            None => Where::new(expr),
        });
        self
    }

    /// Add an OR WHERE condition.
    pub fn or_filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.or(expr),
            None => Where::new(expr),
        });
        self
    }

    /// Add ORDER BY clause.
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Set LIMIT.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(Limit(n));
        self
    }

    /// Set OFFSET.
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(Offset(n));
        self
    }

    /// Remove any LIMIT.
    pub fn clear_limit(mut self) -> Self {
        self.limit = None;
        self
    }

    /// Remove any OFFSET.
    pub fn clear_offset(mut self) -> Self {
        self.offset = None;
        self
    }

    pub fn entity(&self) -> &'static EntityInfo {
        self.entity
    }

    pub fn where_clause(&self) -> Option<&Where> {
        self.where_clause.as_ref()
    }

    pub fn order_terms(&self) -> &[OrderBy] {
        &self.order_by
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit.map(|Limit(n)| n)
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.offset.map(|Offset(n)| n)
    }

    /// Render the query text and its parameters.
    pub fn build(&self) -> (String, Vec<Value>) {
        let mut sql = format!("SELECT * FROM {}", self.entity.name);
        let mut params = Vec::new();

        if let Some(where_clause) = &self.where_clause {
            let (where_sql, where_params) = where_clause.build();
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params.extend(where_params);
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let terms: Vec<String> = self.order_by.iter().map(OrderBy::to_sql).collect();
            sql.push_str(&terms.join(", "));
        }

        if let Some(Limit(n)) = self.limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }

        if let Some(Offset(n)) = self.offset {
            sql.push_str(&format!(" OFFSET {n}"));
        }

        (sql, params)
    }

    // ==================== Execution ====================

    /// Fetch every matching record.
    pub fn all<E: Executor + ?Sized>(&self, exec: &E) -> Result<Vec<Record>> {
        exec.all(self)
    }

    /// Fetch the first matching record, if any.
    pub fn first<E: Executor + ?Sized>(&self, exec: &E) -> Result<Option<Record>> {
        let query = self.clone().limit(1);
        Ok(exec.all(&query)?.into_iter().next())
    }

    /// Count matching records.
    pub fn count<E: Executor + ?Sized>(&self, exec: &E) -> Result<u64> {
        exec.count(self)
    }

    /// Fetch one attribute of every matching record.
    pub fn column<E: Executor + ?Sized>(&self, exec: &E, attribute: &str) -> Result<Vec<Value>> {
        exec.column(self, attribute)
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sql, params) = self.build();
        if params.is_empty() {
            write!(f, "{sql}")
        } else {
            write!(f, "{sql} {params:?}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static POST: EntityInfo = EntityInfo::new("post", &["id"], &["id", "title", "views"]);

    #[test]
    fn filters_combine_with_and() {
        let query = Select::new(&POST)
            .filter(Expr::col("views").gt(10_i64))
            .filter(Expr::col("title").is_not_null());
        let (sql, params) = query.build();
        assert_eq!(
            sql,
            "SELECT * FROM post WHERE (views > ? AND title IS NOT NULL)"
        );
        assert_eq!(params, vec![Value::BigInt(10)]);
    }

    #[test]
    fn order_limit_offset_render() {
        let query = Select::new(&POST)
            .order_by(OrderBy::asc("id"))
            .order_by(OrderBy::desc("views"))
            .limit(10)
            .offset(20);
        assert_eq!(
            query.build().0,
            "SELECT * FROM post ORDER BY id ASC, views DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(query.limit_value(), Some(10));
        assert_eq!(query.offset_value(), Some(20));
        assert_eq!(query.clear_limit().clear_offset().limit_value(), None);
    }

    #[test]
    fn display_includes_params() {
        let query = Select::new(&POST).or_filter(Expr::col("id").eq(3_i64));
        assert_eq!(
            query.to_string(),
            "SELECT * FROM post WHERE id = ? [BigInt(3)]"
        );
        assert_eq!(query.entity().name, "post");
    }
}
