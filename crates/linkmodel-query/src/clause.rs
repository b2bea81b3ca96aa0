//! Query clause types (WHERE, ORDER BY, LIMIT, OFFSET).

use crate::expr::Expr;
use linkmodel_core::Value;

/// WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Where {
    expr: Expr,
}

impl Where {
    /// Create a new WHERE clause with the given expression.
    pub fn new(expr: Expr) -> Self {
        Self { expr }
    }

    /// Add an AND condition.
    pub fn and(self, expr: Expr) -> Self {
        Self {
            expr: self.expr.and(expr),
        }
    }

    /// Add an OR condition.
    pub fn or(self, expr: Expr) -> Self {
        Self {
            expr: self.expr.or(expr),
        }
    }

    /// The predicate tree.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Render the WHERE predicate and its parameters.
    pub fn build(&self) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = self.expr.build(&mut params);
        (sql, params)
    }
}

/// ORDER BY clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    column: String,
    direction: OrderDirection,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderBy {
    /// Create an ascending order by clause.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order by clause.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Desc,
        }
    }

    /// The attribute being ordered on.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// The sort direction.
    pub fn direction(&self) -> OrderDirection {
        self.direction
    }

    /// Render this ORDER BY term.
    pub fn to_sql(&self) -> String {
        let suffix = match self.direction {
            OrderDirection::Asc => " ASC",
            OrderDirection::Desc => " DESC",
        };
        format!("{}{}", self.column, suffix)
    }
}

/// LIMIT clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(pub u64);

/// OFFSET clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset(pub u64);
