//! Predicate expressions for query building.
//!
//! `Expr` is a small, dialect-neutral predicate tree: column references,
//! literals, comparisons, boolean connectives, `IN` and `IS NULL`. Stores
//! interpret it directly; [`Expr::build`] renders a parameterized text form
//! for diagnostics.

use linkmodel_core::Value;

/// A predicate or operand expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Attribute reference with optional entity qualifier
    Column {
        /// Optional entity name
        table: Option<String>,
        /// Attribute name
        name: String,
    },

    /// Literal value
    Literal(Value),

    /// Binary operation (e.g., a = b, a > b, a AND b)
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// Unary operation (NOT a)
    Unary { op: UnaryOp, expr: Box<Expr> },

    /// IN expression
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Operator spelling in rendered queries.
    pub const fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }

    /// Whether this is a comparison (as opposed to a connective).
    pub const fn is_comparison(self) -> bool {
        !matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

impl Expr {
    // ==================== Constructors ====================

    /// Create a column reference expression.
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column {
            table: None,
            name: name.into(),
        }
    }

    /// Create a qualified column reference (entity.attribute).
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Column {
            table: Some(table.into()),
            name: column.into(),
        }
    }

    /// Create a literal value expression.
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// AND together a list of predicates; `None` for an empty list.
    ///
    /// The tree is balanced, so its depth grows with the log of the length.
    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        Self::balanced(exprs.into_iter().collect(), |l, r| l.and(r))
    }

    /// OR together a list of predicates; `None` for an empty list.
    ///
    /// The tree is balanced, so its depth grows with the log of the length.
    pub fn any(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        Self::balanced(exprs.into_iter().collect(), |l, r| l.or(r))
    }

    fn balanced(mut level: Vec<Expr>, join: fn(Expr, Expr) -> Expr) -> Option<Expr> {
        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            let mut items = level.into_iter();
            while let Some(left) = items.next() {
                next.push(match items.next() {
                    Some(right) => join(left, right),
                    None => left,
                });
            }
            level = next;
        }
        level.pop()
    }

    /// Conjunction of `attribute = value` for every pair.
    pub fn matching<'a>(pairs: impl IntoIterator<Item = (&'a str, Value)>) -> Option<Expr> {
        Self::all(
            pairs
                .into_iter()
                .map(|(name, value)| Expr::col(name).eq(value)),
        )
    }

    fn binary(self, op: BinaryOp, other: impl Into<Expr>) -> Self {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(other.into()),
        }
    }

    // ==================== Comparison Operators ====================

    /// Equal to (=)
    pub fn eq(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, other)
    }

    /// Not equal to (<>)
    pub fn ne(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ne, other)
    }

    /// Less than (<)
    pub fn lt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lt, other)
    }

    /// Less than or equal to (<=)
    pub fn le(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Le, other)
    }

    /// Greater than (>)
    pub fn gt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, other)
    }

    /// Greater than or equal to (>=)
    pub fn ge(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ge, other)
    }

    // ==================== Logical Operators ====================

    /// Logical AND
    pub fn and(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, other)
    }

    /// Logical OR
    pub fn or(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, other)
    }

    /// Logical NOT
    pub fn not(self) -> Self {
        Expr::Unary {
            op: UnaryOp::Not,
            expr: Box::new(self),
        }
    }

    // ==================== Membership / Null Checks ====================

    /// IN (list)
    pub fn in_list(self, values: Vec<impl Into<Expr>>) -> Self {
        Expr::In {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    /// NOT IN (list)
    pub fn not_in_list(self, values: Vec<impl Into<Expr>>) -> Self {
        Expr::In {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    /// IS NULL
    pub fn is_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    /// IS NOT NULL
    pub fn is_not_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    // ==================== Rendering ====================

    /// Render with `?` placeholders, collecting literal parameters.
    pub fn build(&self, params: &mut Vec<Value>) -> String {
        match self {
            Expr::Column { table, name } => match table {
                Some(t) => format!("{t}.{name}"),
                None => name.clone(),
            },
            Expr::Literal(value) => {
                params.push(value.clone());
                "?".to_string()
            }
            Expr::Binary { left, op, right } => {
                let left_sql = left.build(params);
                let right_sql = right.build(params);
                if op.is_comparison() {
                    format!("{left_sql} {} {right_sql}", op.as_str())
                } else {
                    format!("({left_sql} {} {right_sql})", op.as_str())
                }
            }
            Expr::Unary { op, expr } => {
                let expr_sql = expr.build(params);
                match op {
                    UnaryOp::Not => format!("NOT ({expr_sql})"),
                }
            }
            Expr::In {
                expr,
                values,
                negated,
            } => {
                let expr_sql = expr.build(params);
                let items: Vec<String> = values.iter().map(|v| v.build(params)).collect();
                let keyword = if *negated { "NOT IN" } else { "IN" };
                format!("{expr_sql} {keyword} ({})", items.join(", "))
            }
            Expr::IsNull { expr, negated } => {
                let expr_sql = expr.build(params);
                if *negated {
                    format!("{expr_sql} IS NOT NULL")
                } else {
                    format!("{expr_sql} IS NULL")
                }
            }
        }
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

impl From<&Value> for Expr {
    fn from(v: &Value) -> Self {
        Expr::Literal(v.clone())
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Literal(Value::Text(s.to_string()))
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Literal(Value::Text(s))
    }
}

impl From<i32> for Expr {
    fn from(v: i32) -> Self {
        Expr::Literal(Value::Int(v))
    }
}

impl From<i64> for Expr {
    fn from(v: i64) -> Self {
        Expr::Literal(Value::BigInt(v))
    }
}

impl From<bool> for Expr {
    fn from(v: bool) -> Self {
        Expr::Literal(Value::Bool(v))
    }
}
