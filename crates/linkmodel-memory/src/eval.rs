//! Predicate evaluation over in-memory records.
//!
//! Evaluation follows SQL three-valued logic: a comparison involving NULL is
//! unknown (`None`), `AND`/`OR` combine unknowns the Kleene way, and a row
//! matches only when its predicate is definitely true.

use linkmodel_core::{Error, QueryError, QueryErrorKind, Record, Result, Value, ValueKey};
use linkmodel_query::{BinaryOp, Expr, OrderBy, OrderDirection, UnaryOp};
use std::cmp::Ordering;
use std::collections::HashSet;

/// A WHERE predicate prepared once per query and applied to every row.
///
/// `IN` lists of integer or text literals are indexed by [`ValueKey`], so a
/// membership test costs one hash lookup instead of a scan of the list.
pub(crate) struct Filter<'e> {
    root: Node<'e>,
}

enum Node<'e> {
    And(Box<Node<'e>>, Box<Node<'e>>),
    Or(Box<Node<'e>>, Box<Node<'e>>),
    Not(Box<Node<'e>>),
    Compare(BinaryOp, Operand<'e>, Operand<'e>),
    In {
        needle: Operand<'e>,
        /// Keys of the integer and text literals.
        indexed: HashSet<ValueKey>,
        /// Candidates not in `indexed`, compared one by one.
        rest: Vec<Operand<'e>>,
        /// Every candidate, for needles that cannot be looked up by key.
        all: Vec<Operand<'e>>,
        negated: bool,
    },
    IsNull(Operand<'e>, bool),
    Truthy(Operand<'e>),
}

enum Operand<'e> {
    Column(&'e str),
    Literal(&'e Value),
    Predicate(Box<Node<'e>>),
}

impl<'e> Filter<'e> {
    pub(crate) fn new(expr: &'e Expr) -> Self {
        Self {
            root: Node::prepare(expr),
        }
    }

    /// Whether `record` satisfies the predicate.
    pub(crate) fn matches(&self, record: &Record) -> Result<bool> {
        Ok(self.root.truth(record)? == Some(true))
    }
}

/// Integer and text values compare equal exactly when their keys do.
fn indexable(value: &Value) -> bool {
    matches!(
        value,
        Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) | Value::Text(_)
    )
}

impl<'e> Node<'e> {
    fn prepare(expr: &'e Expr) -> Self {
        match expr {
            Expr::Binary { left, op, right } => match op {
                BinaryOp::And => Node::And(
                    Box::new(Node::prepare(left)),
                    Box::new(Node::prepare(right)),
                ),
                BinaryOp::Or => Node::Or(
                    Box::new(Node::prepare(left)),
                    Box::new(Node::prepare(right)),
                ),
                cmp => Node::Compare(*cmp, Operand::prepare(left), Operand::prepare(right)),
            },
            Expr::Unary {
                op: UnaryOp::Not,
                expr,
            } => Node::Not(Box::new(Node::prepare(expr))),
            Expr::In {
                expr,
                values,
                negated,
            } => {
                let mut indexed = HashSet::new();
                let mut rest = Vec::new();
                for value in values {
                    match value {
                        Expr::Literal(v) if indexable(v) => {
                            indexed.insert(v.key());
                        }
                        other => rest.push(Operand::prepare(other)),
                    }
                }
                Node::In {
                    needle: Operand::prepare(expr),
                    indexed,
                    rest,
                    all: values.iter().map(Operand::prepare).collect(),
                    negated: *negated,
                }
            }
            Expr::IsNull { expr, negated } => Node::IsNull(Operand::prepare(expr), *negated),
            Expr::Column { .. } | Expr::Literal(_) => Node::Truthy(Operand::prepare(expr)),
        }
    }

    fn truth(&self, record: &Record) -> Result<Option<bool>> {
        match self {
            Node::And(left, right) => {
                let l = left.truth(record)?;
                if l == Some(false) {
                    return Ok(Some(false));
                }
                let r = right.truth(record)?;
                Ok(match (l, r) {
                    (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                })
            }
            Node::Or(left, right) => {
                let l = left.truth(record)?;
                if l == Some(true) {
                    return Ok(Some(true));
                }
                let r = right.truth(record)?;
                Ok(match (l, r) {
                    (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                })
            }
            Node::Not(inner) => Ok(inner.truth(record)?.map(|b| !b)),
            Node::Compare(op, left, right) => {
                let l = left.value(record)?;
                let r = right.value(record)?;
                Ok(compare(*op, &l, &r))
            }
            Node::In {
                needle,
                indexed,
                rest,
                all,
                negated,
            } => {
                let needle = needle.value(record)?;
                if needle.is_null() {
                    return Ok(None);
                }
                let candidates = if indexable(&needle) {
                    if indexed.contains(&needle.key()) {
                        return Ok(Some(!negated));
                    }
                    rest
                } else {
                    all
                };
                let mut saw_null = false;
                for candidate in candidates {
                    let candidate = candidate.value(record)?;
                    match compare(BinaryOp::Eq, &needle, &candidate) {
                        Some(true) => return Ok(Some(!negated)),
                        None => saw_null = true,
                        Some(false) => {}
                    }
                }
                Ok(if saw_null { None } else { Some(*negated) })
            }
            Node::IsNull(operand, negated) => {
                let value = operand.value(record)?;
                Ok(Some(value.is_null() != *negated))
            }
            Node::Truthy(operand) => match operand.value(record)? {
                Value::Null => Ok(None),
                Value::Bool(b) => Ok(Some(b)),
                other => Ok(other.as_i64().map(|n| n != 0)),
            },
        }
    }
}

impl<'e> Operand<'e> {
    fn prepare(expr: &'e Expr) -> Self {
        match expr {
            // The qualifier only names the entity; records are per entity.
            Expr::Column { name, .. } => Operand::Column(name),
            Expr::Literal(value) => Operand::Literal(value),
            predicate => Operand::Predicate(Box::new(Node::prepare(predicate))),
        }
    }

    fn value(&self, record: &Record) -> Result<Value> {
        match self {
            Operand::Column(name) => record.get(name).cloned().ok_or_else(|| {
                Error::Query(QueryError {
                    kind: QueryErrorKind::NotFound,
                    query: None,
                    message: format!(
                        "no attribute '{name}' on entity '{}'",
                        record.entity_name()
                    ),
                })
            }),
            Operand::Literal(value) => Ok((*value).clone()),
            Operand::Predicate(node) => Ok(match node.truth(record)? {
                Some(b) => Value::Bool(b),
                None => Value::Null,
            }),
        }
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Option<bool> {
    if left.is_null() || right.is_null() {
        return None;
    }
    let equal = left.same_as(right) || left.compare(right) == Some(Ordering::Equal);
    match op {
        BinaryOp::Eq => Some(equal),
        BinaryOp::Ne => Some(!equal),
        BinaryOp::Lt => left.compare(right).map(Ordering::is_lt),
        BinaryOp::Le => left.compare(right).map(Ordering::is_le),
        BinaryOp::Gt => left.compare(right).map(Ordering::is_gt),
        BinaryOp::Ge => left.compare(right).map(Ordering::is_ge),
        BinaryOp::And | BinaryOp::Or => None,
    }
}

/// Ordering of two records under a list of ORDER BY terms.
///
/// NULLs sort first ascending and last descending; incomparable values
/// keep their relative order.
pub(crate) fn order(terms: &[OrderBy], a: &Record, b: &Record) -> Ordering {
    for term in terms {
        let left = a.get(term.column()).unwrap_or(&Value::Null);
        let right = b.get(term.column()).unwrap_or(&Value::Null);
        let ord = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => left.compare(right).unwrap_or(Ordering::Equal),
        };
        let ord = match term.direction() {
            OrderDirection::Asc => ord,
            OrderDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
