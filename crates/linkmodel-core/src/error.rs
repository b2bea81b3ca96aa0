//! Error types for LinkModel operations.

use std::fmt;

/// The primary error type for all LinkModel operations.
#[derive(Debug)]
pub enum Error {
    /// Invalid static configuration, detected before any query runs
    Config(ConfigError),
    /// A relation resolved to a value of the wrong shape
    RelationShape(RelationShapeError),
    /// A save or delete failed during reconciliation
    Persistence(PersistenceError),
    /// A read against the store failed
    Query(QueryError),
    /// Transaction misuse (begin/commit/rollback)
    Transaction(TransactionError),
    /// Unknown attribute on an entity
    Attribute(AttributeError),
    /// Configuration document could not be parsed
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

#[derive(Debug)]
pub struct RelationShapeError {
    pub kind: RelationShapeErrorKind,
    /// Entity and relation the shape check ran against, e.g. `post.tags`.
    pub relation: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationShapeErrorKind {
    /// A single related entity was expected, a collection was returned
    ExpectedSingle,
    /// A collection was expected, a single entity was returned
    ExpectedCollection,
    /// An entity key needed as identifier is missing (NULL)
    MissingKey,
    /// An entity key needed as scalar identifier is composite
    CompositeKey,
    /// A desired identifier cannot be stored (NULL or collection)
    InvalidIdentifier,
}

#[derive(Debug)]
pub struct PersistenceError {
    pub op: PersistenceOp,
    pub entity: String,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceOp {
    Save,
    Delete,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    /// Description of the failing query, if available
    pub query: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Entity or attribute not known to the store
    NotFound,
    /// Other store failure
    Database,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// Already committed
    AlreadyCommitted,
    /// Already rolled back
    AlreadyRolledBack,
    /// Nested transaction not supported
    NestedNotSupported,
    /// No transaction is open
    NotActive,
}

#[derive(Debug)]
pub struct AttributeError {
    pub entity: String,
    pub attribute: String,
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
        })
    }

    /// Shorthand for a relation shape error.
    pub fn relation_shape(
        kind: RelationShapeErrorKind,
        relation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::RelationShape(RelationShapeError {
            kind,
            relation: relation.into(),
            message: message.into(),
        })
    }

    /// Shorthand for an unknown attribute.
    pub fn unknown_attribute(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        Error::Attribute(AttributeError {
            entity: entity.into(),
            attribute: attribute.into(),
        })
    }

    /// Wrap a failed save/delete as a persistence error.
    ///
    /// Persistence errors pass through unchanged; anything else becomes the
    /// source of a new persistence error for `entity`.
    pub fn into_persistence(self, op: PersistenceOp, entity: &str) -> Self {
        match self {
            Error::Persistence(_) => self,
            other => Error::Persistence(PersistenceError {
                op,
                entity: entity.to_string(),
                message: other.to_string(),
                source: Some(Box::new(other)),
            }),
        }
    }

    /// Is this a configuration error?
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Is this a relation shape error?
    pub fn is_relation_shape(&self) -> bool {
        matches!(self, Error::RelationShape(_))
    }

    /// Is this a persistence error?
    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Persistence(_))
    }

    /// The shape error kind, if this is a relation shape error.
    pub fn relation_shape_kind(&self) -> Option<RelationShapeErrorKind> {
        match self {
            Error::RelationShape(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl fmt::Display for PersistenceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceOp::Save => write!(f, "save"),
            PersistenceOp::Delete => write!(f, "delete"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::RelationShape(e) => {
                write!(f, "Relation shape error on '{}': {}", e.relation, e.message)
            }
            Error::Persistence(e) => write!(
                f,
                "Persistence error: could not {} '{}': {}",
                e.op, e.entity, e.message
            ),
            Error::Query(e) => match &e.query {
                Some(query) => write!(f, "Query error: {} ({})", e.message, query),
                None => write!(f, "Query error: {}", e.message),
            },
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Attribute(e) => {
                write!(f, "Unknown attribute '{}' on '{}'", e.attribute, e.entity)
            }
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Persistence(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for RelationShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.relation, self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<RelationShapeError> for Error {
    fn from(err: RelationShapeError) -> Self {
        Error::RelationShape(err)
    }
}

impl From<PersistenceError> for Error {
    fn from(err: PersistenceError) -> Self {
        Error::Persistence(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<AttributeError> for Error {
    fn from(err: AttributeError) -> Self {
        Error::Attribute(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for LinkModel operations.
pub type Result<T> = std::result::Result<T, Error>;
