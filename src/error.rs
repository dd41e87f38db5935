//! Error types for query construction and evaluation.

use std::fmt;

use thiserror::Error;

/// Capabilities an index may expose to terms and to the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Equality and range lookups over an ordered field.
    Field,
    /// Free-text search.
    Text,
    /// Membership lookups over multi-valued fields.
    Set,
    /// Lookups over a discrete value domain.
    Value,
    /// Ordered iteration of a given id set.
    Sort,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Field => "field",
            Capability::Text => "text",
            Capability::Set => "set",
            Capability::Value => "value",
            Capability::Sort => "sort",
        };
        f.write_str(name)
    }
}

/// The main error type for the query algebra.
#[derive(Error, Debug)]
pub enum QueryError {
    /// A term was constructed with an argument it does not accept.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A catalog, index, object or id could not be found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The bound index does not provide the capability a caller requires.
    #[error("Index '{index}' does not support the {capability} capability")]
    MissingCapability {
        index: String,
        capability: Capability,
    },

    /// Configuration could not be used as given.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A free-text query string could not be parsed.
    #[error("Query parse error: {0}")]
    QueryParse(String),

    /// The operation is not available for this term.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// An index returned an id the identity registry cannot resolve.
    #[error("Inconsistent data: {0}")]
    Inconsistent(String),

    /// Internal invariant violation.
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;

impl QueryError {
    /// Create an invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        QueryError::InvalidArgument(msg.into())
    }

    /// Create a not found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        QueryError::NotFound(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        QueryError::InvalidConfig(msg.into())
    }

    /// Create a query parse error.
    pub fn query_parse<S: Into<String>>(msg: S) -> Self {
        QueryError::QueryParse(msg.into())
    }

    /// Create an unsupported operation error.
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        QueryError::Unsupported(msg.into())
    }

    /// Create an inconsistent data error.
    pub fn inconsistent<S: Into<String>>(msg: S) -> Self {
        QueryError::Inconsistent(msg.into())
    }

    /// Create an internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        QueryError::Internal(msg.into())
    }

    /// Create a missing capability error.
    pub fn missing_capability<S: Into<String>>(index: S, capability: Capability) -> Self {
        QueryError::MissingCapability {
            index: index.into(),
            capability,
        }
    }

    /// Whether this error signals that a term has no stable cache key.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, QueryError::Unsupported(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_capability_message() {
        let err = QueryError::missing_capability("catalog1.f1", Capability::Sort);
        assert_eq!(
            err.to_string(),
            "Index 'catalog1.f1' does not support the sort capability"
        );
    }

    #[test]
    fn test_is_unsupported() {
        assert!(QueryError::unsupported("no key").is_unsupported());
        assert!(!QueryError::not_found("x").is_unsupported());
    }
}
