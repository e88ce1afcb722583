//! Error types for query compilation.
//!
//! Every variant is a caller-surfaced "invalid query" failure: a compile
//! either fully succeeds or fully fails, and each message names the
//! offending token. There is no partial output and no silent recovery.

use thiserror::Error;

use biblio_dbschema::SchemaError;

/// Errors raised while compiling a CQL tree to SQL.
#[derive(Error, Debug)]
pub enum QueryError {
    /// A relation or sort modifier name is not recognized.
    #[error("unsupported modifier: {name}")]
    UnsupportedModifier {
        /// The unrecognized modifier name.
        name: String,
    },

    /// A reserved CQL character appeared where only a literal is allowed.
    #[error("unsupported query operator '{operator}' in term '{term}'")]
    UnsupportedQueryOperator {
        /// The reserved character.
        operator: char,
        /// The term containing it.
        term: String,
    },

    /// A term ends in an unterminated escaping backslash.
    #[error("malformed escape: trailing backslash in '{term}'")]
    MalformedEscape {
        /// The offending term.
        term: String,
    },

    /// A CQL construct the compiler does not implement.
    #[error("unsupported CQL feature: {feature}")]
    UnsupportedFeature {
        /// Description of the construct.
        feature: String,
    },

    /// The configured JSON field name is unusable.
    #[error("invalid field: {message}")]
    InvalidField {
        /// What is wrong with the field.
        message: String,
    },

    /// Any other query that cannot be compiled.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// What is wrong with the query.
        message: String,
    },

    /// Schema metadata was rejected at setup time.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Result type alias for query compilation.
pub type QueryResult<T> = Result<T, QueryError>;
