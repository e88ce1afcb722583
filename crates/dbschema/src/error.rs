//! Error types for schema metadata.

use thiserror::Error;

/// Errors raised while loading or validating schema metadata.
///
/// All of these surface at schema-setup time, before any query against the
/// schema compiles.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// An index is configured in a way the compiler cannot honor.
    #[error("unsupported index configuration for '{field}': {reason}")]
    UnsupportedIndexConfiguration {
        /// The field name of the offending index definition.
        field: String,
        /// Why the configuration is unsupported.
        reason: String,
    },

    /// A table or column name is not a safe SQL identifier.
    #[error("SQL identifier must match ^[a-zA-Z_][a-zA-Z0-9_]{{0,48}}$ but it is '{identifier}'")]
    InvalidIdentifier {
        /// The rejected identifier.
        identifier: String,
    },

    /// The schema document could not be parsed.
    #[error("invalid schema: {message}")]
    InvalidSchema {
        /// Parser error message.
        message: String,
    },
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        SchemaError::InvalidSchema {
            message: err.to_string(),
        }
    }
}

/// Result type alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display() {
        let err = SchemaError::UnsupportedIndexConfiguration {
            field: "title".to_string(),
            reason: "full text index does not support case sensitive".to_string(),
        };
        assert!(err.to_string().contains("title"));
        assert!(err.to_string().contains("case sensitive"));
    }

    #[test]
    fn test_invalid_identifier_display() {
        let err = SchemaError::InvalidIdentifier {
            identifier: "bad name".to_string(),
        };
        assert!(err.to_string().contains("bad name"));
    }
}
