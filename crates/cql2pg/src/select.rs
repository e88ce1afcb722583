//! The compiled query result.

use std::fmt;

/// The WHERE and ORDER BY clauses of a compiled query.
///
/// Both clauses are stored without their leading keywords so the caller can
/// splice them into a `SELECT`, `UPDATE` or `DELETE` statement. Produced
/// once per compile and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SqlSelect {
    where_clause: String,
    order_by: String,
}

impl SqlSelect {
    /// Creates a result from the WHERE clause (without `WHERE`) and the
    /// ORDER BY clause (without `ORDER BY`).
    pub fn new(where_clause: impl Into<String>, order_by: impl Into<String>) -> Self {
        SqlSelect {
            where_clause: where_clause.into(),
            order_by: order_by.into(),
        }
    }

    /// The WHERE clause without the `WHERE` keyword, or empty.
    pub fn where_clause(&self) -> &str {
        &self.where_clause
    }

    /// The ORDER BY clause without the `ORDER BY` keyword, or empty.
    pub fn order_by(&self) -> &str {
        &self.order_by
    }
}

impl fmt::Display for SqlSelect {
    /// Concatenates both clauses with their keywords, omitting empty parts.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.where_clause.is_empty(), self.order_by.is_empty()) {
            (false, false) => write!(f, "WHERE {} ORDER BY {}", self.where_clause, self.order_by),
            (false, true) => write!(f, "WHERE {}", self.where_clause),
            (true, false) => write!(f, "ORDER BY {}", self.order_by),
            (true, true) => Ok(()),
        }
    }
}
