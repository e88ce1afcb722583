//! SQL string utilities for JSON field access.
//!
//! These functions turn dotted CQL field names into PostgreSQL JSONB
//! traversal expressions and produce safely quoted SQL string constants.
//! The `append_*` variants write into a caller-provided buffer; they run in
//! a single pass over the input without allocating intermediate substrings
//! because they are also called per row by higher-frequency code paths.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{SchemaError, SchemaResult};

/// ASCII-only SQL identifier, capped at 49 characters so that derived names
/// (index suffixes, trigger function names) stay within PostgreSQL's
/// 63-byte identifier limit.
static SQL_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[a-zA-Z_][a-zA-Z0-9_]{0,48}$").unwrap());

/// Validates `identifier` as a safe SQL identifier.
///
/// Rejects anything that does not match `^[a-zA-Z_][a-zA-Z0-9_]{0,48}$`:
/// no quotes, no dollar signs, no non-ASCII letters.
pub fn validate_sql_identifier(identifier: &str) -> SchemaResult<()> {
    if SQL_IDENTIFIER.is_match(identifier) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier {
            identifier: identifier.to_string(),
        })
    }
}

/// Converts a dotted CQL name to an SQL JSON expression.
///
/// Every segment is traversed with `->`, so the result is of JSON type.
///
/// ```
/// use biblio_dbschema::sqlutil::cql_name_as_sql_json;
///
/// assert_eq!(cql_name_as_sql_json("tab.jsonb", "a"), "tab.jsonb->'a'");
/// assert_eq!(cql_name_as_sql_json("tab.jsonb", "a.b.c"), "tab.jsonb->'a'->'b'->'c'");
/// ```
pub fn cql_name_as_sql_json(field: &str, cql_name: &str) -> String {
    let mut result = String::with_capacity(field.len() + cql_name.len() + 8);
    append_cql_name_as_sql_json(field, cql_name, &mut result);
    result
}

/// Appends the SQL JSON expression for `cql_name` to `result`.
///
/// Single quotes inside segments are doubled so that a hostile field name
/// cannot terminate the quoted segment.
pub fn append_cql_name_as_sql_json(field: &str, cql_name: &str, result: &mut String) {
    result.push_str(field);
    result.push_str("->'");
    for c in cql_name.chars() {
        match c {
            '.' => result.push_str("'->'"),
            '\'' => result.push_str("''"),
            _ => result.push(c),
        }
    }
    result.push('\'');
}

/// Converts a dotted CQL name to an SQL expression of type text.
///
/// Interior segments are traversed with `->`, the final segment with `->>`.
///
/// ```
/// use biblio_dbschema::sqlutil::cql_name_as_sql_text;
///
/// assert_eq!(cql_name_as_sql_text("tab.jsonb", "a"), "tab.jsonb->>'a'");
/// assert_eq!(cql_name_as_sql_text("tab.jsonb", "a.b.c"), "tab.jsonb->'a'->'b'->>'c'");
/// ```
pub fn cql_name_as_sql_text(field: &str, cql_name: &str) -> String {
    let mut result = String::with_capacity(field.len() + cql_name.len() + 8);
    append_cql_name_as_sql_text(field, cql_name, &mut result);
    result
}

/// Appends the SQL text expression for `cql_name` to `result`.
pub fn append_cql_name_as_sql_text(field: &str, cql_name: &str, result: &mut String) {
    result.push_str(field);
    let last_dot = cql_name.rfind('.');
    match last_dot {
        None => result.push_str("->>'"),
        Some(_) => result.push_str("->'"),
    }
    for (pos, c) in cql_name.char_indices() {
        match c {
            '.' => {
                if Some(pos) < last_dot {
                    result.push_str("'->'");
                } else {
                    result.push_str("'->>'");
                }
            }
            '\'' => result.push_str("''"),
            _ => result.push(c),
        }
    }
    result.push('\'');
}

/// Duplicates any single quote within `s` and wraps the result in single
/// quotes, producing an SQL string constant.
///
/// ```
/// use biblio_dbschema::sqlutil::quoted;
///
/// assert_eq!(quoted(""), "''");
/// assert_eq!(quoted("It's cool"), "'It''s cool'");
/// ```
pub fn quoted(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    append_quoted(s, &mut result);
    result
}

/// Appends the SQL string constant for `s` to `result`.
pub fn append_quoted(s: &str, result: &mut String) {
    result.push('\'');
    for c in s.chars() {
        if c == '\'' {
            result.push_str("''");
        } else {
            result.push(c);
        }
    }
    result.push('\'');
}

/// Returns `term`, `lower(term)`, `f_unaccent(term)` or
/// `lower(f_unaccent(term))`.
///
/// The two wrappers are independently toggled; when both apply, `lower` is
/// always the outer call. The nesting order is fixed: a matching
/// `CREATE INDEX` expression relies on it.
pub fn wrap_in_lower_unaccent(term: &str, lower: bool, unaccent: bool) -> String {
    match (lower, unaccent) {
        (true, true) => format!("lower(f_unaccent({term}))"),
        (true, false) => format!("lower({term})"),
        (false, true) => format!("f_unaccent({term})"),
        (false, false) => term.to_string(),
    }
}
