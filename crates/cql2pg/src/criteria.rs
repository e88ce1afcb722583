//! Single-comparison clause building.
//!
//! A [`Criteria`] collects the pieces of one leaf comparison — JSON path
//! segments, operator, value, flags — and [`Criteria::build`] resolves them
//! eagerly into an immutable [`Clause`]. All classification (JSON operator
//! detection, array handling) and type inference happen exactly once inside
//! `build`, so rendering a `Clause` is idempotent by construction.
//!
//! Field segments are passed already quoted, e.g. `'price'`, matching how
//! callers assemble paths like `'price' -> 'po_currency' ->> 'value'`.

use std::fmt;

use biblio_dbschema::schema::JSONB_COLUMN;
use biblio_dbschema::sqlutil::quoted;

use crate::escape::is_postgres_number;

/// JSON containment and path operators; they force JSON-object semantics on
/// the final path segment (`->` instead of `->>`).
const JSON_OPS: &[&str] = &["@>", "<@", "#>", "#>>"];

const BOOLEAN_OPS: &[&str] = &[
    "IS TRUE",
    "IS NOT TRUE",
    "IS FALSE",
    "IS NOT FALSE",
    "IS UNKNOWN",
    "IS NOT UNKNOWN",
];

const NULL_OPS: &[&str] = &["IS NULL", "IS NOT NULL", "ISNULL", "NOTNULL"];

/// The inferred SQL type of the compared value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    String,
    Boolean,
    Numeric,
    Null,
}

/// Builder for one leaf comparison.
///
/// ```
/// use biblio_cql2pg::criteria::Criteria;
///
/// let clause = Criteria::new()
///     .add_field("'personal'")
///     .add_field("'lastName'")
///     .operation("=")
///     .value("smith")
///     .build();
/// assert_eq!(clause.sql(), "(jsonb->'personal'->>'lastName') = 'smith'");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    fields: Vec<String>,
    operation: Option<String>,
    value: Option<String>,
    alias: Option<String>,
    jsonb: bool,
    not_query: bool,
    array: bool,
    array_field: Option<String>,
}

impl Criteria {
    /// Creates an empty criteria over the `jsonb` document column.
    pub fn new() -> Self {
        Criteria {
            jsonb: true,
            ..Criteria::default()
        }
    }

    /// Appends one already-quoted path segment, e.g. `'price'`.
    pub fn add_field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Sets the comparison operator, e.g. `=`, `LIKE` or `IS NULL`.
    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Sets the compared value, unquoted.
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Prefixes the document column with a table alias, e.g. `t1` for
    /// queries shaped `FROM table1 t1`.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Marks the criteria as not operating on the JSON document column.
    pub fn jsonb(mut self, jsonb: bool) -> Self {
        self.jsonb = jsonb;
        self
    }

    /// Negates the whole clause.
    pub fn not_query(mut self, not_query: bool) -> Self {
        self.not_query = not_query;
        self
    }

    /// Marks the first path segment as a JSON array that must be unnested
    /// before comparing.
    pub fn array(mut self, array: bool) -> Self {
        self.array = array;
        self
    }

    /// Names the array segment explicitly (already quoted); defaults to the
    /// first path segment when [`Criteria::array`] is set.
    pub fn array_field(mut self, array_field: impl Into<String>) -> Self {
        self.array_field = Some(array_field.into());
        self
    }

    /// Resolves the criteria into an immutable [`Clause`].
    ///
    /// Classification, type inference and rendering run here, once. The
    /// returned clause only hands out the cached results.
    pub fn build(self) -> Clause {
        // CLASSIFIED: operator class and array shape are fixed.
        let is_json_op = self
            .operation
            .as_deref()
            .is_some_and(|op| JSON_OPS.iter().any(|json_op| op.eq_ignore_ascii_case(json_op)));
        let array_field = if self.array {
            self.array_field
                .clone()
                .or_else(|| self.fields.first().cloned())
        } else {
            None
        };
        let from = array_field.as_deref().map(|array_field| FromClause {
            snippet: format!("jsonb_array_elements({JSONB_COLUMN}->{array_field})"),
            alias: unquote(self.fields.first().map(String::as_str).unwrap_or_default()),
        });
        let select = from.as_ref().map(|from| from.alias.clone());

        let sql = match (&self.operation, &self.alias) {
            (Some(operation), _) if !self.fields.is_empty() => {
                // TYPED: the value type picks casts and quoting.
                let kind = self.value_kind(operation);
                let field = self.render_field(is_json_op, kind, from.as_ref());
                let value = self.render_value(kind);
                let mut clause = format!("{field} {operation}");
                if !value.is_empty() {
                    clause.push(' ');
                    clause.push_str(&value);
                }
                if self.not_query {
                    format!("( NOT {clause})")
                } else {
                    clause
                }
            }
            (None, Some(_)) => self.render_field(is_json_op, ValueKind::String, from.as_ref()),
            _ => String::new(),
        };

        Clause { sql, from, select }
    }

    fn value_kind(&self, operation: &str) -> ValueKind {
        match &self.value {
            None => {
                if BOOLEAN_OPS.iter().any(|op| operation.eq_ignore_ascii_case(op)) {
                    ValueKind::Boolean
                } else if NULL_OPS.iter().any(|op| operation.eq_ignore_ascii_case(op)) {
                    ValueKind::Null
                } else {
                    // comparing against a null value with a regular operator
                    ValueKind::String
                }
            }
            Some(value) => {
                if is_postgres_number(value) {
                    ValueKind::Numeric
                } else if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false")
                {
                    ValueKind::Boolean
                } else {
                    ValueKind::String
                }
            }
        }
    }

    fn render_field(
        &self,
        is_json_op: bool,
        kind: ValueKind,
        from: Option<&FromClause>,
    ) -> String {
        let path = self.field_path(is_json_op, from);
        if !self.jsonb {
            return path;
        }
        let prefix = self.field_prefix(is_json_op, from);
        match kind {
            ValueKind::Numeric => format!("({prefix}{path})::numeric"),
            ValueKind::Boolean => format!("({prefix}{path})::boolean"),
            _ => format!("({prefix}{path})"),
        }
    }

    /// The traversal prefix: document column (optionally alias-qualified),
    /// or the unnested array alias, followed by the first arrow.
    fn field_prefix(&self, is_json_op: bool, from: Option<&FromClause>) -> String {
        let base = match (from, &self.alias) {
            (Some(from), _) => from.alias.clone(),
            (None, Some(alias)) => format!("{alias}.{JSONB_COLUMN}"),
            (None, None) => JSONB_COLUMN.to_string(),
        };
        if is_json_op || self.fields.len() > 1 {
            format!("{base}->")
        } else if self.array {
            String::new()
        } else {
            format!("{base}->>")
        }
    }

    /// The segments joined with `->`, the final one with `->>` unless a
    /// JSON operator needs object semantics throughout.
    fn field_path(&self, is_json_op: bool, from: Option<&FromClause>) -> String {
        if self.fields.len() == 1 && self.array {
            return from.map(|f| f.alias.clone()).unwrap_or_default();
        }
        if self.fields.len() == 1 {
            return self.fields[0].clone();
        }
        let mut path = String::new();
        let start = usize::from(self.array);
        for i in start..self.fields.len() {
            path.push_str(&self.fields[i]);
            if i + 2 == self.fields.len() {
                path.push_str(if is_json_op { "->" } else { "->>" });
            } else if i + 1 < self.fields.len() {
                path.push_str("->");
            }
        }
        path
    }

    fn render_value(&self, kind: ValueKind) -> String {
        match (&self.value, kind) {
            // the unnested array element is JSON, so compare against a JSON
            // string literal
            (Some(value), ValueKind::String) if self.array => {
                format!("'\"{}\"'", value.replace('\'', "''"))
            }
            (Some(value), ValueKind::String) => quoted(value),
            // null is a legitimate JSON value to compare against
            (None, ValueKind::String) => "NULL".to_string(),
            // IS TRUE, IS NULL and friends need no right-hand side
            (None, _) => String::new(),
            (Some(value), _) => value.clone(),
        }
    }
}

/// The immutable result of [`Criteria::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    sql: String,
    from: Option<FromClause>,
    select: Option<String>,
}

impl Clause {
    /// The rendered SQL fragment.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The side FROM clause unnesting the array field, if any.
    pub fn from_clause(&self) -> Option<&FromClause> {
        self.from.as_ref()
    }

    /// The unquoted array field for the SELECT list, if any.
    pub fn select_snippet(&self) -> Option<&str> {
        self.select.as_deref()
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// A `jsonb_array_elements(...)` FROM clause with its alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromClause {
    snippet: String,
    alias: String,
}

impl FromClause {
    /// The `jsonb_array_elements(...)` call.
    pub fn snippet(&self) -> &str {
        &self.snippet
    }

    /// The alias the unnested elements are addressed by.
    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl fmt::Display for FromClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} AS {}", self.snippet, self.alias)
    }
}

fn unquote(field: &str) -> String {
    field.trim_matches('\'').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_criteria_render_empty() {
        assert_eq!(Criteria::new().add_field("'personal'").build().sql(), "");
        assert_eq!(Criteria::new().operation("=").build().sql(), "");
    }

    #[test]
    fn test_string_comparison() {
        let clause = Criteria::new()
            .add_field("'personal'")
            .add_field("'lastName'")
            .operation("=")
            .value("smith")
            .build();
        assert_eq!(clause.sql(), "(jsonb->'personal'->>'lastName') = 'smith'");
    }

    #[test]
    fn test_alias_prefix() {
        let clause = Criteria::new()
            .add_field("'personal'")
            .add_field("'lastName'")
            .operation("=")
            .value("smith")
            .alias("foo")
            .build();
        assert_eq!(
            clause.sql(),
            "(foo.jsonb->'personal'->>'lastName') = 'smith'"
        );
    }

    #[test]
    fn test_not_query_wraps_clause() {
        let clause = Criteria::new()
            .add_field("'personal'")
            .add_field("'lastName'")
            .operation("=")
            .value("smith")
            .not_query(true)
            .build();
        assert_eq!(
            clause.sql(),
            "( NOT (jsonb->'personal'->>'lastName') = 'smith')"
        );
    }

    #[test]
    fn test_json_containment_keeps_object_semantics() {
        let clause = Criteria::new()
            .add_field("'personal'")
            .operation("@>")
            .value(r#"{"a":"b"}"#)
            .build();
        assert_eq!(clause.sql(), r#"(jsonb->'personal') @> '{"a":"b"}'"#);
    }

    #[test]
    fn test_three_segment_path() {
        let clause = Criteria::new()
            .add_field("'price'")
            .add_field("'po_currency'")
            .add_field("'value'")
            .operation("LIKE")
            .value("USD")
            .build();
        assert_eq!(
            clause.sql(),
            "(jsonb->'price'->'po_currency'->>'value') LIKE 'USD'"
        );
    }

    #[test]
    fn test_boolean_operator_casts() {
        let clause = Criteria::new()
            .add_field("'rush'")
            .operation("IS FALSE")
            .build();
        assert_eq!(clause.sql(), "(jsonb->>'rush')::boolean IS FALSE");
    }

    #[test]
    fn test_null_operator_needs_no_value() {
        let clause = Criteria::new()
            .add_field("'ebook_url'")
            .operation("IS NOT NULL")
            .build();
        assert_eq!(clause.sql(), "(jsonb->>'ebook_url') IS NOT NULL");
    }

    #[test]
    fn test_boolean_value_casts() {
        let clause = Criteria::new()
            .add_field("'rush'")
            .operation("!=")
            .value("true")
            .build();
        assert_eq!(clause.sql(), "(jsonb->>'rush')::boolean != true");
    }

    #[test]
    fn test_numeric_value_casts() {
        let clause = Criteria::new()
            .add_field("'amount'")
            .operation(">")
            .value("120")
            .build();
        assert_eq!(clause.sql(), "(jsonb->>'amount')::numeric > 120");
    }

    #[test]
    fn test_null_value_with_regular_operator() {
        let clause = Criteria::new().add_field("'f'").operation("=").build();
        assert_eq!(clause.sql(), "(jsonb->>'f') = NULL");
    }

    #[test]
    fn test_value_quoting() {
        let cases: &[(&str, &str)] = &[
            ("a", "'a'"),
            ("'a'", "'''a'''"),
            ("O'Kapi", "'O''Kapi'"),
            ("'", "''''"),
            ("''", "''''''"),
            // SQL strings do not treat backslash as masking
            ("Up/\\Up", "'Up/\\Up'"),
            ("", "''"),
        ];
        for (value, sql) in cases {
            let clause = Criteria::new()
                .add_field("'f'")
                .operation("=")
                .value(*value)
                .build();
            assert_eq!(clause.sql(), format!("(jsonb->>'f') = {sql}"));
        }
    }

    #[test]
    fn test_array_field() {
        let clause = Criteria::new()
            .add_field("'transaction'")
            .add_field("'status'")
            .operation("=")
            .value("rollbackComplete")
            .array(true)
            .build();
        assert_eq!(
            clause.sql(),
            "(transaction->'status') = '\"rollbackComplete\"'"
        );
        assert_eq!(clause.select_snippet(), Some("transaction"));
        let from = clause.from_clause().unwrap();
        assert_eq!(from.snippet(), "jsonb_array_elements(jsonb->'transaction')");
        assert_eq!(from.alias(), "transaction");
        assert_eq!(
            from.to_string(),
            "jsonb_array_elements(jsonb->'transaction') AS transaction"
        );
    }

    #[test]
    fn test_alias_only_renders_field() {
        let clause = Criteria::new()
            .alias("'personal'")
            .add_field("'foo'")
            .value("123")
            .build();
        assert_eq!(clause.sql(), "('personal'.jsonb->>'foo')");
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let clause = Criteria::new()
            .add_field("'transaction'")
            .add_field("'status'")
            .operation("=")
            .value("done")
            .array(true)
            .build();
        let first = clause.sql().to_string();
        let second = clause.sql().to_string();
        assert_eq!(first, second);
        assert_eq!(clause.to_string(), first);
        assert_eq!(clause.to_string(), first);
    }
}
