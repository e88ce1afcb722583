//! Schema metadata types.
//!
//! These types are the compiler's read-only view of a `schema.json`
//! document. They describe which JSON document fields are backed by which
//! index kinds and which fields are foreign keys; they never describe data.

use serde::Deserialize;

use crate::error::{SchemaError, SchemaResult};
use crate::sqlutil::{
    append_cql_name_as_sql_json, append_cql_name_as_sql_text, cql_name_as_sql_text,
    validate_sql_identifier, wrap_in_lower_unaccent,
};

/// Name of the JSON document column every table stores its record in.
pub const JSONB_COLUMN: &str = "jsonb";

const ARRAY_TOKEN: &str = "[*]";
const ARRAY_TERM_TOKEN: &str = "[*].";

fn default_true() -> bool {
    true
}

fn default_pk_column() -> String {
    "id".to_string()
}

/// The full database schema: one entry per table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// All tables described by the schema document.
    #[serde(default)]
    pub tables: Vec<Table>,
}

impl Schema {
    /// Parses a `schema.json` document and validates it.
    ///
    /// Validation failures (for example a case-sensitive full-text index)
    /// surface here, before any query against the schema compiles.
    pub fn from_json(json: &str) -> SchemaResult<Self> {
        let schema: Schema = serde_json::from_str(json)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Validates every table; see [`Table::validate`].
    pub fn validate(&self) -> SchemaResult<()> {
        for table in &self.tables {
            table.validate()?;
        }
        Ok(())
    }

    /// Looks up a table by name, ignoring ASCII case.
    pub fn table(&self, table_name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.table_name.eq_ignore_ascii_case(table_name))
    }
}

/// Index and foreign-key metadata for one table.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// The SQL table name.
    pub table_name: String,
    /// Name of the primary key column.
    #[serde(default = "default_pk_column")]
    pub pk_column_name: String,
    /// Indexes using `text_pattern_ops`.
    #[serde(default)]
    pub like_index: Vec<IndexDef>,
    /// Unique btree indexes.
    #[serde(default)]
    pub unique_index: Vec<IndexDef>,
    /// Non-unique btree indexes.
    #[serde(default)]
    pub index: Vec<IndexDef>,
    /// Indexes using `gin_trgm_ops` trigram matching.
    #[serde(default)]
    pub gin_index: Vec<IndexDef>,
    /// Indexes using tsvector full-text search.
    #[serde(default)]
    pub full_text_index: Vec<IndexDef>,
    /// Foreign keys from this table (the child) to parent tables.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyDef>,
}

impl Table {
    /// Creates a table with the given name and no indexes.
    pub fn new(table_name: impl Into<String>) -> Self {
        Table {
            table_name: table_name.into(),
            pk_column_name: default_pk_column(),
            like_index: Vec::new(),
            unique_index: Vec::new(),
            index: Vec::new(),
            gin_index: Vec::new(),
            full_text_index: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Validates the table's identifiers and index configurations.
    pub fn validate(&self) -> SchemaResult<()> {
        validate_sql_identifier(&self.table_name)?;
        validate_sql_identifier(&self.pk_column_name)?;
        for index in &self.full_text_index {
            if index.case_sensitive {
                return Err(SchemaError::UnsupportedIndexConfiguration {
                    field: index.field_name.clone(),
                    reason: "full text index does not support case sensitive".to_string(),
                });
            }
        }
        for index in self.all_indexes() {
            index.validate()?;
        }
        for fk in &self.foreign_keys {
            validate_sql_identifier(&fk.target_table)?;
        }
        Ok(())
    }

    fn all_indexes(&self) -> impl Iterator<Item = &IndexDef> {
        self.like_index
            .iter()
            .chain(&self.unique_index)
            .chain(&self.index)
            .chain(&self.gin_index)
            .chain(&self.full_text_index)
    }
}

/// One index definition.
///
/// `field_name` is the dotted CQL name of the indexed field. An index may
/// instead cover several fields (`multi_field_names`) or an arbitrary SQL
/// expression (`sql_expression`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDef {
    /// Dotted CQL name of the indexed field.
    pub field_name: String,
    /// Whether matching respects character case. Must be false for
    /// full-text indexes.
    #[serde(default)]
    pub case_sensitive: bool,
    /// Whether `f_unaccent` is applied before matching.
    #[serde(default = "default_true")]
    pub remove_accents: bool,
    /// Whether the indexed value is a string (false suppresses case and
    /// accent folding).
    #[serde(default = "default_true")]
    pub string_type: bool,
    /// Comma-separated multi-field spec, each component a dotted path with
    /// optional `[*]` array markers.
    #[serde(default)]
    pub multi_field_names: Option<String>,
    /// Verbatim SQL expression overriding any field path.
    #[serde(default)]
    pub sql_expression: Option<String>,
}

impl IndexDef {
    /// Creates a plain string index on `field_name` with default folding.
    pub fn new(field_name: impl Into<String>) -> Self {
        IndexDef {
            field_name: field_name.into(),
            case_sensitive: false,
            remove_accents: true,
            string_type: true,
            multi_field_names: None,
            sql_expression: None,
        }
    }

    /// Validates the multi-field spec, if any.
    ///
    /// An empty spec or a blank component is an unresolvable multi-field
    /// path and fails hard here rather than being silently skipped later.
    pub fn validate(&self) -> SchemaResult<()> {
        let Some(multi) = &self.multi_field_names else {
            return Ok(());
        };
        if multi.trim().is_empty() || multi.split(',').any(|part| part.trim().is_empty()) {
            return Err(SchemaError::UnsupportedIndexConfiguration {
                field: self.field_name.clone(),
                reason: format!("unresolvable multi field names '{multi}'"),
            });
        }
        Ok(())
    }

    /// Returns the SQL expression replacing the plain field path, if this
    /// index defines one.
    ///
    /// Case folding defaults to the index's own `case_sensitive` flag; see
    /// [`IndexDef::expression_override_with`].
    pub fn expression_override(&self, table_loc: &str) -> Option<String> {
        self.expression_override_with(table_loc, !self.case_sensitive)
    }

    /// Returns the SQL expression replacing the plain field path, if this
    /// index defines one, with explicit case folding.
    ///
    /// An explicit `sql_expression` wins verbatim. Otherwise each component
    /// of `multi_field_names` is expanded into a plain path or a
    /// `concat_array_object[_values]` call, the components are joined with
    /// `concat_space_sql(...)`, and the result is wrapped in
    /// `lower`/`f_unaccent` as configured.
    pub fn expression_override_with(&self, table_loc: &str, lower: bool) -> Option<String> {
        if let Some(expr) = &self.sql_expression {
            return Some(expr.clone());
        }
        let multi = self.multi_field_names.as_ref()?;

        let mut result = String::from("concat_space_sql(");
        for (i, part) in multi.split(',').enumerate() {
            if i != 0 {
                result.push_str(" , ");
            }
            Self::append_expanded_term(table_loc, part.trim(), &mut result);
        }
        result.push(')');
        Some(wrap_in_lower_unaccent(&result, lower, self.remove_accents))
    }

    /// Returns the plain text path for this index's field on `table_loc`.
    pub fn sql_text_path(&self, table_loc: &str) -> String {
        cql_name_as_sql_text(&format!("{table_loc}.{JSONB_COLUMN}"), &self.field_name)
    }

    /// Expands one multi-field component into `result`.
    ///
    /// A component without `[*]` becomes a plain `->>` path. A trailing
    /// `[*]` concatenates the whole array with `concat_array_object(...)`;
    /// `[*].sub` concatenates one subfield of every element with
    /// `concat_array_object_values(..., 'sub')`.
    fn append_expanded_term(table_loc: &str, term: &str, result: &mut String) {
        let field = format!("{table_loc}.{JSONB_COLUMN}");
        match term.find(ARRAY_TOKEN) {
            None => {
                append_cql_name_as_sql_text(&field, term, result);
            }
            Some(idx) if idx == term.len() - ARRAY_TOKEN.len() => {
                result.push_str("concat_array_object(");
                append_cql_name_as_sql_json(&field, &term[..idx], result);
                result.push(')');
            }
            Some(idx) => {
                result.push_str("concat_array_object_values(");
                append_cql_name_as_sql_json(&field, &term[..idx], result);
                result.push_str(",'");
                result.push_str(&term[idx + ARRAY_TERM_TOKEN.len()..]);
                result.push_str("')");
            }
        }
    }
}

/// A foreign key relation from this table (the child) to a parent table.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyDef {
    /// The JSON field in the child record holding the parent's id.
    pub field_name: String,
    /// The parent table's name.
    pub target_table: String,
    /// Alias under which CQL queries on the child may address the parent;
    /// `None` disables child-to-parent traversal.
    #[serde(default)]
    pub target_table_alias: Option<String>,
    /// Alias under which CQL queries on the parent may address the child;
    /// `None` disables parent-to-child traversal.
    #[serde(default)]
    pub table_alias: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with_multi(multi: &str) -> IndexDef {
        IndexDef {
            multi_field_names: Some(multi.to_string()),
            ..IndexDef::new("compound")
        }
    }

    #[test]
    fn test_from_json_defaults() {
        let schema = Schema::from_json(
            r#"{"tables": [{"tableName": "users",
                "fullTextIndex": [{"fieldName": "name"}],
                "ginIndex": [{"fieldName": "email", "removeAccents": false}]}]}"#,
        )
        .unwrap();
        let table = schema.table("users").unwrap();
        assert_eq!(table.pk_column_name, "id");
        let ft = &table.full_text_index[0];
        assert!(!ft.case_sensitive);
        assert!(ft.remove_accents);
        assert!(!table.gin_index[0].remove_accents);
    }

    #[test]
    fn test_table_lookup_ignores_case() {
        let schema = Schema {
            tables: vec![Table::new("users")],
        };
        assert!(schema.table("Users").is_some());
        assert!(schema.table("orders").is_none());
    }

    #[test]
    fn test_case_sensitive_full_text_index_rejected() {
        let result = Schema::from_json(
            r#"{"tables": [{"tableName": "users",
                "fullTextIndex": [{"fieldName": "name", "caseSensitive": true}]}]}"#,
        );
        match result {
            Err(SchemaError::UnsupportedIndexConfiguration { field, .. }) => {
                assert_eq!(field, "name");
            }
            other => panic!("expected UnsupportedIndexConfiguration, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_table_name_rejected() {
        let result = Schema::from_json(r#"{"tables": [{"tableName": "bad table"}]}"#);
        assert!(matches!(result, Err(SchemaError::InvalidIdentifier { .. })));
    }

    #[test]
    fn test_blank_multi_field_component_rejected() {
        let mut table = Table::new("tablea");
        table.unique_index.push(index_with_multi("key1, ,key2"));
        let schema = Schema {
            tables: vec![table],
        };
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::UnsupportedIndexConfiguration { .. })
        ));
    }

    #[test]
    fn test_expression_override_plain_fields() {
        let index = index_with_multi("key1,key2");
        assert_eq!(
            index.expression_override("tablea").unwrap(),
            "lower(f_unaccent(concat_space_sql(tablea.jsonb->>'key1' , tablea.jsonb->>'key2')))"
        );
    }

    #[test]
    fn test_expression_override_respects_flags() {
        let mut index = index_with_multi("firstName,lastName");
        index.remove_accents = false;
        assert_eq!(
            index.expression_override("tablea").unwrap(),
            "lower(concat_space_sql(tablea.jsonb->>'firstName' , tablea.jsonb->>'lastName'))"
        );
        assert_eq!(
            index.expression_override_with("tablea", false).unwrap(),
            "concat_space_sql(tablea.jsonb->>'firstName' , tablea.jsonb->>'lastName')"
        );
    }

    #[test]
    fn test_expression_override_array_subfield() {
        let index = index_with_multi("field1[*].city,field2[*].state");
        assert_eq!(
            index.expression_override_with("tablea", false).unwrap(),
            "f_unaccent(concat_space_sql(concat_array_object_values(tablea.jsonb->'field1','city') \
             , concat_array_object_values(tablea.jsonb->'field2','state')))"
        );
    }

    #[test]
    fn test_expression_override_whole_array() {
        let index = index_with_multi("field3.info[*],field3.data[*]");
        assert_eq!(
            index.expression_override_with("tablea", false).unwrap(),
            "f_unaccent(concat_space_sql(concat_array_object(tablea.jsonb->'field3'->'info') \
             , concat_array_object(tablea.jsonb->'field3'->'data')))"
        );
    }

    #[test]
    fn test_expression_override_sql_expression_wins() {
        let mut index = index_with_multi("ignored");
        index.sql_expression = Some("lower(concat_space_sql(jsonb->>'a', jsonb->>'b'))".to_string());
        assert_eq!(
            index.expression_override("tablea").unwrap(),
            "lower(concat_space_sql(jsonb->>'a', jsonb->>'b'))"
        );
    }

    #[test]
    fn test_expression_override_none_for_plain_index() {
        assert!(IndexDef::new("title").expression_override("tab").is_none());
    }

    #[test]
    fn test_sql_text_path() {
        assert_eq!(
            IndexDef::new("name.first").sql_text_path("users"),
            "users.jsonb->'name'->>'first'"
        );
    }
}
