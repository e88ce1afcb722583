//! The query assembler.
//!
//! [`CqlCompiler`] walks a parsed CQL tree once, compiles every leaf into a
//! PostgreSQL JSONB predicate, folds the leaves with the tree's boolean
//! operators and compiles the sort indexes into an ORDER BY clause. The
//! result is a [`SqlSelect`] holding raw WHERE/ORDER BY fragments.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use biblio_dbschema::schema::{JSONB_COLUMN, Schema, Table};
use biblio_dbschema::sqlutil::{
    cql_name_as_sql_json, cql_name_as_sql_text, quoted, wrap_in_lower_unaccent,
};

use crate::ast::{CqlBoolOp, CqlBooleanNode, CqlNode, CqlSortNode, CqlTermNode};
use crate::dbindex::{
    DbIndex, find_foreign_keys_from_source_alias_to_target_table,
    find_foreign_keys_from_source_table_to_target_alias,
};
use crate::error::{QueryError, QueryResult};
use crate::escape::{
    has_cql_wildcard, is_postgres_number, to_like_pattern, to_string_literal, to_tsquery_and,
    to_tsquery_or, to_tsquery_phrase,
};
use crate::modifiers::{CqlAccents, CqlCase, CqlModifiers, CqlSort, CqlTermFormat};
use crate::select::SqlSelect;

static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new("^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});

const UUID_LO: &str = "00000000-0000-0000-0000-000000000000";
const UUID_HI: &str = "ffffffff-ffff-ffff-ffff-ffffffffffff";

/// The text and JSON SQL expressions of one index.
struct IndexSqlValues {
    text: String,
    json: String,
}

fn index_sql_values(json_field: &str, index: &str) -> IndexSqlValues {
    IndexSqlValues {
        text: cql_name_as_sql_text(json_field, index),
        json: cql_name_as_sql_json(json_field, index),
    }
}

/// The table part of a JSON field name: `users.jsonb` gives `users`.
fn table_loc(json_field: &str) -> &str {
    json_field
        .rsplit_once('.')
        .map(|(table, _)| table)
        .unwrap_or(json_field)
}

/// Compiles parsed CQL trees into PostgreSQL JSONB SQL clauses.
///
/// One compiler instance is bound to one JSON document field (for example
/// `users.jsonb`) and one loaded schema snapshot. Compilation is purely
/// functional over those inputs, so a compiler may be shared freely between
/// threads as long as the schema snapshot is treated as immutable.
///
/// ```
/// use biblio_cql2pg::ast::{CqlNode, CqlTermNode};
/// use biblio_cql2pg::query_builder::CqlCompiler;
/// use biblio_dbschema::Schema;
///
/// let schema = Schema::from_json(r#"{"tables": [{"tableName": "tab"}]}"#).unwrap();
/// let compiler = CqlCompiler::new(schema, "tab.jsonb").unwrap();
/// let select = compiler
///     .compile(&CqlNode::Term(CqlTermNode::new("title", "=", "Hobbit*")))
///     .unwrap();
/// assert_eq!(
///     select.where_clause(),
///     "lower(f_unaccent(tab.jsonb->>'title')) LIKE lower(f_unaccent('Hobbit%'))"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct CqlCompiler {
    schema: Schema,
    json_field: String,
    table_name: String,
    server_choice_indexes: Vec<String>,
}

impl CqlCompiler {
    /// Creates a compiler for the given schema and JSON field name.
    ///
    /// The field name may include the table name (`users.jsonb`); the table
    /// part selects the index metadata. The schema is validated here, so a
    /// misconfigured index fails before any query compiles.
    pub fn new(schema: Schema, field: &str) -> QueryResult<Self> {
        let field = field.trim();
        if field.is_empty() {
            return Err(QueryError::InvalidField {
                message: "a field name must not be empty".to_string(),
            });
        }
        schema.validate()?;
        let table_name = table_loc(field).to_string();
        if schema.table(&table_name).is_none() {
            warn!("table {table_name} not found in schema, compiling without index metadata");
        }
        Ok(CqlCompiler {
            schema,
            json_field: field.to_string(),
            table_name,
            server_choice_indexes: Vec::new(),
        })
    }

    /// Sets the index names `cql.serverChoice` expands to.
    ///
    /// Names must not be empty and must not contain quotes.
    pub fn with_server_choice_indexes(mut self, indexes: Vec<String>) -> QueryResult<Self> {
        for index in &indexes {
            if index.trim().is_empty() {
                return Err(QueryError::InvalidQuery {
                    message: "serverChoice index names must not be empty".to_string(),
                });
            }
            if index.contains('"') || index.contains('\'') {
                return Err(QueryError::InvalidQuery {
                    message: format!("serverChoice index name contains a quote: {index}"),
                });
            }
        }
        self.server_choice_indexes = indexes;
        Ok(self)
    }

    fn table(&self) -> Option<&Table> {
        self.schema.table(&self.table_name)
    }

    /// Compiles the tree into WHERE and ORDER BY clauses.
    pub fn compile(&self, node: &CqlNode) -> QueryResult<SqlSelect> {
        match node {
            CqlNode::Sort(sort) => self.sort_node(sort),
            _ => Ok(SqlSelect::new(self.where_clause(node)?, "")),
        }
    }

    /// Compiles the tree into a single WHERE clause string; a sort node
    /// renders its ORDER BY inline.
    pub fn where_clause(&self, node: &CqlNode) -> QueryResult<String> {
        match node {
            CqlNode::Term(term) => self.term_node(term),
            CqlNode::Boolean(boolean) => self.boolean_node(boolean),
            CqlNode::Sort(sort) => {
                let select = self.sort_node(sort)?;
                Ok(format!(
                    "{} ORDER BY {}",
                    select.where_clause(),
                    select.order_by()
                ))
            }
        }
    }

    fn sort_node(&self, node: &CqlSortNode) -> QueryResult<SqlSelect> {
        let where_clause = self.where_clause(&node.subtree)?;
        let mut order = String::new();
        for (i, sort_index) in node.sort_indexes.iter().enumerate() {
            if i != 0 {
                order.push_str(", ");
            }
            let modifiers = CqlModifiers::from_sort_index(sort_index)?;
            // ASC is not needed, it is the PostgreSQL default
            let desc = if modifiers.sort == CqlSort::Descending {
                " DESC"
            } else {
                ""
            };

            if sort_index.base == "id" {
                order.push_str(self.pk_column(self.table()));
                order.push_str(desc);
                continue;
            }

            let vals = index_sql_values(&self.json_field, &sort_index.base);
            // a field marked as number sorts numerically over the JSON value
            if modifiers.term_format == CqlTermFormat::Number {
                order.push_str(&vals.json);
                order.push_str(desc);
                continue;
            }
            // assumes a matching CREATE INDEX expression is installed
            order.push_str(&wrap_in_lower_unaccent(&vals.text, true, true));
            order.push_str(desc);
        }
        Ok(SqlSelect::new(where_clause, order))
    }

    fn boolean_node(&self, node: &CqlBooleanNode) -> QueryResult<String> {
        // common UI query before the user typed anything:
        // title=* OR contributors=* OR identifier=*
        if node.op == CqlBoolOp::Or {
            if let CqlNode::Term(right) = &*node.right {
                if right.term == "*" && right.relation.base == "=" {
                    debug!("simplifying '=* OR =*'");
                    return self.where_clause(&node.left);
                }
            }
        }

        let left = self.where_clause(&node.left)?;
        let right = self.where_clause(&node.right)?;
        match node.op {
            CqlBoolOp::And => Ok(format!("({left}) AND ({right})")),
            CqlBoolOp::Or => Ok(format!("({left}) OR ({right})")),
            // CQL NOT means SQL AND NOT; IS NOT TRUE also catches the NULL
            // case when the right-hand field does not exist
            CqlBoolOp::Not => Ok(format!("({left}) AND ( ({right}) IS NOT TRUE)")),
            CqlBoolOp::Prox => Err(QueryError::UnsupportedFeature {
                feature: "PROX boolean operator".to_string(),
            }),
        }
    }

    fn term_node(&self, node: &CqlTermNode) -> QueryResult<String> {
        if node.index.eq_ignore_ascii_case("cql.allRecords") {
            return Ok("true".to_string());
        }
        if node.index.eq_ignore_ascii_case("cql.serverChoice") {
            if self.server_choice_indexes.is_empty() {
                return Err(QueryError::InvalidQuery {
                    message: "cql.serverChoice requested, but no serverChoiceIndexes defined"
                        .to_string(),
                });
            }
            let pieces = self
                .server_choice_indexes
                .iter()
                .map(|index| self.index_to_sql(index, node))
                .collect::<QueryResult<Vec<_>>>()?;
            return Ok(pieces.join(" OR "));
        }
        // a dotted index whose head names a foreign table alias becomes a
        // cross-table subquery
        if let Some((alias, rest)) = node.index.split_once('.') {
            if let Some(sql) = self.foreign_key_query(alias, rest, node)? {
                return Ok(sql);
            }
        }
        self.index_to_sql(&node.index, node)
    }

    fn index_to_sql(&self, index: &str, node: &CqlTermNode) -> QueryResult<String> {
        self.index_to_sql_on(self.table(), &self.json_field, index, node)
    }

    /// Compiles one leaf against an explicit table and JSON field, so the
    /// foreign-key path can reuse it for the foreign table.
    fn index_to_sql_on(
        &self,
        table: Option<&Table>,
        json_field: &str,
        index: &str,
        node: &CqlTermNode,
    ) -> QueryResult<String> {
        if index == "id" {
            return self.pg_id(table, node);
        }

        let vals = index_sql_values(json_field, index);
        let db_index = DbIndex::for_table(table, index);
        let modifiers = CqlModifiers::from_term(node)?;
        let comparator = node.relation.base.to_lowercase();
        let loc = table_loc(json_field);

        match comparator.as_str() {
            "=" => {
                if modifiers.term_format == CqlTermFormat::Number {
                    self.query_by_sql(loc, &db_index, &vals, node, &comparator, &modifiers)
                } else if db_index.ft()
                    && modifiers.case == CqlCase::IgnoreCase
                    && modifiers.accents == CqlAccents::IgnoreAccents
                {
                    self.query_by_ft(loc, &db_index, &vals, node, &comparator, &modifiers)
                } else {
                    self.query_by_like(loc, &db_index, &vals, node, &comparator, &modifiers)
                }
            }
            "adj" | "all" | "any" => {
                self.query_by_ft(loc, &db_index, &vals, node, &comparator, &modifiers)
            }
            "==" | "<>" => {
                if modifiers.term_format == CqlTermFormat::String {
                    self.query_by_like(loc, &db_index, &vals, node, &comparator, &modifiers)
                } else {
                    self.query_by_sql(loc, &db_index, &vals, node, &comparator, &modifiers)
                }
            }
            "<" | ">" | "<=" | ">=" => {
                self.query_by_sql(loc, &db_index, &vals, node, &comparator, &modifiers)
            }
            _ => Err(QueryError::UnsupportedFeature {
                feature: format!("relation {comparator}"),
            }),
        }
    }

    /// Full-text shape: `to_tsvector('simple', ...) @@ to_tsquery(...)`.
    fn query_by_ft(
        &self,
        loc: &str,
        db_index: &DbIndex,
        vals: &IndexSqlValues,
        node: &CqlTermNode,
        comparator: &str,
        modifiers: &CqlModifiers,
    ) -> QueryResult<String> {
        let index_def = db_index.full_text_index();
        if index_def.is_none() {
            warn!(
                "doing full-text search without full-text index for {}",
                vals.text
            );
        }
        if modifiers.accents == CqlAccents::RespectAccents {
            warn!(
                "ignoring /respectAccents modifier for full-text search {}",
                vals.text
            );
        }
        if modifiers.case == CqlCase::RespectCase {
            warn!(
                "ignoring /respectCase modifier for full-text search {}",
                vals.text
            );
        }

        let term = node.term.trim();
        if term == "*" {
            return Ok("true".to_string());
        }
        if term.is_empty() {
            return Ok(format!("{} ~ ''", vals.text));
        }

        // the 'simple' dictionary only lowercases, accents need f_unaccent
        let remove_accents = index_def.is_none_or(|def| def.remove_accents);
        let lhs = index_def
            .and_then(|def| def.expression_override_with(loc, false))
            .unwrap_or_else(|| wrap_in_lower_unaccent(&vals.text, false, remove_accents));

        let tsquery = match comparator {
            "=" | "adj" => to_tsquery_phrase(term, remove_accents)?,
            "all" => to_tsquery_and(term, remove_accents)?,
            "any" => to_tsquery_or(term, remove_accents)?,
            _ => {
                return Err(QueryError::InvalidQuery {
                    message: format!("unknown full-text comparator '{comparator}'"),
                });
            }
        };

        let sql = format!("to_tsvector('simple', {lhs}) @@ {tsquery}");
        debug!("index {} generated SQL {}", vals.text, sql);
        Ok(sql)
    }

    /// LIKE shape with case and accent folding on both sides.
    fn query_by_like(
        &self,
        loc: &str,
        db_index: &DbIndex,
        vals: &IndexSqlValues,
        node: &CqlTermNode,
        comparator: &str,
        modifiers: &CqlModifiers,
    ) -> QueryResult<String> {
        if db_index.gin_index().is_none() {
            warn!("doing LIKE search without GIN index for {}", vals.text);
        }
        // a unique/btree index definition still contributes its folding
        // flags and multi-field expression
        let index_def = db_index.gin_index().or_else(|| db_index.other_index());

        let lower = index_def.is_none_or(|def| !def.case_sensitive);
        let unaccent = index_def.is_none_or(|def| def.remove_accents);

        let like_operator = if comparator == "<>" {
            " NOT LIKE "
        } else {
            " LIKE "
        };
        let like = quoted(&to_like_pattern(&node.term));

        let lhs = index_def
            .and_then(|def| def.expression_override(loc))
            .unwrap_or_else(|| wrap_in_lower_unaccent(&vals.text, lower, unaccent));
        let index_match = format!(
            "{lhs}{like_operator}{}",
            wrap_in_lower_unaccent(&like, lower, unaccent)
        );

        let sql = if modifiers.accents == CqlAccents::IgnoreAccents
            && modifiers.case == CqlCase::IgnoreCase
        {
            index_match
        } else {
            // the first conjunct can use the index, the second one applies
            // the exact case/accent handling the modifiers ask for
            let modifier_lower = modifiers.case != CqlCase::RespectCase;
            let modifier_unaccent = modifiers.accents != CqlAccents::RespectAccents;
            format!(
                "{index_match} AND {}{like_operator}{}",
                wrap_in_lower_unaccent(&vals.text, modifier_lower, modifier_unaccent),
                wrap_in_lower_unaccent(&like, modifier_lower, modifier_unaccent)
            )
        };

        debug!("index {} generated SQL {}", vals.text, sql);
        Ok(sql)
    }

    /// Plain SQL comparison shape, numeric or string.
    fn query_by_sql(
        &self,
        _loc: &str,
        db_index: &DbIndex,
        vals: &IndexSqlValues,
        node: &CqlTermNode,
        comparator: &str,
        modifiers: &CqlModifiers,
    ) -> QueryResult<String> {
        if db_index.other_index().is_none() {
            warn!("doing SQL query without index for {}", vals.text);
        }

        let comparator = if comparator == "==" { "=" } else { comparator };

        let sql = if modifiers.term_format == CqlTermFormat::Number {
            if !is_postgres_number(&node.term) {
                return Err(QueryError::InvalidQuery {
                    message: format!("invalid number in term '{}'", node.term),
                });
            }
            format!("({})::numeric {} {}", vals.text, comparator, node.term)
        } else {
            let literal = quoted(&to_string_literal(&node.term)?);
            format!("{} {} {}", vals.text, comparator, literal)
        };

        debug!("index {} generated SQL {}", vals.text, sql);
        Ok(sql)
    }

    fn pk_column<'a>(&self, table: Option<&'a Table>) -> &'a str {
        table.map_or("id", |table| table.pk_column_name.as_str())
    }

    /// Primary-key terms compare on the pk column directly: the database
    /// can use the primary key index and right truncation becomes a range
    /// scan instead of a LIKE.
    fn pg_id(&self, table: Option<&Table>, node: &CqlTermNode) -> QueryResult<String> {
        if let Some(modifier) = node.relation.modifiers.first() {
            return Err(QueryError::UnsupportedModifier {
                name: modifier.name.clone(),
            });
        }
        let pk = self.pk_column(table);
        let term = &node.term;
        let comparator = node.relation.base.as_str();

        let equals = match comparator {
            ">" | "<" | ">=" | "<=" => {
                if !UUID_PATTERN.is_match(term) {
                    return Err(QueryError::InvalidQuery {
                        message: format!("invalid UUID after id comparator {comparator}: {term}"),
                    });
                }
                return Ok(format!("{pk}{comparator}'{term}'"));
            }
            "=" | "==" => true,
            "<>" => false,
            _ => {
                return Err(QueryError::InvalidQuery {
                    message: format!(
                        "unsupported operator '{comparator}': id only supports '=', '==', and \
                         '<>' (possibly with right truncation)"
                    ),
                });
            }
        };
        let comparator = if equals { "=" } else { "<>" };

        // id is mandatory, so "all that have an id" is all records
        if term.is_empty() || term == "*" {
            return Ok(if equals { "true" } else { "false" }.to_string());
        }

        if !has_cql_wildcard(term) {
            if !UUID_PATTERN.is_match(term) {
                // avoid SQL injection, don't put the term into the comment
                return Ok(if equals {
                    "false /* id == invalid UUID */"
                } else {
                    "true /* id <> invalid UUID */"
                }
                .to_string());
            }
            return Ok(format!("{pk}{comparator}'{term}'"));
        }

        let truncated = term.strip_suffix('*').unwrap_or(term);
        if has_cql_wildcard(truncated) {
            return Err(QueryError::InvalidQuery {
                message: format!("only right truncation supported for id: {term}"),
            });
        }
        let lo = overlay(UUID_LO, truncated);
        let hi = overlay(UUID_HI, truncated);
        if !UUID_PATTERN.is_match(&lo) || !UUID_PATTERN.is_match(&hi) {
            return Ok(if equals {
                "false /* id == invalid UUID */"
            } else {
                "true /* id <> invalid UUID */"
            }
            .to_string());
        }
        if equals {
            Ok(format!("({pk}>='{lo}' and {pk}<='{hi}')"))
        } else {
            Ok(format!("({pk}<'{lo}' or {pk}>'{hi}')"))
        }
    }

    /// Compiles a term whose index head names a foreign table alias.
    ///
    /// Returns `Ok(None)` when the head does not resolve to a foreign-key
    /// path, so the caller falls back to a plain JSON path.
    fn foreign_key_query(
        &self,
        alias: &str,
        rest: &str,
        node: &CqlTermNode,
    ) -> QueryResult<Option<String>> {
        // child to parent: this table's records point at the alias table
        let parent_path =
            find_foreign_keys_from_source_table_to_target_alias(&self.schema, &self.table_name, alias);
        if !parent_path.is_empty() {
            let leaf_table = &parent_path.last().unwrap().target_table;
            let mut sql = self.foreign_leaf(leaf_table, rest, node)?;
            for hop in parent_path.iter().rev() {
                let target = self.schema.table(&hop.target_table);
                sql = format!(
                    "({}.{JSONB_COLUMN}->>'{}')::UUID IN ( SELECT {} from {} WHERE {})",
                    hop.table,
                    hop.field,
                    self.pk_column(target),
                    hop.target_table,
                    sql
                );
            }
            return Ok(Some(sql));
        }

        // parent to child: records of the alias table point at this table
        let child_path =
            find_foreign_keys_from_source_alias_to_target_table(&self.schema, alias, &self.table_name);
        if !child_path.is_empty() {
            let leaf_table = child_path.first().unwrap().table.clone();
            let mut sql = self.foreign_leaf(&leaf_table, rest, node)?;
            for hop in &child_path {
                let target = self.schema.table(&hop.target_table);
                sql = format!(
                    "{}.{} IN ( SELECT ({}.{JSONB_COLUMN}->>'{}')::UUID from {} WHERE {})",
                    hop.target_table,
                    self.pk_column(target),
                    hop.table,
                    hop.field,
                    hop.table,
                    sql
                );
            }
            return Ok(Some(sql));
        }

        Ok(None)
    }

    /// The leaf condition of a foreign-key subquery, compiled against the
    /// foreign table's own metadata.
    fn foreign_leaf(&self, table_name: &str, index: &str, node: &CqlTermNode) -> QueryResult<String> {
        let table = self.schema.table(table_name);
        let json_field = format!("{table_name}.{JSONB_COLUMN}");
        self.index_to_sql_on(table, &json_field, index, node)
    }
}

/// Overlays `prefix` onto the template, keeping the template's tail.
fn overlay(template: &str, prefix: &str) -> String {
    if prefix.len() >= template.len() {
        return prefix.to_string();
    }
    format!("{prefix}{}", &template[prefix.len()..])
}
