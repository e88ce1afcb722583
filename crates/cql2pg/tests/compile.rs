//! End-to-end compilation tests over a fixture schema.

use biblio_cql2pg::ast::{
    CqlBoolOp, CqlBooleanNode, CqlModifier, CqlNode, CqlRelation, CqlSortIndex, CqlSortNode,
    CqlTermNode,
};
use biblio_cql2pg::{CqlCompiler, QueryError};
use biblio_dbschema::Schema;

const SCHEMA_JSON: &str = include_str!("fixtures/schema.json");

fn compiler(field: &str) -> CqlCompiler {
    let schema = Schema::from_json(SCHEMA_JSON).unwrap();
    CqlCompiler::new(schema, field).unwrap()
}

fn term(index: &str, relation: &str, value: &str) -> CqlNode {
    CqlNode::Term(CqlTermNode::new(index, relation, value))
}

fn term_with_modifier(index: &str, relation: &str, modifier: &str, value: &str) -> CqlNode {
    CqlNode::Term(CqlTermNode {
        index: index.to_string(),
        relation: CqlRelation::new(relation).with_modifier(CqlModifier::new(modifier)),
        term: value.to_string(),
    })
}

fn where_on(field: &str, node: &CqlNode) -> String {
    compiler(field)
        .compile(node)
        .unwrap()
        .where_clause()
        .to_string()
}

#[test]
fn plain_json_field_compiles_to_like() {
    assert_eq!(
        where_on("tab.jsonb", &term("title", "=", "Hobbit*")),
        "lower(f_unaccent(tab.jsonb->>'title')) LIKE lower(f_unaccent('Hobbit%'))"
    );
}

#[test]
fn full_text_index_compiles_to_tsquery() {
    assert_eq!(
        where_on("tablea.jsonb", &term("title", "=", "winter journey")),
        "to_tsvector('simple', f_unaccent(tablea.jsonb->>'title')) @@ \
         replace((to_tsquery('simple', f_unaccent('''winter'' & ''journey''')))::text, \
         '&', '<->')::tsquery"
    );
}

#[test]
fn multi_field_unique_index_concatenates_fields() {
    assert_eq!(
        where_on("tablea.jsonb", &term("compound", "==", "y")),
        "lower(f_unaccent(concat_space_sql(tablea.jsonb->>'department' , \
         tablea.jsonb->>'staffnumber'))) LIKE lower(f_unaccent('y'))"
    );
}

#[test]
fn multi_field_gin_index_respects_accent_config() {
    assert_eq!(
        where_on("tablea.jsonb", &term("fullname", "==", "John Smith")),
        "lower(concat_space_sql(tablea.jsonb->>'firstName' , tablea.jsonb->>'lastName')) \
         LIKE lower('John Smith')"
    );
}

#[test]
fn foreign_key_search_from_parent() {
    assert_eq!(
        where_on(
            "tablea.jsonb",
            &term("tableb.prefix", "==", "11111111-1111-1111-1111-111111111111")
        ),
        "tablea.id IN ( SELECT (tableb.jsonb->>'tableaId')::UUID from tableb WHERE \
         lower(f_unaccent(tableb.jsonb->>'prefix')) LIKE \
         lower(f_unaccent('11111111-1111-1111-1111-111111111111')))"
    );
}

#[test]
fn foreign_key_search_from_child() {
    assert_eq!(
        where_on(
            "tableb.jsonb",
            &term("tablea.prefix", "==", "11111111-1111-1111-1111-111111111111")
        ),
        "(tableb.jsonb->>'tableaId')::UUID IN ( SELECT id from tablea WHERE \
         lower(f_unaccent(tablea.jsonb->>'prefix')) LIKE \
         lower(f_unaccent('11111111-1111-1111-1111-111111111111')))"
    );
}

#[test]
fn foreign_key_search_over_two_hops() {
    assert_eq!(
        where_on("tablea.jsonb", &term("tablec.cindex", "==", "z1")),
        "tablea.id IN ( SELECT (tableb.jsonb->>'tableaId')::UUID from tableb WHERE \
         tableb.id IN ( SELECT (tablec.jsonb->>'tablebId')::UUID from tablec WHERE \
         lower(f_unaccent(tablec.jsonb->>'cindex')) LIKE lower(f_unaccent('z1'))))"
    );
}

#[test]
fn foreign_key_search_numeric() {
    assert_eq!(
        where_on(
            "tablea.jsonb",
            &term_with_modifier("tableb.blah", "==", "number", "123452")
        ),
        "tablea.id IN ( SELECT (tableb.jsonb->>'tableaId')::UUID from tableb WHERE \
         (tableb.jsonb->>'blah')::numeric = 123452)"
    );
}

#[test]
fn foreign_key_search_full_text() {
    assert_eq!(
        where_on("tablea.jsonb", &term("tableb.ftprefix", "=", "x0")),
        "tablea.id IN ( SELECT (tableb.jsonb->>'tableaId')::UUID from tableb WHERE \
         to_tsvector('simple', tableb.jsonb->>'ftprefix') @@ \
         replace((to_tsquery('simple', ('''x0''')))::text, '&', '<->')::tsquery)"
    );
}

#[test]
fn foreign_key_search_range() {
    assert_eq!(
        where_on("tablea.jsonb", &term("tableb.otherindex", ">=", "y0")),
        "tablea.id IN ( SELECT (tableb.jsonb->>'tableaId')::UUID from tableb WHERE \
         tableb.jsonb->>'otherindex' >= 'y0')"
    );
}

#[test]
fn foreign_key_star_term_compiles_to_true() {
    assert_eq!(
        where_on("tablea.jsonb", &term("tableb.ftprefix", "=", "*")),
        "tablea.id IN ( SELECT (tableb.jsonb->>'tableaId')::UUID from tableb WHERE true)"
    );
}

#[test]
fn dotted_index_without_alias_is_a_json_path() {
    assert_eq!(
        where_on("tab.jsonb", &term("name.first", "==", "Jo")),
        "lower(f_unaccent(tab.jsonb->'name'->>'first')) LIKE lower(f_unaccent('Jo'))"
    );
}

#[test]
fn boolean_tree_with_sort() {
    let tree = CqlNode::Sort(CqlSortNode::new(
        CqlNode::Boolean(CqlBooleanNode::new(
            CqlBoolOp::And,
            term("title", "=", "Hobbit"),
            term("author", "==", "Tolkien"),
        )),
        vec![
            CqlSortIndex::new("title").with_modifier(CqlModifier::new("sort.descending")),
            CqlSortIndex::new("author"),
        ],
    ));
    let select = compiler("tab.jsonb").compile(&tree).unwrap();
    assert_eq!(
        select.where_clause(),
        "(lower(f_unaccent(tab.jsonb->>'title')) LIKE lower(f_unaccent('Hobbit'))) AND \
         (lower(f_unaccent(tab.jsonb->>'author')) LIKE lower(f_unaccent('Tolkien')))"
    );
    assert_eq!(
        select.order_by(),
        "lower(f_unaccent(tab.jsonb->>'title')) DESC, lower(f_unaccent(tab.jsonb->>'author'))"
    );
    assert_eq!(
        select.to_string(),
        format!(
            "WHERE {} ORDER BY {}",
            select.where_clause(),
            select.order_by()
        )
    );
}

#[test]
fn unconfigured_index_never_fails() {
    // no index metadata at all, still a valid query
    assert_eq!(
        where_on("tab.jsonb", &term("nosuchfield", "==", "x")),
        "lower(f_unaccent(tab.jsonb->>'nosuchfield')) LIKE lower(f_unaccent('x'))"
    );
}

#[test]
fn compile_fails_whole_query_on_bad_modifier() {
    let tree = CqlNode::Boolean(CqlBooleanNode::new(
        CqlBoolOp::And,
        term("title", "=", "ok"),
        term_with_modifier("author", "=", "bogus", "x"),
    ));
    match compiler("tab.jsonb").compile(&tree) {
        Err(QueryError::UnsupportedModifier { name }) => assert_eq!(name, "bogus"),
        other => panic!("expected UnsupportedModifier, got {other:?}"),
    }
}

#[test]
fn case_sensitive_full_text_index_fails_at_setup() {
    let schema_json = r#"{
        "tables": [{
            "tableName": "tab",
            "fullTextIndex": [{"fieldName": "title", "caseSensitive": true}]
        }]
    }"#;
    assert!(Schema::from_json(schema_json).is_err());

    // the same schema also fails when handed to the compiler unvalidated
    let schema: Schema = serde_json::from_str(schema_json).unwrap();
    assert!(matches!(
        CqlCompiler::new(schema, "tab.jsonb"),
        Err(QueryError::Schema(_))
    ));
}
