//! Index classification against schema metadata.
//!
//! For a CQL index name the compiler needs to know which index kinds back
//! it: full text routes the term through the tsquery path, GIN backs LIKE
//! matching, btree/unique/like indexes back plain SQL comparisons, and a
//! foreign key means a cross-table subquery. A name may match several
//! categories; a name matching none yields all-false flags — a missing
//! index degrades performance, never correctness, so it must not refuse the
//! query.

use biblio_dbschema::schema::{ForeignKeyDef, IndexDef, Schema, Table};

/// Index information for one CQL index name on one table.
///
/// Derived fresh per lookup; holds the matching definitions so callers can
/// read per-index flags such as `remove_accents` without a second scan.
#[derive(Debug, Clone, Default)]
pub struct DbIndex {
    like: Option<IndexDef>,
    unique: Option<IndexDef>,
    btree: Option<IndexDef>,
    gin: Option<IndexDef>,
    full_text: Option<IndexDef>,
    foreign_key: Option<ForeignKeyDef>,
}

impl DbIndex {
    /// Collects the index information for `index_name` on `table`.
    ///
    /// `None` or an unconfigured name returns all-false flags.
    pub fn for_table(table: Option<&Table>, index_name: &str) -> Self {
        let Some(table) = table else {
            return DbIndex::default();
        };
        DbIndex {
            like: find_index(index_name, &table.like_index),
            unique: find_index(index_name, &table.unique_index),
            btree: find_index(index_name, &table.index),
            gin: find_index(index_name, &table.gin_index),
            full_text: find_index(index_name, &table.full_text_index),
            foreign_key: table
                .foreign_keys
                .iter()
                .find(|fk| fk.field_name == index_name)
                .cloned(),
        }
    }

    /// Whether a tsvector full-text index backs the name.
    pub fn ft(&self) -> bool {
        self.full_text.is_some()
    }

    /// Whether a trigram GIN index backs the name.
    pub fn gin(&self) -> bool {
        self.gin.is_some()
    }

    /// Whether a btree, unique or text-pattern index backs the name.
    pub fn other(&self) -> bool {
        self.btree.is_some() || self.unique.is_some() || self.like.is_some()
    }

    /// Whether the name is a foreign-key field.
    pub fn is_foreign_key(&self) -> bool {
        self.foreign_key.is_some()
    }

    /// The full-text index definition, if any.
    pub fn full_text_index(&self) -> Option<&IndexDef> {
        self.full_text.as_ref()
    }

    /// The GIN index definition, if any.
    pub fn gin_index(&self) -> Option<&IndexDef> {
        self.gin.as_ref()
    }

    /// The first btree, unique or text-pattern index definition, if any.
    pub fn other_index(&self) -> Option<&IndexDef> {
        self.btree
            .as_ref()
            .or(self.unique.as_ref())
            .or(self.like.as_ref())
    }

    /// The foreign-key definition, if any.
    pub fn foreign_key(&self) -> Option<&ForeignKeyDef> {
        self.foreign_key.as_ref()
    }
}

fn find_index(index_name: &str, indexes: &[IndexDef]) -> Option<IndexDef> {
    indexes
        .iter()
        .find(|index| index.field_name == index_name)
        .cloned()
}

/// One hop of a foreign-key path: `table`'s JSON field `field` holds the id
/// of a row in `target_table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbFkInfo {
    /// The child table.
    pub table: String,
    /// The child's JSON field holding the parent id.
    pub field: String,
    /// The parent table.
    pub target_table: String,
}

/// Finds the foreign-key path from `source_table` up to the table published
/// under `target_alias` (child-to-parent traversal).
///
/// Returns the hops in child-to-parent order; empty if no path exists.
pub fn find_foreign_keys_from_source_table_to_target_alias(
    schema: &Schema,
    source_table: &str,
    target_alias: &str,
) -> Vec<DbFkInfo> {
    let mut visited = Vec::new();
    find_foreign_keys(schema, source_table, target_alias, true, &mut visited)
}

/// Finds the foreign-key path from the child table published under
/// `source_alias` up to `target_table` (parent-to-child traversal).
///
/// Returns the hops in child-to-parent order; empty if no path exists.
pub fn find_foreign_keys_from_source_alias_to_target_table(
    schema: &Schema,
    source_alias: &str,
    target_table: &str,
) -> Vec<DbFkInfo> {
    let mut best: Vec<DbFkInfo> = Vec::new();
    for table in &schema.tables {
        for fk in &table.foreign_keys {
            let table_alias = fk.table_alias.as_deref().unwrap_or(&table.table_name);
            if table_alias != source_alias {
                continue;
            }
            let head = DbFkInfo {
                table: table.table_name.clone(),
                field: fk.field_name.clone(),
                target_table: fk.target_table.clone(),
            };
            if fk.target_table == target_table {
                return vec![head];
            }
            let mut visited = vec![table.table_name.clone()];
            let tail = find_foreign_keys(schema, &fk.target_table, target_table, false, &mut visited);
            if !tail.is_empty() && (best.is_empty() || best.len() > tail.len() + 1) {
                best = std::iter::once(head).chain(tail).collect();
            }
        }
    }
    best
}

/// Walks child-to-parent foreign keys from `source_table` towards
/// `target_name`, matching either the target table alias or the target
/// table name, and keeps the shortest path.
fn find_foreign_keys(
    schema: &Schema,
    source_table: &str,
    target_name: &str,
    use_target_alias: bool,
    visited: &mut Vec<String>,
) -> Vec<DbFkInfo> {
    if visited.iter().any(|name| name == source_table) {
        return Vec::new();
    }
    visited.push(source_table.to_string());
    let result = find_foreign_keys_visit(schema, source_table, target_name, use_target_alias, visited);
    visited.pop();
    result
}

fn find_foreign_keys_visit(
    schema: &Schema,
    source_table: &str,
    target_name: &str,
    use_target_alias: bool,
    visited: &mut Vec<String>,
) -> Vec<DbFkInfo> {
    let Some(source) = schema.table(source_table) else {
        return Vec::new();
    };
    // direct hop first
    for fk in &source.foreign_keys {
        let name = if use_target_alias {
            fk.target_table_alias.as_deref()
        } else {
            Some(fk.target_table.as_str())
        };
        if name == Some(target_name) {
            return vec![DbFkInfo {
                table: source.table_name.clone(),
                field: fk.field_name.clone(),
                target_table: fk.target_table.clone(),
            }];
        }
    }
    // otherwise the shortest transitive path
    let mut best: Vec<DbFkInfo> = Vec::new();
    for fk in &source.foreign_keys {
        let tail = find_foreign_keys(schema, &fk.target_table, target_name, use_target_alias, visited);
        if !tail.is_empty() && (best.is_empty() || best.len() > tail.len() + 1) {
            let head = DbFkInfo {
                table: source.table_name.clone(),
                field: fk.field_name.clone(),
                target_table: fk.target_table.clone(),
            };
            best = std::iter::once(head).chain(tail).collect();
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_table() -> Table {
        let mut table = Table::new("users");
        table.full_text_index.push(IndexDef::new("name"));
        table.gin_index.push(IndexDef::new("name"));
        table.index.push(IndexDef::new("name"));
        table.unique_index.push(IndexDef::new("email"));
        table.like_index.push(IndexDef::new("address"));
        table
    }

    #[test]
    fn test_classify_name() {
        let table = users_table();
        let db_index = DbIndex::for_table(Some(&table), "name");
        assert!(db_index.ft());
        assert!(db_index.gin());
        assert!(db_index.other());
        assert!(!db_index.is_foreign_key());
    }

    #[test]
    fn test_classify_email_and_address() {
        let table = users_table();
        let email = DbIndex::for_table(Some(&table), "email");
        assert!(!email.ft());
        assert!(!email.gin());
        assert!(email.other());

        let address = DbIndex::for_table(Some(&table), "address");
        assert!(!address.ft());
        assert!(!address.gin());
        assert!(address.other());
    }

    #[test]
    fn test_unconfigured_name_is_all_false() {
        let table = users_table();
        let db_index = DbIndex::for_table(Some(&table), "nosuchfield");
        assert!(!db_index.ft());
        assert!(!db_index.gin());
        assert!(!db_index.other());
        assert!(!db_index.is_foreign_key());
    }

    #[test]
    fn test_missing_table_is_all_false() {
        let db_index = DbIndex::for_table(None, "address");
        assert!(!db_index.ft());
        assert!(!db_index.gin());
        assert!(!db_index.other());
    }

    fn fk(field: &str, target: &str) -> ForeignKeyDef {
        ForeignKeyDef {
            field_name: field.to_string(),
            target_table: target.to_string(),
            target_table_alias: Some(target.to_string()),
            table_alias: None,
        }
    }

    /// pathA: f -> e -> d -> c -> b -> a, pathB: f -> e -> c -> b -> a
    fn path_schema() -> Schema {
        let mut a = Table::new("a");
        a.pk_column_name = "id".to_string();
        let mut b = Table::new("b");
        b.foreign_keys.push(fk("aId", "a"));
        let mut c = Table::new("c");
        c.foreign_keys.push(fk("bId", "b"));
        let mut d = Table::new("d");
        d.foreign_keys.push(fk("cId", "c"));
        let mut e = Table::new("e");
        e.foreign_keys.push(fk("dId", "d"));
        e.foreign_keys.push(fk("cId", "c"));
        let mut f = Table::new("f");
        f.foreign_keys.push(fk("eId", "e"));
        Schema {
            tables: vec![a, b, c, d, e, f],
        }
    }

    #[test]
    fn test_find_foreign_keys_direct() {
        let schema = path_schema();
        let path = find_foreign_keys_from_source_table_to_target_alias(&schema, "b", "a");
        assert_eq!(
            path,
            vec![DbFkInfo {
                table: "b".to_string(),
                field: "aId".to_string(),
                target_table: "a".to_string(),
            }]
        );
    }

    #[test]
    fn test_find_foreign_keys_takes_shortest_path() {
        let schema = path_schema();
        let path = find_foreign_keys_from_source_table_to_target_alias(&schema, "f", "a");
        let hops: Vec<&str> = path.iter().map(|info| info.table.as_str()).collect();
        // f -> e -> c -> b -> a, skipping the longer route through d
        assert_eq!(hops, vec!["f", "e", "c", "b"]);
    }

    #[test]
    fn test_find_foreign_keys_no_path() {
        let schema = path_schema();
        assert!(find_foreign_keys_from_source_table_to_target_alias(&schema, "a", "f").is_empty());
        assert!(
            find_foreign_keys_from_source_table_to_target_alias(&schema, "nosuch", "a").is_empty()
        );
    }

    #[test]
    fn test_find_foreign_keys_from_alias_direct() {
        let schema = path_schema();
        let path = find_foreign_keys_from_source_alias_to_target_table(&schema, "b", "a");
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].table, "b");
    }

    #[test]
    fn test_find_foreign_keys_from_alias_transitive() {
        let schema = path_schema();
        let path = find_foreign_keys_from_source_alias_to_target_table(&schema, "c", "a");
        let hops: Vec<&str> = path.iter().map(|info| info.table.as_str()).collect();
        assert_eq!(hops, vec!["c", "b"]);
    }

    #[test]
    fn test_foreign_key_cycles_terminate() {
        let mut x = Table::new("x");
        x.foreign_keys.push(fk("yId", "y"));
        let mut y = Table::new("y");
        y.foreign_keys.push(fk("xId", "x"));
        let schema = Schema {
            tables: vec![x, y],
        };
        assert!(find_foreign_keys_from_source_table_to_target_alias(&schema, "x", "z").is_empty());
    }
}
