//! The parsed CQL tree consumed by the compiler.
//!
//! Parsing CQL text is an external concern; these types model the node
//! shapes the external parser hands over: term nodes carrying an index
//! name, a relation with modifiers, and the compared value; boolean nodes
//! combining two subtrees; and a sort node wrapping a subtree with an
//! ordered list of sort indexes.

use serde::{Deserialize, Serialize};

/// One node of a parsed CQL query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CqlNode {
    /// A leaf comparison, e.g. `title = Hobbit*`.
    Term(CqlTermNode),
    /// A boolean combination of two subtrees.
    Boolean(CqlBooleanNode),
    /// A subtree with sort indexes, e.g. `... sortBy name/sort.descending`.
    Sort(CqlSortNode),
}

/// A leaf comparison: index name, relation, and the compared value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CqlTermNode {
    /// The CQL index name, possibly dotted (`name.first`) or prefixed with
    /// a foreign table alias (`holdingsRecords.callNumber`).
    pub index: String,
    /// The relation between index and term.
    pub relation: CqlRelation,
    /// The compared value, unquoted.
    pub term: String,
}

impl CqlTermNode {
    /// Creates a term node with the given relation base and no modifiers.
    pub fn new(
        index: impl Into<String>,
        relation: impl Into<String>,
        term: impl Into<String>,
    ) -> Self {
        CqlTermNode {
            index: index.into(),
            relation: CqlRelation::new(relation),
            term: term.into(),
        }
    }
}

/// A relation (`=`, `==`, `all`, ...) with its modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CqlRelation {
    /// The relation base, e.g. `=` or `any`.
    pub base: String,
    /// Relation modifiers in query order, e.g. `/respectCase`.
    #[serde(default)]
    pub modifiers: Vec<CqlModifier>,
}

impl CqlRelation {
    /// Creates a relation with no modifiers.
    pub fn new(base: impl Into<String>) -> Self {
        CqlRelation {
            base: base.into(),
            modifiers: Vec::new(),
        }
    }

    /// Adds a modifier.
    pub fn with_modifier(mut self, modifier: CqlModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }
}

/// One relation or sort modifier, e.g. `sort.descending` or `@weight 2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CqlModifier {
    /// The modifier name, including any `@` prefix.
    pub name: String,
    /// The modifier value, if the query supplied one.
    #[serde(default)]
    pub value: Option<String>,
}

impl CqlModifier {
    /// Creates a modifier without a value.
    pub fn new(name: impl Into<String>) -> Self {
        CqlModifier {
            name: name.into(),
            value: None,
        }
    }

    /// Creates a modifier with a value.
    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        CqlModifier {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

/// The boolean operators CQL defines between two subtrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CqlBoolOp {
    /// Both subtrees must match.
    And,
    /// Either subtree must match.
    Or,
    /// The left subtree must match, the right must not.
    Not,
    /// Proximity search; not supported by this compiler.
    Prox,
}

/// A boolean combination of two subtrees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CqlBooleanNode {
    /// The operator.
    pub op: CqlBoolOp,
    /// The left operand.
    pub left: Box<CqlNode>,
    /// The right operand.
    pub right: Box<CqlNode>,
}

impl CqlBooleanNode {
    /// Combines two nodes with the given operator.
    pub fn new(op: CqlBoolOp, left: CqlNode, right: CqlNode) -> Self {
        CqlBooleanNode {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// A subtree wrapped with `sortBy` indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CqlSortNode {
    /// The query subtree being sorted.
    pub subtree: Box<CqlNode>,
    /// The sort indexes in query order.
    pub sort_indexes: Vec<CqlSortIndex>,
}

impl CqlSortNode {
    /// Wraps `subtree` with the given sort indexes.
    pub fn new(subtree: CqlNode, sort_indexes: Vec<CqlSortIndex>) -> Self {
        CqlSortNode {
            subtree: Box::new(subtree),
            sort_indexes,
        }
    }
}

/// One sort index with its modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CqlSortIndex {
    /// The index name to sort by.
    pub base: String,
    /// Sort modifiers in query order, e.g. `sort.descending`.
    #[serde(default)]
    pub modifiers: Vec<CqlModifier>,
}

impl CqlSortIndex {
    /// Creates a sort index with no modifiers.
    pub fn new(base: impl Into<String>) -> Self {
        CqlSortIndex {
            base: base.into(),
            modifiers: Vec::new(),
        }
    }

    /// Adds a modifier.
    pub fn with_modifier(mut self, modifier: CqlModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_node_construction() {
        let node = CqlTermNode::new("title", "=", "Hobbit*");
        assert_eq!(node.index, "title");
        assert_eq!(node.relation.base, "=");
        assert!(node.relation.modifiers.is_empty());
    }

    #[test]
    fn test_serde_round_trip() {
        let node = CqlNode::Boolean(CqlBooleanNode::new(
            CqlBoolOp::And,
            CqlNode::Term(CqlTermNode::new("title", "=", "Hobbit")),
            CqlNode::Term(CqlTermNode::new("author", "==", "Tolkien")),
        ));
        let json = serde_json::to_string(&node).unwrap();
        let back: CqlNode = serde_json::from_str(&json).unwrap();
        assert_eq!(node, back);
    }
}
