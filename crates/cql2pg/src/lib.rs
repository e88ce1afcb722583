//! Biblio CQL-to-PostgreSQL Query Compiler
//!
//! This crate compiles parsed CQL queries (Contextual Query Language, the
//! grammar behind library-style search APIs such as `title=Hobbit* and
//! author=Tolkien`) into PostgreSQL SQL clauses against tables that store
//! their record in one JSONB document column.
//!
//! Parsing CQL text is an external concern; the compiler consumes the
//! parsed tree described by [`ast`] together with the schema metadata from
//! `biblio-dbschema` and produces a [`select::SqlSelect`] holding the WHERE
//! and ORDER BY fragments, without their leading keywords, ready to be
//! spliced into a `SELECT`, `UPDATE` or `DELETE`.
//!
//! # Overview
//!
//! - [`ast`] - the parsed CQL tree the external parser hands over
//! - [`escape`] - CQL term conversions into LIKE patterns, string literals,
//!   POSIX regexps and tsquery expressions
//! - [`modifiers`] - relation and sort modifier resolution
//! - [`dbindex`] - index classification and foreign-key path discovery
//! - [`criteria`] - single-comparison clause building
//! - [`query_builder`] - the tree walk assembling the final query
//! - [`select`] - the compiled WHERE/ORDER BY pair
//! - [`error`] - the "invalid query" failure taxonomy
//!
//! # Quick Start
//!
//! ```
//! use biblio_cql2pg::ast::{CqlNode, CqlTermNode};
//! use biblio_cql2pg::CqlCompiler;
//! use biblio_dbschema::Schema;
//!
//! let schema = Schema::from_json(r#"{
//!     "tables": [{
//!         "tableName": "instances",
//!         "fullTextIndex": [{"fieldName": "title"}]
//!     }]
//! }"#).unwrap();
//!
//! let compiler = CqlCompiler::new(schema, "instances.jsonb").unwrap();
//! let query = CqlNode::Term(CqlTermNode::new("title", "all", "winter journey"));
//! let select = compiler.compile(&query).unwrap();
//! assert!(select.where_clause().starts_with("to_tsvector('simple', "));
//! ```
//!
//! # Escaping
//!
//! Every untrusted term is escaped for the SQL sub-language it lands in
//! (string literal, LIKE pattern, POSIX regexp, tsquery), so no input can
//! terminate the surrounding quote early. Reserved CQL characters outside a
//! wildcard context fail the compile instead of being passed through.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod ast;
pub mod criteria;
pub mod dbindex;
pub mod error;
pub mod escape;
pub mod modifiers;
pub mod query_builder;
pub mod select;

// Re-export commonly used types at crate root
pub use criteria::{Clause, Criteria};
pub use dbindex::DbIndex;
pub use error::{QueryError, QueryResult};
pub use modifiers::CqlModifiers;
pub use query_builder::CqlCompiler;
pub use select::SqlSelect;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
