//! Biblio Database Schema Metadata
//!
//! This crate provides the read-only schema metadata consumed by the Biblio
//! CQL-to-SQL compiler, plus the low-level SQL string utilities shared with
//! other per-row code paths.
//!
//! # Overview
//!
//! A `schema.json` document describes, per table, which JSON document fields
//! are backed by which PostgreSQL index kinds (btree, unique, text pattern,
//! trigram GIN, tsvector full text) and which fields are foreign keys to
//! other tables. The compiler only reads this metadata; generating the DDL
//! that creates the indexes is a separate concern and out of scope here.
//!
//! - [`schema`] - `Schema`, `Table`, `IndexDef`, `ForeignKeyDef` metadata
//!   types deserialized from `schema.json`
//! - [`sqlutil`] - JSON path expressions, SQL quoting, identifier validation
//! - [`error`] - Error types for schema validation
//!
//! # Quick Start
//!
//! ```
//! use biblio_dbschema::schema::Schema;
//!
//! let schema = Schema::from_json(r#"{
//!     "tables": [{
//!         "tableName": "users",
//!         "fullTextIndex": [{"fieldName": "name"}]
//!     }]
//! }"#).unwrap();
//!
//! let table = schema.table("users").unwrap();
//! assert_eq!(table.table_name, "users");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod schema;
pub mod sqlutil;

pub use error::{SchemaError, SchemaResult};
pub use schema::{ForeignKeyDef, IndexDef, Schema, Table};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
