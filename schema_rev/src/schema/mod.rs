//! Schema module for schema_rev
//!
//! This module holds the schema object model, the reversible operations that
//! change it, and the differ that derives operations from two schemas.

pub mod diff;
pub mod keys;
pub mod ops;
pub mod render;
pub mod source;
pub mod types;

// Re-export key types
pub use diff::{diff, SchemaDiff};
pub use keys::ObjectKey;
pub use ops::{ColumnChanges, DataAction, DataOperation, Operation};
pub use source::{SchemaFile, SchemaModel};
pub use types::{
    Check, Column, DataType, ForeignKey, Index, PrimaryKey, Schema, SqlText, Table, Unique,
};
