//! Database module for schema_rev
//!
//! This module handles database connections and DDL execution.

pub mod connection;
pub mod executor;
pub mod generator;

// Re-export key types
pub use connection::{Connection, DatabaseConnection, DatabaseSession, Dialect};
pub use executor::{DdlExecutor, DdlIntent, LiveTarget, SqlDdlExecutor};
