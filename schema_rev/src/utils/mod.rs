//! Utilities for schema_rev
//!
//! This module provides utility functions used across the library.

pub mod logging;
pub mod naming;

// Re-export key utility functions
pub use logging::init_logging;
pub use naming::{format_name, format_sql_identifier, get_constraint_name, truncate_identifier};
