//! Naming utilities for schema_rev
//!
//! Identifier quoting and deterministic constraint names.

use crate::db::connection::Dialect;

/// Format a name according to a pattern with placeholders
pub fn format_name(pattern: &str, replacements: &[(&str, &str)]) -> String {
    let mut result = pattern.to_string();

    for (placeholder, value) in replacements {
        result = result.replace(&format!("{{{}}}", placeholder), value);
    }

    result
}

/// Create a constraint name from its kind prefix, table and columns.
///
/// The result is truncated to the dialect's identifier limit.
pub fn get_constraint_name(
    prefix: &str,
    table_name: &str,
    columns: &[String],
    dialect: Dialect,
) -> String {
    let table_name = table_name.rsplit('.').next().unwrap_or(table_name);
    let columns_str = columns.join("_");

    let name = format_name(
        "{type}_{table}_{columns}",
        &[("type", prefix), ("table", table_name), ("columns", &columns_str)],
    );
    truncate_identifier(&name, get_max_identifier_length(dialect))
}

/// Short stable digest used to name objects identified by free text
pub fn short_hash(text: &str) -> String {
    let hash = format!("{:x}", md5::compute(text.as_bytes()));
    hash[..8].to_string()
}

/// Truncate an identifier to fit database limits
pub fn truncate_identifier(name: &str, max_length: usize) -> String {
    if name.len() <= max_length {
        return name.to_string();
    }

    // Room for an underscore and eight hash characters
    let mut keep_length = max_length.saturating_sub(9);
    while !name.is_char_boundary(keep_length) {
        keep_length -= 1;
    }

    format!("{}_{}", &name[..keep_length], short_hash(name))
}

/// Get maximum identifier length for specific database
pub fn get_max_identifier_length(dialect: Dialect) -> usize {
    match dialect {
        Dialect::Postgres => 63,
        Dialect::MySql => 64,
        Dialect::Sqlite => 2048,
    }
}

/// Quote an identifier for the dialect, keeping schema qualification.
///
/// `public.users` becomes `"public"."users"` on PostgreSQL.
pub fn format_sql_identifier(name: &str, dialect: Dialect) -> String {
    name.split('.')
        .map(|part| match dialect {
            Dialect::MySql => format!("`{}`", part.replace('`', "``")),
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", part.replace('"', "\"\"")),
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Quote a list of column names and join them with commas
pub fn format_column_list(columns: &[String], dialect: Dialect) -> String {
    columns
        .iter()
        .map(|column| format_sql_identifier(column, dialect))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Quote a string literal
pub fn format_sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_name() {
        assert_eq!(
            format_name("ix_{table}_{columns}", &[("table", "users"), ("columns", "email")]),
            "ix_users_email"
        );
    }

    #[test]
    fn test_constraint_name() {
        let columns = vec!["user_id".to_string(), "tag".to_string()];
        assert_eq!(
            get_constraint_name("uq", "public.posts", &columns, Dialect::Postgres),
            "uq_posts_user_id_tag"
        );
    }

    #[test]
    fn test_truncate_identifier() {
        let long_name = "this_is_a_very_long_identifier_that_exceeds_database_limits";
        let truncated = truncate_identifier(long_name, 30);

        assert_eq!(truncated.len(), 30);
        assert!(truncated.starts_with("this_is_a_very_long"));
        assert_eq!(truncated, truncate_identifier(long_name, 30));
        assert_eq!(truncate_identifier("short", 30), "short");
    }

    #[test]
    fn test_format_sql_identifier() {
        assert_eq!(format_sql_identifier("users", Dialect::Postgres), "\"users\"");
        assert_eq!(format_sql_identifier("app.users", Dialect::Postgres), "\"app\".\"users\"");
        assert_eq!(format_sql_identifier("order", Dialect::MySql), "`order`");
        assert_eq!(format_sql_identifier("we\"ird", Dialect::Sqlite), "\"we\"\"ird\"");
    }

    #[test]
    fn test_format_sql_literal() {
        assert_eq!(format_sql_literal("it's"), "'it''s'");
    }
}
