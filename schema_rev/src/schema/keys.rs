//! Identity keys and canonical forms
//!
//! Objects are matched across two models by an identity key that depends on
//! their kind. Type declarations and check expressions are compared in a
//! canonical spelling so cosmetic differences never produce a diff.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static PAREN_PADDING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s+|\s+\)").unwrap());
static COMMA_PADDING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*,\s*").unwrap());
static TYPE_PARTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Z0-9_ ]+?)\s*(\(.*\))?(\[\])?$").unwrap());

/// The identity of a schema object within one model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKey {
    Table(String),
    Column { table: String, column: String },
    PrimaryKey { table: String },
    ForeignKey {
        table: String,
        columns: Vec<String>,
        ref_table: String,
        ref_columns: Vec<String>,
    },
    Unique { table: String, columns: Vec<String> },
    Check { table: String, expression: String },
    Index { table: String, name: String },
}

impl ObjectKey {
    /// Name of the table owning the object (the table itself for tables).
    pub fn table(&self) -> &str {
        match self {
            ObjectKey::Table(table)
            | ObjectKey::Column { table, .. }
            | ObjectKey::PrimaryKey { table }
            | ObjectKey::ForeignKey { table, .. }
            | ObjectKey::Unique { table, .. }
            | ObjectKey::Check { table, .. }
            | ObjectKey::Index { table, .. } => table,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ObjectKey::Table(_) => "table",
            ObjectKey::Column { .. } => "column",
            ObjectKey::PrimaryKey { .. } => "primary key",
            ObjectKey::ForeignKey { .. } => "foreign key",
            ObjectKey::Unique { .. } => "unique constraint",
            ObjectKey::Check { .. } => "check constraint",
            ObjectKey::Index { .. } => "index",
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKey::Table(table) => write!(f, "{:?}", table),
            ObjectKey::Column { table, column } => write!(f, "{:?} on table {:?}", column, table),
            ObjectKey::PrimaryKey { table } => write!(f, "on table {:?}", table),
            ObjectKey::ForeignKey { table, columns, ref_table, ref_columns } => write!(
                f,
                "({}) -> {}({}) on table {:?}",
                columns.join(", "),
                ref_table,
                ref_columns.join(", "),
                table
            ),
            ObjectKey::Unique { table, columns } => {
                write!(f, "({}) on table {:?}", columns.join(", "), table)
            }
            ObjectKey::Check { table, expression } => {
                write!(f, "({}) on table {:?}", expression, table)
            }
            ObjectKey::Index { table, name } => write!(f, "{:?} on table {:?}", name, table),
        }
    }
}

/// Canonical spelling of a column type declaration.
///
/// Upper-cases, normalizes spacing and folds common aliases so that
/// `int4`, `INT` and `integer` all compare equal. Quoted literals, as in
/// `ENUM('a', 'b')`, keep their case and spacing.
pub fn canonical_type(declaration: &str) -> String {
    let upper = squeeze(&map_unquoted(declaration, str::to_uppercase));
    let Some(parts) = TYPE_PARTS.captures(&upper) else {
        return upper;
    };
    let base = parts.get(1).map_or("", |m| m.as_str()).trim();
    let args = parts.get(2).map_or("", |m| m.as_str());
    let array = parts.get(3).map_or("", |m| m.as_str());

    let base = match base {
        "INT" | "INT4" => "INTEGER",
        "INT8" => "BIGINT",
        "INT2" => "SMALLINT",
        "BOOL" => "BOOLEAN",
        "CHARACTER VARYING" => "VARCHAR",
        "CHARACTER" => "CHAR",
        "FLOAT8" | "DOUBLE" => "DOUBLE PRECISION",
        "FLOAT4" => "REAL",
        "DECIMAL" => "NUMERIC",
        "TIMESTAMP WITHOUT TIME ZONE" => "TIMESTAMP",
        "TIMESTAMP WITH TIME ZONE" => "TIMESTAMPTZ",
        "TIME WITHOUT TIME ZONE" => "TIME",
        other => other,
    };

    format!("{}{}{}", base, args, array)
}

/// Canonical spelling of a SQL expression (check constraints, defaults).
///
/// Whitespace is collapsed and redundant outer parentheses are removed.
/// Case is preserved because expressions may contain string literals.
pub fn canonical_sql(expression: &str) -> String {
    let mut text = squeeze(expression);
    while let Some(inner) = strip_outer_parens(&text) {
        text = inner.trim().to_string();
    }
    text
}

fn squeeze(text: &str) -> String {
    map_unquoted(text.trim(), |segment| {
        let segment = WHITESPACE.replace_all(segment, " ");
        let segment = PAREN_PADDING.replace_all(&segment, |caps: &regex::Captures| {
            caps[0].trim().to_string()
        });
        COMMA_PADDING.replace_all(&segment, ", ").into_owned()
    })
}

/// Rewrites the text outside single-quoted literals with `f`.
///
/// An unterminated literal runs to the end of the text.
fn map_unquoted(text: &str, f: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('\'') {
        out.push_str(&f(&rest[..start]));
        let literal = &rest[start..];
        let end = literal[1..].find('\'').map_or(literal.len(), |i| i + 2);
        out.push_str(&literal[..end]);
        rest = &literal[end..];
    }
    out.push_str(&f(rest));
    out
}

/// Returns the contents of `text` when a single pair of parentheses wraps
/// the whole expression.
fn strip_outer_parens(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    let mut depth = 0i32;
    let mut quoted = false;
    for c in inner.chars() {
        match c {
            '\'' => quoted = !quoted,
            _ if quoted => {}
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    (depth == 0).then_some(inner)
}
