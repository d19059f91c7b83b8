//! Head schema providers
//!
//! A [`SchemaModel`] produces the desired schema that new migrations are
//! generated against. [`SchemaFile`] reads it from a declarative document:
//!
//! ```yaml
//! tables:
//!   - name: users
//!     columns:
//!       - { name: id, data_type: INTEGER, nullable: false }
//!     primary_key: { columns: [id] }
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::schema::types::{Schema, Table};

/// Source of the head schema
pub trait SchemaModel {
    fn schema(&self) -> Result<Schema>;
}

impl SchemaModel for Schema {
    fn schema(&self) -> Result<Schema> {
        Ok(self.clone())
    }
}

/// Document formats accepted by [`SchemaFile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
    Toml,
}

impl DocumentFormat {
    /// Infer the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "json" => Ok(DocumentFormat::Json),
            "yaml" | "yml" => Ok(DocumentFormat::Yaml),
            "toml" => Ok(DocumentFormat::Toml),
            _ => Err(Error::ConfigError(format!(
                "Unsupported schema file extension: {}",
                path.display()
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SchemaDocument {
    #[serde(default)]
    tables: Vec<Table>,
}

/// Head schema loaded from a JSON, YAML or TOML file
#[derive(Debug, Clone)]
pub struct SchemaFile {
    path: PathBuf,
}

impl SchemaFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse a schema document held in memory
    pub fn parse(text: &str, format: DocumentFormat) -> Result<Schema> {
        let document: SchemaDocument = match format {
            DocumentFormat::Json => serde_json::from_str(text)?,
            DocumentFormat::Yaml => serde_yaml::from_str(text)?,
            DocumentFormat::Toml => toml::from_str(text)?,
        };

        let tables = document
            .tables
            .into_iter()
            .map(checked_table)
            .collect::<Result<Vec<_>>>()?;
        Schema::from_tables(tables)
    }
}

impl SchemaModel for SchemaFile {
    fn schema(&self) -> Result<Schema> {
        let format = DocumentFormat::from_path(&self.path)?;
        let text = fs::read_to_string(&self.path)?;
        tracing::debug!(path = %self.path.display(), ?format, "Loading schema file");
        Self::parse(&text, format)
    }
}

/// Rebuilds a table through the checked mutators so duplicate members are
/// rejected.
fn checked_table(table: Table) -> Result<Table> {
    let mut checked = Table::new(table.name.clone());
    for column in table.columns {
        checked.add_column(column)?;
    }
    if let Some(pk) = table.primary_key {
        checked.set_primary_key(pk)?;
    }
    for fk in table.foreign_keys {
        checked.add_foreign_key(fk)?;
    }
    for unique in table.uniques {
        checked.add_unique(unique)?;
    }
    for check in table.checks {
        checked.add_check(check)?;
    }
    for index in table.indexes {
        checked.add_index(index)?;
    }
    Ok(checked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{Column, PrimaryKey};
    use pretty_assertions::assert_eq;

    fn expected() -> Schema {
        Schema::from_tables([Table::new("users")
            .with_column(Column::new("id", "INTEGER").nullable(false))
            .with_column(Column::new("name", "TEXT"))
            .with_primary_key(PrimaryKey::new(&["id"]))])
        .unwrap()
    }

    #[test]
    fn test_parse_yaml() {
        let text = r#"
tables:
  - name: users
    columns:
      - { name: id, data_type: INTEGER, nullable: false }
      - { name: name, data_type: TEXT }
    primary_key: { columns: [id] }
"#;
        assert_eq!(SchemaFile::parse(text, DocumentFormat::Yaml).unwrap(), expected());
    }

    #[test]
    fn test_parse_toml() {
        let text = r#"
[[tables]]
name = "users"
primary_key = { columns = ["id"] }

[[tables.columns]]
name = "id"
data_type = "INTEGER"
nullable = false

[[tables.columns]]
name = "name"
data_type = "TEXT"
"#;
        assert_eq!(SchemaFile::parse(text, DocumentFormat::Toml).unwrap(), expected());
    }

    #[test]
    fn test_duplicate_columns_are_rejected() {
        let text = r#"{"tables": [{"name": "users", "columns": [
            {"name": "id", "data_type": "INTEGER"},
            {"name": "id", "data_type": "BIGINT"}
        ]}]}"#;
        assert!(matches!(
            SchemaFile::parse(text, DocumentFormat::Json),
            Err(Error::DuplicateObject { kind: "column", .. })
        ));
    }

    #[test]
    fn test_schema_file_reads_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        fs::write(
            &path,
            r#"{"tables": [{"name": "users", "columns": [
                {"name": "id", "data_type": "INTEGER", "nullable": false},
                {"name": "name", "data_type": "TEXT"}
            ], "primary_key": {"columns": ["id"]}}]}"#,
        )
        .unwrap();

        assert_eq!(SchemaFile::new(&path).schema().unwrap(), expected());
        assert!(matches!(
            SchemaFile::new(dir.path().join("schema.xml")).schema(),
            Err(Error::ConfigError(_))
        ));
    }
}
