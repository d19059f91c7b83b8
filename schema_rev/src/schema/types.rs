//! Type definitions for database schema objects

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::schema::keys::{canonical_sql, canonical_type, ObjectKey};

/// Represents a complete database schema
///
/// Tables are keyed by name. Equality ignores table order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub tables: IndexMap<String, Table>,
}

impl Schema {
    /// Create a new empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from a list of tables, rejecting duplicates
    pub fn from_tables(tables: impl IntoIterator<Item = Table>) -> Result<Self> {
        let mut schema = Self::new();
        for table in tables {
            schema.add_table(table)?;
        }
        Ok(schema)
    }

    /// Add a table to the schema
    pub fn add_table(&mut self, table: Table) -> Result<()> {
        if self.tables.contains_key(&table.name) {
            return Err(Error::duplicate("table", format!("{:?}", table.name)));
        }
        self.tables.insert(table.name.clone(), table);
        Ok(())
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::not_found("table", format!("{:?}", name)))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::not_found("table", format!("{:?}", name)))
    }

    pub fn remove_table(&mut self, name: &str) -> Result<Table> {
        self.tables
            .shift_remove(name)
            .ok_or_else(|| Error::not_found("table", format!("{:?}", name)))
    }

    /// Rename a table, repointing foreign keys that reference it
    pub fn rename_table(&mut self, from: &str, to: &str) -> Result<()> {
        if from != to && self.tables.contains_key(to) {
            return Err(Error::duplicate("table", format!("{:?}", to)));
        }
        let mut table = self.remove_table(from)?;
        table.name = to.to_string();
        self.tables.insert(table.name.clone(), table);

        for table in self.tables.values_mut() {
            for fk in &mut table.foreign_keys {
                if fk.ref_table == from {
                    fk.ref_table = to.to_string();
                }
            }
        }
        Ok(())
    }

    /// Rename a column, rewriting every constraint and index that names it
    pub fn rename_column(&mut self, table_name: &str, from: &str, to: &str) -> Result<()> {
        let table = self.table_mut(table_name)?;
        if from != to && table.columns.iter().any(|c| c.name == to) {
            return Err(Error::duplicate(
                "column",
                ObjectKey::Column { table: table_name.to_string(), column: to.to_string() }.to_string(),
            ));
        }
        table.column_mut(from)?.name = to.to_string();

        let rename = |columns: &mut Vec<String>| {
            for column in columns.iter_mut() {
                if column == from {
                    *column = to.to_string();
                }
            }
        };
        if let Some(pk) = &mut table.primary_key {
            rename(&mut pk.columns);
        }
        table.uniques.iter_mut().for_each(|u| rename(&mut u.columns));
        table.indexes.iter_mut().for_each(|i| rename(&mut i.columns));
        table.foreign_keys.iter_mut().for_each(|fk| rename(&mut fk.columns));

        for table in self.tables.values_mut() {
            for fk in &mut table.foreign_keys {
                if fk.ref_table == table_name {
                    rename(&mut fk.ref_columns);
                }
            }
        }
        Ok(())
    }
}

/// Represents a database table
///
/// Child collections are compared as sets keyed by identity, so two tables
/// holding the same objects in a different order are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uniques: Vec<Unique>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<Check>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Index>,
}

impl Table {
    /// Create a new table with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
            uniques: Vec::new(),
            checks: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_primary_key(mut self, pk: PrimaryKey) -> Self {
        self.primary_key = Some(pk);
        self
    }

    pub fn with_foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn with_unique(mut self, unique: Unique) -> Self {
        self.uniques.push(unique);
        self
    }

    pub fn with_check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    pub fn with_index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| self.missing(ObjectKey::Column { table: self.name.clone(), column: name.to_string() }))
    }

    pub fn column_mut(&mut self, name: &str) -> Result<&mut Column> {
        let key = ObjectKey::Column { table: self.name.clone(), column: name.to_string() };
        self.columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::not_found(key.kind(), key.to_string()))
    }

    /// Add a column to the table
    pub fn add_column(&mut self, column: Column) -> Result<()> {
        let key = column.key(&self.name);
        if self.columns.iter().any(|c| c.name == column.name) {
            return Err(Error::duplicate(key.kind(), key.to_string()));
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Result<Column> {
        let position = self.columns.iter().position(|c| c.name == name).ok_or_else(|| {
            self.missing(ObjectKey::Column { table: self.name.clone(), column: name.to_string() })
        })?;
        Ok(self.columns.remove(position))
    }

    pub fn primary_key(&self) -> Result<&PrimaryKey> {
        self.primary_key
            .as_ref()
            .ok_or_else(|| self.missing(ObjectKey::PrimaryKey { table: self.name.clone() }))
    }

    pub fn set_primary_key(&mut self, pk: PrimaryKey) -> Result<()> {
        if self.primary_key.is_some() {
            let key = ObjectKey::PrimaryKey { table: self.name.clone() };
            return Err(Error::duplicate(key.kind(), key.to_string()));
        }
        self.primary_key = Some(pk);
        Ok(())
    }

    pub fn take_primary_key(&mut self) -> Result<PrimaryKey> {
        let key = ObjectKey::PrimaryKey { table: self.name.clone() };
        self.primary_key
            .take()
            .ok_or_else(|| Error::not_found(key.kind(), key.to_string()))
    }

    pub fn foreign_key(&self, key: &ObjectKey) -> Result<&ForeignKey> {
        find(&self.foreign_keys, &self.name, key)
    }

    pub fn add_foreign_key(&mut self, fk: ForeignKey) -> Result<()> {
        insert(&mut self.foreign_keys, &self.name, fk)
    }

    pub fn remove_foreign_key(&mut self, key: &ObjectKey) -> Result<ForeignKey> {
        remove(&mut self.foreign_keys, &self.name, key)
    }

    pub fn unique(&self, key: &ObjectKey) -> Result<&Unique> {
        find(&self.uniques, &self.name, key)
    }

    pub fn add_unique(&mut self, unique: Unique) -> Result<()> {
        insert(&mut self.uniques, &self.name, unique)
    }

    pub fn remove_unique(&mut self, key: &ObjectKey) -> Result<Unique> {
        remove(&mut self.uniques, &self.name, key)
    }

    pub fn check(&self, key: &ObjectKey) -> Result<&Check> {
        find(&self.checks, &self.name, key)
    }

    pub fn add_check(&mut self, check: Check) -> Result<()> {
        insert(&mut self.checks, &self.name, check)
    }

    pub fn remove_check(&mut self, key: &ObjectKey) -> Result<Check> {
        remove(&mut self.checks, &self.name, key)
    }

    pub fn index(&self, key: &ObjectKey) -> Result<&Index> {
        find(&self.indexes, &self.name, key)
    }

    pub fn add_index(&mut self, index: Index) -> Result<()> {
        insert(&mut self.indexes, &self.name, index)
    }

    pub fn remove_index(&mut self, key: &ObjectKey) -> Result<Index> {
        remove(&mut self.indexes, &self.name, key)
    }

    fn missing(&self, key: ObjectKey) -> Error {
        Error::not_found(key.kind(), key.to_string())
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.primary_key == other.primary_key
            && same_set(&self.columns, &other.columns, &self.name)
            && same_set(&self.foreign_keys, &other.foreign_keys, &self.name)
            && same_set(&self.uniques, &other.uniques, &self.name)
            && same_set(&self.checks, &other.checks, &self.name)
            && same_set(&self.indexes, &other.indexes, &self.name)
    }
}

/// An object owned by a table, matched across models by its identity key.
pub trait TableObject: Clone + PartialEq {
    fn key(&self, table: &str) -> ObjectKey;
}

fn same_set<T: TableObject>(left: &[T], right: &[T], table: &str) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut left: Vec<_> = left.iter().map(|o| (o.key(table), o)).collect();
    let mut right: Vec<_> = right.iter().map(|o| (o.key(table), o)).collect();
    left.sort_by(|a, b| a.0.cmp(&b.0));
    right.sort_by(|a, b| a.0.cmp(&b.0));
    left.iter().zip(&right).all(|(l, r)| l.0 == r.0 && l.1 == r.1)
}

fn find<'a, T: TableObject>(items: &'a [T], table: &str, key: &ObjectKey) -> Result<&'a T> {
    items
        .iter()
        .find(|o| &o.key(table) == key)
        .ok_or_else(|| Error::not_found(key.kind(), key.to_string()))
}

fn insert<T: TableObject>(items: &mut Vec<T>, table: &str, item: T) -> Result<()> {
    let key = item.key(table);
    if items.iter().any(|o| o.key(table) == key) {
        return Err(Error::duplicate(key.kind(), key.to_string()));
    }
    items.push(item);
    Ok(())
}

fn remove<T: TableObject>(items: &mut Vec<T>, table: &str, key: &ObjectKey) -> Result<T> {
    let position = items
        .iter()
        .position(|o| &o.key(table) == key)
        .ok_or_else(|| Error::not_found(key.kind(), key.to_string()))?;
    Ok(items.remove(position))
}

/// A column type declaration, compared by its canonical spelling
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataType(String);

impl DataType {
    pub fn new(declaration: impl Into<String>) -> Self {
        Self(declaration.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn canonical(&self) -> String {
        canonical_type(&self.0)
    }
}

impl PartialEq for DataType {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 || self.canonical() == other.canonical()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DataType {
    fn from(declaration: &str) -> Self {
        Self::new(declaration)
    }
}

/// SQL expression text, compared by its canonical spelling
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SqlText(String);

impl SqlText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn canonical(&self) -> String {
        canonical_sql(&self.0)
    }
}

impl PartialEq for SqlText {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 || self.canonical() == other.canonical()
    }
}

impl fmt::Display for SqlText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SqlText {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

fn default_true() -> bool {
    true
}

/// Represents a database column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_onupdate: Option<String>,
}

impl Column {
    /// Create a new nullable column with the given name and type
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: DataType::new(data_type),
            nullable: true,
            server_default: None,
            server_onupdate: None,
        }
    }

    /// Set whether the column is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set a server-side default expression for the column
    pub fn server_default(mut self, default: &str) -> Self {
        self.server_default = Some(default.to_string());
        self
    }

    pub fn server_onupdate(mut self, onupdate: &str) -> Self {
        self.server_onupdate = Some(onupdate.to_string());
        self
    }
}

impl TableObject for Column {
    fn key(&self, table: &str) -> ObjectKey {
        ObjectKey::Column { table: table.to_string(), column: self.name.clone() }
    }
}

/// Represents a primary key constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKey {
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deferrable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initially: Option<String>,
}

impl PrimaryKey {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: owned(columns),
            name: None,
            deferrable: None,
            initially: None,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

impl TableObject for PrimaryKey {
    fn key(&self, table: &str) -> ObjectKey {
        ObjectKey::PrimaryKey { table: table.to_string() }
    }
}

/// Represents a foreign key constraint
///
/// Identity is structural: the local and referenced column lists plus the
/// referenced table. The name is an attribute, since generated names vary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deferrable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initially: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_type: Option<String>,
}

impl ForeignKey {
    pub fn new(columns: &[&str], ref_table: &str, ref_columns: &[&str]) -> Self {
        Self {
            columns: owned(columns),
            ref_table: ref_table.to_string(),
            ref_columns: owned(ref_columns),
            name: None,
            on_update: None,
            on_delete: None,
            deferrable: None,
            initially: None,
            match_type: None,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn on_delete(mut self, action: &str) -> Self {
        self.on_delete = Some(action.to_string());
        self
    }

    pub fn on_update(mut self, action: &str) -> Self {
        self.on_update = Some(action.to_string());
        self
    }
}

impl TableObject for ForeignKey {
    fn key(&self, table: &str) -> ObjectKey {
        ObjectKey::ForeignKey {
            table: table.to_string(),
            columns: self.columns.clone(),
            ref_table: self.ref_table.clone(),
            ref_columns: self.ref_columns.clone(),
        }
    }
}

/// Represents a unique constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unique {
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deferrable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initially: Option<String>,
}

impl Unique {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: owned(columns),
            name: None,
            deferrable: None,
            initially: None,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

impl TableObject for Unique {
    fn key(&self, table: &str) -> ObjectKey {
        ObjectKey::Unique { table: table.to_string(), columns: self.columns.clone() }
    }
}

/// Represents a check constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub expression: SqlText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deferrable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initially: Option<String>,
}

impl Check {
    pub fn new(expression: &str) -> Self {
        Self {
            expression: SqlText::new(expression),
            name: None,
            deferrable: None,
            initially: None,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

impl TableObject for Check {
    fn key(&self, table: &str) -> ObjectKey {
        ObjectKey::Check { table: table.to_string(), expression: self.expression.canonical() }
    }
}

/// Represents an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl Index {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: owned(columns),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

impl TableObject for Index {
    fn key(&self, table: &str) -> ObjectKey {
        ObjectKey::Index { table: table.to_string(), name: self.name.clone() }
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
