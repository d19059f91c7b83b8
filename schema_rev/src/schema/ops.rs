//! Reversible schema operations
//!
//! Every schema change is one variant of [`Operation`]. An operation can be
//! replayed against an in-memory [`Schema`] (a dry replay) and, when given a
//! [`LiveTarget`], also issues the matching DDL. Reverses are derived from
//! the model state immediately before the operation runs:
//!
//! ```ignore
//! let reverse = op.derive_reverse(&schema)?;
//! op.apply_to(&mut schema)?;
//! ```

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::db::connection::Connection;
use crate::db::executor::{DdlIntent, LiveTarget};
use crate::error::{Error, Result};
use crate::schema::keys::ObjectKey;
use crate::schema::types::{
    Check, Column, DataType, ForeignKey, Index, PrimaryKey, Schema, SqlText, Table, TableObject,
    Unique,
};

/// Which of the three operation shapes a variant belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Shape {
    Drop,
    Add,
    Alter,
    Data,
}

/// A single reversible schema change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Operation {
    AddTable(AddTable),
    DropTable(DropTable),
    AlterTable(AlterTable),
    AddColumn(AddColumn),
    DropColumn(DropColumn),
    AlterColumn(AlterColumn),
    AddPrimaryKey(AddPrimaryKey),
    DropPrimaryKey(DropPrimaryKey),
    AddForeignKey(AddForeignKey),
    DropForeignKey(DropForeignKey),
    AddUnique(AddUnique),
    DropUnique(DropUnique),
    AddCheck(AddCheck),
    DropCheck(DropCheck),
    AddIndex(AddIndex),
    DropIndex(DropIndex),
    #[serde(rename = "DataOperation")]
    Data(DataOperation),
}

/// Creates a table with its columns, keys, checks and indexes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddTable {
    pub table: Table,
}

impl AddTable {
    pub fn from_schema_object(table: &Table) -> Self {
        Self { table: table.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropTable {
    pub table_name: String,
}

impl DropTable {
    pub fn from_schema_object(table: &Table) -> Self {
        Self { table_name: table.name.clone() }
    }
}

/// Renames a table. `name` is `None` when the name is unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlterTable {
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AlterTable {
    pub fn from_schema_object(table: &Table, name: Option<String>) -> Self {
        Self { table_name: table.name.clone(), name }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddColumn {
    pub table_name: String,
    pub column: Column,
}

impl AddColumn {
    pub fn from_schema_object(table_name: &str, column: &Column) -> Self {
        Self { table_name: table_name.to_string(), column: column.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropColumn {
    pub table_name: String,
    pub column_name: String,
}

impl DropColumn {
    pub fn from_schema_object(table_name: &str, column: &Column) -> Self {
        Self { table_name: table_name.to_string(), column_name: column.name.clone() }
    }
}

/// Attribute delta for [`AlterColumn`]; `None` means unchanged.
///
/// The nullable expressions use `Some(None)` to clear the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub server_default: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub server_onupdate: Option<Option<String>>,
}

impl ColumnChanges {
    /// Delta turning `old` into `new`, ignoring the name
    pub fn between(old: &Column, new: &Column) -> Self {
        Self {
            name: None,
            data_type: (old.data_type != new.data_type).then(|| new.data_type.clone()),
            nullable: (old.nullable != new.nullable).then_some(new.nullable),
            server_default: (old.server_default != new.server_default)
                .then(|| new.server_default.clone()),
            server_onupdate: (old.server_onupdate != new.server_onupdate)
                .then(|| new.server_onupdate.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.data_type.is_none()
            && self.nullable.is_none()
            && self.server_default.is_none()
            && self.server_onupdate.is_none()
    }

    /// Captures the current values of every attribute this delta touches
    fn reversed(&self, column: &Column) -> Self {
        Self {
            name: self.name.as_ref().map(|_| column.name.clone()),
            data_type: self.data_type.as_ref().map(|_| column.data_type.clone()),
            nullable: self.nullable.map(|_| column.nullable),
            server_default: self.server_default.as_ref().map(|_| column.server_default.clone()),
            server_onupdate: self.server_onupdate.as_ref().map(|_| column.server_onupdate.clone()),
        }
    }

    /// Applies every attribute except the name
    pub fn apply(&self, column: &mut Column) {
        if let Some(data_type) = &self.data_type {
            column.data_type = data_type.clone();
        }
        if let Some(nullable) = self.nullable {
            column.nullable = nullable;
        }
        if let Some(server_default) = &self.server_default {
            column.server_default = server_default.clone();
        }
        if let Some(server_onupdate) = &self.server_onupdate {
            column.server_onupdate = server_onupdate.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlterColumn {
    pub table_name: String,
    pub column_name: String,
    pub changes: ColumnChanges,
}

impl AlterColumn {
    pub fn from_schema_object(table_name: &str, column: &Column, changes: ColumnChanges) -> Self {
        Self {
            table_name: table_name.to_string(),
            column_name: column.name.clone(),
            changes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddPrimaryKey {
    pub table_name: String,
    pub constraint: PrimaryKey,
}

impl AddPrimaryKey {
    pub fn from_schema_object(table_name: &str, pk: &PrimaryKey) -> Self {
        Self { table_name: table_name.to_string(), constraint: pk.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropPrimaryKey {
    pub table_name: String,
}

impl DropPrimaryKey {
    pub fn from_schema_object(table_name: &str, _pk: &PrimaryKey) -> Self {
        Self { table_name: table_name.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddForeignKey {
    pub table_name: String,
    pub constraint: ForeignKey,
}

impl AddForeignKey {
    pub fn from_schema_object(table_name: &str, fk: &ForeignKey) -> Self {
        Self { table_name: table_name.to_string(), constraint: fk.clone() }
    }
}

/// Drops the foreign key identified by its column mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropForeignKey {
    pub table_name: String,
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
}

impl DropForeignKey {
    pub fn from_schema_object(table_name: &str, fk: &ForeignKey) -> Self {
        Self {
            table_name: table_name.to_string(),
            columns: fk.columns.clone(),
            ref_table: fk.ref_table.clone(),
            ref_columns: fk.ref_columns.clone(),
        }
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::ForeignKey {
            table: self.table_name.clone(),
            columns: self.columns.clone(),
            ref_table: self.ref_table.clone(),
            ref_columns: self.ref_columns.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddUnique {
    pub table_name: String,
    pub constraint: Unique,
}

impl AddUnique {
    pub fn from_schema_object(table_name: &str, unique: &Unique) -> Self {
        Self { table_name: table_name.to_string(), constraint: unique.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropUnique {
    pub table_name: String,
    pub columns: Vec<String>,
}

impl DropUnique {
    pub fn from_schema_object(table_name: &str, unique: &Unique) -> Self {
        Self { table_name: table_name.to_string(), columns: unique.columns.clone() }
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::Unique { table: self.table_name.clone(), columns: self.columns.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddCheck {
    pub table_name: String,
    pub constraint: Check,
}

impl AddCheck {
    pub fn from_schema_object(table_name: &str, check: &Check) -> Self {
        Self { table_name: table_name.to_string(), constraint: check.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropCheck {
    pub table_name: String,
    pub expression: SqlText,
}

impl DropCheck {
    pub fn from_schema_object(table_name: &str, check: &Check) -> Self {
        Self { table_name: table_name.to_string(), expression: check.expression.clone() }
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::Check { table: self.table_name.clone(), expression: self.expression.canonical() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddIndex {
    pub table_name: String,
    pub index: Index,
}

impl AddIndex {
    pub fn from_schema_object(table_name: &str, index: &Index) -> Self {
        Self { table_name: table_name.to_string(), index: index.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropIndex {
    pub table_name: String,
    pub index_name: String,
}

impl DropIndex {
    pub fn from_schema_object(table_name: &str, index: &Index) -> Self {
        Self { table_name: table_name.to_string(), index_name: index.name.clone() }
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::Index { table: self.table_name.clone(), name: self.index_name.clone() }
    }
}

/// Custom code run against a live connection
pub type DataCallback =
    Arc<dyn for<'a> Fn(&'a Schema, &'a dyn Connection) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// One direction of a [`DataOperation`]
///
/// Only SQL text can be persisted; callbacks exist for migrations assembled
/// in code.
#[derive(Clone, Serialize, Deserialize)]
pub enum DataAction {
    Sql(String),
    #[serde(skip)]
    Callback(DataCallback),
}

impl DataAction {
    pub fn sql(sql: &str) -> Self {
        DataAction::Sql(sql.to_string())
    }

    pub fn callback<F>(callback: F) -> Self
    where
        F: for<'a> Fn(&'a Schema, &'a dyn Connection) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        DataAction::Callback(Arc::new(callback))
    }
}

impl fmt::Debug for DataAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataAction::Sql(sql) => f.debug_tuple("Sql").field(sql).finish(),
            DataAction::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

impl PartialEq for DataAction {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DataAction::Sql(a), DataAction::Sql(b)) => a == b,
            (DataAction::Callback(a), DataAction::Callback(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Free-form data change that leaves the schema model untouched
///
/// The reverse swaps `forwards` and `backwards`. When `backwards` is absent
/// the reverse is a no-op whose own reverse is a no-op too; the original
/// forward action is not recovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataOperation {
    #[serde(default)]
    pub forwards: Option<DataAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backwards: Option<DataAction>,
}

impl DataOperation {
    pub fn new(forwards: DataAction, backwards: Option<DataAction>) -> Self {
        Self { forwards: Some(forwards), backwards }
    }

    pub fn sql(forwards: &str, backwards: Option<&str>) -> Self {
        Self::new(DataAction::sql(forwards), backwards.map(DataAction::sql))
    }

    fn reversed(&self) -> Self {
        match &self.backwards {
            Some(backwards) => Self {
                forwards: Some(backwards.clone()),
                backwards: self.forwards.clone(),
            },
            None => Self { forwards: None, backwards: None },
        }
    }

    async fn run(&self, schema: &Schema, connection: &dyn Connection) -> Result<()> {
        match &self.forwards {
            None => Ok(()),
            Some(DataAction::Sql(sql)) => connection.execute(sql).await,
            Some(DataAction::Callback(callback)) => (callback.as_ref())(schema, connection).await,
        }
    }
}

macro_rules! impl_from_operation {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Operation {
                fn from(op: $variant) -> Self {
                    Operation::$variant(op)
                }
            }
        )*
    };
}

impl_from_operation!(
    AddTable, DropTable, AlterTable, AddColumn, DropColumn, AlterColumn, AddPrimaryKey,
    DropPrimaryKey, AddForeignKey, DropForeignKey, AddUnique, DropUnique, AddCheck, DropCheck,
    AddIndex, DropIndex,
);

impl From<DataOperation> for Operation {
    fn from(op: DataOperation) -> Self {
        Operation::Data(op)
    }
}

impl Operation {
    pub fn shape(&self) -> Shape {
        match self {
            Operation::AddTable(_)
            | Operation::AddColumn(_)
            | Operation::AddPrimaryKey(_)
            | Operation::AddForeignKey(_)
            | Operation::AddUnique(_)
            | Operation::AddCheck(_)
            | Operation::AddIndex(_) => Shape::Add,
            Operation::DropTable(_)
            | Operation::DropColumn(_)
            | Operation::DropPrimaryKey(_)
            | Operation::DropForeignKey(_)
            | Operation::DropUnique(_)
            | Operation::DropCheck(_)
            | Operation::DropIndex(_) => Shape::Drop,
            Operation::AlterTable(_) | Operation::AlterColumn(_) => Shape::Alter,
            Operation::Data(_) => Shape::Data,
        }
    }

    /// Position of this operation's bucket in a batch.
    ///
    /// Drops run first with children before parents, then adds with parents
    /// before children, then alters.
    pub fn priority(&self) -> u8 {
        match self {
            Operation::DropCheck(_) => 0,
            Operation::DropForeignKey(_) => 1,
            Operation::DropUnique(_) => 2,
            Operation::DropPrimaryKey(_) => 3,
            Operation::DropIndex(_) => 4,
            Operation::DropColumn(_) => 5,
            Operation::DropTable(_) => 6,
            Operation::AddTable(_) => 10,
            Operation::AddColumn(_) => 11,
            Operation::AddIndex(_) => 12,
            Operation::AddPrimaryKey(_) => 13,
            Operation::AddUnique(_) => 14,
            Operation::AddForeignKey(_) => 15,
            Operation::AddCheck(_) => 16,
            Operation::AlterTable(_) => 20,
            Operation::AlterColumn(_) => 21,
            Operation::Data(_) => 30,
        }
    }

    /// Identity key of the object this operation targets
    pub fn identity_key(&self) -> Option<ObjectKey> {
        let key = match self {
            Operation::AddTable(op) => ObjectKey::Table(op.table.name.clone()),
            Operation::DropTable(op) => ObjectKey::Table(op.table_name.clone()),
            Operation::AlterTable(op) => ObjectKey::Table(op.table_name.clone()),
            Operation::AddColumn(op) => op.column.key(&op.table_name),
            Operation::DropColumn(op) => ObjectKey::Column {
                table: op.table_name.clone(),
                column: op.column_name.clone(),
            },
            Operation::AlterColumn(op) => ObjectKey::Column {
                table: op.table_name.clone(),
                column: op.column_name.clone(),
            },
            Operation::AddPrimaryKey(op) => op.constraint.key(&op.table_name),
            Operation::DropPrimaryKey(op) => ObjectKey::PrimaryKey { table: op.table_name.clone() },
            Operation::AddForeignKey(op) => op.constraint.key(&op.table_name),
            Operation::DropForeignKey(op) => op.key(),
            Operation::AddUnique(op) => op.constraint.key(&op.table_name),
            Operation::DropUnique(op) => op.key(),
            Operation::AddCheck(op) => op.constraint.key(&op.table_name),
            Operation::DropCheck(op) => op.key(),
            Operation::AddIndex(op) => op.index.key(&op.table_name),
            Operation::DropIndex(op) => op.key(),
            Operation::Data(_) => return None,
        };
        Some(key)
    }

    /// Replays this operation against the in-memory model only
    pub fn apply_to(&self, schema: &mut Schema) -> Result<()> {
        match self {
            Operation::AddTable(op) => schema.add_table(op.table.clone()),
            Operation::DropTable(op) => schema.remove_table(&op.table_name).map(drop),
            Operation::AlterTable(op) => match &op.name {
                Some(name) => schema.rename_table(&op.table_name, name),
                None => schema.table(&op.table_name).map(drop),
            },
            Operation::AddColumn(op) => {
                schema.table_mut(&op.table_name)?.add_column(op.column.clone())
            }
            Operation::DropColumn(op) => {
                schema.table_mut(&op.table_name)?.remove_column(&op.column_name).map(drop)
            }
            Operation::AlterColumn(op) => {
                let table = schema.table(&op.table_name)?;
                table.column(&op.column_name)?;
                if let Some(name) = &op.changes.name {
                    if name != &op.column_name && table.column(name).is_ok() {
                        return Err(Error::duplicate(
                            "column",
                            ObjectKey::Column { table: op.table_name.clone(), column: name.clone() }
                                .to_string(),
                        ));
                    }
                }

                op.changes.apply(schema.table_mut(&op.table_name)?.column_mut(&op.column_name)?);
                if let Some(name) = &op.changes.name {
                    schema.rename_column(&op.table_name, &op.column_name, name)?;
                }
                Ok(())
            }
            Operation::AddPrimaryKey(op) => {
                schema.table_mut(&op.table_name)?.set_primary_key(op.constraint.clone())
            }
            Operation::DropPrimaryKey(op) => {
                schema.table_mut(&op.table_name)?.take_primary_key().map(drop)
            }
            Operation::AddForeignKey(op) => {
                schema.table_mut(&op.table_name)?.add_foreign_key(op.constraint.clone())
            }
            Operation::DropForeignKey(op) => {
                schema.table_mut(&op.table_name)?.remove_foreign_key(&op.key()).map(drop)
            }
            Operation::AddUnique(op) => {
                schema.table_mut(&op.table_name)?.add_unique(op.constraint.clone())
            }
            Operation::DropUnique(op) => {
                schema.table_mut(&op.table_name)?.remove_unique(&op.key()).map(drop)
            }
            Operation::AddCheck(op) => {
                schema.table_mut(&op.table_name)?.add_check(op.constraint.clone())
            }
            Operation::DropCheck(op) => {
                schema.table_mut(&op.table_name)?.remove_check(&op.key()).map(drop)
            }
            Operation::AddIndex(op) => schema.table_mut(&op.table_name)?.add_index(op.index.clone()),
            Operation::DropIndex(op) => {
                schema.table_mut(&op.table_name)?.remove_index(&op.key()).map(drop)
            }
            Operation::Data(_) => Ok(()),
        }
    }

    /// Builds the operation undoing this one.
    ///
    /// `schema` must be the model state immediately before this operation is
    /// applied; drops and alters read the prior definition from it.
    pub fn derive_reverse(&self, schema: &Schema) -> Result<Operation> {
        let reverse = match self {
            Operation::AddTable(op) => DropTable::from_schema_object(&op.table).into(),
            Operation::DropTable(op) => {
                AddTable::from_schema_object(schema.table(&op.table_name)?).into()
            }
            Operation::AlterTable(op) => {
                let table = schema.table(&op.table_name)?;
                AlterTable {
                    table_name: op.name.clone().unwrap_or_else(|| table.name.clone()),
                    name: op.name.as_ref().map(|_| table.name.clone()),
                }
                .into()
            }
            Operation::AddColumn(op) => {
                schema.table(&op.table_name)?;
                DropColumn::from_schema_object(&op.table_name, &op.column).into()
            }
            Operation::DropColumn(op) => {
                let column = schema.table(&op.table_name)?.column(&op.column_name)?;
                AddColumn::from_schema_object(&op.table_name, column).into()
            }
            Operation::AlterColumn(op) => {
                let column = schema.table(&op.table_name)?.column(&op.column_name)?;
                AlterColumn {
                    table_name: op.table_name.clone(),
                    column_name: op.changes.name.clone().unwrap_or_else(|| column.name.clone()),
                    changes: op.changes.reversed(column),
                }
                .into()
            }
            Operation::AddPrimaryKey(op) => {
                schema.table(&op.table_name)?;
                DropPrimaryKey::from_schema_object(&op.table_name, &op.constraint).into()
            }
            Operation::DropPrimaryKey(op) => {
                let pk = schema.table(&op.table_name)?.primary_key()?;
                AddPrimaryKey::from_schema_object(&op.table_name, pk).into()
            }
            Operation::AddForeignKey(op) => {
                schema.table(&op.table_name)?;
                DropForeignKey::from_schema_object(&op.table_name, &op.constraint).into()
            }
            Operation::DropForeignKey(op) => {
                let fk = schema.table(&op.table_name)?.foreign_key(&op.key())?;
                AddForeignKey::from_schema_object(&op.table_name, fk).into()
            }
            Operation::AddUnique(op) => {
                schema.table(&op.table_name)?;
                DropUnique::from_schema_object(&op.table_name, &op.constraint).into()
            }
            Operation::DropUnique(op) => {
                let unique = schema.table(&op.table_name)?.unique(&op.key())?;
                AddUnique::from_schema_object(&op.table_name, unique).into()
            }
            Operation::AddCheck(op) => {
                schema.table(&op.table_name)?;
                DropCheck::from_schema_object(&op.table_name, &op.constraint).into()
            }
            Operation::DropCheck(op) => {
                let check = schema.table(&op.table_name)?.check(&op.key())?;
                AddCheck::from_schema_object(&op.table_name, check).into()
            }
            Operation::AddIndex(op) => {
                schema.table(&op.table_name)?;
                DropIndex::from_schema_object(&op.table_name, &op.index).into()
            }
            Operation::DropIndex(op) => {
                let index = schema.table(&op.table_name)?.index(&op.key())?;
                AddIndex::from_schema_object(&op.table_name, index).into()
            }
            Operation::Data(op) => op.reversed().into(),
        };
        Ok(reverse)
    }

    /// Applies this operation to `schema` and, when `live` is given, issues
    /// the matching DDL.
    ///
    /// Missing objects are reported before any statement is sent.
    pub async fn apply(&self, schema: &mut Schema, live: Option<&LiveTarget<'_>>) -> Result<()> {
        let Some(live) = live else {
            return self.apply_to(schema);
        };

        if let Operation::Data(op) = self {
            tracing::debug!(operation = %self, "running data operation");
            return op.run(schema, live.connection).await;
        }

        let intent = self.ddl_intent(schema)?;
        self.apply_to(schema)?;
        if let Some(intent) = intent {
            tracing::debug!(operation = %self, "issuing DDL");
            live.executor.execute(live.connection, &intent, schema).await?;
        }
        Ok(())
    }

    /// DDL intent for this operation, read from the state before it runs
    pub(crate) fn ddl_intent(&self, schema: &Schema) -> Result<Option<DdlIntent>> {
        let intent = match self {
            Operation::AddTable(op) => DdlIntent::CreateTable { table: op.table.clone() },
            Operation::DropTable(op) => DdlIntent::DropTable {
                table: schema.table(&op.table_name)?.clone(),
            },
            Operation::AlterTable(op) => match &op.name {
                Some(name) if name != &op.table_name => DdlIntent::RenameTable {
                    from: schema.table(&op.table_name)?.name.clone(),
                    to: name.clone(),
                },
                _ => return Ok(None),
            },
            Operation::AddColumn(op) => DdlIntent::AddColumn {
                table: schema.table(&op.table_name)?.clone(),
                column: op.column.clone(),
            },
            Operation::DropColumn(op) => {
                let table = schema.table(&op.table_name)?;
                DdlIntent::DropColumn {
                    column: table.column(&op.column_name)?.clone(),
                    table: table.clone(),
                }
            }
            Operation::AlterColumn(op) => {
                let table = schema.table(&op.table_name)?;
                let column = table.column(&op.column_name)?;
                if op.changes.is_empty() {
                    return Ok(None);
                }
                DdlIntent::AlterColumn {
                    column: column.clone(),
                    changes: op.changes.clone(),
                    table: table.clone(),
                }
            }
            Operation::AddPrimaryKey(op) => DdlIntent::AddPrimaryKey {
                table: schema.table(&op.table_name)?.clone(),
                constraint: op.constraint.clone(),
            },
            Operation::DropPrimaryKey(op) => {
                let table = schema.table(&op.table_name)?;
                DdlIntent::DropPrimaryKey {
                    constraint: table.primary_key()?.clone(),
                    table: table.clone(),
                }
            }
            Operation::AddForeignKey(op) => DdlIntent::AddForeignKey {
                table: schema.table(&op.table_name)?.clone(),
                constraint: op.constraint.clone(),
            },
            Operation::DropForeignKey(op) => {
                let table = schema.table(&op.table_name)?;
                DdlIntent::DropForeignKey {
                    constraint: table.foreign_key(&op.key())?.clone(),
                    table: table.clone(),
                }
            }
            Operation::AddUnique(op) => DdlIntent::AddUnique {
                table: schema.table(&op.table_name)?.clone(),
                constraint: op.constraint.clone(),
            },
            Operation::DropUnique(op) => {
                let table = schema.table(&op.table_name)?;
                DdlIntent::DropUnique {
                    constraint: table.unique(&op.key())?.clone(),
                    table: table.clone(),
                }
            }
            Operation::AddCheck(op) => DdlIntent::AddCheck {
                table: schema.table(&op.table_name)?.clone(),
                constraint: op.constraint.clone(),
            },
            Operation::DropCheck(op) => {
                let table = schema.table(&op.table_name)?;
                DdlIntent::DropCheck {
                    constraint: table.check(&op.key())?.clone(),
                    table: table.clone(),
                }
            }
            Operation::AddIndex(op) => DdlIntent::CreateIndex {
                table: schema.table(&op.table_name)?.clone(),
                index: op.index.clone(),
            },
            Operation::DropIndex(op) => {
                let table = schema.table(&op.table_name)?;
                DdlIntent::DropIndex {
                    index: table.index(&op.key())?.clone(),
                    table: table.clone(),
                }
            }
            Operation::Data(_) => return Ok(None),
        };
        Ok(Some(intent))
    }
}

/// Serde adapter keeping `Some(None)` distinct from an absent field
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn users() -> Table {
        Table::new("users")
            .with_column(Column::new("id", "INTEGER").nullable(false))
            .with_column(Column::new("name", "TEXT").nullable(false))
            .with_primary_key(PrimaryKey::new(&["id"]).named("pk_users"))
    }

    fn posts() -> Table {
        Table::new("posts")
            .with_column(Column::new("id", "INTEGER").nullable(false))
            .with_column(Column::new("user_id", "INTEGER"))
            .with_column(Column::new("title", "TEXT").server_default("''"))
            .with_primary_key(PrimaryKey::new(&["id"]))
            .with_foreign_key(ForeignKey::new(&["user_id"], "users", &["id"]).on_delete("CASCADE"))
            .with_unique(Unique::new(&["title"]).named("uq_posts_title"))
            .with_check(Check::new("length(title) > 0"))
            .with_index(Index::new("ix_posts_user_id", &["user_id"]))
    }

    fn model() -> Schema {
        Schema::from_tables([users(), posts()]).unwrap()
    }

    /// Applies `op`, then its reverse, and checks the model is restored
    fn assert_round_trip(op: Operation) {
        let original = model();
        let mut schema = original.clone();
        let reverse = op.derive_reverse(&schema).unwrap();
        op.apply_to(&mut schema).unwrap();
        assert_ne!(schema, original, "{} did not change the model", op);

        let reverse_of_reverse = reverse.derive_reverse(&schema).unwrap();
        reverse.apply_to(&mut schema).unwrap();
        assert_eq!(schema, original, "{} was not undone by {}", op, reverse);
        assert_eq!(reverse_of_reverse, op);
    }

    #[test]
    fn test_table_round_trips() {
        assert_round_trip(AddTable::from_schema_object(&Table::new("tags").with_column(Column::new("id", "INTEGER"))).into());
        assert_round_trip(DropTable { table_name: "posts".into() }.into());
        assert_round_trip(AlterTable { table_name: "users".into(), name: Some("accounts".into()) }.into());
    }

    #[test]
    fn test_column_round_trips() {
        assert_round_trip(AddColumn::from_schema_object("users", &Column::new("email", "TEXT")).into());
        assert_round_trip(DropColumn { table_name: "posts".into(), column_name: "title".into() }.into());
        assert_round_trip(
            AlterColumn {
                table_name: "posts".into(),
                column_name: "title".into(),
                changes: ColumnChanges {
                    name: Some("headline".into()),
                    data_type: Some("VARCHAR(200)".into()),
                    nullable: Some(false),
                    server_default: Some(None),
                    server_onupdate: None,
                },
            }
            .into(),
        );
    }

    #[test]
    fn test_constraint_round_trips() {
        assert_round_trip(DropPrimaryKey { table_name: "users".into() }.into());
        assert_round_trip(
            AddForeignKey::from_schema_object("posts", &ForeignKey::new(&["id"], "users", &["id"])).into(),
        );
        assert_round_trip(DropForeignKey::from_schema_object("posts", &posts().foreign_keys[0]).into());
        assert_round_trip(AddUnique::from_schema_object("users", &Unique::new(&["name"])).into());
        assert_round_trip(DropUnique { table_name: "posts".into(), columns: vec!["title".into()] }.into());
        assert_round_trip(AddCheck::from_schema_object("users", &Check::new("id > 0")).into());
        assert_round_trip(DropCheck { table_name: "posts".into(), expression: "(length(title)  > 0)".into() }.into());
        assert_round_trip(AddIndex::from_schema_object("users", &Index::new("ix_users_name", &["name"])).into());
        assert_round_trip(DropIndex { table_name: "posts".into(), index_name: "ix_posts_user_id".into() }.into());
    }

    #[test]
    fn test_add_primary_key_round_trip() {
        let mut schema = model();
        schema.table_mut("posts").unwrap().primary_key = None;
        let original = schema.clone();

        let op: Operation = AddPrimaryKey::from_schema_object("posts", &PrimaryKey::new(&["id"])).into();
        let reverse = op.derive_reverse(&schema).unwrap();
        op.apply_to(&mut schema).unwrap();
        reverse.apply_to(&mut schema).unwrap();
        assert_eq!(schema, original);
    }

    #[test]
    fn test_missing_objects_are_reported() {
        let mut schema = model();
        let op: Operation = DropColumn { table_name: "users".into(), column_name: "email".into() }.into();
        assert!(matches!(op.derive_reverse(&schema), Err(Error::ObjectNotFound { kind: "column", .. })));
        assert!(matches!(op.apply_to(&mut schema), Err(Error::ObjectNotFound { .. })));

        let op: Operation = AddColumn::from_schema_object("tags", &Column::new("id", "INTEGER")).into();
        assert!(matches!(op.apply_to(&mut schema), Err(Error::ObjectNotFound { kind: "table", .. })));
    }

    #[test]
    fn test_alter_column_without_changes_is_noop() {
        let mut schema = model();
        let op: Operation = AlterColumn {
            table_name: "users".into(),
            column_name: "name".into(),
            changes: ColumnChanges::default(),
        }
        .into();
        op.apply_to(&mut schema).unwrap();
        assert_eq!(schema, model());
        assert_eq!(op.ddl_intent(&schema).unwrap().map(|_| ()), None);
    }

    #[test]
    fn test_rename_onto_existing_column_leaves_model_untouched() {
        let mut schema = model();
        let op: Operation = AlterColumn {
            table_name: "posts".into(),
            column_name: "title".into(),
            changes: ColumnChanges {
                name: Some("user_id".into()),
                data_type: Some("VARCHAR(200)".into()),
                nullable: Some(false),
                server_default: Some(None),
                server_onupdate: None,
            },
        }
        .into();

        assert!(matches!(op.apply_to(&mut schema), Err(Error::DuplicateObject { kind: "column", .. })));
        assert_eq!(schema, model());
        let title = schema.table("posts").unwrap().column("title").unwrap();
        assert_eq!(title.server_default.as_deref(), Some("''"));
        assert!(title.nullable);
    }

    #[test]
    fn test_data_operation_reverse_swaps_directions() {
        let op = DataOperation::sql("UPDATE users SET name = upper(name)", Some("UPDATE users SET name = lower(name)"));
        let reverse = Operation::from(op.clone()).derive_reverse(&model()).unwrap();
        assert_eq!(
            reverse,
            Operation::Data(DataOperation::sql("UPDATE users SET name = lower(name)", Some("UPDATE users SET name = upper(name)")))
        );
    }

    #[test]
    fn test_one_way_data_operation_reverses_to_noop_pair() {
        let op: Operation = DataOperation::sql("DELETE FROM users", None).into();
        let reverse = op.derive_reverse(&model()).unwrap();
        let noop = Operation::Data(DataOperation { forwards: None, backwards: None });
        assert_eq!(reverse, noop);
        // The original forward action is not recovered.
        assert_eq!(reverse.derive_reverse(&model()).unwrap(), noop);
    }

    #[test]
    fn test_serialized_alter_column_keeps_cleared_default() {
        let op: Operation = AlterColumn {
            table_name: "posts".into(),
            column_name: "title".into(),
            changes: ColumnChanges { server_default: Some(None), ..Default::default() },
        }
        .into();
        let json = serde_json::to_string(&op).unwrap();
        let parsed: Operation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, op);
    }

    #[test]
    fn test_callbacks_cannot_be_serialized() {
        fn noop<'a>(_: &'a Schema, _: &'a dyn Connection) -> BoxFuture<'a, Result<()>> {
            Box::pin(async { Ok(()) })
        }
        let op: Operation = DataOperation::new(DataAction::callback(noop), None).into();
        assert!(serde_json::to_string(&op).is_err());
    }
}
