//! Shared fakes for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use schema_rev::db::{Connection, DdlExecutor, DdlIntent, Dialect};
use schema_rev::schema::types::{Check, Column, ForeignKey, Index, PrimaryKey, TableObject, Unique};
use schema_rev::schema::Schema;
use schema_rev::{Error, Result};

static CREATE_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^CREATE TABLE IF NOT EXISTS "([^"]+)""#).unwrap());
static INSERT_REVISION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^INSERT INTO .* VALUES \((\d+), (-?\d+), ").unwrap());

/// In-memory connection that records every statement and emulates the
/// revision table.
#[derive(Default)]
pub struct FakeConnection {
    statements: Mutex<Vec<String>>,
    tables: Mutex<BTreeSet<String>>,
    revisions: Mutex<Vec<(i64, i64)>>,
    fail_on: Option<String>,
}

impl FakeConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements containing `needle` fail
    pub fn failing_on(needle: &str) -> Self {
        Self { fail_on: Some(needle.to_string()), ..Self::default() }
    }

    /// Pretend `revision` was recorded by an earlier run
    pub fn with_revision(self, table: &str, revision: i64) -> Self {
        self.tables.lock().unwrap().insert(table.to_string());
        self.revisions.lock().unwrap().push((1, revision));
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    /// `(order, revision)` rows in insertion order
    pub fn revision_rows(&self) -> Vec<(i64, i64)> {
        self.revisions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connection for FakeConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        self.statements.lock().unwrap().push(sql.to_string());

        if let Some(needle) = &self.fail_on {
            if sql.contains(needle.as_str()) {
                return Err(Error::DatabaseError(format!("refused: {}", sql)));
            }
        }
        if let Some(caps) = CREATE_TABLE.captures(sql) {
            self.tables.lock().unwrap().insert(caps[1].to_string());
        }
        if let Some(caps) = INSERT_REVISION.captures(sql) {
            let order = caps[1].parse().unwrap();
            let revision = caps[2].parse().unwrap();
            self.revisions.lock().unwrap().push((order, revision));
        }
        Ok(())
    }

    async fn scalar(&self, sql: &str) -> Result<Option<i64>> {
        let rows = self.revisions.lock().unwrap();
        if sql.starts_with("SELECT MAX(") {
            return Ok(rows.iter().map(|(order, _)| *order).max());
        }
        if sql.starts_with("SELECT revision FROM") {
            return Ok(rows.iter().max_by_key(|(order, _)| *order).map(|(_, revision)| *revision));
        }
        Ok(None)
    }

    async fn has_table(&self, name: &str) -> Result<bool> {
        Ok(self.tables.lock().unwrap().contains(name))
    }
}

#[derive(Default)]
struct Recorded {
    intents: Vec<DdlIntent>,
    live: Schema,
}

/// Executor that applies intents to its own model of the live database
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    state: Arc<Mutex<Recorded>>,
    fail_on_table: Option<String>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor whose database already holds `live`
    pub fn with_live(live: Schema) -> Self {
        let executor = Self::default();
        executor.state.lock().unwrap().live = live;
        executor
    }

    /// Any intent touching `table` fails
    pub fn failing_on_table(table: &str) -> Self {
        Self { fail_on_table: Some(table.to_string()), ..Self::default() }
    }

    pub fn intents(&self) -> Vec<DdlIntent> {
        self.state.lock().unwrap().intents.clone()
    }

    pub fn live(&self) -> Schema {
        self.state.lock().unwrap().live.clone()
    }
}

#[async_trait]
impl DdlExecutor for RecordingExecutor {
    async fn execute(
        &self,
        _connection: &dyn Connection,
        intent: &DdlIntent,
        _schema: &Schema,
    ) -> Result<()> {
        let table = match intent {
            DdlIntent::RenameTable { from, .. } => from.clone(),
            other => other.table().map(|t| t.name.clone()).unwrap_or_default(),
        };
        if self.fail_on_table.as_deref() == Some(table.as_str()) {
            return Err(Error::DdlExecution {
                statement: format!("{:?}", intent),
                source: Box::new(Error::DatabaseError(format!("refused DDL on {}", table))),
            });
        }

        let mut state = self.state.lock().unwrap();
        apply_intent(&mut state.live, intent, &table)?;
        state.intents.push(intent.clone());
        Ok(())
    }
}

fn apply_intent(live: &mut Schema, intent: &DdlIntent, table: &str) -> Result<()> {
    match intent {
        DdlIntent::CreateTable { table } => live.add_table(table.clone()),
        DdlIntent::DropTable { .. } => live.remove_table(table).map(drop),
        DdlIntent::RenameTable { from, to } => live.rename_table(from, to),
        DdlIntent::AddColumn { column, .. } => live.table_mut(table)?.add_column(column.clone()),
        DdlIntent::DropColumn { column, .. } => {
            live.table_mut(table)?.remove_column(&column.name).map(drop)
        }
        DdlIntent::AlterColumn { column, changes, .. } => {
            changes.apply(live.table_mut(table)?.column_mut(&column.name)?);
            match &changes.name {
                Some(name) => live.rename_column(table, &column.name, name),
                None => Ok(()),
            }
        }
        DdlIntent::AddPrimaryKey { constraint, .. } => {
            live.table_mut(table)?.set_primary_key(constraint.clone())
        }
        DdlIntent::DropPrimaryKey { .. } => live.table_mut(table)?.take_primary_key().map(drop),
        DdlIntent::AddForeignKey { constraint, .. } => {
            live.table_mut(table)?.add_foreign_key(constraint.clone())
        }
        DdlIntent::DropForeignKey { constraint, .. } => live
            .table_mut(table)?
            .remove_foreign_key(&key_of::<ForeignKey>(constraint, table))
            .map(drop),
        DdlIntent::AddUnique { constraint, .. } => live.table_mut(table)?.add_unique(constraint.clone()),
        DdlIntent::DropUnique { constraint, .. } => live
            .table_mut(table)?
            .remove_unique(&key_of::<Unique>(constraint, table))
            .map(drop),
        DdlIntent::AddCheck { constraint, .. } => live.table_mut(table)?.add_check(constraint.clone()),
        DdlIntent::DropCheck { constraint, .. } => live
            .table_mut(table)?
            .remove_check(&key_of::<Check>(constraint, table))
            .map(drop),
        DdlIntent::CreateIndex { index, .. } => live.table_mut(table)?.add_index(index.clone()),
        DdlIntent::DropIndex { index, .. } => live
            .table_mut(table)?
            .remove_index(&key_of::<Index>(index, table))
            .map(drop),
    }
}

fn key_of<T: TableObject>(object: &T, table: &str) -> schema_rev::schema::ObjectKey {
    object.key(table)
}

/// `users` with a primary key, a unique email, a check and an index
pub fn users() -> schema_rev::schema::Table {
    schema_rev::schema::Table::new("users")
        .with_column(Column::new("id", "INTEGER").nullable(false))
        .with_column(Column::new("name", "TEXT").nullable(false))
        .with_column(Column::new("email", "TEXT"))
        .with_primary_key(PrimaryKey::new(&["id"]))
        .with_unique(Unique::new(&["email"]))
        .with_check(Check::new("length(name) > 0"))
        .with_index(Index::new("ix_users_name", &["name"]))
}

/// `posts` referencing `users`
pub fn posts() -> schema_rev::schema::Table {
    schema_rev::schema::Table::new("posts")
        .with_column(Column::new("id", "INTEGER").nullable(false))
        .with_column(Column::new("user_id", "INTEGER").nullable(false))
        .with_column(Column::new("title", "TEXT"))
        .with_primary_key(PrimaryKey::new(&["id"]))
        .with_foreign_key(ForeignKey::new(&["user_id"], "users", &["id"]).on_delete("CASCADE"))
}
