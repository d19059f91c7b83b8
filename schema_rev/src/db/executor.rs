//! DDL execution
//!
//! Operations describe their database effect as a [`DdlIntent`]; a
//! [`DdlExecutor`] turns the intent into statements against a
//! [`Connection`].

use async_trait::async_trait;

use crate::db::connection::Connection;
use crate::db::generator::SqlGenerator;
use crate::error::{Error, Result};
use crate::schema::ops::ColumnChanges;
use crate::schema::types::{Check, Column, ForeignKey, Index, PrimaryKey, Schema, Table, Unique};

/// One semantic DDL change
///
/// `table` is always the owning table as it was before the change.
#[derive(Debug, Clone, PartialEq)]
pub enum DdlIntent {
    CreateTable { table: Table },
    DropTable { table: Table },
    RenameTable { from: String, to: String },
    AddColumn { table: Table, column: Column },
    DropColumn { table: Table, column: Column },
    AlterColumn { table: Table, column: Column, changes: ColumnChanges },
    AddPrimaryKey { table: Table, constraint: PrimaryKey },
    DropPrimaryKey { table: Table, constraint: PrimaryKey },
    AddForeignKey { table: Table, constraint: ForeignKey },
    DropForeignKey { table: Table, constraint: ForeignKey },
    AddUnique { table: Table, constraint: Unique },
    DropUnique { table: Table, constraint: Unique },
    AddCheck { table: Table, constraint: Check },
    DropCheck { table: Table, constraint: Check },
    CreateIndex { table: Table, index: Index },
    DropIndex { table: Table, index: Index },
}

impl DdlIntent {
    /// The owning table before the change, if the intent carries one
    pub fn table(&self) -> Option<&Table> {
        match self {
            DdlIntent::RenameTable { .. } => None,
            DdlIntent::CreateTable { table }
            | DdlIntent::DropTable { table }
            | DdlIntent::AddColumn { table, .. }
            | DdlIntent::DropColumn { table, .. }
            | DdlIntent::AlterColumn { table, .. }
            | DdlIntent::AddPrimaryKey { table, .. }
            | DdlIntent::DropPrimaryKey { table, .. }
            | DdlIntent::AddForeignKey { table, .. }
            | DdlIntent::DropForeignKey { table, .. }
            | DdlIntent::AddUnique { table, .. }
            | DdlIntent::DropUnique { table, .. }
            | DdlIntent::AddCheck { table, .. }
            | DdlIntent::DropCheck { table, .. }
            | DdlIntent::CreateIndex { table, .. }
            | DdlIntent::DropIndex { table, .. } => Some(table),
        }
    }
}

/// Issues the SQL for a [`DdlIntent`]
#[async_trait]
pub trait DdlExecutor: Send + Sync {
    /// Execute `intent`. `schema` is the model after the change.
    async fn execute(
        &self,
        connection: &dyn Connection,
        intent: &DdlIntent,
        schema: &Schema,
    ) -> Result<()>;
}

/// Connection and executor used when an operation runs live
#[derive(Clone, Copy)]
pub struct LiveTarget<'a> {
    pub connection: &'a dyn Connection,
    pub executor: &'a dyn DdlExecutor,
}

impl<'a> LiveTarget<'a> {
    pub fn new(connection: &'a dyn Connection, executor: &'a dyn DdlExecutor) -> Self {
        Self { connection, executor }
    }
}

/// Executor rendering intents with [`SqlGenerator`] for the connection's dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlDdlExecutor;

impl SqlDdlExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DdlExecutor for SqlDdlExecutor {
    async fn execute(
        &self,
        connection: &dyn Connection,
        intent: &DdlIntent,
        schema: &Schema,
    ) -> Result<()> {
        let statements = SqlGenerator::new(connection.dialect()).generate(intent, schema)?;

        for statement in &statements {
            tracing::debug!(sql = %statement, "Executing DDL");
            connection.execute(statement).await.map_err(|e| Error::DdlExecution {
                statement: statement.clone(),
                source: Box::new(e),
            })?;
        }

        Ok(())
    }
}
