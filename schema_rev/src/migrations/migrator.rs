//! Migrator
//!
//! Generates new migrations from a head schema and moves a database between
//! revisions of the migration log.

use crate::config::MigrationsConfig;
use crate::db::connection::Connection;
use crate::db::executor::{DdlExecutor, LiveTarget, SqlDdlExecutor};
use crate::error::{Error, Result};
use crate::migrations::log::{Migration, MigrationLog};
use crate::migrations::revision::RevisionTable;
use crate::migrations::store::{DirectoryStore, MigrationStore};
use crate::schema::diff::diff;
use crate::schema::source::SchemaModel;

pub struct Migrator {
    store: Box<dyn MigrationStore>,
    executor: Box<dyn DdlExecutor>,
    revisions: RevisionTable,
    transactional: bool,
    log: Option<MigrationLog>,
}

impl Migrator {
    /// Migrator over `store` issuing SQL through [`SqlDdlExecutor`]
    pub fn new(store: impl MigrationStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            executor: Box::new(SqlDdlExecutor::new()),
            revisions: RevisionTable::default(),
            transactional: false,
            log: None,
        }
    }

    pub fn from_config(config: &MigrationsConfig) -> Self {
        Self::new(DirectoryStore::new(&config.directory))
            .with_revision_table(RevisionTable::new(config.revision_table.clone()))
            .transactional(config.transactional)
    }

    pub fn with_executor(mut self, executor: impl DdlExecutor + 'static) -> Self {
        self.executor = Box::new(executor);
        self
    }

    pub fn with_revision_table(mut self, revisions: RevisionTable) -> Self {
        self.revisions = revisions;
        self
    }

    /// Wrap each [`migrate`](Self::migrate) call in BEGIN/COMMIT
    pub fn transactional(mut self, transactional: bool) -> Self {
        self.transactional = transactional;
        self
    }

    /// The migration log, loaded from the store on first use
    pub fn ensure_loaded(&mut self) -> Result<&MigrationLog> {
        let log = load_once(&mut self.log, self.store.as_ref())?;
        Ok(log)
    }

    /// Append a migration taking the log head to `model`.
    ///
    /// Returns `None` when the head already matches.
    pub fn generate(&mut self, model: &dyn SchemaModel) -> Result<Option<&Migration>> {
        let new = model.schema()?;
        let store = self.store.as_ref();
        let log = load_once(&mut self.log, store)?;

        let head = log.replay(log.len())?;
        let operations = diff(&head, &new)?;
        if operations.is_empty() {
            tracing::info!("No schema changes detected");
            return Ok(None);
        }

        tracing::info!(operations = operations.len(), "Generating migration");
        log.append(store, operations).map(Some)
    }

    /// Move the database to `target` (the log head when `None`).
    ///
    /// Both the target and the recorded revision are validated before any
    /// statement runs. With `fake` only the revision table is written.
    /// Returns the revision now recorded.
    pub async fn migrate(
        &mut self,
        connection: &dyn Connection,
        target: Option<i64>,
        fake: bool,
    ) -> Result<usize> {
        let log = load_once(&mut self.log, self.store.as_ref())?;
        let head = log.len();

        let target = check_revision(target.unwrap_or(head as i64), head)?;
        let current = check_revision(self.revisions.current(connection).await?, head)?;

        if self.transactional {
            connection.begin().await?;
        }

        let result = run(
            log,
            connection,
            self.executor.as_ref(),
            &self.revisions,
            current,
            target,
            fake,
        )
        .await;

        if self.transactional {
            match &result {
                Ok(()) => connection.commit().await?,
                Err(e) => {
                    tracing::error!(error = %e, "Migration failed, rolling back");
                    if let Err(rollback) = connection.rollback().await {
                        tracing::error!(error = %rollback, "Rollback failed");
                    }
                }
            }
        }

        result.map(|()| target)
    }

    /// Revision recorded in the database, 0 if none
    pub async fn get_db_revision(&self, connection: &dyn Connection) -> Result<i64> {
        self.revisions.current(connection).await
    }
}

fn load_once<'a>(
    log: &'a mut Option<MigrationLog>,
    store: &dyn MigrationStore,
) -> Result<&'a mut MigrationLog> {
    let loaded = match log.take() {
        Some(loaded) => loaded,
        None => MigrationLog::load(store)?,
    };
    Ok(log.insert(loaded))
}

fn check_revision(revision: i64, head: usize) -> Result<usize> {
    match usize::try_from(revision) {
        Ok(valid) if valid <= head => Ok(valid),
        _ => Err(Error::InvalidRevision { revision, head }),
    }
}

async fn run(
    log: &MigrationLog,
    connection: &dyn Connection,
    executor: &dyn DdlExecutor,
    revisions: &RevisionTable,
    current: usize,
    target: usize,
    fake: bool,
) -> Result<()> {
    if fake {
        tracing::warn!(from = current, to = target, "Recording revision without running migrations");
    } else {
        let mut schema = log.replay(current)?;
        let live = LiveTarget::new(connection, executor);

        let steps: Vec<(usize, usize)> = if current <= target {
            (current + 1..=target).map(|n| (n - 1, n)).collect()
        } else {
            (target + 1..=current).rev().map(|n| (n, n - 1)).collect()
        };

        for (from, to) in steps {
            if from < to {
                tracing::info!(migration = to, "Applying migration");
            } else {
                tracing::info!(migration = from, "Reverting migration");
            }
            for op in log.collect_operations(from, to)? {
                op.apply(&mut schema, Some(&live)).await?;
            }
        }
    }

    revisions.record(connection, target as i64).await?;
    tracing::info!(revision = target, "Database is at revision {}", target);
    Ok(())
}
