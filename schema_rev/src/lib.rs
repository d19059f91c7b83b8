//! schema_rev: reversible, versioned schema migrations
//!
//! schema_rev diffs an in-memory model of a relational schema against a
//! desired one, stores the difference as a numbered migration of reversible
//! operations, and moves a live database forwards or backwards between
//! revisions of that log.

pub mod config;
pub mod db;
pub mod error;
pub mod migrations;
pub mod schema;
pub mod utils;

// Re-export main types for easier access
pub use config::Config;
pub use db::connection::{Connection, DatabaseConnection, Dialect};
pub use db::executor::{DdlExecutor, DdlIntent, SqlDdlExecutor};
pub use error::{Error, Result};
pub use migrations::{Migration, MigrationLog, MigrationStore, Migrator};
pub use schema::{diff, Operation, Schema, SchemaDiff, SchemaFile, SchemaModel};

/// Initialize schema_rev with the specified configuration file
pub async fn init(config_path: &str) -> Result<SchemaRevClient> {
    let config = config::load_from_file(config_path)?;
    SchemaRevClient::new(config).await
}

/// The main client for interacting with schema_rev
pub struct SchemaRevClient {
    config: Config,
    db_connection: DatabaseConnection,
    migrator: Migrator,
}

impl SchemaRevClient {
    /// Create a new client from configuration
    pub async fn new(config: Config) -> Result<Self> {
        let db_connection = DatabaseConnection::connect(&config.database).await?;
        let migrator = Migrator::from_config(&config.migrations);

        Ok(Self {
            config,
            db_connection,
            migrator,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn migrator(&mut self) -> &mut Migrator {
        &mut self.migrator
    }

    /// Generate a migration from the configured head schema file
    pub fn generate(&mut self) -> Result<Option<&Migration>> {
        let path = self.config.migrations.schema.as_deref().ok_or_else(|| {
            Error::ConfigError("No head schema configured under [migrations] schema".to_string())
        })?;
        let model = SchemaFile::new(path);
        self.migrator.generate(&model)
    }

    /// Move the database to `target`, or to the newest revision
    pub async fn migrate(&mut self, target: Option<i64>, fake: bool) -> Result<usize> {
        let session = self.db_connection.session().await?;
        self.migrator.migrate(&session, target, fake).await
    }

    /// Revision currently recorded in the database
    pub async fn db_revision(&self) -> Result<i64> {
        let session = self.db_connection.session().await?;
        self.migrator.get_db_revision(&session).await
    }
}
