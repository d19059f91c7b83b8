//! Database connection handling
//!
//! [`Connection`] is the capability migrations run against. The sqlx-backed
//! [`DatabaseSession`] pins one pooled connection so that transaction
//! statements and the DDL inside them share a session.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{
    mysql::MySqlPoolOptions, postgres::PgPoolOptions, sqlite::SqlitePoolOptions, MySql, Pool,
    Postgres, Row, Sqlite,
};
use std::fmt;
use tokio::sync::Mutex;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::utils::naming::{format_sql_identifier, format_sql_literal};

/// SQL dialects with DDL support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    /// Parse a configured driver name
    pub fn from_driver(driver: &str) -> Result<Self> {
        match driver.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::MySql),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(Error::DatabaseError(format!("Unsupported database driver: {}", other))),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        })
    }
}

/// A live database session
///
/// Implementations are driven by one migrator at a time; statements run in
/// the order they are issued.
#[async_trait]
pub trait Connection: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Execute a statement, discarding any rows
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Run a query and return the first column of the first row
    async fn scalar(&self, sql: &str) -> Result<Option<i64>>;

    /// Whether `name` exists. A `schema.table` name is looked up in that
    /// schema, a bare name in the session's current one.
    async fn has_table(&self, name: &str) -> Result<bool> {
        let sql = table_exists_query(name, self.dialect());
        Ok(self.scalar(&sql).await?.unwrap_or(0) > 0)
    }

    async fn begin(&self) -> Result<()> {
        self.execute("BEGIN").await
    }

    async fn commit(&self) -> Result<()> {
        self.execute("COMMIT").await
    }

    async fn rollback(&self) -> Result<()> {
        self.execute("ROLLBACK").await
    }
}

/// `COUNT(*)` query for a table name that may be schema-qualified
pub(crate) fn table_exists_query(name: &str, dialect: Dialect) -> String {
    let (schema, table) = match name.rsplit_once('.') {
        Some((schema, table)) => (Some(schema), table),
        None => (None, name),
    };
    let table = format_sql_literal(table);

    match dialect {
        Dialect::Postgres | Dialect::MySql => {
            let schema = match (schema, dialect) {
                (Some(schema), _) => format_sql_literal(schema),
                (None, Dialect::Postgres) => "current_schema()".to_string(),
                (None, _) => "DATABASE()".to_string(),
            };
            format!(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = {} AND table_name = {}",
                schema, table
            )
        }
        Dialect::Sqlite => {
            let master = match schema {
                Some(schema) => format!("{}.sqlite_master", format_sql_identifier(schema, dialect)),
                None => "sqlite_master".to_string(),
            };
            format!("SELECT COUNT(*) FROM {} WHERE type = 'table' AND name = {}", master, table)
        }
    }
}

/// Enumeration of supported database pools
#[derive(Debug, Clone)]
pub enum DatabaseConnection {
    Postgres(Pool<Postgres>),
    MySql(Pool<MySql>),
    Sqlite(Pool<Sqlite>),
}

impl DatabaseConnection {
    /// Create a new database connection from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool_size = config.pool_size.unwrap_or(5) as u32;
        let timeout = std::time::Duration::from_secs(config.timeout_seconds.unwrap_or(30));

        tracing::debug!(driver = %config.driver, pool_size, "Connecting to database");

        match Dialect::from_driver(&config.driver)? {
            Dialect::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(pool_size)
                    .acquire_timeout(timeout)
                    .connect(&config.url)
                    .await?;

                Ok(DatabaseConnection::Postgres(pool))
            }
            Dialect::MySql => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(pool_size)
                    .acquire_timeout(timeout)
                    .connect(&config.url)
                    .await?;

                Ok(DatabaseConnection::MySql(pool))
            }
            Dialect::Sqlite => {
                let pool = SqlitePoolOptions::new()
                    .max_connections(pool_size)
                    .acquire_timeout(timeout)
                    .connect(&config.url)
                    .await?;

                Ok(DatabaseConnection::Sqlite(pool))
            }
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            DatabaseConnection::Postgres(_) => Dialect::Postgres,
            DatabaseConnection::MySql(_) => Dialect::MySql,
            DatabaseConnection::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Check out one connection from the pool for a migration run
    pub async fn session(&self) -> Result<DatabaseSession> {
        let inner = match self {
            DatabaseConnection::Postgres(pool) => PooledConnection::Postgres(pool.acquire().await?),
            DatabaseConnection::MySql(pool) => PooledConnection::MySql(pool.acquire().await?),
            DatabaseConnection::Sqlite(pool) => PooledConnection::Sqlite(pool.acquire().await?),
        };
        Ok(DatabaseSession { dialect: self.dialect(), inner: Mutex::new(inner) })
    }
}

enum PooledConnection {
    Postgres(PoolConnection<Postgres>),
    MySql(PoolConnection<MySql>),
    Sqlite(PoolConnection<Sqlite>),
}

/// One pooled connection implementing [`Connection`]
pub struct DatabaseSession {
    dialect: Dialect,
    inner: Mutex<PooledConnection>,
}

/// Fetches the first column of the first row as an optional integer.
///
/// Integer columns decode as `INT4` on some backends, so a 32-bit read is
/// attempted when the 64-bit one fails.
macro_rules! fetch_scalar {
    ($executor:expr, $sql:expr) => {{
        match sqlx::query($sql).fetch_optional($executor).await? {
            None => None,
            Some(row) => match row.try_get::<Option<i64>, _>(0) {
                Ok(value) => value,
                Err(_) => row.try_get::<Option<i32>, _>(0)?.map(i64::from),
            },
        }
    }};
}

#[async_trait]
impl Connection for DatabaseSession {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        tracing::trace!(sql, "Executing statement");
        let mut guard = self.inner.lock().await;
        match &mut *guard {
            PooledConnection::Postgres(conn) => {
                sqlx::query(sql).execute(&mut **conn).await?;
            }
            PooledConnection::MySql(conn) => {
                sqlx::query(sql).execute(&mut **conn).await?;
            }
            PooledConnection::Sqlite(conn) => {
                sqlx::query(sql).execute(&mut **conn).await?;
            }
        }
        Ok(())
    }

    async fn scalar(&self, sql: &str) -> Result<Option<i64>> {
        tracing::trace!(sql, "Querying scalar");
        let mut guard = self.inner.lock().await;
        let value = match &mut *guard {
            PooledConnection::Postgres(conn) => fetch_scalar!(&mut **conn, sql),
            PooledConnection::MySql(conn) => fetch_scalar!(&mut **conn, sql),
            PooledConnection::Sqlite(conn) => fetch_scalar!(&mut **conn, sql),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_driver() {
        assert_eq!(Dialect::from_driver("postgres").unwrap(), Dialect::Postgres);
        assert_eq!(Dialect::from_driver("SQLite").unwrap(), Dialect::Sqlite);
        assert!(matches!(Dialect::from_driver("oracle"), Err(Error::DatabaseError(_))));
    }

    #[test]
    fn test_table_exists_query_splits_schema() {
        assert_eq!(
            table_exists_query("app.schema_rev_revision", Dialect::Postgres),
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = 'app' AND table_name = 'schema_rev_revision'"
        );
        assert_eq!(
            table_exists_query("users", Dialect::MySql),
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = 'users'"
        );
        assert_eq!(
            table_exists_query("aux.users", Dialect::Sqlite),
            "SELECT COUNT(*) FROM \"aux\".sqlite_master WHERE type = 'table' AND name = 'users'"
        );
        assert_eq!(
            table_exists_query("users", Dialect::Sqlite),
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'users'"
        );
    }
}
