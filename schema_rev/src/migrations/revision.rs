//! Revision control table
//!
//! An append-only table recording which revision the database was migrated
//! to and when. The newest row by `order` holds the current revision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::connection::Connection;
use crate::error::Result;
use crate::utils::naming::{format_sql_identifier, format_sql_literal};

pub const DEFAULT_REVISION_TABLE: &str = "schema_rev_revision";

/// One row of the revision table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub order: i64,
    pub revision: i64,
    pub date_applied: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionTable {
    name: String,
}

impl Default for RevisionTable {
    fn default() -> Self {
        Self::new(DEFAULT_REVISION_TABLE)
    }
}

impl RevisionTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Revision of the most recent record, or 0 when nothing was recorded yet
    pub async fn current(&self, connection: &dyn Connection) -> Result<i64> {
        if !connection.has_table(&self.name).await? {
            return Ok(0);
        }

        let dialect = connection.dialect();
        let sql = format!(
            "SELECT revision FROM {} ORDER BY {} DESC LIMIT 1",
            format_sql_identifier(&self.name, dialect),
            format_sql_identifier("order", dialect),
        );
        Ok(connection.scalar(&sql).await?.unwrap_or(0))
    }

    /// Append a record for `revision`, creating the table on first use
    pub async fn record(&self, connection: &dyn Connection, revision: i64) -> Result<RevisionRecord> {
        let dialect = connection.dialect();
        let table = format_sql_identifier(&self.name, dialect);
        let order_column = format_sql_identifier("order", dialect);

        connection
            .execute(&format!(
                "CREATE TABLE IF NOT EXISTS {} ({} INTEGER NOT NULL, revision INTEGER NOT NULL, \
                 date_applied TIMESTAMP NOT NULL)",
                table, order_column
            ))
            .await?;

        let last = connection
            .scalar(&format!("SELECT MAX({}) FROM {}", order_column, table))
            .await?;

        let record = RevisionRecord {
            order: last.unwrap_or(0) + 1,
            revision,
            date_applied: Utc::now(),
        };

        connection
            .execute(&format!(
                "INSERT INTO {} ({}, revision, date_applied) VALUES ({}, {}, {})",
                table,
                order_column,
                record.order,
                record.revision,
                format_sql_literal(&record.date_applied.format("%Y-%m-%d %H:%M:%S").to_string()),
            ))
            .await?;

        tracing::debug!(table = %self.name, order = record.order, revision, "Recorded revision");
        Ok(record)
    }
}
