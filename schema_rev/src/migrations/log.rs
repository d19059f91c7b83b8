//! Migration log
//!
//! The ordered list of every known migration. Loading replays each
//! operation once against a running model, which both validates the log
//! and captures the reverse of every operation while its prior state is
//! still observable.

use crate::error::{Error, Result};
use crate::migrations::store::{MigrationStore, MigrationUnit};
use crate::schema::ops::Operation;
use crate::schema::types::Schema;

/// One numbered, immutable bundle of operations
#[derive(Debug, Clone, PartialEq)]
pub struct Migration {
    pub number: usize,
    pub operations: Vec<Operation>,
    /// `reverses[i]` undoes `operations[i]`
    pub reverses: Vec<Operation>,
}

/// All migrations in ascending number order
#[derive(Debug, Clone, Default)]
pub struct MigrationLog {
    migrations: Vec<Migration>,
    head: Schema,
}

impl MigrationLog {
    /// Load and validate every migration held by `store`
    pub fn load(store: &dyn MigrationStore) -> Result<Self> {
        let log = Self::from_units(store.list_units()?)?;
        tracing::debug!(migrations = log.len(), "Loaded migration log");
        Ok(log)
    }

    /// Assemble a log from units; numbering must run 1, 2, 3, ...
    pub fn from_units(units: Vec<MigrationUnit>) -> Result<Self> {
        let mut log = Self::default();
        for unit in units {
            let expected = log.migrations.len() + 1;
            if unit.number != expected {
                return Err(Error::MigrationError(format!(
                    "Expected migration {} but found {}",
                    expected, unit.number
                )));
            }
            let reverses = advance(&mut log.head, &unit.operations).map_err(|e| {
                Error::MigrationError(format!("Migration {} does not replay: {}", unit.number, e))
            })?;
            log.migrations.push(Migration { number: unit.number, operations: unit.operations, reverses });
        }
        Ok(log)
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Schema after every migration
    pub fn head(&self) -> &Schema {
        &self.head
    }

    /// Flat operation list moving the schema from revision `start` to `end`.
    ///
    /// Forwards yields the operations of migrations `start+1..=end`. Backwards
    /// yields the reverses of migrations `end+1..=start`, last one first.
    pub fn collect_operations(&self, start: usize, end: usize) -> Result<Vec<Operation>> {
        self.check_revision(start)?;
        self.check_revision(end)?;

        let operations = if start <= end {
            self.migrations[start..end]
                .iter()
                .flat_map(|m| m.operations.iter())
                .cloned()
                .collect()
        } else {
            self.migrations[end..start]
                .iter()
                .rev()
                .flat_map(|m| m.reverses.iter().rev())
                .cloned()
                .collect()
        };
        Ok(operations)
    }

    /// Dry-replay migrations `1..=revision` into a fresh schema
    pub fn replay(&self, revision: usize) -> Result<Schema> {
        let mut schema = Schema::new();
        for op in self.collect_operations(0, revision)? {
            op.apply_to(&mut schema)?;
        }
        Ok(schema)
    }

    /// Persist `operations` as the next migration and add it to the log
    pub fn append(&mut self, store: &dyn MigrationStore, operations: Vec<Operation>) -> Result<&Migration> {
        let number = self.migrations.len() + 1;

        let mut head = self.head.clone();
        let reverses = advance(&mut head, &operations)?;
        store.save_unit(number, &operations)?;

        self.head = head;
        self.migrations.push(Migration { number, operations, reverses });
        tracing::info!(number, "Appended migration");

        Ok(&self.migrations[number - 1])
    }

    fn check_revision(&self, revision: usize) -> Result<()> {
        if revision > self.migrations.len() {
            return Err(Error::InvalidRevision {
                revision: revision as i64,
                head: self.migrations.len(),
            });
        }
        Ok(())
    }
}

/// Applies `operations` to `schema`, returning the reverse of each
fn advance(schema: &mut Schema, operations: &[Operation]) -> Result<Vec<Operation>> {
    operations
        .iter()
        .map(|op| {
            let reverse = op.derive_reverse(schema)?;
            op.apply_to(schema)?;
            Ok(reverse)
        })
        .collect()
}
