//! Migration storage
//!
//! A [`MigrationStore`] persists numbered bundles of operations.
//! [`DirectoryStore`] keeps one pretty-printed JSON file per migration, named
//! by its zero-padded number, with a rendered summary for human readers.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::schema::ops::Operation;

/// One persisted migration
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationUnit {
    pub number: usize,
    pub operations: Vec<Operation>,
}

/// Persistent storage for migration units
pub trait MigrationStore: Send + Sync {
    /// All units in ascending number order
    fn list_units(&self) -> Result<Vec<MigrationUnit>>;

    fn save_unit(&self, number: usize, operations: &[Operation]) -> Result<()>;
}

#[derive(Serialize)]
struct MigrationFileRef<'a> {
    number: usize,
    summary: Vec<String>,
    operations: &'a [Operation],
}

#[derive(Deserialize)]
struct MigrationFile {
    number: usize,
    operations: Vec<Operation>,
}

/// Stores migrations as `0001.json`, `0002.json`, ... in a directory
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    directory: PathBuf,
}

impl DirectoryStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into() }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_name(number: usize) -> String {
        format!("{:04}.json", number)
    }
}

impl MigrationStore for DirectoryStore {
    fn list_units(&self) -> Result<Vec<MigrationUnit>> {
        if !self.directory.exists() {
            return Ok(Vec::new());
        }

        let directory = self.directory.to_str().ok_or_else(|| {
            Error::ConfigError(format!("Non UTF-8 migrations directory: {}", self.directory.display()))
        })?;
        let pattern = format!("{}/[0-9]*.json", glob::Pattern::escape(directory));

        let mut units = Vec::new();
        for entry in glob::glob(&pattern).map_err(|e| Error::ConfigError(e.to_string()))? {
            let path = entry.map_err(|e| Error::IoError(e.into()))?;
            let text = fs::read_to_string(&path)?;
            let file: MigrationFile = serde_json::from_str(&text).map_err(|e| {
                Error::SerializationError(format!("{}: {}", path.display(), e))
            })?;
            units.push(MigrationUnit { number: file.number, operations: file.operations });
        }

        units.sort_by_key(|unit| unit.number);
        tracing::debug!(directory = %self.directory.display(), count = units.len(), "Listed migrations");
        Ok(units)
    }

    fn save_unit(&self, number: usize, operations: &[Operation]) -> Result<()> {
        let file = MigrationFileRef {
            number,
            summary: operations.iter().map(|op| op.to_string()).collect(),
            operations,
        };
        let text = serde_json::to_string_pretty(&file)?;

        fs::create_dir_all(&self.directory)?;
        let path = self.directory.join(Self::file_name(number));
        if path.exists() {
            return Err(Error::MigrationError(format!(
                "Migration file already exists: {}",
                path.display()
            )));
        }
        fs::write(&path, text)?;

        tracing::info!(path = %path.display(), "Wrote migration file");
        Ok(())
    }
}

/// In-memory store, for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    units: Mutex<Vec<MigrationUnit>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with one unit per bundle, numbered from 1
    pub fn with_migrations(migrations: Vec<Vec<Operation>>) -> Self {
        let units = migrations
            .into_iter()
            .enumerate()
            .map(|(i, operations)| MigrationUnit { number: i + 1, operations })
            .collect();
        Self { units: Mutex::new(units) }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<MigrationUnit>>> {
        self.units
            .lock()
            .map_err(|_| Error::MigrationError("Migration store lock poisoned".to_string()))
    }
}

impl MigrationStore for MemoryStore {
    fn list_units(&self) -> Result<Vec<MigrationUnit>> {
        let mut units = self.lock()?.clone();
        units.sort_by_key(|unit| unit.number);
        Ok(units)
    }

    fn save_unit(&self, number: usize, operations: &[Operation]) -> Result<()> {
        let mut units = self.lock()?;
        if units.iter().any(|unit| unit.number == number) {
            return Err(Error::MigrationError(format!("Migration {} already exists", number)));
        }
        units.push(MigrationUnit { number, operations: operations.to_vec() });
        Ok(())
    }
}
