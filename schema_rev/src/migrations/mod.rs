//! Migrations module for schema_rev
//!
//! Persisted migration units, the in-memory log built from them, the
//! revision table tracking what a database has applied, and the migrator
//! tying them together.

pub mod log;
pub mod migrator;
pub mod revision;
pub mod store;

pub use log::{Migration, MigrationLog};
pub use migrator::Migrator;
pub use revision::{RevisionRecord, RevisionTable, DEFAULT_REVISION_TABLE};
pub use store::{DirectoryStore, MemoryStore, MigrationStore, MigrationUnit};
