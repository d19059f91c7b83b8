//! Error types for schema_rev

use thiserror::Error;

/// Result type for schema_rev operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for schema_rev
#[derive(Error, Debug)]
pub enum Error {
    /// An operation referenced a table, column, constraint or index that is
    /// not present in the model it was applied to.
    #[error("can't find {kind} {key}")]
    ObjectNotFound { kind: &'static str, key: String },

    /// Two schema objects of the same kind share one identity key within a
    /// single model.
    #[error("duplicate {kind} {key}")]
    DuplicateObject { kind: &'static str, key: String },

    #[error("invalid revision {revision}: must be between 0 and {head}")]
    InvalidRevision { revision: i64, head: usize },

    /// A generated DDL statement failed on the connection.
    #[error("DDL execution error: {source} (while executing `{statement}`)")]
    DdlExecution {
        statement: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    pub(crate) fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Error::ObjectNotFound { kind, key: key.into() }
    }

    pub(crate) fn duplicate(kind: &'static str, key: impl Into<String>) -> Self {
        Error::DuplicateObject { kind, key: key.into() }
    }
}

/// Convert Serde JSON errors to schema_rev errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to schema_rev errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}
