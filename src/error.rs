//! Error type shared by generators, properties and writers.

use std::fmt;

use crate::entity::IdType;

/// Boxed error reported by a database connection.
pub type DbError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for SQL generation
#[derive(Debug)]
pub enum GeneratorError {
    /// The caller violated a precondition (e.g. wrote an entity twice).
    Precondition(String),
    Overflow {
        value: i64,
        id_type: IdType,
    },
    /// A statement could not be executed against the connection.
    Execution {
        sql: String,
        source: DbError,
    },
    /// A generator could not be initialized from the database.
    GeneratorSync {
        sql: String,
        reason: String,
    },
    Configuration(String),
    Connection(DbError),
    Io(std::io::Error),
    Dataset(String),
}

impl GeneratorError {
    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        GeneratorError::Precondition(msg.into())
    }
}

impl fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorError::Precondition(msg) => write!(f, "Precondition failed: {}", msg),
            GeneratorError::Overflow { value, id_type } => {
                write!(f, "Generated id {} does not fit into {}", value, id_type)
            }
            GeneratorError::Execution { sql, source } => {
                write!(f, "Could not execute statement: {} ({})", sql, source)
            }
            GeneratorError::GeneratorSync { sql, reason } => {
                write!(f, "Can't initialize generator with {}: {}", sql, reason)
            }
            GeneratorError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            GeneratorError::Connection(e) => write!(f, "Connection error: {}", e),
            GeneratorError::Io(e) => write!(f, "IO error: {}", e),
            GeneratorError::Dataset(msg) => write!(f, "Dataset error: {}", msg),
        }
    }
}

impl std::error::Error for GeneratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GeneratorError::Execution { source, .. } => Some(source.as_ref()),
            GeneratorError::Connection(e) => Some(e.as_ref()),
            GeneratorError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GeneratorError {
    fn from(err: std::io::Error) -> Self {
        GeneratorError::Io(err)
    }
}
