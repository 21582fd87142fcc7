use thiserror::Error;

pub mod config;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] tokio_postgres::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("Schema validation error: {0}")]
    SchemaValidation(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Row {row} for table {table} has {actual} fields, expected {expected}")]
    ArityMismatch {
        table: String,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Cannot store {value} in column {table}.{column} of type {datatype}")]
    TypeMismatch {
        table: String,
        column: String,
        datatype: String,
        value: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Faults confined to a single input file. The file is skipped and the run goes on.
    pub fn is_parse_fault(&self) -> bool {
        matches!(
            self,
            Error::Json(_) | Error::MalformedInput(_) | Error::InvalidTimestamp(_)
        )
    }

    /// Schema/flattener drift. Never retried, never swallowed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ArityMismatch { .. } | Error::SchemaMismatch(_) | Error::SchemaValidation(_)
        )
    }
}
