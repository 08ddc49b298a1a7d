//! Error types for the housekeeper crate

use object_store::Error as ObjectStoreError;

/// A result returned by housekeeper operations
pub type MaintenanceResult<T> = Result<T, MaintenanceError>;

/// Maintenance specific error
#[derive(thiserror::Error, Debug)]
pub enum MaintenanceError {
    /// Error returned when a table cannot be resolved through the catalog.
    #[error("Table not found in catalog: {identifier}")]
    TableNotFound {
        /// The fully-qualified table name that was requested.
        identifier: String,
    },

    /// Error returned when a fully-qualified table name cannot be parsed.
    #[error("Invalid table identifier `{input}`, expected `database.table`")]
    InvalidTableIdentifier {
        /// The identifier input that failed to parse.
        input: String,
    },

    /// Error returned when a file path does not lie under the table location.
    #[error("Path `{path}` is not contained in table location `{location}`")]
    InvalidPath {
        /// The offending file path.
        path: String,
        /// The table location the path was checked against.
        location: String,
    },

    /// Error returned when a retention granularity string is not recognized.
    #[error("Invalid retention granularity `{input}`, expected one of hour, day, month, year")]
    InvalidGranularity {
        /// The granularity input that failed to parse.
        input: String,
    },

    /// Error returned when compaction options violate their invariants.
    #[error("Invalid compaction options: {reason}")]
    InvalidCompactionOptions {
        /// Description of the violated invariant.
        reason: String,
    },

    /// Error returned when the retention column is missing from the table schema.
    #[error("Column `{column}` not found in schema of table {table}")]
    ColumnNotFound {
        /// The requested column name.
        column: String,
        /// The fully-qualified table name.
        table: String,
    },

    /// Error returned when a string-typed retention column has no parse pattern.
    #[error("Column `{column}` is string-typed and requires a non-empty column pattern")]
    MissingColumnPattern {
        /// The retention column name.
        column: String,
    },

    /// Error returned when interacting with the underlying object storage.
    #[error("Object store operation failed: {source}")]
    ObjectStore {
        /// Storage error details.
        #[from]
        source: ObjectStoreError,
    },

    /// Error returned when a datetime string cannot be parsed with the given pattern.
    #[error("Invalid datetime string: {source}")]
    InvalidDateTimeString {
        /// Parse error details of the datetime string.
        #[from]
        source: chrono::ParseError,
    },

    /// Error surfaced by the external table-format engine.
    ///
    /// Commit conflicts from concurrent maintenance runs arrive through this
    /// variant; they must be retried or reported by the caller, never dropped.
    #[error("Table engine operation failed: {source}")]
    Engine {
        /// Engine error details.
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A generic error qualified in the message
    #[error("Generic maintenance error: {0}")]
    Generic(String),
}

impl MaintenanceError {
    /// Wrap an arbitrary engine failure.
    pub fn engine(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Engine {
            source: Box::new(source),
        }
    }
}
