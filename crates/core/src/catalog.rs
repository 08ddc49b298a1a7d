//! Catalog abstraction for maintenance runs.
//!
//! The catalog owns table metadata; maintenance only ever asks it for a
//! read-only [`Table`] handle. Each run resolves its own handle and drops it
//! on completion.

use std::fmt;
use std::fmt::Debug;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{MaintenanceError, MaintenanceResult};
use crate::table::Table;

/// A fully-qualified table name, `database.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableIdentifier {
    /// Database (namespace) portion of the name.
    pub database: String,
    /// Table portion of the name.
    pub table: String,
}

impl TableIdentifier {
    /// Create an identifier from its parts.
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }
}

impl FromStr for TableIdentifier {
    type Err = MaintenanceError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.split_once('.') {
            Some((database, table))
                if !database.is_empty() && !table.is_empty() && !table.contains('.') =>
            {
                Ok(Self::new(database, table))
            }
            _ => Err(MaintenanceError::InvalidTableIdentifier {
                input: input.to_string(),
            }),
        }
    }
}

impl fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

/// Read-only lookup of table handles.
///
/// Implementations wrap a concrete catalog service; they are constructed from
/// a [`CatalogConfig`](crate::config::CatalogConfig) by the embedding
/// application.
#[async_trait::async_trait]
pub trait Catalog: Send + Sync + Debug {
    /// Resolve a table handle for the given identifier.
    ///
    /// Returns [`MaintenanceError::TableNotFound`] when the identifier does
    /// not resolve; that failure is fatal to the invocation.
    async fn load_table(&self, identifier: &TableIdentifier) -> MaintenanceResult<Table>;
}
