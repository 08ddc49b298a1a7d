//! Read-only table handles.
//!
//! A [`Table`] identifies one versioned dataset for the duration of a single
//! maintenance run. The handle carries the metadata maintenance needs to make
//! decisions; all metadata mutation happens through the external engine's
//! commit path, never through this struct.

use std::collections::HashMap;

use arrow_schema::{DataType, Field, SchemaRef};
use object_store::path::Path;

use crate::catalog::TableIdentifier;

/// An immutable point-in-time version of a table's data-file set.
///
/// Snapshots are ordered by creation time. Expiry is monotonic: once a
/// snapshot id has been removed it never reappears in the live sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    /// Snapshot identifier.
    pub id: i64,
    /// Creation time in milliseconds since epoch.
    pub timestamp_millis: i64,
}

impl PartialOrd for Snapshot {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Snapshot {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.timestamp_millis, self.id).cmp(&(other.timestamp_millis, other.id))
    }
}

/// A read-only handle to one table, valid for a single maintenance run.
#[derive(Debug, Clone)]
pub struct Table {
    identifier: TableIdentifier,
    location: Path,
    schema: SchemaRef,
    snapshots: Vec<Snapshot>,
    properties: HashMap<String, String>,
}

impl Table {
    /// Create a handle from catalog metadata. Snapshots are kept in creation
    /// order regardless of input order.
    pub fn new(
        identifier: TableIdentifier,
        location: Path,
        schema: SchemaRef,
        mut snapshots: Vec<Snapshot>,
        properties: HashMap<String, String>,
    ) -> Self {
        snapshots.sort();
        Self {
            identifier,
            location,
            schema,
            snapshots,
            properties,
        }
    }

    /// The fully-qualified table identifier.
    pub fn identifier(&self) -> &TableIdentifier {
        &self.identifier
    }

    /// The fully-qualified table name, `database.table`.
    pub fn name(&self) -> String {
        self.identifier.to_string()
    }

    /// Root path of the table's storage location.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// The table's current schema.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Look up a schema field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.schema
            .fields()
            .iter()
            .find(|field| field.name() == name)
            .map(|field| field.as_ref())
    }

    /// Whether the named column is declared as a string type.
    pub fn is_string_column(&self, name: &str) -> Option<bool> {
        self.field(name)
            .map(|field| matches!(field.data_type(), DataType::Utf8 | DataType::LargeUtf8))
    }

    /// Live snapshots in creation order.
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// The most recent snapshot, if the table has any.
    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    /// Table properties as key-value pairs.
    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Look up a single table property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}
