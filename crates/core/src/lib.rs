//! Lifecycle maintenance for versioned, snapshot-based table datasets.
//!
//! Housekeeper runs as a batch job invoked per table: it quarantines orphaned
//! physical files into a trash directory, garbage-collects staged files past
//! their staging age, enforces time-based record retention, expires
//! historical snapshots, and orchestrates compaction of small data files.
//! The table-format engine itself (snapshot creation, manifest management,
//! binpacking, atomic commits) and the storage backend stay behind the
//! [`TableEngine`] and [`ObjectStore`] traits.
//!
//! # Usage
//!
//! Quarantine orphan files of one table:
//!
//! ```rust ignore
//! let identifier = "test_db.test_table".parse()?;
//! let ops = MaintenanceOps::load(&catalog, &identifier, engine, store).await?;
//! let (_table, metrics) = ops.quarantine_orphans().await?;
//! println!("detected {} orphan files", metrics.orphan_paths.len());
//! ```
//!
//! Enforce a 30-day retention window on a string partition column:
//!
//! ```rust ignore
//! let ops = MaintenanceOps::load(&catalog, &identifier, engine, store).await?;
//! let (_table, metrics) = ops
//!     .run_retention("datepartition", Granularity::Day, 30)
//!     .with_column_pattern("%Y-%m-%d")
//!     .await?;
//! ```

#![deny(missing_docs)]

pub mod catalog;
pub mod config;
pub mod engine;
pub mod errors;
pub mod metrics;
pub mod operations;
pub mod storage;
pub mod table;

#[cfg(test)]
pub mod test_utils;

pub use self::catalog::{Catalog, TableIdentifier};
pub use self::config::CatalogConfig;
pub use self::engine::{DeleteOutcome, OrphanCandidateStream, TableEngine};
pub use self::errors::{MaintenanceError, MaintenanceResult};
pub use self::operations::{Granularity, MaintenanceOps};
pub use self::table::{Snapshot, Table};
pub use object_store::{path::Path, Error as ObjectStoreError, ObjectMeta, ObjectStore};

/// Returns rust crate version, can be use used in language bindings to expose Rust core version
pub fn crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
