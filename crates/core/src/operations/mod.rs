//! High level maintenance operations API.
//!
//! At the heart of the API is the [`MaintenanceOps`] struct, which holds one
//! table handle together with the engine and storage collaborators and
//! exposes methods to attain builders for the individual maintenance
//! operations. Each builder is consumed by awaiting it; a run owns its
//! handles and releases them when the future resolves, success or failure.

use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::catalog::{Catalog, TableIdentifier};
use crate::engine::TableEngine;
use crate::errors::MaintenanceResult;
use crate::storage::ObjectStoreRef;
use crate::table::Table;

pub mod compact;
pub mod expire;
pub mod orphans;
pub mod retention;
pub mod staged;

pub use compact::{CompactBuilder, CompactionOptions, FileGroupRewriteResult, RewriteMetrics};
pub use expire::{ExpireMetrics, ExpireSnapshotsBuilder};
pub use orphans::{OrphanMetrics, OrphanQuarantineBuilder};
pub use retention::{Granularity, RetentionBuilder, RetentionMetrics, RetentionPredicate};
pub use staged::{StagedPurgeBuilder, StagedPurgeMetrics};

/// Default name of the per-table quarantine directory.
pub const DEFAULT_TRASH_DIR: &str = ".trash";

/// Default age window for orphan candidates and staged-file purges, in days.
/// Files younger than this are left alone so concurrent writers can finish.
pub const DEFAULT_STAGING_AGE_DAYS: u32 = 3;

/// A source of time
pub trait Clock: Debug + Send + Sync {
    /// get the current time in milliseconds since epoch
    fn current_timestamp_millis(&self) -> i64;
}

/// Resolve "now" from an optional test clock, falling back to the system time.
pub(crate) fn now_from(clock: Option<&Arc<dyn Clock>>) -> DateTime<Utc> {
    match clock {
        Some(clock) => Utc
            .timestamp_millis_opt(clock.current_timestamp_millis())
            .single()
            .unwrap_or_else(Utc::now),
        None => Utc::now(),
    }
}

/// High level interface for running maintenance against one table.
///
/// ```rust ignore
/// let ops = MaintenanceOps::load(&catalog, &"db.events".parse()?, engine, store).await?;
/// let (_table, metrics) = ops.quarantine_orphans().await?;
/// ```
#[derive(Debug, Clone)]
pub struct MaintenanceOps {
    table: Table,
    engine: Arc<dyn TableEngine>,
    store: ObjectStoreRef,
}

impl MaintenanceOps {
    /// Create an operations handle from an already-resolved table.
    pub fn new(table: Table, engine: Arc<dyn TableEngine>, store: ObjectStoreRef) -> Self {
        Self {
            table,
            engine,
            store,
        }
    }

    /// Resolve the table through the catalog and create an operations handle.
    pub async fn load(
        catalog: &dyn Catalog,
        identifier: &TableIdentifier,
        engine: Arc<dyn TableEngine>,
        store: ObjectStoreRef,
    ) -> MaintenanceResult<Self> {
        let table = catalog.load_table(identifier).await?;
        Ok(Self::new(table, engine, store))
    }

    /// The table this handle operates on.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Quarantine files no longer referenced by any live snapshot.
    pub fn quarantine_orphans(self) -> OrphanQuarantineBuilder {
        OrphanQuarantineBuilder::new(self.table, self.engine, self.store)
    }

    /// Purge previously quarantined files past their staging age.
    pub fn purge_staged(self) -> StagedPurgeBuilder {
        StagedPurgeBuilder::new(self.table, self.store)
    }

    /// Enforce a time-window retention policy on the given column.
    pub fn run_retention(
        self,
        column: impl Into<String>,
        granularity: Granularity,
        count: u32,
    ) -> RetentionBuilder {
        RetentionBuilder::new(self.table, self.engine, column, granularity, count)
    }

    /// Compact small data files into larger ones.
    pub fn compact(self) -> CompactBuilder {
        CompactBuilder::new(self.table, self.engine)
    }

    /// Expire snapshots created before the given timestamp.
    pub fn expire_snapshots(self, before: DateTime<Utc>) -> ExpireSnapshotsBuilder {
        ExpireSnapshotsBuilder::new(self.table, self.engine, before)
    }
}
