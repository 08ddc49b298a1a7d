//! The external table-format engine interface.
//!
//! Everything with a commit path lives behind [`TableEngine`]: reachability
//! scans, snapshot expiry, data-file rewrites, and predicate deletes. The
//! maintenance operations in this crate configure and invoke the engine but
//! never mutate table metadata themselves. Conflict detection between
//! concurrent commits is the engine's responsibility; a losing commit
//! surfaces as [`MaintenanceError::Engine`](crate::errors::MaintenanceError),
//! never as silent data loss.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use object_store::path::Path;

use crate::errors::MaintenanceResult;
use crate::operations::compact::{CompactionOptions, RewriteMetrics};
use crate::operations::expire::ExpireMetrics;
use crate::operations::retention::RetentionPredicate;
use crate::table::Table;

/// Stream of candidate orphan paths produced by the engine's reachability scan.
///
/// Each path is reported exactly once per scan and is consumed exactly once by
/// the quarantine decision loop.
pub type OrphanCandidateStream = BoxStream<'static, MaintenanceResult<Path>>;

/// Outcome of a predicate delete issued through the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DeleteOutcome {
    /// The delete committed a new snapshot removing the given number of rows.
    Committed {
        /// Rows removed by the commit.
        rows_deleted: u64,
    },
    /// Nothing matched; no commit was produced.
    NoOp,
}

/// Operations consumed from the external table-format engine.
#[async_trait::async_trait]
pub trait TableEngine: Send + Sync + Debug {
    /// Scan for files under the table location that are not referenced by any
    /// live snapshot and were last modified before `older_than`.
    async fn scan_orphan_candidates(
        &self,
        table: &Table,
        older_than: DateTime<Utc>,
    ) -> MaintenanceResult<OrphanCandidateStream>;

    /// Expire snapshots created before the given timestamp.
    ///
    /// The engine keeps its own floor invariants, in particular the sole
    /// remaining snapshot is never removed.
    async fn expire_snapshots(
        &self,
        table: &Table,
        before: DateTime<Utc>,
    ) -> MaintenanceResult<ExpireMetrics>;

    /// Rewrite (bin-pack) data files according to the given options.
    async fn rewrite_data_files(
        &self,
        table: &Table,
        options: &CompactionOptions,
    ) -> MaintenanceResult<RewriteMetrics>;

    /// Bounded existence probe: whether at least one row satisfies the
    /// retention predicate. Must not create a snapshot.
    async fn any_rows_match(
        &self,
        table: &Table,
        predicate: &RetentionPredicate,
    ) -> MaintenanceResult<bool>;

    /// Delete all rows satisfying the retention predicate as a single
    /// committed operation.
    async fn delete_matching(
        &self,
        table: &Table,
        predicate: &RetentionPredicate,
    ) -> MaintenanceResult<DeleteOutcome>;

    /// Sample up to `limit` raw values of the named column, rendered as
    /// strings, for pattern validation.
    async fn sample_column(
        &self,
        table: &Table,
        column: &str,
        limit: usize,
    ) -> MaintenanceResult<Vec<String>>;
}
