//! Quarantine orphan files of a table.
//!
//! The engine's reachability scan reports files under the table location that
//! no live snapshot references. Instead of deleting them outright, this
//! operation moves each candidate into the table's trash directory, where the
//! staged-file purge removes it after its staging age has passed. Candidates
//! younger than the age cutoff are not considered at all, since concurrent
//! writers may still be about to commit them.
//!
//! Metadata-description files are never touched here: the catalog reports
//! their paths scheme-qualified, which makes the current metadata file look
//! unreferenced, and their lifecycle belongs to the engine's commit path.
//!
//! # Example
//! ```rust ignore
//! let (table, metrics) = MaintenanceOps::new(table, engine, store)
//!     .quarantine_orphans()
//!     .with_trash_dir(".trash")
//!     .await?;
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;
use futures::StreamExt;
use metrics::counter;
use object_store::path::Path;
use serde::Serialize;
use tracing::{error, info};

use super::{now_from, Clock, DEFAULT_STAGING_AGE_DAYS, DEFAULT_TRASH_DIR};
use crate::engine::TableEngine;
use crate::errors::MaintenanceResult;
use crate::metrics::{ORPHAN_FILE_COUNT, TABLE_NAME};
use crate::storage::paths::{is_staged, to_trash_path, trash_root};
use crate::storage::ObjectStoreRef;
use crate::table::Table;

/// Canonical suffix of metadata-description files.
const METADATA_FILE_SUFFIX: &str = "metadata.json";

/// What to do with one orphan candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OrphanDisposition {
    /// Leave the file alone.
    Keep(KeepReason),
    /// Move the file to the given trash path.
    Quarantine(Path),
    /// Delete the file outright, non-recursively.
    Delete,
}

/// Why a candidate is left in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeepReason {
    /// Metadata-description files are owned by the engine's commit path.
    MetadataFile,
    /// The file already lies under the trash root.
    AlreadyStaged,
}

/// Decide the fate of one candidate. Pure; all filesystem effects happen in
/// the caller's stream loop.
pub(crate) fn decide(
    candidate: &Path,
    location: &Path,
    trash_root: &Path,
    trash_dir: &str,
    skip_staging: bool,
) -> MaintenanceResult<OrphanDisposition> {
    let is_metadata = candidate
        .filename()
        .map(|name| name.ends_with(METADATA_FILE_SUFFIX))
        .unwrap_or(false);
    if is_metadata {
        return Ok(OrphanDisposition::Keep(KeepReason::MetadataFile));
    }
    if skip_staging {
        return Ok(OrphanDisposition::Delete);
    }
    if is_staged(trash_root, candidate) {
        return Ok(OrphanDisposition::Keep(KeepReason::AlreadyStaged));
    }
    Ok(OrphanDisposition::Quarantine(to_trash_path(
        location, candidate, trash_dir,
    )?))
}

/// Quarantine orphan files of a table with the given options.
/// See this module's documentation for more information.
#[derive(Debug)]
pub struct OrphanQuarantineBuilder {
    table: Table,
    engine: Arc<dyn TableEngine>,
    store: ObjectStoreRef,
    /// Name of the quarantine directory under the table location.
    trash_dir: String,
    /// Only files last modified before this instant are considered orphan.
    older_than: Option<DateTime<Utc>>,
    /// Delete candidates outright instead of staging them.
    skip_staging: bool,
    /// Override the source of time
    clock: Option<Arc<dyn Clock>>,
}

/// Details for a quarantine run.
///
/// `orphan_paths` always contains every candidate the engine reported,
/// whether or not the per-file action succeeded, so callers can reconcile
/// detected against acted-upon counts.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanMetrics {
    /// Every candidate path the engine reported as unreferenced.
    pub orphan_paths: Vec<String>,
    /// Candidates successfully moved into the trash directory.
    pub quarantined_files: Vec<String>,
    /// Candidates successfully hard-deleted (staging disabled).
    pub deleted_files: Vec<String>,
    /// Metadata-description files left in place.
    pub skipped_metadata_files: Vec<String>,
    /// Candidates already under the trash directory, left in place.
    pub already_staged_files: Vec<String>,
    /// Candidates whose move or delete failed; logged, not fatal.
    pub failed_files: Vec<String>,
}

impl std::fmt::Display for OrphanMetrics {
    /// Display the metrics using serde serialization
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&serde_json::to_string(self).map_err(|_| std::fmt::Error)?)
    }
}

impl OrphanQuarantineBuilder {
    /// Create a new [`OrphanQuarantineBuilder`]
    pub(crate) fn new(table: Table, engine: Arc<dyn TableEngine>, store: ObjectStoreRef) -> Self {
        Self {
            table,
            engine,
            store,
            trash_dir: DEFAULT_TRASH_DIR.to_string(),
            older_than: None,
            skip_staging: false,
            clock: None,
        }
    }

    /// Override the name of the trash directory.
    pub fn with_trash_dir(mut self, trash_dir: impl Into<String>) -> Self {
        self.trash_dir = trash_dir.into();
        self
    }

    /// Only treat files last modified before this instant as orphan.
    /// Defaults to three days before the current time.
    pub fn with_older_than(mut self, older_than: DateTime<Utc>) -> Self {
        self.older_than = Some(older_than);
        self
    }

    /// Delete orphans outright instead of moving them to the trash directory.
    pub fn with_skip_staging(mut self, skip_staging: bool) -> Self {
        self.skip_staging = skip_staging;
        self
    }

    /// add a time source for testing
    #[doc(hidden)]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    async fn execute(self) -> MaintenanceResult<(Table, OrphanMetrics)> {
        let operation_id = uuid::Uuid::new_v4();
        let now = now_from(self.clock.as_ref());
        let older_than = self
            .older_than
            .unwrap_or_else(|| now - Duration::days(DEFAULT_STAGING_AGE_DAYS as i64));
        let location = self.table.location().clone();
        let root = trash_root(&location, &self.trash_dir);

        let mut metrics = OrphanMetrics::default();
        let mut candidates = self
            .engine
            .scan_orphan_candidates(&self.table, older_than)
            .await?;

        while let Some(candidate) = candidates.next().await {
            let candidate = candidate?;
            info!(%operation_id, "Detected orphan file {candidate}");
            metrics.orphan_paths.push(candidate.to_string());

            match decide(
                &candidate,
                &location,
                &root,
                &self.trash_dir,
                self.skip_staging,
            )? {
                OrphanDisposition::Keep(KeepReason::MetadataFile) => {
                    info!(%operation_id, "Skipped metadata file {candidate}");
                    metrics.skipped_metadata_files.push(candidate.to_string());
                }
                OrphanDisposition::Keep(KeepReason::AlreadyStaged) => {
                    metrics.already_staged_files.push(candidate.to_string());
                }
                OrphanDisposition::Quarantine(target) => {
                    match self.store.rename(&candidate, &target).await {
                        Ok(()) => {
                            info!(%operation_id, "Moved orphan file {candidate} to {target}");
                            metrics.quarantined_files.push(candidate.to_string());
                        }
                        Err(err) => {
                            error!(%operation_id, "Move operation failed for file {candidate}: {err}");
                            metrics.failed_files.push(candidate.to_string());
                        }
                    }
                }
                OrphanDisposition::Delete => match self.store.delete(&candidate).await {
                    Ok(()) => {
                        info!(%operation_id, "Deleted orphan file {candidate}");
                        metrics.deleted_files.push(candidate.to_string());
                    }
                    Err(err) => {
                        error!(%operation_id, "Delete operation failed for file {candidate}: {err}");
                        metrics.failed_files.push(candidate.to_string());
                    }
                },
            }
        }

        counter!(ORPHAN_FILE_COUNT, TABLE_NAME => self.table.name())
            .increment(metrics.orphan_paths.len() as u64);
        Ok((self.table, metrics))
    }
}

impl std::future::IntoFuture for OrphanQuarantineBuilder {
    type Output = MaintenanceResult<(Table, OrphanMetrics)>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}
