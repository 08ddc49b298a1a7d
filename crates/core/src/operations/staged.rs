//! Purge staged (quarantined) files.
//!
//! Walks a trash directory and deletes files whose modification time has
//! fallen behind the staging age. Detection and action are reported
//! separately: the matched set always reflects what qualified, whether or not
//! each individual delete succeeded. A base directory with nothing under it
//! yields an empty result, not an error.
//!
//! # Example
//! ```rust ignore
//! let (table, metrics) = MaintenanceOps::new(table, engine, store)
//!     .purge_staged()
//!     .with_older_than_days(3)
//!     .await?;
//! ```

use std::sync::Arc;

use chrono::Duration;
use futures::future::BoxFuture;
use metrics::counter;
use object_store::path::Path;
use serde::Serialize;
use tracing::{error, info};

use super::{now_from, Clock, DEFAULT_STAGING_AGE_DAYS, DEFAULT_TRASH_DIR};
use crate::errors::MaintenanceResult;
use crate::metrics::{STAGED_FILE_COUNT, TABLE_NAME};
use crate::storage::paths::trash_root;
use crate::storage::{list_files, ObjectStoreRef};
use crate::table::Table;

/// Purge staged files of a table with the given options.
/// See this module's documentation for more information.
#[derive(Debug)]
pub struct StagedPurgeBuilder {
    table: Table,
    store: ObjectStoreRef,
    /// Directory to purge; defaults to the table's trash directory.
    base_dir: Option<Path>,
    /// Only files strictly older than this many days are purged.
    older_than_days: u32,
    /// Walk the full subtree instead of only the immediate children.
    recursive: bool,
    /// Override the source of time
    clock: Option<Arc<dyn Clock>>,
}

/// Details for a staged-file purge run.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedPurgeMetrics {
    /// Every file whose modification time fell behind the cutoff.
    pub matched_paths: Vec<String>,
    /// Matched files that were deleted successfully.
    pub deleted_files: Vec<String>,
    /// Matched files whose deletion failed; logged, not fatal.
    pub failed_files: Vec<String>,
}

impl StagedPurgeBuilder {
    /// Create a new [`StagedPurgeBuilder`]
    pub(crate) fn new(table: Table, store: ObjectStoreRef) -> Self {
        Self {
            table,
            store,
            base_dir: None,
            older_than_days: DEFAULT_STAGING_AGE_DAYS,
            recursive: true,
            clock: None,
        }
    }

    /// Purge under this directory instead of the table's trash directory.
    pub fn with_base_dir(mut self, base_dir: Path) -> Self {
        self.base_dir = Some(base_dir);
        self
    }

    /// Override the staging age in days.
    pub fn with_older_than_days(mut self, days: u32) -> Self {
        self.older_than_days = days;
        self
    }

    /// Restrict the walk to the immediate children of the base directory.
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// add a time source for testing
    #[doc(hidden)]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    async fn execute(self) -> MaintenanceResult<(Table, StagedPurgeMetrics)> {
        let base_dir = self
            .base_dir
            .unwrap_or_else(|| trash_root(self.table.location(), DEFAULT_TRASH_DIR));
        let cutoff = now_from(self.clock.as_ref()) - Duration::days(self.older_than_days as i64);

        let matched = list_files(self.store.as_ref(), &base_dir, self.recursive, |meta| {
            meta.last_modified < cutoff
        })
        .await?;
        info!(
            "Deleting {} files from {base_dir} older than {} days (modified before {cutoff})",
            matched.len(),
            self.older_than_days,
        );

        let mut metrics = StagedPurgeMetrics::default();
        for meta in matched {
            metrics.matched_paths.push(meta.location.to_string());
            match self.store.delete(&meta.location).await {
                Ok(()) => metrics.deleted_files.push(meta.location.to_string()),
                Err(err) => {
                    error!("Failed to delete staged file {}: {err}", meta.location);
                    metrics.failed_files.push(meta.location.to_string());
                }
            }
        }

        counter!(STAGED_FILE_COUNT, TABLE_NAME => self.table.name())
            .increment(metrics.matched_paths.len() as u64);
        Ok((self.table, metrics))
    }
}

impl std::future::IntoFuture for StagedPurgeBuilder {
    type Output = MaintenanceResult<(Table, StagedPurgeMetrics)>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}
