//! Compact small data files into larger ones.
//!
//! The planner translates high-level sizing, concurrency, and commit-budget
//! parameters into the option set handed to the external rewrite action; the
//! binpacking itself is the engine's job. Files are grouped by partition and
//! groups never span partition boundaries. With partial progress enabled the
//! engine may commit completed groups in up to `max_commits` batches instead
//! of one commit for the whole run.
//!
//! Re-running with the same parameters against a fully-compacted table is a
//! no-op: zero added files, zero rewritten files, zero rewritten bytes.
//!
//! # Example
//! ```rust ignore
//! let (table, metrics) = MaintenanceOps::new(table, engine, store)
//!     .compact()
//!     .with_target_file_size(512 * 1024 * 1024)
//!     .with_partial_progress(true)
//!     .await?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use itertools::Itertools;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::TableEngine;
use crate::errors::{MaintenanceError, MaintenanceResult};
use crate::metrics::{
    ADDED_DATA_FILE_COUNT, REWRITTEN_DATA_FILE_BYTES, REWRITTEN_DATA_FILE_COUNT,
    REWRITTEN_DATA_FILE_GROUP_COUNT, TABLE_NAME,
};
use crate::table::Table;

/// Default desired file size after bin-packing, 512 MiB.
pub const DEFAULT_TARGET_FILE_SIZE: u64 = 512 * 1024 * 1024;

/// Default lower rewrite bound as a fraction of the target size (75%).
const MIN_FILE_SIZE_RATIO: u64 = 75;

/// Default upper rewrite bound as a fraction of the target size (180%).
const MAX_FILE_SIZE_RATIO: u64 = 180;

/// Default number of eligible files before a partition group is rewritten.
pub const DEFAULT_MIN_INPUT_FILES: usize = 5;

/// Default bound on concurrently rewritten file groups. Compaction does a
/// full scan on its first run, so the default stays conservative.
pub const DEFAULT_MAX_CONCURRENT_FILE_GROUPS: usize = 2;

/// Default commit budget when partial progress is enabled.
pub const DEFAULT_PARTIAL_PROGRESS_MAX_COMMITS: u32 = 10;

/// Validated option set handed to the external rewrite action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionOptions {
    /// Desired file size after bin-packing.
    pub target_file_size_bytes: u64,
    /// Files under this size are rewritten regardless of other criteria.
    pub min_file_size_bytes: u64,
    /// Files over this size are rewritten regardless of other criteria.
    pub max_file_size_bytes: u64,
    /// A partition group with at least this many eligible files is rewritten.
    pub min_input_files: usize,
    /// Maximum number of file groups rewritten in parallel.
    pub max_concurrent_file_groups: usize,
    /// Allow committing completed groups before the whole run finishes.
    pub partial_progress_enabled: bool,
    /// Commit budget per run when partial progress is enabled.
    pub partial_progress_max_commits: u32,
}

impl Default for CompactionOptions {
    fn default() -> Self {
        Self {
            target_file_size_bytes: DEFAULT_TARGET_FILE_SIZE,
            min_file_size_bytes: DEFAULT_TARGET_FILE_SIZE * MIN_FILE_SIZE_RATIO / 100,
            max_file_size_bytes: DEFAULT_TARGET_FILE_SIZE * MAX_FILE_SIZE_RATIO / 100,
            min_input_files: DEFAULT_MIN_INPUT_FILES,
            max_concurrent_file_groups: DEFAULT_MAX_CONCURRENT_FILE_GROUPS,
            partial_progress_enabled: false,
            partial_progress_max_commits: DEFAULT_PARTIAL_PROGRESS_MAX_COMMITS,
        }
    }
}

impl CompactionOptions {
    /// Check the option invariants before anything is delegated to the
    /// engine.
    pub fn validate(&self) -> MaintenanceResult<()> {
        if self.target_file_size_bytes == 0 {
            return Err(invalid("target file size must be positive".to_string()));
        }
        if self.min_file_size_bytes > self.target_file_size_bytes {
            return Err(invalid(format!(
                "min file size {} exceeds target file size {}",
                self.min_file_size_bytes, self.target_file_size_bytes
            )));
        }
        if self.target_file_size_bytes > self.max_file_size_bytes {
            return Err(invalid(format!(
                "target file size {} exceeds max file size {}",
                self.target_file_size_bytes, self.max_file_size_bytes
            )));
        }
        if self.min_input_files == 0 {
            return Err(invalid("min input files must be at least 1".to_string()));
        }
        if self.max_concurrent_file_groups == 0 {
            return Err(invalid(
                "max concurrent file groups must be at least 1".to_string(),
            ));
        }
        if self.partial_progress_enabled && self.partial_progress_max_commits == 0 {
            return Err(invalid(
                "partial progress requires a commit budget of at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Render the options as the engine-facing string map.
    pub fn engine_options(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            (
                "max-concurrent-file-group-rewrites",
                self.max_concurrent_file_groups.to_string(),
            ),
            (
                "partial-progress.enabled",
                self.partial_progress_enabled.to_string(),
            ),
            (
                "partial-progress.max-commits",
                self.partial_progress_max_commits.to_string(),
            ),
            ("min-input-files", self.min_input_files.to_string()),
            (
                "target-file-size-bytes",
                self.target_file_size_bytes.to_string(),
            ),
            ("min-file-size-bytes", self.min_file_size_bytes.to_string()),
            ("max-file-size-bytes", self.max_file_size_bytes.to_string()),
        ])
    }
}

fn invalid(reason: String) -> MaintenanceError {
    MaintenanceError::InvalidCompactionOptions { reason }
}

/// Outcome of rewriting one partition-scoped file group.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileGroupRewriteResult {
    /// String representation of the partition the group belongs to.
    pub partition: String,
    /// Index of the group within its partition.
    pub partition_index: u32,
    /// Index of the group across the whole run.
    pub global_index: u32,
    /// Files written for this group.
    pub added_files: u64,
    /// Files replaced by this group.
    pub rewritten_files: u64,
    /// Bytes replaced by this group.
    pub rewritten_bytes: u64,
}

/// Metrics from a compaction run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteMetrics {
    /// Number of compacted files added.
    pub added_data_files_count: u64,
    /// Number of files replaced.
    pub rewritten_data_files_count: u64,
    /// Bytes replaced.
    pub rewritten_bytes_count: u64,
    /// Per-group outcomes.
    pub file_group_results: Vec<FileGroupRewriteResult>,
}

impl std::fmt::Display for RewriteMetrics {
    /// Display the metrics using serde serialization
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&serde_json::to_string(self).map_err(|_| std::fmt::Error)?)
    }
}

/// Compact a table with the given options.
/// See this module's documentation for more information.
#[derive(Debug)]
pub struct CompactBuilder {
    table: Table,
    engine: Arc<dyn TableEngine>,
    options: CompactionOptions,
    /// Whether a commit budget was supplied without partial progress.
    max_commits_overridden: bool,
}

impl CompactBuilder {
    /// Create a new [`CompactBuilder`]
    pub(crate) fn new(table: Table, engine: Arc<dyn TableEngine>) -> Self {
        Self {
            table,
            engine,
            options: CompactionOptions::default(),
            max_commits_overridden: false,
        }
    }

    /// Set the target file size and derive the default rewrite bounds from it.
    pub fn with_target_file_size(mut self, target: u64) -> Self {
        self.options.target_file_size_bytes = target;
        self.options.min_file_size_bytes = target * MIN_FILE_SIZE_RATIO / 100;
        self.options.max_file_size_bytes = target * MAX_FILE_SIZE_RATIO / 100;
        self
    }

    /// Files under this size are rewritten regardless of other criteria.
    pub fn with_min_file_size(mut self, min: u64) -> Self {
        self.options.min_file_size_bytes = min;
        self
    }

    /// Files over this size are rewritten regardless of other criteria.
    pub fn with_max_file_size(mut self, max: u64) -> Self {
        self.options.max_file_size_bytes = max;
        self
    }

    /// A partition group with at least this many eligible files is rewritten.
    pub fn with_min_input_files(mut self, min_input_files: usize) -> Self {
        self.options.min_input_files = min_input_files;
        self
    }

    /// Bound the number of file groups rewritten in parallel.
    pub fn with_max_concurrent_file_groups(mut self, groups: usize) -> Self {
        self.options.max_concurrent_file_groups = groups;
        self
    }

    /// Allow committing completed groups before the whole run finishes.
    pub fn with_partial_progress(mut self, enabled: bool) -> Self {
        self.options.partial_progress_enabled = enabled;
        self
    }

    /// Commit budget per run; only meaningful with partial progress enabled.
    pub fn with_max_commits(mut self, max_commits: u32) -> Self {
        self.options.partial_progress_max_commits = max_commits;
        self.max_commits_overridden = true;
        self
    }

    async fn execute(self) -> MaintenanceResult<(Table, RewriteMetrics)> {
        self.options.validate()?;
        if self.max_commits_overridden && !self.options.partial_progress_enabled {
            warn!(
                "Commit budget {} is ignored because partial progress is disabled",
                self.options.partial_progress_max_commits
            );
        }
        debug!(
            "Rewriting data files of {} with options {:?}",
            self.table.name(),
            self.options.engine_options(),
        );

        let metrics = self
            .engine
            .rewrite_data_files(&self.table, &self.options)
            .await?;

        let partitions = metrics
            .file_group_results
            .iter()
            .map(|group| group.partition.as_str())
            .unique()
            .count();
        info!(
            "Compacted {}: {} files added, {} files ({} bytes) rewritten across {} groups in {partitions} partitions",
            self.table.name(),
            metrics.added_data_files_count,
            metrics.rewritten_data_files_count,
            metrics.rewritten_bytes_count,
            metrics.file_group_results.len(),
        );

        let table_name = self.table.name();
        counter!(ADDED_DATA_FILE_COUNT, TABLE_NAME => table_name.clone())
            .increment(metrics.added_data_files_count);
        counter!(REWRITTEN_DATA_FILE_COUNT, TABLE_NAME => table_name.clone())
            .increment(metrics.rewritten_data_files_count);
        counter!(REWRITTEN_DATA_FILE_BYTES, TABLE_NAME => table_name.clone())
            .increment(metrics.rewritten_bytes_count);
        counter!(REWRITTEN_DATA_FILE_GROUP_COUNT, TABLE_NAME => table_name)
            .increment(metrics.file_group_results.len() as u64);

        Ok((self.table, metrics))
    }
}

impl std::future::IntoFuture for CompactBuilder {
    type Output = MaintenanceResult<(Table, RewriteMetrics)>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestFixture;

    #[test]
    fn default_options_are_valid() {
        CompactionOptions::default().validate().unwrap();
    }

    #[test]
    fn size_bound_invariants_are_enforced() {
        let mut options = CompactionOptions::default();
        options.min_file_size_bytes = options.target_file_size_bytes + 1;
        assert!(matches!(
            options.validate().unwrap_err(),
            MaintenanceError::InvalidCompactionOptions { .. }
        ));

        let mut options = CompactionOptions::default();
        options.max_file_size_bytes = options.target_file_size_bytes - 1;
        assert!(options.validate().is_err());

        let mut options = CompactionOptions::default();
        options.max_concurrent_file_groups = 0;
        assert!(options.validate().is_err());

        let mut options = CompactionOptions::default();
        options.partial_progress_enabled = true;
        options.partial_progress_max_commits = 0;
        assert!(options.validate().is_err());
    }

    #[test]
    fn engine_options_render_the_full_option_set() {
        let options = CompactionOptions {
            target_file_size_bytes: 512,
            min_file_size_bytes: 384,
            max_file_size_bytes: 920,
            min_input_files: 2,
            max_concurrent_file_groups: 4,
            partial_progress_enabled: true,
            partial_progress_max_commits: 3,
        };
        let rendered = options.engine_options();
        assert_eq!(rendered["target-file-size-bytes"], "512");
        assert_eq!(rendered["min-file-size-bytes"], "384");
        assert_eq!(rendered["max-file-size-bytes"], "920");
        assert_eq!(rendered["min-input-files"], "2");
        assert_eq!(rendered["max-concurrent-file-group-rewrites"], "4");
        assert_eq!(rendered["partial-progress.enabled"], "true");
        assert_eq!(rendered["partial-progress.max-commits"], "3");
    }

    #[tokio::test]
    async fn three_small_files_compact_into_one() {
        let fixture = TestFixture::new().await;
        fixture.add_data_file("", 10);
        fixture.add_data_file("", 10);
        fixture.add_data_file("", 10);

        let (table, metrics) = fixture
            .ops()
            .compact()
            .with_min_input_files(2)
            .await
            .unwrap();

        assert_eq!(metrics.added_data_files_count, 1);
        assert_eq!(metrics.rewritten_data_files_count, 3);
        assert_eq!(metrics.rewritten_bytes_count, 30);
        assert_eq!(metrics.file_group_results.len(), 1);

        // a second run with identical parameters is a no-op
        let ops = crate::operations::MaintenanceOps::new(
            table,
            fixture.engine.clone(),
            fixture.store.clone(),
        );
        let (_table, rerun) = ops.compact().with_min_input_files(2).await.unwrap();
        assert_eq!(rerun.added_data_files_count, 0);
        assert_eq!(rerun.rewritten_data_files_count, 0);
        assert_eq!(rerun.rewritten_bytes_count, 0);
    }

    #[tokio::test]
    async fn groups_never_span_partitions() {
        let fixture = TestFixture::new().await;
        for partition in ["day=2023-07-14", "day=2023-07-15"] {
            fixture.add_data_file(partition, 10);
            fixture.add_data_file(partition, 10);
            fixture.add_data_file(partition, 10);
        }

        let (_table, metrics) = fixture
            .ops()
            .compact()
            .with_min_input_files(2)
            .await
            .unwrap();

        assert_eq!(metrics.added_data_files_count, 2);
        assert_eq!(metrics.rewritten_data_files_count, 6);
        assert_eq!(metrics.file_group_results.len(), 2);
        let partitions: Vec<&str> = metrics
            .file_group_results
            .iter()
            .map(|group| group.partition.as_str())
            .sorted()
            .collect();
        assert_eq!(partitions, vec!["day=2023-07-14", "day=2023-07-15"]);
    }

    #[tokio::test]
    async fn partial_progress_bounds_commit_count() {
        let fixture = TestFixture::new().await;
        for partition in ["p=1", "p=2", "p=3"] {
            fixture.add_data_file(partition, 10);
            fixture.add_data_file(partition, 10);
        }
        let commits_before = fixture.engine.commits();

        let (_table, metrics) = fixture
            .ops()
            .compact()
            .with_min_input_files(2)
            .with_partial_progress(true)
            .with_max_commits(2)
            .await
            .unwrap();

        assert_eq!(metrics.file_group_results.len(), 3);
        assert_eq!(fixture.engine.commits() - commits_before, 2);
    }

    #[tokio::test]
    async fn single_commit_without_partial_progress() {
        let fixture = TestFixture::new().await;
        fixture.add_data_file("p=1", 10);
        fixture.add_data_file("p=1", 10);
        let commits_before = fixture.engine.commits();

        let (_table, _metrics) = fixture
            .ops()
            .compact()
            .with_min_input_files(2)
            .await
            .unwrap();
        assert_eq!(fixture.engine.commits() - commits_before, 1);
    }

    #[tokio::test]
    async fn nothing_eligible_produces_zero_commits() {
        let fixture = TestFixture::new().await;
        let commits_before = fixture.engine.commits();

        let (_table, metrics) = fixture.ops().compact().await.unwrap();

        assert_eq!(metrics.added_data_files_count, 0);
        assert_eq!(fixture.engine.commits(), commits_before);
    }
}
