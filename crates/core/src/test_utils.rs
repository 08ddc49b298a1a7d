//! Shared fixtures for the operation tests: an in-memory object store plus a
//! small [`TableEngine`] implementation with just enough commit bookkeeping
//! to assert snapshot-count stability and partial-progress budgets.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use arrow_schema::{DataType, Field, Schema, TimeUnit};
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use itertools::Itertools;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};

use crate::catalog::TableIdentifier;
use crate::engine::{DeleteOutcome, OrphanCandidateStream, TableEngine};
use crate::errors::MaintenanceResult;
use crate::operations::compact::{CompactionOptions, FileGroupRewriteResult, RewriteMetrics};
use crate::operations::expire::ExpireMetrics;
use crate::operations::retention::RetentionPredicate;
use crate::operations::MaintenanceOps;
use crate::storage::ObjectStoreRef;
use crate::table::{Snapshot, Table};

/// One table over an in-memory store and engine.
pub struct TestFixture {
    /// Backing in-memory store.
    pub store: ObjectStoreRef,
    /// Engine stub shared with the operations under test.
    pub engine: Arc<TestEngine>,
    /// The table handle.
    pub table: Table,
}

impl TestFixture {
    /// A fixture for `test_db.test_table` with a native timestamp column and
    /// a string partition column.
    pub async fn new() -> Self {
        let store: ObjectStoreRef = Arc::new(InMemory::new());
        let schema = Arc::new(Schema::new(vec![
            Field::new("ts", DataType::Timestamp(TimeUnit::Millisecond, None), false),
            Field::new("datepartition", DataType::Utf8, false),
        ]));
        let table = Table::new(
            TableIdentifier::new("test_db", "test_table"),
            Path::from("warehouse/test_db/test_table"),
            schema,
            vec![],
            Default::default(),
        );
        let engine = Arc::new(TestEngine::new(store.clone()));
        Self {
            store,
            engine,
            table,
        }
    }

    /// A fresh operations handle over the fixture's table.
    pub fn ops(&self) -> MaintenanceOps {
        MaintenanceOps::new(self.table.clone(), self.engine.clone(), self.store.clone())
    }

    fn child(&self, relative: &str) -> Path {
        Path::from(format!("{}/{relative}", self.table.location()))
    }

    /// Write a file under the table location and mark it referenced by the
    /// live snapshot set.
    pub async fn track_file(&self, relative: &str) -> Path {
        let path = self.child(relative);
        self.store
            .put(&path, PutPayload::from_static(b"data"))
            .await
            .unwrap();
        self.engine.state().referenced.insert(path.clone());
        path
    }

    /// Write a file under the table location without referencing it.
    pub async fn inject_file(&self, relative: &str) -> Path {
        let path = self.child(relative);
        self.store
            .put(&path, PutPayload::from_static(b"data"))
            .await
            .unwrap();
        path
    }

    /// Register a row for retention tests.
    pub fn insert_row(&self, ts_millis: i64, raw: &str) {
        self.engine.state().rows.push(TestRow {
            ts_millis,
            raw: raw.to_string(),
        });
    }

    /// Register a data file for compaction tests.
    pub fn add_data_file(&self, partition: &str, size: u64) {
        self.engine.state().data_files.push(TestDataFile {
            partition: partition.to_string(),
            size,
        });
    }

    /// Register a snapshot for expiry tests.
    pub fn add_snapshot(&self, id: i64, timestamp_millis: i64) {
        self.engine.state().snapshots.push(Snapshot {
            id,
            timestamp_millis,
        });
    }
}

#[derive(Debug, Clone)]
struct TestRow {
    ts_millis: i64,
    raw: String,
}

#[derive(Debug, Clone)]
struct TestDataFile {
    partition: String,
    size: u64,
}

#[derive(Debug, Default)]
struct EngineState {
    referenced: HashSet<Path>,
    snapshots: Vec<Snapshot>,
    rows: Vec<TestRow>,
    data_files: Vec<TestDataFile>,
    commits: u64,
}

/// In-memory [`TableEngine`] stub backing the operation tests.
#[derive(Debug)]
pub struct TestEngine {
    store: ObjectStoreRef,
    state: Mutex<EngineState>,
}

impl TestEngine {
    fn new(store: ObjectStoreRef) -> Self {
        Self {
            store,
            state: Mutex::new(EngineState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap()
    }

    /// Commits issued so far.
    pub fn commits(&self) -> u64 {
        self.state().commits
    }

    /// Rows currently live.
    pub fn row_count(&self) -> usize {
        self.state().rows.len()
    }

    /// Live snapshot ids in creation order.
    pub fn snapshot_ids(&self) -> Vec<i64> {
        let mut snapshots = self.state().snapshots.clone();
        snapshots.sort();
        snapshots.into_iter().map(|s| s.id).collect()
    }

    fn row_matches(row: &TestRow, predicate: &RetentionPredicate) -> bool {
        if predicate.pattern.is_some() {
            // unparseable values compare to nothing, like SQL to_timestamp
            predicate.matches_raw(&row.raw).unwrap_or(false)
        } else {
            predicate.matches_epoch_millis(row.ts_millis)
        }
    }
}

#[async_trait::async_trait]
impl TableEngine for TestEngine {
    async fn scan_orphan_candidates(
        &self,
        table: &Table,
        older_than: DateTime<Utc>,
    ) -> MaintenanceResult<OrphanCandidateStream> {
        let entries: Vec<_> = self
            .store
            .list(Some(table.location()))
            .try_collect()
            .await?;
        let state = self.state();
        let candidates: Vec<MaintenanceResult<Path>> = entries
            .into_iter()
            .filter(|meta| {
                !state.referenced.contains(&meta.location) && meta.last_modified < older_than
            })
            .map(|meta| Ok(meta.location))
            .collect();
        Ok(futures::stream::iter(candidates).boxed())
    }

    async fn expire_snapshots(
        &self,
        _table: &Table,
        before: DateTime<Utc>,
    ) -> MaintenanceResult<ExpireMetrics> {
        let before_millis = before.timestamp_millis();
        let mut state = self.state();
        state.snapshots.sort();
        let newest = state.snapshots.last().map(|s| s.id);
        let (expired, kept): (Vec<Snapshot>, Vec<Snapshot>) = state
            .snapshots
            .iter()
            .copied()
            .partition(|s| s.timestamp_millis < before_millis && Some(s.id) != newest);
        state.snapshots = kept;
        if !expired.is_empty() {
            state.commits += 1;
        }
        Ok(ExpireMetrics {
            expired_snapshot_ids: expired.into_iter().map(|s| s.id).collect(),
            detected_files: vec![],
        })
    }

    async fn rewrite_data_files(
        &self,
        _table: &Table,
        options: &CompactionOptions,
    ) -> MaintenanceResult<RewriteMetrics> {
        let mut state = self.state();
        let mut metrics = RewriteMetrics::default();
        let mut remaining: Vec<TestDataFile> = vec![];

        let by_partition = state
            .data_files
            .drain(..)
            .into_group_map_by(|file| file.partition.clone());
        for (global_index, (partition, files)) in by_partition
            .into_iter()
            .sorted_by(|a, b| a.0.cmp(&b.0))
            .enumerate()
        {
            let (candidates, kept): (Vec<TestDataFile>, Vec<TestDataFile>) =
                files.into_iter().partition(|file| {
                    file.size < options.min_file_size_bytes
                        || file.size > options.max_file_size_bytes
                });
            remaining.extend(kept);

            let oversized = candidates
                .iter()
                .any(|file| file.size > options.max_file_size_bytes);
            if candidates.is_empty()
                || (candidates.len() < options.min_input_files && !oversized)
            {
                remaining.extend(candidates);
                continue;
            }

            let total: u64 = candidates.iter().map(|file| file.size).sum();
            let added = total.div_ceil(options.target_file_size_bytes).max(1);
            for index in 0..added {
                let size = if index == 0 {
                    total - (added - 1) * (total / added)
                } else {
                    total / added
                };
                remaining.push(TestDataFile {
                    partition: partition.clone(),
                    size,
                });
            }

            metrics.added_data_files_count += added;
            metrics.rewritten_data_files_count += candidates.len() as u64;
            metrics.rewritten_bytes_count += total;
            metrics.file_group_results.push(FileGroupRewriteResult {
                partition: partition.clone(),
                partition_index: 0,
                global_index: global_index as u32,
                added_files: added,
                rewritten_files: candidates.len() as u64,
                rewritten_bytes: total,
            });
        }

        state.data_files = remaining;
        let groups = metrics.file_group_results.len() as u64;
        if groups > 0 {
            state.commits += if options.partial_progress_enabled {
                groups.min(options.partial_progress_max_commits as u64)
            } else {
                1
            };
        }
        Ok(metrics)
    }

    async fn any_rows_match(
        &self,
        _table: &Table,
        predicate: &RetentionPredicate,
    ) -> MaintenanceResult<bool> {
        Ok(self
            .state()
            .rows
            .iter()
            .any(|row| Self::row_matches(row, predicate)))
    }

    async fn delete_matching(
        &self,
        _table: &Table,
        predicate: &RetentionPredicate,
    ) -> MaintenanceResult<DeleteOutcome> {
        let mut state = self.state();
        let before = state.rows.len();
        state.rows.retain(|row| !Self::row_matches(row, predicate));
        let deleted = (before - state.rows.len()) as u64;
        if deleted == 0 {
            return Ok(DeleteOutcome::NoOp);
        }
        state.commits += 1;
        let next_id = state.snapshots.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        state.snapshots.push(Snapshot {
            id: next_id,
            timestamp_millis: Utc::now().timestamp_millis(),
        });
        Ok(DeleteOutcome::Committed {
            rows_deleted: deleted,
        })
    }

    async fn sample_column(
        &self,
        _table: &Table,
        _column: &str,
        limit: usize,
    ) -> MaintenanceResult<Vec<String>> {
        Ok(self
            .state()
            .rows
            .iter()
            .take(limit)
            .map(|row| row.raw.clone())
            .collect())
    }
}
