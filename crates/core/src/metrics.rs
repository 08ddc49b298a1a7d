//! Maintenance metrics.
//!
//! Counter names and label keys emitted by the operations in this crate. The
//! [`metrics`] facade is used for recording; installing an exporter is the
//! embedding application's responsibility.

use metrics::describe_counter;

/// Label key carrying the fully-qualified table name.
pub const TABLE_NAME: &str = "table_name";

/// Orphan files detected by a quarantine run.
pub const ORPHAN_FILE_COUNT: &str = "orphan_file_count";

/// Staged files matched by a purge run.
pub const STAGED_FILE_COUNT: &str = "staged_file_count";

/// Files detected as referenced only by expired snapshots.
pub const EXPIRED_FILE_COUNT: &str = "expired_file_count";

/// Sampled retention column values that failed to parse with the column pattern.
pub const INCOMPATIBLE_DATE_COLUMN: &str = "incompatible_date_column";

/// Data files added by compaction.
pub const ADDED_DATA_FILE_COUNT: &str = "added_data_file_count";

/// Data files rewritten by compaction.
pub const REWRITTEN_DATA_FILE_COUNT: &str = "rewritten_data_file_count";

/// Bytes rewritten by compaction.
pub const REWRITTEN_DATA_FILE_BYTES: &str = "rewritten_data_file_bytes";

/// File groups rewritten by compaction.
pub const REWRITTEN_DATA_FILE_GROUP_COUNT: &str = "rewritten_data_file_group_count";

/// Register descriptions for all counters emitted by this crate.
///
/// Safe to call multiple times; recorders treat repeated descriptions as
/// no-ops.
pub fn describe_metrics() {
    describe_counter!(ORPHAN_FILE_COUNT, "Orphan files detected per table");
    describe_counter!(STAGED_FILE_COUNT, "Staged files matched for deletion per table");
    describe_counter!(
        EXPIRED_FILE_COUNT,
        "Files referenced only by expired snapshots per table"
    );
    describe_counter!(
        INCOMPATIBLE_DATE_COLUMN,
        "Retention column values that failed pattern validation per table"
    );
    describe_counter!(ADDED_DATA_FILE_COUNT, "Data files added by compaction per table");
    describe_counter!(
        REWRITTEN_DATA_FILE_COUNT,
        "Data files rewritten by compaction per table"
    );
    describe_counter!(
        REWRITTEN_DATA_FILE_BYTES,
        "Bytes rewritten by compaction per table"
    );
    describe_counter!(
        REWRITTEN_DATA_FILE_GROUP_COUNT,
        "File groups rewritten by compaction per table"
    );
}
