//! Expire historical snapshots.
//!
//! Thin orchestration over the engine's snapshot expiry: snapshots created
//! before the requested timestamp are removed from the live sequence, subject
//! to the engine's own floor invariants (the sole remaining snapshot always
//! survives). Files referenced only by expired snapshots are detected and
//! reported here, never deleted — their physical removal belongs to the
//! orphan quarantine and staged purge.
//!
//! # Example
//! ```rust ignore
//! let (table, metrics) = MaintenanceOps::new(table, engine, store)
//!     .expire_snapshots(Utc::now() - Duration::days(7))
//!     .await?;
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::TableEngine;
use crate::errors::MaintenanceResult;
use crate::metrics::{EXPIRED_FILE_COUNT, TABLE_NAME};
use crate::table::Table;

/// Details for a snapshot expiry run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpireMetrics {
    /// Identifiers of the snapshots removed from the live sequence.
    pub expired_snapshot_ids: Vec<i64>,
    /// Files referenced only by expired snapshots; reported, not deleted.
    pub detected_files: Vec<String>,
}

/// Expire snapshots of a table created before a timestamp.
/// See this module's documentation for more information.
#[derive(Debug)]
pub struct ExpireSnapshotsBuilder {
    table: Table,
    engine: Arc<dyn TableEngine>,
    before: DateTime<Utc>,
}

impl ExpireSnapshotsBuilder {
    /// Create a new [`ExpireSnapshotsBuilder`]
    pub(crate) fn new(table: Table, engine: Arc<dyn TableEngine>, before: DateTime<Utc>) -> Self {
        Self {
            table,
            engine,
            before,
        }
    }

    async fn execute(self) -> MaintenanceResult<(Table, ExpireMetrics)> {
        let metrics = self.engine.expire_snapshots(&self.table, self.before).await?;
        for file in &metrics.detected_files {
            info!("Detected file {file} that is not part of survived snapshots");
        }
        info!(
            "Expired {} snapshots of {} created before {}",
            metrics.expired_snapshot_ids.len(),
            self.table.name(),
            self.before,
        );
        counter!(EXPIRED_FILE_COUNT, TABLE_NAME => self.table.name())
            .increment(metrics.detected_files.len() as u64);
        Ok((self.table, metrics))
    }
}

impl std::future::IntoFuture for ExpireSnapshotsBuilder {
    type Output = MaintenanceResult<(Table, ExpireMetrics)>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}
