//! Time-window record retention.
//!
//! Derives a deletion predicate over a partition or time column from a
//! granularity+count window and executes it through the engine. When the
//! column is string-typed, values are parsed with a chrono format pattern; a
//! sample of the column is validated against the pattern up front so that
//! schema drift (rows that stopped matching the pattern) surfaces as a metric
//! and a warning instead of silently never matching.
//!
//! The delete is guarded: a bounded existence probe runs first, and when no
//! row qualifies no delete is issued at all, so idempotent re-runs do not
//! grow the snapshot history.
//!
//! # Example
//! ```rust ignore
//! let (table, metrics) = MaintenanceOps::new(table, engine, store)
//!     .run_retention("datepartition", Granularity::Day, 30)
//!     .with_column_pattern("%Y-%m-%d")
//!     .await?;
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use futures::future::BoxFuture;
use metrics::counter;
use serde::Serialize;
use tracing::{info, warn};

use super::{now_from, Clock};
use crate::engine::{DeleteOutcome, TableEngine};
use crate::errors::{MaintenanceError, MaintenanceResult};
use crate::metrics::{INCOMPATIBLE_DATE_COLUMN, TABLE_NAME};
use crate::table::Table;

/// Rows sampled for column-pattern validation.
const RETENTION_SAMPLE_SIZE: usize = 10;

/// The time unit used to compute retention cutoffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Truncate to the start of the hour.
    Hour,
    /// Truncate to the start of the day.
    Day,
    /// Truncate to the first of the month.
    Month,
    /// Truncate to the first of January.
    Year,
}

impl Granularity {
    /// Truncate a timestamp down to the start of this unit.
    pub fn truncate(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let date = t.date_naive();
        // NOTE unwrap is safe, midnight and the first of the month/year are
        // always representable.
        let naive = match self {
            Granularity::Hour => date.and_hms_opt(t.hour(), 0, 0).unwrap(),
            Granularity::Day => date.and_time(NaiveTime::MIN),
            Granularity::Month => date.with_day(1).unwrap().and_time(NaiveTime::MIN),
            Granularity::Year => date
                .with_day(1)
                .unwrap()
                .with_month(1)
                .unwrap()
                .and_time(NaiveTime::MIN),
        };
        naive.and_utc()
    }

    /// Step a timestamp back by `count` of this unit.
    pub fn rewind(&self, t: DateTime<Utc>, count: u32) -> DateTime<Utc> {
        match self {
            Granularity::Hour => t - Duration::hours(count as i64),
            Granularity::Day => t - Duration::days(count as i64),
            // NOTE unwrap is safe, month arithmetic only fails at the far
            // edges of the representable range.
            Granularity::Month => t.checked_sub_months(Months::new(count)).unwrap(),
            Granularity::Year => t.checked_sub_months(Months::new(12 * count)).unwrap(),
        }
    }
}

impl FromStr for Granularity {
    type Err = MaintenanceError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_ascii_lowercase().as_str() {
            "hour" => Ok(Granularity::Hour),
            "day" => Ok(Granularity::Day),
            "month" => Ok(Granularity::Month),
            "year" => Ok(Granularity::Year),
            _ => Err(MaintenanceError::InvalidGranularity {
                input: input.to_string(),
            }),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Month => "month",
            Granularity::Year => "year",
        };
        f.write_str(name)
    }
}

/// The retention cutoff: `now` truncated to the granularity, stepped back by
/// `count` units. Rows whose effective timestamp is strictly older qualify
/// for deletion; count=0 means everything before the start of the current
/// unit.
pub fn retention_cutoff(now: DateTime<Utc>, granularity: Granularity, count: u32) -> DateTime<Utc> {
    granularity.rewind(granularity.truncate(now), count)
}

/// Parse a raw column value with a chrono format pattern, accepting both
/// datetime and date-only patterns.
pub(crate) fn parse_pattern_value(value: &str, pattern: &str) -> MaintenanceResult<NaiveDateTime> {
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, pattern) {
        return Ok(parsed);
    }
    let date = NaiveDate::parse_from_str(value, pattern)?;
    Ok(date.and_time(NaiveTime::MIN))
}

/// Deletion predicate handed to the engine: rows whose `column` value is
/// strictly older than `cutoff`, parsed with `pattern` when the column is
/// string-typed.
#[derive(Debug, Clone, PartialEq)]
pub struct RetentionPredicate {
    /// Column the predicate applies to.
    pub column: String,
    /// Parse pattern for string-typed columns.
    pub pattern: Option<String>,
    cutoff: DateTime<Utc>,
}

impl RetentionPredicate {
    /// The cutoff instant.
    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }

    /// The cutoff in milliseconds since epoch.
    pub fn cutoff_millis(&self) -> i64 {
        self.cutoff.timestamp_millis()
    }

    /// Whether a native timestamp value (milliseconds since epoch) qualifies.
    pub fn matches_epoch_millis(&self, millis: i64) -> bool {
        millis < self.cutoff_millis()
    }

    /// Whether a raw string value qualifies. Requires a parse pattern.
    pub fn matches_raw(&self, value: &str) -> MaintenanceResult<bool> {
        let pattern = self.pattern.as_deref().ok_or_else(|| {
            MaintenanceError::MissingColumnPattern {
                column: self.column.clone(),
            }
        })?;
        Ok(parse_pattern_value(value, pattern)?.and_utc() < self.cutoff)
    }
}

/// Run record retention on a table with the given options.
/// See this module's documentation for more information.
#[derive(Debug)]
pub struct RetentionBuilder {
    table: Table,
    engine: Arc<dyn TableEngine>,
    column: String,
    pattern: Option<String>,
    granularity: Granularity,
    count: u32,
    /// Override the source of time
    clock: Option<Arc<dyn Clock>>,
}

/// Details for a retention run.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionMetrics {
    /// The derived cutoff in milliseconds since epoch.
    pub cutoff_millis: i64,
    /// Rows removed by the delete commit.
    pub rows_deleted: u64,
    /// Whether a delete was issued at all. False when the existence probe
    /// found nothing, preserving snapshot-count stability on re-runs.
    pub executed: bool,
    /// Whether sampled column values failed to parse with the pattern.
    pub pattern_drift_detected: bool,
}

impl RetentionBuilder {
    /// Create a new [`RetentionBuilder`]
    pub(crate) fn new(
        table: Table,
        engine: Arc<dyn TableEngine>,
        column: impl Into<String>,
        granularity: Granularity,
        count: u32,
    ) -> Self {
        Self {
            table,
            engine,
            column: column.into(),
            pattern: None,
            granularity,
            count,
            clock: None,
        }
    }

    /// Parse pattern for string-typed retention columns, in chrono's
    /// strftime syntax. An empty pattern is treated as absent.
    pub fn with_column_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// add a time source for testing
    #[doc(hidden)]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sample the column and verify the pattern parses it; drift is advisory
    /// and surfaces as a counter plus a warning, never a failure.
    async fn check_records(&self, pattern: &str) -> MaintenanceResult<bool> {
        let sample = self
            .engine
            .sample_column(&self.table, &self.column, RETENTION_SAMPLE_SIZE)
            .await?;
        for value in &sample {
            if parse_pattern_value(value, pattern).is_err() {
                counter!(INCOMPATIBLE_DATE_COLUMN, TABLE_NAME => self.table.name()).increment(1);
                warn!(
                    "Failed to parse column {} with provided retention column pattern {} for table {}",
                    self.column,
                    pattern,
                    self.table.name(),
                );
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn execute(self) -> MaintenanceResult<(Table, RetentionMetrics)> {
        let pattern = self.pattern.as_deref().filter(|p| !p.is_empty());

        let is_string = self.table.is_string_column(&self.column).ok_or_else(|| {
            MaintenanceError::ColumnNotFound {
                column: self.column.clone(),
                table: self.table.name(),
            }
        })?;
        if is_string && pattern.is_none() {
            return Err(MaintenanceError::MissingColumnPattern {
                column: self.column.clone(),
            });
        }

        let mut metrics = RetentionMetrics::default();
        if let Some(pattern) = pattern {
            metrics.pattern_drift_detected = self.check_records(pattern).await?;
        }

        let cutoff = retention_cutoff(now_from(self.clock.as_ref()), self.granularity, self.count);
        metrics.cutoff_millis = cutoff.timestamp_millis();
        let predicate = RetentionPredicate {
            column: self.column.clone(),
            pattern: pattern.map(str::to_string),
            cutoff,
        };

        if !self.engine.any_rows_match(&self.table, &predicate).await? {
            info!(
                "No rows of {} older than {cutoff} in column {}; skipping delete",
                self.table.name(),
                self.column,
            );
            return Ok((self.table, metrics));
        }

        match self.engine.delete_matching(&self.table, &predicate).await? {
            DeleteOutcome::Committed { rows_deleted } => {
                info!(
                    "Deleted {rows_deleted} rows of {} older than {cutoff}",
                    self.table.name(),
                );
                metrics.rows_deleted = rows_deleted;
                metrics.executed = true;
            }
            DeleteOutcome::NoOp => {}
        }
        Ok((self.table, metrics))
    }
}

impl std::future::IntoFuture for RetentionBuilder {
    type Output = MaintenanceResult<(Table, RetentionMetrics)>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}
