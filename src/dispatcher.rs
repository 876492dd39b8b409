// 🚦 Concurrent Dispatcher - one task per row, one deadline per batch
//
// Per-row faults (bad shape, pipeline error, panic) end up on the row.
// The batch deadline is the only cancellation: on expiry nothing is returned.

use crate::config::MatchConfig;
use crate::entities::{ReferenceRow, RowRecord, RowStatus};
use crate::error::{MatchError, Result};
use crate::index::ReferenceIndex;
use crate::pipeline::RowPipeline;
use crate::segmenter::Segmenter;
use chrono::{DateTime, Utc};
use crossbeam_channel::RecvTimeoutError;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Work applied to every dispatched row. Must record its own faults on the row.
pub trait RowProcessor: Send + Sync {
    fn process(&self, row: &mut RowRecord);
}

// ============================================================================
// BATCH REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub existing: usize,
    pub nonexistent: usize,
    pub similarity_matched: usize,
    pub errors: usize,
}

impl BatchReport {
    fn tally(batch_id: Uuid, started_at: DateTime<Utc>, rows: &[RowRecord]) -> Self {
        let count = |status: RowStatus| rows.iter().filter(|r| r.status() == status).count();

        BatchReport {
            batch_id,
            started_at,
            finished_at: Utc::now(),
            total: rows.len(),
            existing: count(RowStatus::Existing),
            nonexistent: count(RowStatus::Nonexistent),
            similarity_matched: count(RowStatus::SimilarityMatched),
            errors: count(RowStatus::Error),
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} rows in {}ms | {} existing, {} similar, {} nonexistent, {} errors",
            self.total,
            self.duration_ms(),
            self.existing,
            self.similarity_matched,
            self.nonexistent,
            self.errors
        )
    }
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Completion order
    pub rows: Vec<RowRecord>,
    pub report: BatchReport,
}

impl BatchOutcome {
    /// Rows back in sheet order
    pub fn into_ordered_rows(self) -> Vec<RowRecord> {
        let mut rows = self.rows;
        rows.sort_by_key(|r| r.position);
        rows
    }
}

// ============================================================================
// ROW BOUNDARY
// ============================================================================

/// Shape and status precondition for a dispatched row
pub fn check_row(row: &RowRecord) -> Result<()> {
    let fault = |what: &str| -> Result<()> {
        Err(MatchError::Validation(format!("row {}: {}", row.position, what)))
    };

    if row.position == 0 {
        return fault("position must be a positive integer");
    }
    if row.source.file_name.trim().is_empty() || row.source.sheet_name.trim().is_empty() {
        return fault("missing source file or sheet name");
    }
    if row.column_names.is_empty() {
        return fault("no column names");
    }
    if row.row_values.is_empty() {
        return fault("no row values");
    }
    if row.column_values.is_empty() {
        return fault("no column values");
    }
    if !row.status().is_dispatchable() {
        return fault(&format!("status '{}' can't be dispatched", row.status().as_str()));
    }
    Ok(())
}

/// Everything that can go wrong with one row stays on that row
fn handle_row(mut row: RowRecord, processor: &dyn RowProcessor) -> RowRecord {
    if let Err(err) = check_row(&row) {
        warn!(position = row.position, error = %err, "row rejected");
        row.fail(&err);
        return row;
    }

    if row.status() == RowStatus::Initial {
        if let Err(err) = row.transition(RowStatus::Checked) {
            row.fail(&err);
            return row;
        }
    }

    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| processor.process(&mut row))) {
        let err = MatchError::Processing(format!(
            "row {}: processing panicked: {}",
            row.position,
            panic_message(panic.as_ref())
        ));
        warn!(position = row.position, error = %err, "row panicked");
        row.fail(&err);
    }

    row
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// DISPATCHER
// ============================================================================

#[derive(Debug, Clone)]
pub struct ConcurrentDispatcher {
    max_workers: usize,
    timeout: Duration,
}

impl ConcurrentDispatcher {
    pub fn new(max_workers: usize, timeout: Duration) -> Self {
        ConcurrentDispatcher {
            max_workers: max_workers.max(1),
            timeout,
        }
    }

    pub fn from_config(config: &MatchConfig) -> Self {
        ConcurrentDispatcher::new(config.max_workers, Duration::from_secs(config.batch_timeout_secs))
    }

    /// Process every row on the worker pool. Batch-or-nothing: a deadline
    /// miss returns `BatchTimeout` and drops the completed rows.
    pub fn run(&self, rows: Vec<RowRecord>, processor: Arc<dyn RowProcessor>) -> Result<BatchOutcome> {
        let batch_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = rows.len();
        info!(%batch_id, rows = total, workers = self.max_workers, "batch started");

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .thread_name(|i| format!("reconcile-worker-{}", i))
            .build()
            .map_err(|e| MatchError::Config(format!("failed to start worker pool: {}", e)))?;

        // Queued rows skip their work once the batch has been abandoned
        let abandoned = Arc::new(AtomicBool::new(false));
        let (tx, rx) = crossbeam_channel::unbounded();

        for row in rows {
            let tx = tx.clone();
            let processor = Arc::clone(&processor);
            let abandoned = Arc::clone(&abandoned);
            pool.spawn(move || {
                if abandoned.load(Ordering::Relaxed) {
                    return;
                }
                let row = handle_row(row, processor.as_ref());
                // Receiver is gone only after a timeout
                let _ = tx.send(row);
            });
        }
        drop(tx);

        // A timeout too large to land on the clock means no deadline at all
        let deadline = Instant::now().checked_add(self.timeout);
        let mut done = Vec::with_capacity(total);
        while done.len() < total {
            let received = match deadline {
                Some(deadline) => rx.recv_deadline(deadline),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(row) => done.push(row),
                Err(RecvTimeoutError::Timeout) => {
                    abandoned.store(true, Ordering::Relaxed);
                    let err = MatchError::BatchTimeout {
                        completed: done.len(),
                        pending: total - done.len(),
                        timeout_secs: self.timeout.as_secs_f64(),
                    };
                    error!(%batch_id, error = %err, "batch abandoned");
                    return Err(err);
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let report = BatchReport::tally(batch_id, started_at, &done);
        info!(%batch_id, "{}", report.summary());
        Ok(BatchOutcome { rows: done, report })
    }
}

/// Build the index, wire the pipeline and run one batch
pub fn reconcile(
    reference_rows: &[ReferenceRow],
    rows: Vec<RowRecord>,
    config: &MatchConfig,
    segmenter: Arc<dyn Segmenter>,
) -> Result<BatchOutcome> {
    config.validate()?;
    let index = Arc::new(ReferenceIndex::build(reference_rows, config)?);
    let pipeline = Arc::new(RowPipeline::new(index, config, segmenter)?);
    ConcurrentDispatcher::from_config(config).run(rows, pipeline)
}

// ============================================================================
// TESTS
// ============================================================================
