//! Batch execution of the cascade over many points.
//!
//! ## Execution Model
//!
//! ```text
//! inputs[0..n] --(rayon pool, chunked)--> run_one(i) --> outcomes[i]
//!                       |
//!                 CancellationToken: checked before each point starts
//! ```
//!
//! A token is scoped to the batch it is passed to. `run` and `run_grid`
//! create a fresh one, so cancelling one batch never affects the next.
//!
//! Points are independent: the orchestrator is read-only, and the only
//! shared mutable state is a set of atomic counters for progress. Outcomes
//! are always index-aligned with the input, whatever the scheduling.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;
use sharko_core::{CascadeResult, Error, Result};
use tracing::{debug, info, warn};

use crate::cascade::CascadeOrchestrator;
use crate::grid::GridSpec;
use crate::inference::{CascadeInput, PointFailure, PointRequest, SurfaceCell};

/// Shared flag that stops new points from starting.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Points already running finish normally.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Batch execution settings.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Worker threads (0 = one per core).
    pub num_workers: usize,
    /// Minimum points handed to a worker at once.
    pub chunk_size: usize,
    /// Draw a progress bar on stderr.
    pub show_progress: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            num_workers: 0,
            chunk_size: 256,
            show_progress: false,
        }
    }
}

/// What happened to one point.
#[derive(Debug)]
pub enum PointStatus {
    Success(CascadeResult),
    Failed(Error),
    /// Cancellation arrived before the point started.
    Cancelled,
}

/// Outcome for the point at `index` in the input.
#[derive(Debug)]
pub struct PointOutcome {
    pub index: usize,
    pub request: PointRequest,
    pub status: PointStatus,
}

impl PointOutcome {
    /// The cascade result, if the point succeeded.
    pub fn result(&self) -> Option<&CascadeResult> {
        match &self.status {
            PointStatus::Success(result) => Some(result),
            _ => None,
        }
    }

    /// The error, if the point failed.
    pub fn error(&self) -> Option<&Error> {
        match &self.status {
            PointStatus::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Batch statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub elapsed_secs: f64,
    pub points_per_sec: f64,
}

/// All outcomes of a batch, in input order.
#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<PointOutcome>,
    pub stats: BatchStats,
}

impl BatchReport {
    /// Successful results in input order.
    pub fn results(&self) -> impl Iterator<Item = &CascadeResult> {
        self.outcomes.iter().filter_map(PointOutcome::result)
    }

    /// Failed outcomes in input order.
    pub fn failures(&self) -> impl Iterator<Item = (&PointOutcome, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.error().map(|e| (o, e)))
    }

    /// Probability surface of the successful points.
    pub fn surface(&self) -> Vec<SurfaceCell> {
        self.results().map(SurfaceCell::from).collect()
    }

    /// Serializable records for every failed or cancelled point.
    pub fn failure_records(&self) -> Vec<PointFailure> {
        self.outcomes
            .iter()
            .filter_map(|o| {
                let (category, message) = match &o.status {
                    PointStatus::Success(_) => return None,
                    PointStatus::Failed(e) => (e.category().to_string(), e.to_string()),
                    PointStatus::Cancelled => {
                        ("cancelled".to_string(), "cancelled before start".to_string())
                    }
                };
                Some(PointFailure {
                    index: o.index,
                    point: o.request.clone(),
                    category,
                    message,
                })
            })
            .collect()
    }

    /// Check whether every point succeeded.
    pub fn is_complete(&self) -> bool {
        self.stats.completed == self.stats.total
    }
}

#[derive(Default)]
struct Counters {
    completed: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
}

/// Runs the cascade over batches of points.
#[derive(Debug)]
pub struct BatchRunner {
    config: BatchConfig,
    #[cfg(feature = "parallel")]
    pool: rayon::ThreadPool,
}

impl BatchRunner {
    /// Create a runner with its own worker pool.
    pub fn new(config: BatchConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk size must be at least 1".into()));
        }

        #[cfg(feature = "parallel")]
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_workers)
            .thread_name(|i| format!("sharko-worker-{i}"))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to create thread pool: {e}")))?;

        Ok(Self {
            config,
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    /// Batch settings.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run every input through the cascade.
    ///
    /// Per-point failures are collected in the report. The batch itself
    /// fails only with [`Error::SystemicMismatch`], when every point of a
    /// non-empty batch failed a stage contract.
    pub fn run<T: CascadeInput>(
        &self,
        orchestrator: &CascadeOrchestrator,
        inputs: &[T],
    ) -> Result<BatchReport> {
        self.run_with_cancel(orchestrator, inputs, &CancellationToken::new())
    }

    /// Like [`run`](Self::run), stopping new points once `cancel` fires.
    pub fn run_with_cancel<T: CascadeInput>(
        &self,
        orchestrator: &CascadeOrchestrator,
        inputs: &[T],
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        self.execute(orchestrator, inputs.len(), |i| &inputs[i], cancel)
    }

    /// Run every point of a grid, generating points on demand.
    pub fn run_grid(&self, orchestrator: &CascadeOrchestrator, grid: &GridSpec) -> Result<BatchReport> {
        self.run_grid_with_cancel(orchestrator, grid, &CancellationToken::new())
    }

    /// Like [`run_grid`](Self::run_grid), stopping new points once `cancel` fires.
    pub fn run_grid_with_cancel(
        &self,
        orchestrator: &CascadeOrchestrator,
        grid: &GridSpec,
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        self.execute(orchestrator, grid.len(), |i| grid.point(i), cancel)
    }

    fn execute<I, F>(
        &self,
        orchestrator: &CascadeOrchestrator,
        total: usize,
        input: F,
        cancel: &CancellationToken,
    ) -> Result<BatchReport>
    where
        I: CascadeInput,
        F: Fn(usize) -> I + Sync,
    {
        let start = Instant::now();
        let counters = Counters::default();
        let pb = self.progress_bar(total);
        debug!(
            "Running batch of {} points (chunk size {})",
            total, self.config.chunk_size
        );

        let task = |index: usize| {
            let outcome = self.run_one(orchestrator, index, &input(index), cancel, &counters);
            pb.inc(1);
            outcome
        };

        #[cfg(feature = "parallel")]
        let outcomes: Vec<PointOutcome> = self.pool.install(|| {
            (0..total)
                .into_par_iter()
                .with_min_len(self.config.chunk_size)
                .map(task)
                .collect()
        });
        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<PointOutcome> = (0..total).map(task).collect();

        pb.finish_and_clear();

        let elapsed = start.elapsed().as_secs_f64();
        let completed = counters.completed.load(Ordering::Relaxed);
        let stats = BatchStats {
            total,
            completed,
            failed: counters.failed.load(Ordering::Relaxed),
            cancelled: counters.cancelled.load(Ordering::Relaxed),
            elapsed_secs: elapsed,
            points_per_sec: if elapsed > 0.0 {
                completed as f64 / elapsed
            } else {
                0.0
            },
        };

        info!(
            "Batch finished: {} completed, {} failed, {} cancelled in {:.2}s ({:.0} points/s)",
            stats.completed, stats.failed, stats.cancelled, stats.elapsed_secs, stats.points_per_sec
        );

        let report = BatchReport { outcomes, stats };
        if let Some(error) = systemic_mismatch(&report) {
            return Err(error);
        }
        Ok(report)
    }

    fn run_one<I: CascadeInput>(
        &self,
        orchestrator: &CascadeOrchestrator,
        index: usize,
        input: &I,
        cancel: &CancellationToken,
        counters: &Counters,
    ) -> PointOutcome {
        let request = input.request();

        if cancel.is_cancelled() {
            counters.cancelled.fetch_add(1, Ordering::Relaxed);
            return PointOutcome {
                index,
                request,
                status: PointStatus::Cancelled,
            };
        }

        let status = match input.query_point().and_then(|p| orchestrator.run(&p)) {
            Ok(result) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
                PointStatus::Success(result)
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!("Point {} ({}) failed [{}]: {}", index, request, e.category(), e);
                PointStatus::Failed(e)
            }
        };

        PointOutcome {
            index,
            request,
            status,
        }
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

fn systemic_mismatch(report: &BatchReport) -> Option<Error> {
    let stats = &report.stats;
    if stats.total == 0 || stats.failed != stats.total {
        return None;
    }
    let mut failures = report.failures().map(|(_, e)| e);
    let first = failures.next()?;
    if !first.is_contract_violation() || !failures.all(Error::is_contract_violation) {
        return None;
    }
    Some(Error::SystemicMismatch {
        points: stats.total,
        first: first.to_string(),
    })
}
