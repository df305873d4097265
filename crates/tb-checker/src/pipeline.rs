//! Pipeline coordinator
//!
//! Feeds puzzles to a bounded pool of verification tasks and appends each
//! result to the checkpoint store as soon as it completes. Puzzles already in
//! the store are skipped, so an interrupted run resumes where it stopped.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;

use puzzle_core::PuzzleRecord;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::error::CheckerError;
use crate::oracle::Oracle;
use crate::report::PuzzleCheckResult;
use crate::verifier::{verify_puzzle, VerifyOptions};

const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum number of puzzles verified at once
    pub workers: usize,
    pub verify: VerifyOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            verify: VerifyOptions::default(),
        }
    }
}

/// Counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub skipped_mate: usize,
    pub skipped_done: usize,
    pub skipped_duplicate: usize,
    /// Puzzles verified and appended during this run
    pub checked: usize,
    /// Of `checked`, those with at least one error
    pub flagged: usize,
    pub cancelled: bool,
}

pub struct Pipeline<O: Oracle> {
    oracle: Arc<O>,
    store: Arc<CheckpointStore>,
    config: PipelineConfig,
}

impl<O: Oracle> Pipeline<O> {
    pub fn new(oracle: Arc<O>, store: Arc<CheckpointStore>, config: PipelineConfig) -> Self {
        Self {
            oracle,
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<CheckpointStore> {
        &self.store
    }

    /// Verify every pending puzzle.
    pub async fn run(&self, puzzles: Vec<PuzzleRecord>) -> Result<RunSummary, CheckerError> {
        self.run_until(puzzles, std::future::pending()).await
    }

    /// Verify pending puzzles until done or until `shutdown` resolves. On
    /// shutdown in-flight tasks are aborted and their puzzles stay pending.
    pub async fn run_until<F>(
        &self,
        puzzles: Vec<PuzzleRecord>,
        shutdown: F,
    ) -> Result<RunSummary, CheckerError>
    where
        F: Future<Output = ()>,
    {
        let mut summary = RunSummary {
            total: puzzles.len(),
            ..RunSummary::default()
        };

        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        for puzzle in puzzles {
            if !seen.insert(puzzle.puzzle_id.clone()) {
                debug!(puzzle_id = %puzzle.puzzle_id, "Duplicate puzzle id in input, skipping");
                summary.skipped_duplicate += 1;
            } else if puzzle.is_mate() {
                summary.skipped_mate += 1;
            } else if self.store.contains(&puzzle.puzzle_id) {
                summary.skipped_done += 1;
            } else {
                queue.push_back(puzzle);
            }
        }

        let workers = self.config.workers.max(1);
        info!(
            pending = queue.len(),
            workers,
            skipped_mate = summary.skipped_mate,
            skipped_done = summary.skipped_done,
            "Starting verification"
        );

        let mut tasks: JoinSet<Option<PuzzleCheckResult>> = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            while tasks.len() < workers {
                let Some(puzzle) = queue.pop_front() else {
                    break;
                };
                let oracle = Arc::clone(&self.oracle);
                let options = self.config.verify.clone();
                tasks.spawn(async move { verify_puzzle(oracle.as_ref(), &puzzle, &options).await });
            }

            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!(in_flight = tasks.len(), "Shutdown requested, aborting in-flight puzzles");
                    tasks.abort_all();
                    // Keep whatever finished before the abort landed
                    while let Some(joined) = tasks.join_next().await {
                        if let Ok(Some(result)) = joined {
                            self.record(result, &mut summary).await?;
                        }
                    }
                    summary.cancelled = true;
                    break;
                }
                Some(joined) = tasks.join_next() => {
                    match joined {
                        Ok(Some(result)) => self.record(result, &mut summary).await?,
                        Ok(None) => {}
                        Err(e) if e.is_panic() => {
                            error!(error = %e, "Verification task panicked, puzzle left pending");
                        }
                        Err(_) => {}
                    }
                }
            }
        }

        info!(
            checked = summary.checked,
            flagged = summary.flagged,
            cancelled = summary.cancelled,
            "Verification finished"
        );
        Ok(summary)
    }

    /// Append on the blocking pool, since each append waits for `sync_data`.
    async fn record(&self, result: PuzzleCheckResult, summary: &mut RunSummary) -> Result<(), CheckerError> {
        let correct = result.is_correct();
        if !correct {
            warn!(puzzle_id = %result.puzzle_id, errors = %result.tokens(), "Puzzle flagged");
        }
        let store = Arc::clone(&self.store);
        let appended = tokio::task::spawn_blocking(move || store.append(result)).await??;
        if appended {
            summary.checked += 1;
            if !correct {
                summary.flagged += 1;
            }
            if summary.checked % PROGRESS_EVERY == 0 {
                info!(checked = summary.checked, flagged = summary.flagged, "Progress");
            }
        }
        Ok(())
    }
}
