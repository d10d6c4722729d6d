//! Permutation campaign: the test statistics of many shuffled copies of one
//! sequence, computed sequentially or across scoped worker threads.
//!
//! Each trial shuffles a private copy of the reference sequence and runs the
//! selected tests on it. Trials are independent, so the order of the rows in
//! the returned trial matrix carries no meaning. The first failing trial
//! stops every worker and fails the whole campaign: dropping a trial would
//! change the permutation count the IID thresholds are scaled by.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use iidperm_tests::{TestSelection, run_tests};
use rand::Rng;

use crate::error::{IidError, Result};
use crate::shuffle::shuffled_copy;

/// How the trials of a campaign are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    /// One trial after the other on the calling thread.
    Sequential,
    /// One worker thread per available processor.
    #[default]
    Parallel,
    /// A fixed number of worker threads.
    Workers(NonZeroUsize),
}

impl Execution {
    pub fn from_flag(parallel: bool) -> Self {
        if parallel {
            Self::Parallel
        } else {
            Self::Sequential
        }
    }

    /// Number of threads to use for `n_trials` trials (never more threads than trials).
    pub fn worker_count(self, n_trials: usize) -> usize {
        let wanted = match self {
            Self::Sequential => 1,
            Self::Parallel => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            Self::Workers(n) => n.get(),
        };
        wanted.min(n_trials).max(1)
    }
}

/// Trial matrix: one result vector per permutation.
pub type TrialMatrix = Vec<Vec<f64>>;

/// Logs campaign progress at debug level every 10%.
struct Progress {
    done: AtomicUsize,
    total: usize,
    step: usize,
}

impl Progress {
    fn new(total: usize) -> Self {
        Self {
            done: AtomicUsize::new(0),
            total,
            step: (total / 10).max(1),
        }
    }

    fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if done % self.step == 0 || done == self.total {
            log::debug!(
                "permutations: {done}/{} ({:.0}%)",
                self.total,
                done as f64 * 100.0 / self.total as f64
            );
        }
    }
}

fn check_trial_count(n_permutations: usize) -> Result<()> {
    if n_permutations == 0 {
        return Err(IidError::Config(
            "number of permutations must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Run `n_permutations` trials on shuffled copies of `seq`.
///
/// Parallel workers each draw from their own thread-local generator, so no
/// two workers share a random stream.
pub fn run_permutations(
    seq: &[u8],
    n_permutations: usize,
    selection: &TestSelection,
    lags: &[usize],
    execution: Execution,
) -> Result<TrialMatrix> {
    check_trial_count(n_permutations)?;
    let workers = execution.worker_count(n_permutations);
    if workers == 1 {
        return run_permutations_with_rng(seq, n_permutations, selection, lags, &mut rand::rng());
    }
    log::debug!("running {n_permutations} permutations on {workers} threads");

    let progress = Progress::new(n_permutations);
    let failed = AtomicBool::new(false);

    let outcomes: Vec<Result<TrialMatrix>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|w| {
                let share = n_permutations / workers + usize::from(w < n_permutations % workers);
                let progress = &progress;
                let failed = &failed;
                s.spawn(move || -> Result<TrialMatrix> {
                    let mut rng = rand::rng();
                    let mut rows = Vec::with_capacity(share);
                    for _ in 0..share {
                        if failed.load(Ordering::Relaxed) {
                            break;
                        }
                        let shuffled = shuffled_copy(seq, &mut rng);
                        match run_tests(&shuffled, lags, selection) {
                            Ok(row) => {
                                rows.push(row);
                                progress.tick();
                            }
                            Err(e) => {
                                failed.store(true, Ordering::Relaxed);
                                return Err(e.into());
                            }
                        }
                    }
                    Ok(rows)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(Err(IidError::WorkerPanicked)))
            .collect()
    });

    let mut ti = Vec::with_capacity(n_permutations);
    for outcome in outcomes {
        ti.extend(outcome?);
    }
    Ok(ti)
}

/// Run `n_permutations` trials sequentially with a caller-supplied generator.
pub fn run_permutations_with_rng<R: Rng + ?Sized>(
    seq: &[u8],
    n_permutations: usize,
    selection: &TestSelection,
    lags: &[usize],
    rng: &mut R,
) -> Result<TrialMatrix> {
    check_trial_count(n_permutations)?;
    let progress = Progress::new(n_permutations);
    let mut ti = Vec::with_capacity(n_permutations);
    for _ in 0..n_permutations {
        let shuffled = shuffled_copy(seq, rng);
        ti.push(run_tests(&shuffled, lags, selection)?);
        progress.tick();
    }
    Ok(ti)
}
