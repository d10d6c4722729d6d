//! C0/C1 counters and the IID decision rule.
//!
//! For every result vector position `u`, `C0[u]` counts the trials whose
//! statistic is strictly smaller than the reference value and `C1[u]` the
//! trials that tie with it. The IID hypothesis is rejected when the reference
//! value sits in either 0.05% tail of the permutation distribution.

use serde::Serialize;

use crate::error::{IidError, Result};

/// Lower tail: `C0 + C1` must exceed this fraction of the trials.
pub const LOWER_TAIL: f64 = 0.0005;
/// Upper tail: `C0` must stay below this fraction of the trials.
pub const UPPER_TAIL: f64 = 0.9995;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub c0: Vec<u64>,
    pub c1: Vec<u64>,
}

impl Counters {
    pub fn zeros(len: usize) -> Self {
        Self {
            c0: vec![0; len],
            c1: vec![0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.c0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.c0.is_empty()
    }

    /// Record one comparison at position `u`.
    pub(crate) fn compare(&mut self, u: usize, reference: f64, trial: f64) {
        if reference > trial {
            self.c0[u] += 1;
        } else if reference == trial {
            self.c1[u] += 1;
        }
    }

    /// IID verdict for counters gathered over `n_trials` comparisons.
    pub fn iid_verdict(&self, n_trials: usize) -> Result<bool> {
        iid_result(&self.c0, &self.c1, n_trials)
    }

    /// Positions that fall in one of the rejection tails.
    pub fn rejected_positions(&self, n_trials: usize) -> Vec<usize> {
        self.c0
            .iter()
            .zip(&self.c1)
            .enumerate()
            .filter(|&(_, (&c0, &c1))| is_rejected(c0, c1, n_trials))
            .map(|(u, _)| u)
            .collect()
    }
}

fn is_rejected(c0: u64, c1: u64, n_trials: usize) -> bool {
    let n = n_trials as f64;
    (c0 + c1) as f64 <= LOWER_TAIL * n || c0 as f64 >= UPPER_TAIL * n
}

/// Compare the reference vector against every trial row.
pub fn calculate_counters(tx: &[f64], ti: &[Vec<f64>]) -> Result<Counters> {
    let mut acc = CounterAccumulator::new(tx);
    for row in ti {
        acc.observe(row)?;
    }
    Ok(acc.finish())
}

/// Incremental form of [`calculate_counters`], fed one trial row at a time.
#[derive(Debug, Clone)]
pub struct CounterAccumulator<'a> {
    tx: &'a [f64],
    counters: Counters,
    trials: usize,
}

impl<'a> CounterAccumulator<'a> {
    pub fn new(tx: &'a [f64]) -> Self {
        Self {
            tx,
            counters: Counters::zeros(tx.len()),
            trials: 0,
        }
    }

    pub fn observe(&mut self, row: &[f64]) -> Result<()> {
        if row.len() != self.tx.len() {
            return Err(IidError::TrialLengthMismatch {
                trial: self.trials,
                expected: self.tx.len(),
                got: row.len(),
            });
        }
        for (u, (&x, &t)) in self.tx.iter().zip(row).enumerate() {
            self.counters.compare(u, x, t);
        }
        self.trials += 1;
        Ok(())
    }

    pub fn finish(self) -> Counters {
        self.counters
    }
}

/// IID decision over counters gathered from `n_permutations` trials.
///
/// Fails if any position has `C0 + C1 <= 0.0005 n` or `C0 >= 0.9995 n`.
pub fn iid_result(c0: &[u64], c1: &[u64], n_permutations: usize) -> Result<bool> {
    if c0.len() != c1.len() {
        return Err(IidError::CounterLengthMismatch {
            c0: c0.len(),
            c1: c1.len(),
        });
    }
    Ok(!c0
        .iter()
        .zip(c1)
        .any(|(&a, &b)| is_rejected(a, b, n_permutations)))
}
