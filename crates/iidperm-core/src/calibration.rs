//! Calibration of the permutation counters.
//!
//! Repeats the permutation campaign `n_iterations` times on one reference
//! sequence and records the counters of every iteration under two counting
//! conventions:
//!
//! - **Tx**: each trial is compared with the reference statistic, exactly as
//!   the IID validation does. C0 follows a binomial law whose success
//!   probability depends on where Tx sits, estimated from the data.
//! - **Tj-normalized**: trials are compared with each other in disjoint
//!   consecutive pairs, ties being re-drawn on fresh shuffles. C0 then follows
//!   a binomial law with `p = 0.5` over `n_permutations / 2` pairs.
//!
//! The spread of C0 over the iterations is compared with the expected binomial
//! distribution (10-bin histogram, reduced chi-square).

use std::fmt;
use std::time::Instant;

use iidperm_tests::{TestSelection, run_single, run_tests};
use rand::Rng;
use serde::Serialize;
use statrs::distribution::{Binomial, Discrete};

use crate::campaign::{Execution, TrialMatrix, run_permutations, run_permutations_with_rng};
use crate::counters::{Counters, calculate_counters};
use crate::error::{IidError, Result};
use crate::shuffle::shuffled_copy;

/// Default cap on tie re-draws per Tj pair.
pub const DEFAULT_TIE_RETRY_LIMIT: usize = 10_000;

/// Number of histogram bins used by the binomial comparison.
pub const HISTOGRAM_BINS: u64 = 10;

// ---------------------------------------------------------------------------
// Parameters and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CalibrationParams {
    pub selection: TestSelection,
    /// Single lag used by periodicity and covariance.
    pub lag: usize,
    pub n_permutations: usize,
    pub n_iterations: usize,
    pub execution: Execution,
    pub tie_retry_limit: usize,
}

/// Counting convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Method {
    Tx,
    Tj,
}

impl Method {
    /// Directory name used for the per-iteration counter file.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Tx => "countersTx_distribution",
            Self::Tj => "countersTj_distribution",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tx => f.write_str("Tx"),
            Self::Tj => f.write_str("Tj"),
        }
    }
}

/// Outcome of one method in one iteration.
#[derive(Debug, Clone, Serialize)]
pub struct MethodOutcome {
    pub counters: Counters,
    pub iid: bool,
    /// Seconds spent on the campaign plus this method's counting.
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IterationRecord {
    pub tx: MethodOutcome,
    pub tj: MethodOutcome,
}

impl IterationRecord {
    pub fn outcome(&self, method: Method) -> &MethodOutcome {
        match method {
            Method::Tx => &self.tx,
            Method::Tj => &self.tj,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CalibrationReport {
    pub labels: Vec<String>,
    pub reference: Vec<f64>,
    pub iterations: Vec<IterationRecord>,
    pub distributions: Vec<CounterDistribution>,
}

impl CalibrationReport {
    /// Fraction of iterations with an IID verdict under `method`.
    pub fn pass_rate(&self, method: Method) -> f64 {
        if self.iterations.is_empty() {
            return 0.0;
        }
        let passed = self
            .iterations
            .iter()
            .filter(|it| it.outcome(method).iid)
            .count();
        passed as f64 / self.iterations.len() as f64
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Run the calibration with the configured execution mode.
pub fn run_calibration(seq: &[u8], params: &CalibrationParams) -> Result<CalibrationReport> {
    calibrate(seq, params, &mut rand::rng(), false)
}

/// Run the calibration sequentially from a caller-supplied generator.
pub fn run_calibration_with_rng<R: Rng + ?Sized>(
    seq: &[u8],
    params: &CalibrationParams,
    rng: &mut R,
) -> Result<CalibrationReport> {
    calibrate(seq, params, rng, true)
}

fn calibrate<R: Rng + ?Sized>(
    seq: &[u8],
    params: &CalibrationParams,
    rng: &mut R,
    seeded: bool,
) -> Result<CalibrationReport> {
    if params.n_iterations == 0 {
        return Err(IidError::Config(
            "number of iterations must be at least 1".to_string(),
        ));
    }
    let lags = [params.lag];
    let labels = params.selection.labels(&lags);
    log::debug!(
        "calibration: {} iterations of {} permutations over {:?}",
        params.n_iterations,
        params.n_permutations,
        labels
    );
    let reference = run_tests(seq, &lags, &params.selection)?;
    let tj_trials = params.n_permutations / 2;

    let step = (params.n_iterations / 10).max(1);
    let mut iterations = Vec::with_capacity(params.n_iterations);
    for i in 0..params.n_iterations {
        let t0 = Instant::now();
        let ti: TrialMatrix = if seeded {
            run_permutations_with_rng(seq, params.n_permutations, &params.selection, &lags, rng)?
        } else {
            run_permutations(
                seq,
                params.n_permutations,
                &params.selection,
                &lags,
                params.execution,
            )?
        };
        let campaign_secs = t0.elapsed().as_secs_f64();

        let t1 = Instant::now();
        let tx_counters = calculate_counters(&reference, &ti)?;
        let tx_secs = t1.elapsed().as_secs_f64();

        let t2 = Instant::now();
        let tj_counters = tj_normalized_counters(
            seq,
            &ti,
            &params.selection,
            params.lag,
            params.tie_retry_limit,
            rng,
        )?;
        let tj_secs = t2.elapsed().as_secs_f64();

        let tx_iid = tx_counters.iid_verdict(params.n_permutations)?;
        let tj_iid = tj_counters.iid_verdict(tj_trials)?;
        iterations.push(IterationRecord {
            tx: MethodOutcome {
                counters: tx_counters,
                iid: tx_iid,
                elapsed_secs: campaign_secs + tx_secs,
            },
            tj: MethodOutcome {
                counters: tj_counters,
                iid: tj_iid,
                elapsed_secs: campaign_secs + tj_secs,
            },
        });

        let done = i + 1;
        if done % step == 0 || done == params.n_iterations {
            log::debug!("calibration: {done}/{} iterations", params.n_iterations);
        }
    }

    let mut distributions = Vec::with_capacity(2 * labels.len());
    for method in [Method::Tx, Method::Tj] {
        for (u, label) in labels.iter().enumerate() {
            let c0: Vec<u64> = iterations
                .iter()
                .map(|it| it.outcome(method).counters.c0[u])
                .collect();
            distributions.push(CounterDistribution::fit(
                label,
                method,
                c0,
                params.n_permutations,
            )?);
        }
    }

    let report = CalibrationReport {
        labels,
        reference,
        iterations,
        distributions,
    };
    log::info!(
        "calibration: IID verdict in {:.1}% of iterations (Tx), {:.1}% (Tj)",
        report.pass_rate(Method::Tx) * 100.0,
        report.pass_rate(Method::Tj) * 100.0
    );
    Ok(report)
}

/// Tj-normalized counters over the disjoint pairs `(ti[z], ti[z + 1])`,
/// `z = 0, 2, 4, ...`. An odd last row is left out.
///
/// A pair whose values tie at position `u` is replaced by the statistic of
/// that test on two fresh shuffles of `seq` until the values differ, at most
/// `tie_retry_limit` times. A pair still tied after that counts towards C1.
pub fn tj_normalized_counters<R: Rng + ?Sized>(
    seq: &[u8],
    ti: &[Vec<f64>],
    selection: &TestSelection,
    lag: usize,
    tie_retry_limit: usize,
    rng: &mut R,
) -> Result<Counters> {
    let tests = selection.tests();
    if let Some((trial, row)) = ti.iter().enumerate().find(|(_, r)| r.len() != tests.len()) {
        return Err(IidError::TrialLengthMismatch {
            trial,
            expected: tests.len(),
            got: row.len(),
        });
    }

    let mut counters = Counters::zeros(tests.len());
    for (u, &test) in tests.iter().enumerate() {
        let mut exhausted = 0usize;
        for z in (0..ti.len().saturating_sub(1)).step_by(2) {
            let mut first = ti[z][u];
            let mut second = ti[z + 1][u];
            let mut rounds = 0;
            while first == second && rounds < tie_retry_limit {
                first = run_single(&shuffled_copy(seq, rng), test, lag)?;
                second = run_single(&shuffled_copy(seq, rng), test, lag)?;
                rounds += 1;
            }
            if first == second {
                exhausted += 1;
            }
            counters.compare(u, first, second);
        }
        if exhausted > 0 {
            log::warn!(
                "{test}: {exhausted} pair(s) still tied after {tie_retry_limit} re-draws, counted as ties"
            );
        }
    }
    Ok(counters)
}

// ---------------------------------------------------------------------------
// Binomial comparison
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    /// First counter value in the bin.
    pub lower: u64,
    /// Last counter value in the bin (inclusive).
    pub upper: u64,
    pub observed: u64,
    pub expected: f64,
}

/// Distribution of one test's C0 values over the calibration iterations.
#[derive(Debug, Clone, Serialize)]
pub struct CounterDistribution {
    pub label: String,
    pub method: Method,
    pub c0: Vec<u64>,
    /// Binomial number of trials.
    pub trials: u64,
    /// Binomial success probability.
    pub p: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub histogram: Vec<HistogramBin>,
    /// `None` when no bin has a non-zero expectation.
    pub reduced_chi_square: Option<f64>,
}

impl CounterDistribution {
    /// Fit `c0` (one value per iteration) against the binomial law of `method`.
    pub fn fit(label: &str, method: Method, c0: Vec<u64>, n_permutations: usize) -> Result<Self> {
        let (Some(&min), Some(&max)) = (c0.iter().min(), c0.iter().max()) else {
            return Err(IidError::Fit(format!("{label}: no counter values")));
        };
        let n_iter = c0.len();
        let (trials, p) = match method {
            Method::Tx => {
                let total: u64 = c0.iter().sum();
                (
                    n_permutations as u64,
                    total as f64 / (n_permutations as f64 * n_iter as f64),
                )
            }
            Method::Tj => ((n_permutations / 2) as u64, 0.5),
        };
        let binomial =
            Binomial::new(p, trials).map_err(|e| IidError::Fit(format!("{label}: {e}")))?;

        let width = (max - min + 2).div_ceil(HISTOGRAM_BINS);
        let n_bins = (max - min + 1).div_ceil(width);
        let mut histogram: Vec<HistogramBin> = (0..n_bins)
            .map(|b| {
                let lower = min + b * width;
                let upper = lower + width - 1;
                let expected = (lower..=upper)
                    .filter(|&k| k <= trials)
                    .map(|k| n_iter as f64 * binomial.pmf(k))
                    .sum();
                HistogramBin {
                    lower,
                    upper,
                    observed: 0,
                    expected,
                }
            })
            .collect();
        for &c in &c0 {
            histogram[((c - min) / width) as usize].observed += 1;
        }

        let mut chi_square = 0.0;
        let mut ndf = 0usize;
        for bin in histogram.iter().filter(|b| b.expected != 0.0) {
            let d = bin.observed as f64 - bin.expected;
            chi_square += d * d / bin.expected;
            ndf += 1;
        }
        let reduced_chi_square = (ndf > 0).then(|| chi_square / ndf as f64);

        let mean = c0.iter().sum::<u64>() as f64 / n_iter as f64;
        let std_dev = if n_iter > 1 {
            let ss: f64 = c0.iter().map(|&c| (c as f64 - mean).powi(2)).sum();
            (ss / (n_iter - 1) as f64).sqrt()
        } else {
            0.0
        };

        Ok(Self {
            label: label.to_string(),
            method,
            c0,
            trials,
            p,
            mean,
            std_dev,
            histogram,
            reduced_chi_square,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iidperm_tests::TestId;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn nibbles(n: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.random_range(0..16u8)).collect()
    }

    fn params(selection: TestSelection) -> CalibrationParams {
        CalibrationParams {
            selection,
            lag: 2,
            n_permutations: 20,
            n_iterations: 6,
            execution: Execution::Sequential,
            tie_retry_limit: DEFAULT_TIE_RETRY_LIMIT,
        }
    }

    #[test]
    fn test_tj_pairs_without_ties() {
        let sel = TestSelection::single(TestId::Excursion);
        let ti = vec![vec![3.0], vec![1.0], vec![0.5], vec![2.0], vec![9.0]];
        let mut rng = StdRng::seed_from_u64(1);
        let c = tj_normalized_counters(&[0, 1, 2], &ti, &sel, 1, 10, &mut rng).unwrap();
        assert_eq!(c.c0, vec![1]);
        assert_eq!(c.c1, vec![0]);
    }

    #[test]
    fn test_tj_ties_are_redrawn() {
        // Periodicity at lag 1 on a sequence with distinct values can change
        // between shuffles, so a tie in the trial matrix gets resolved.
        let s = nibbles(200, 3);
        let sel = TestSelection::single(TestId::Periodicity);
        // All 10 pairs start tied. Re-drawn pairs with a larger first value
        // count in C0, the others in neither counter.
        let ti = vec![vec![12.0]; 20];
        let mut rng = StdRng::seed_from_u64(5);
        let c = tj_normalized_counters(&s, &ti, &sel, 1, DEFAULT_TIE_RETRY_LIMIT, &mut rng).unwrap();
        assert_eq!(c.c1, vec![0]);
        assert!(c.c0[0] > 0 && c.c0[0] < 10, "C0 = {}", c.c0[0]);
    }

    #[test]
    fn test_tj_exhausted_retries_count_as_tie() {
        // A constant sequence always yields the same statistic.
        let s = vec![7u8; 50];
        let sel = TestSelection::single(TestId::NDirectionalRuns);
        let ti = vec![vec![1.0]; 4];
        let mut rng = StdRng::seed_from_u64(2);
        let c = tj_normalized_counters(&s, &ti, &sel, 1, 3, &mut rng).unwrap();
        assert_eq!(c.c0, vec![0]);
        assert_eq!(c.c1, vec![2]);
    }

    #[test]
    fn test_tj_row_length_checked() {
        let sel = TestSelection::from_ids(&[0, 1]).unwrap();
        let ti = vec![vec![1.0, 2.0], vec![1.0]];
        let mut rng = StdRng::seed_from_u64(2);
        let err = tj_normalized_counters(&[1, 2, 3], &ti, &sel, 1, 3, &mut rng).unwrap_err();
        assert!(matches!(err, IidError::TrialLengthMismatch { trial: 1, .. }));
    }

    #[test]
    fn test_calibration_report_shape() {
        let s = nibbles(300, 11);
        let p = params(TestSelection::from_ids(&[0, 3, 8, 9]).unwrap());
        let report = run_calibration_with_rng(&s, &p, &mut StdRng::seed_from_u64(4)).unwrap();
        assert_eq!(report.labels, ["excursion", "n_increases_decreases", "periodicity2", "covariance2"]);
        assert_eq!(report.reference.len(), 4);
        assert_eq!(report.iterations.len(), 6);
        assert_eq!(report.distributions.len(), 8);
        for it in &report.iterations {
            assert_eq!(it.tx.counters.len(), 4);
            assert!(it.tx.counters.c0.iter().all(|&c| c <= 20));
            // Tj compares disjoint pairs only.
            for (c0, c1) in it.tj.counters.c0.iter().zip(&it.tj.counters.c1) {
                assert!(c0 + c1 <= 10);
            }
        }
    }

    #[test]
    fn test_calibration_parallel_matches_shape() {
        let s = nibbles(200, 12);
        let mut p = params(TestSelection::single(TestId::Covariance));
        p.execution = Execution::Parallel;
        let report = run_calibration(&s, &p).unwrap();
        assert_eq!(report.iterations.len(), 6);
        assert!(report.iterations.iter().all(|it| it.tj.counters.len() == 1));
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let mut p = params(TestSelection::all());
        p.n_iterations = 0;
        assert!(matches!(
            run_calibration(&nibbles(100, 1), &p),
            Err(IidError::Config(_))
        ));
    }

    #[test]
    fn test_fit_tx_binning() {
        let c0 = vec![10, 12, 12, 15, 20, 31];
        let d = CounterDistribution::fit("excursion", Method::Tx, c0, 40).unwrap();
        assert_eq!(d.trials, 40);
        assert!((d.p - 100.0 / 240.0).abs() < 1e-12);
        // width = ceil((31 - 10 + 2) / 10) = 3, bins cover 10..=30 and 31..=33
        assert_eq!(d.histogram.len(), 8);
        assert_eq!(d.histogram[0].lower, 10);
        assert_eq!(d.histogram[0].upper, 12);
        assert_eq!(d.histogram[0].observed, 3);
        assert_eq!(d.histogram[7].observed, 1);
        assert_eq!(d.histogram.iter().map(|b| b.observed).sum::<u64>(), 6);
        assert!((d.mean - 100.0 / 6.0).abs() < 1e-12);
        assert!(d.reduced_chi_square.is_some());
    }

    #[test]
    fn test_fit_tj_uses_half_trials() {
        let d = CounterDistribution::fit("covariance2", Method::Tj, vec![50, 48, 52, 50], 200).unwrap();
        assert_eq!(d.trials, 100);
        assert_eq!(d.p, 0.5);
        let expected: f64 = d.histogram.iter().map(|b| b.expected).sum();
        assert!(expected > 0.0 && expected <= 4.0);
        assert!((d.std_dev - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_fit_single_value() {
        let d = CounterDistribution::fit("x", Method::Tx, vec![7], 10).unwrap();
        assert_eq!(d.histogram.len(), 1);
        assert_eq!(d.std_dev, 0.0);
    }

    #[test]
    fn test_fit_empty_rejected() {
        assert!(matches!(
            CounterDistribution::fit("x", Method::Tj, vec![], 10),
            Err(IidError::Fit(_))
        ));
    }
}
