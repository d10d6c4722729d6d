//! NIST SP 800-90B IID permutation test statistics.
//!
//! Provides the eleven test statistics of SP 800-90B section 5.1 and the trial
//! runner that evaluates a selection of them on one symbol sequence. Every
//! statistic is returned as an `f64` so that result vectors from different
//! tests can be compared position by position by the permutation counters.
//!
//! The numeric semantics follow the NIST reference implementation exactly:
//! the counters compare statistics with `>` and `==`, so any rounding
//! difference here would change an IID verdict.

use bzip2::Compression;
use bzip2::write::BzEncoder;
use std::collections::BTreeSet;
use std::fmt;
use std::io::Write;

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

/// bzip2 block size used by the compression statistic. Fixed so that results
/// stay comparable with the reference suite.
pub const COMPRESSION_LEVEL: u32 = 5;

/// Error raised by a statistic or by test selection.
#[derive(Debug, thiserror::Error)]
pub enum StatError {
    #[error("{test}: input sequence is empty")]
    EmptySequence { test: TestId },

    #[error("{test}: sequence too short (need {needed} symbols, got {got})")]
    SequenceTooShort {
        test: TestId,
        needed: usize,
        got: usize,
    },

    #[error("{test}: no repeated symbol in sequence of {len} symbols")]
    NoCollision { test: TestId, len: usize },

    #[error("{test}: lag {lag} out of range (0 < lag < {len})")]
    LagOutOfRange { test: TestId, lag: usize, len: usize },

    #[error("unknown test id {0} (valid ids are 0-10)")]
    UnknownTest(usize),

    #[error("test selection is empty")]
    EmptySelection,

    #[error("compression: bzip2 encoder failed: {0}")]
    Compression(#[from] std::io::Error),
}

/// One of the eleven SP 800-90B permutation test statistics.
///
/// The discriminant is the test id used by configuration files and by the
/// fixed evaluation order of result vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TestId {
    Excursion = 0,
    NDirectionalRuns = 1,
    LDirectionalRuns = 2,
    NIncreasesDecreases = 3,
    NMedianRuns = 4,
    LMedianRuns = 5,
    AvgCollision = 6,
    MaxCollision = 7,
    Periodicity = 8,
    Covariance = 9,
    Compression = 10,
}

impl TestId {
    /// All tests in evaluation order.
    pub const ALL: [TestId; 11] = [
        TestId::Excursion,
        TestId::NDirectionalRuns,
        TestId::LDirectionalRuns,
        TestId::NIncreasesDecreases,
        TestId::NMedianRuns,
        TestId::LMedianRuns,
        TestId::AvgCollision,
        TestId::MaxCollision,
        TestId::Periodicity,
        TestId::Covariance,
        TestId::Compression,
    ];

    pub fn from_id(id: usize) -> Option<TestId> {
        Self::ALL.get(id).copied()
    }

    pub fn id(self) -> usize {
        self as usize
    }

    /// Short name, used for labels and file names.
    pub fn name(self) -> &'static str {
        match self {
            Self::Excursion => "excursion",
            Self::NDirectionalRuns => "n_directional_runs",
            Self::LDirectionalRuns => "l_directional_runs",
            Self::NIncreasesDecreases => "n_increases_decreases",
            Self::NMedianRuns => "n_median_runs",
            Self::LMedianRuns => "l_median_runs",
            Self::AvgCollision => "avg_collision",
            Self::MaxCollision => "max_collision",
            Self::Periodicity => "periodicity",
            Self::Covariance => "covariance",
            Self::Compression => "compression",
        }
    }

    /// Name with the SP 800-90B section number.
    pub fn pretty_name(self) -> &'static str {
        match self {
            Self::Excursion => "5.1.1 Excursion Test Statistic",
            Self::NDirectionalRuns => "5.1.2 Number of Directional Runs",
            Self::LDirectionalRuns => "5.1.3 Length of Directional Runs",
            Self::NIncreasesDecreases => "5.1.4 Number of Increases and Decreases",
            Self::NMedianRuns => "5.1.5 Number of Runs Based on the Median",
            Self::LMedianRuns => "5.1.6 Length of Runs Based on Median",
            Self::AvgCollision => "5.1.7 Average Collision Test Statistic",
            Self::MaxCollision => "5.1.8 Maximum Collision Test Statistic",
            Self::Periodicity => "5.1.9 Periodicity Test Statistic",
            Self::Covariance => "5.1.10 Covariance Test Statistic",
            Self::Compression => "5.1.11 Compression Test Statistic",
        }
    }

    /// Periodicity and covariance are evaluated once per lag parameter.
    pub fn uses_lag(self) -> bool {
        matches!(self, Self::Periodicity | Self::Covariance)
    }

    /// Whether the statistic only takes integer values.
    pub fn is_integer(self) -> bool {
        !matches!(self, Self::Excursion | Self::AvgCollision)
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated, sorted, duplicate-free, non-empty set of tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSelection {
    tests: Vec<TestId>,
}

impl TestSelection {
    /// Every test.
    pub fn all() -> Self {
        Self {
            tests: TestId::ALL.to_vec(),
        }
    }

    pub fn single(test: TestId) -> Self {
        Self { tests: vec![test] }
    }

    /// Build a selection from configuration ids, in any order and with
    /// possible duplicates.
    pub fn from_ids(ids: &[usize]) -> Result<Self, StatError> {
        if ids.is_empty() {
            return Err(StatError::EmptySelection);
        }
        let mut set = BTreeSet::new();
        for &id in ids {
            let test = TestId::from_id(id).ok_or(StatError::UnknownTest(id))?;
            set.insert(test);
        }
        Ok(Self {
            tests: set.into_iter().collect(),
        })
    }

    pub fn tests(&self) -> &[TestId] {
        &self.tests
    }

    pub fn ids(&self) -> Vec<usize> {
        self.tests.iter().map(|t| t.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Length of the result vector produced with `n_lags` lag parameters.
    pub fn result_len(&self, n_lags: usize) -> usize {
        self.tests
            .iter()
            .map(|t| if t.uses_lag() { n_lags } else { 1 })
            .sum()
    }

    /// One label per result vector position (`periodicity8`, `covariance16`, ...).
    pub fn labels(&self, lags: &[usize]) -> Vec<String> {
        let mut labels = Vec::with_capacity(self.result_len(lags.len()));
        for &test in &self.tests {
            if test.uses_lag() {
                labels.extend(lags.iter().map(|p| format!("{}{p}", test.name())));
            } else {
                labels.push(test.name().to_string());
            }
        }
        labels
    }

    /// Integer-valued flag per result vector position.
    pub fn integer_flags(&self, lags: &[usize]) -> Vec<bool> {
        let mut flags = Vec::with_capacity(self.result_len(lags.len()));
        for &test in &self.tests {
            let n = if test.uses_lag() { lags.len() } else { 1 };
            flags.extend(std::iter::repeat_n(test.is_integer(), n));
        }
        flags
    }
}

impl Default for TestSelection {
    fn default() -> Self {
        Self::all()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Derived sequences
// ═══════════════════════════════════════════════════════════════════════════════

/// Directional sign sequence: `-1` where a symbol is greater than its
/// successor, `+1` otherwise. Length is `len - 1`.
pub fn directional_signs(test: TestId, s: &[u8]) -> Result<Vec<i8>, StatError> {
    if s.len() < 2 {
        return Err(StatError::SequenceTooShort {
            test,
            needed: 2,
            got: s.len(),
        });
    }
    Ok(s.windows(2)
        .map(|w| if w[0] > w[1] { -1 } else { 1 })
        .collect())
}

/// Median of the sequence. Even lengths average the two middle values.
pub fn median(test: TestId, s: &[u8]) -> Result<f64, StatError> {
    if s.is_empty() {
        return Err(StatError::EmptySequence { test });
    }
    let mut hist = [0usize; 256];
    for &v in s {
        hist[v as usize] += 1;
    }
    let n = s.len();
    let kth = |k: usize| -> u8 {
        let mut seen = 0usize;
        for (value, &count) in hist.iter().enumerate() {
            seen += count;
            if seen > k {
                return value as u8;
            }
        }
        u8::MAX
    };
    if n % 2 == 1 {
        Ok(kth(n / 2) as f64)
    } else {
        Ok((kth(n / 2 - 1) as f64 + kth(n / 2) as f64) / 2.0)
    }
}

/// Median sign sequence: `-1` below the median, `+1` otherwise (ties count
/// as `+1`). Same length as the input.
pub fn median_signs(test: TestId, s: &[u8]) -> Result<Vec<i8>, StatError> {
    let m = median(test, s)?;
    Ok(s.iter()
        .map(|&v| if (v as f64) < m { -1 } else { 1 })
        .collect())
}

/// Lengths of the collision segments: the number of symbols read since the
/// previous repeat up to and including the next symbol already seen.
pub fn collision_segments(s: &[u8]) -> Vec<usize> {
    let mut seen = [false; 256];
    let mut segments = Vec::new();
    let mut last_split = 0usize;
    for (i, &v) in s.iter().enumerate() {
        let pos = i + 1;
        if seen[v as usize] {
            segments.push(pos - last_split);
            last_split = pos;
            seen = [false; 256];
        } else {
            seen[v as usize] = true;
        }
    }
    segments
}

/// Number of maximal runs of equal values. Assumes a non-empty input.
fn count_runs(signs: &[i8]) -> usize {
    1 + signs.windows(2).filter(|w| w[0] != w[1]).count()
}

/// Length of the longest maximal run of equal values.
fn longest_run(signs: &[i8]) -> usize {
    let mut longest = 0usize;
    let mut current = 1usize;
    for w in signs.windows(2) {
        if w[0] == w[1] {
            current += 1;
        } else {
            longest = longest.max(current);
            current = 1;
        }
    }
    longest.max(current)
}

fn increases_decreases(signs: &[i8]) -> usize {
    let ups = signs.iter().filter(|&&v| v == 1).count();
    ups.max(signs.len() - ups)
}

fn collision_mean(test: TestId, segments: &[usize], len: usize) -> Result<f64, StatError> {
    if segments.is_empty() {
        return Err(StatError::NoCollision { test, len });
    }
    let total: usize = segments.iter().sum();
    Ok(total as f64 / segments.len() as f64)
}

fn collision_max(test: TestId, segments: &[usize], len: usize) -> Result<f64, StatError> {
    segments
        .iter()
        .max()
        .map(|&m| m as f64)
        .ok_or(StatError::NoCollision { test, len })
}

fn check_lag(test: TestId, s: &[u8], lag: usize) -> Result<(), StatError> {
    if lag == 0 || lag >= s.len() {
        return Err(StatError::LagOutOfRange {
            test,
            lag,
            len: s.len(),
        });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// 5.1.1 - 5.1.11 Test statistics
// ═══════════════════════════════════════════════════════════════════════════════

/// 5.1.1: maximum distance of the running sum from its expected value `i * mean`.
pub fn excursion(s: &[u8]) -> Result<f64, StatError> {
    if s.is_empty() {
        return Err(StatError::EmptySequence {
            test: TestId::Excursion,
        });
    }
    let total: u64 = s.iter().map(|&v| v as u64).sum();
    let mean = total as f64 / s.len() as f64;
    let mut cumsum = 0u64;
    let mut max = 0.0f64;
    for (i, &v) in s.iter().enumerate() {
        cumsum += v as u64;
        let d = (cumsum as f64 - (i + 1) as f64 * mean).abs();
        if d > max {
            max = d;
        }
    }
    Ok(max)
}

/// 5.1.2: number of runs in the directional sign sequence.
pub fn n_directional_runs(s: &[u8]) -> Result<f64, StatError> {
    let signs = directional_signs(TestId::NDirectionalRuns, s)?;
    Ok(count_runs(&signs) as f64)
}

/// 5.1.3: longest run in the directional sign sequence.
pub fn l_directional_runs(s: &[u8]) -> Result<f64, StatError> {
    let signs = directional_signs(TestId::LDirectionalRuns, s)?;
    Ok(longest_run(&signs) as f64)
}

/// 5.1.4: the larger of the number of increases and of decreases.
pub fn n_increases_decreases(s: &[u8]) -> Result<f64, StatError> {
    let signs = directional_signs(TestId::NIncreasesDecreases, s)?;
    Ok(increases_decreases(&signs) as f64)
}

/// 5.1.5: number of runs above/below the median.
pub fn n_median_runs(s: &[u8]) -> Result<f64, StatError> {
    let signs = median_signs(TestId::NMedianRuns, s)?;
    Ok(count_runs(&signs) as f64)
}

/// 5.1.6: longest run above/below the median.
pub fn l_median_runs(s: &[u8]) -> Result<f64, StatError> {
    let signs = median_signs(TestId::LMedianRuns, s)?;
    Ok(longest_run(&signs) as f64)
}

/// 5.1.7: mean collision segment length.
pub fn avg_collision(s: &[u8]) -> Result<f64, StatError> {
    collision_mean(TestId::AvgCollision, &collision_segments(s), s.len())
}

/// 5.1.8: maximum collision segment length.
pub fn max_collision(s: &[u8]) -> Result<f64, StatError> {
    collision_max(TestId::MaxCollision, &collision_segments(s), s.len())
}

/// 5.1.9: number of positions `i` with `s[i] == s[i + lag]`.
pub fn periodicity(s: &[u8], lag: usize) -> Result<f64, StatError> {
    check_lag(TestId::Periodicity, s, lag)?;
    let matches = s.iter().zip(&s[lag..]).filter(|(a, b)| a == b).count();
    Ok(matches as f64)
}

/// 5.1.10: sum of the products `s[i] * s[i + lag]`.
pub fn covariance(s: &[u8], lag: usize) -> Result<f64, StatError> {
    check_lag(TestId::Covariance, s, lag)?;
    let sum: u64 = s
        .iter()
        .zip(&s[lag..])
        .map(|(&a, &b)| a as u64 * b as u64)
        .sum();
    Ok(sum as f64)
}

/// 5.1.11: bzip2 length of the sequence written as space-separated decimals.
pub fn compression(s: &[u8]) -> Result<f64, StatError> {
    let mut text = Vec::with_capacity(s.len() * 3);
    for (i, &v) in s.iter().enumerate() {
        if i > 0 {
            text.push(b' ');
        }
        push_decimal(&mut text, v);
    }
    let mut encoder = BzEncoder::new(Vec::new(), Compression::new(COMPRESSION_LEVEL));
    encoder.write_all(&text)?;
    let compressed = encoder.finish()?;
    Ok(compressed.len() as f64)
}

fn push_decimal(buf: &mut Vec<u8>, v: u8) {
    if v >= 100 {
        buf.push(b'0' + v / 100);
    }
    if v >= 10 {
        buf.push(b'0' + (v / 10) % 10);
    }
    buf.push(b'0' + v % 10);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Trial runner
// ═══════════════════════════════════════════════════════════════════════════════

/// Derived arrays of one sequence, computed on first use and shared by every
/// statistic that needs them.
struct Derived<'a> {
    s: &'a [u8],
    directional: Option<Vec<i8>>,
    median: Option<Vec<i8>>,
    collisions: Option<Vec<usize>>,
}

impl<'a> Derived<'a> {
    fn new(s: &'a [u8]) -> Self {
        Self {
            s,
            directional: None,
            median: None,
            collisions: None,
        }
    }

    fn directional(&mut self, test: TestId) -> Result<&[i8], StatError> {
        if self.directional.is_none() {
            self.directional = Some(directional_signs(test, self.s)?);
        }
        Ok(self.directional.as_deref().unwrap_or_default())
    }

    fn median(&mut self, test: TestId) -> Result<&[i8], StatError> {
        if self.median.is_none() {
            self.median = Some(median_signs(test, self.s)?);
        }
        Ok(self.median.as_deref().unwrap_or_default())
    }

    fn collisions(&mut self) -> &[usize] {
        let s = self.s;
        self.collisions.get_or_insert_with(|| collision_segments(s))
    }
}

/// Evaluate the selected tests on one sequence.
///
/// The result has one entry per test, in ascending test id order, except
/// periodicity and covariance which contribute one entry per lag in `lags`.
pub fn run_tests(s: &[u8], lags: &[usize], selection: &TestSelection) -> Result<Vec<f64>, StatError> {
    let mut derived = Derived::new(s);
    let mut out = Vec::with_capacity(selection.result_len(lags.len()));
    for &test in selection.tests() {
        match test {
            TestId::Excursion => out.push(excursion(s)?),
            TestId::NDirectionalRuns => out.push(count_runs(derived.directional(test)?) as f64),
            TestId::LDirectionalRuns => out.push(longest_run(derived.directional(test)?) as f64),
            TestId::NIncreasesDecreases => {
                out.push(increases_decreases(derived.directional(test)?) as f64)
            }
            TestId::NMedianRuns => out.push(count_runs(derived.median(test)?) as f64),
            TestId::LMedianRuns => out.push(longest_run(derived.median(test)?) as f64),
            TestId::AvgCollision => out.push(collision_mean(test, derived.collisions(), s.len())?),
            TestId::MaxCollision => out.push(collision_max(test, derived.collisions(), s.len())?),
            TestId::Periodicity => {
                for &lag in lags {
                    out.push(periodicity(s, lag)?);
                }
            }
            TestId::Covariance => {
                for &lag in lags {
                    out.push(covariance(s, lag)?);
                }
            }
            TestId::Compression => out.push(compression(s)?),
        }
    }
    Ok(out)
}

/// Evaluate a single test, with `lag` used only by periodicity and covariance.
pub fn run_single(s: &[u8], test: TestId, lag: usize) -> Result<f64, StatError> {
    match test {
        TestId::Excursion => excursion(s),
        TestId::NDirectionalRuns => n_directional_runs(s),
        TestId::LDirectionalRuns => l_directional_runs(s),
        TestId::NIncreasesDecreases => n_increases_decreases(s),
        TestId::NMedianRuns => n_median_runs(s),
        TestId::LMedianRuns => l_median_runs(s),
        TestId::AvgCollision => avg_collision(s),
        TestId::MaxCollision => max_collision(s),
        TestId::Periodicity => periodicity(s, lag),
        TestId::Covariance => covariance(s, lag),
        TestId::Compression => compression(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Generate pseudo-random nibbles for testing (simple LCG).
    fn pseudo_random_nibbles(n: usize) -> Vec<u8> {
        lcg_nibbles(n, 0xDEAD_BEEF_CAFE_BABE)
    }

    fn lcg_nibbles(n: usize, seed: u64) -> Vec<u8> {
        let mut data = Vec::with_capacity(n);
        let mut state = seed;
        for _ in 0..n {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            data.push(((state >> 33) & 0x0f) as u8);
        }
        data
    }

    #[test]
    fn test_ids_round_trip() {
        for (i, t) in TestId::ALL.iter().enumerate() {
            assert_eq!(t.id(), i);
            assert_eq!(TestId::from_id(i), Some(*t));
        }
        assert_eq!(TestId::from_id(11), None);
    }

    #[test]
    fn test_selection_sorted_and_deduplicated() {
        let sel = TestSelection::from_ids(&[9, 0, 3, 9, 0]).unwrap();
        assert_eq!(sel.ids(), vec![0, 3, 9]);
    }

    #[test]
    fn test_selection_rejects_unknown_and_empty() {
        assert!(matches!(
            TestSelection::from_ids(&[1, 42]),
            Err(StatError::UnknownTest(42))
        ));
        assert!(matches!(
            TestSelection::from_ids(&[]),
            Err(StatError::EmptySelection)
        ));
    }

    #[test]
    fn test_labels_fan_out_lags() {
        let sel = TestSelection::from_ids(&[10, 8, 0, 9]).unwrap();
        let labels = sel.labels(&[1, 16]);
        assert_eq!(
            labels,
            vec![
                "excursion",
                "periodicity1",
                "periodicity16",
                "covariance1",
                "covariance16",
                "compression"
            ]
        );
        assert_eq!(
            sel.integer_flags(&[1, 16]),
            vec![false, true, true, true, true, true]
        );
    }

    #[test]
    fn test_excursion_basic() {
        // mean = 2, cumsum = 1, 4, 6 -> |1-2|, |4-4|, |6-6|
        assert_eq!(excursion(&[1, 3, 2]).unwrap(), 1.0);
        assert_eq!(excursion(&[5]).unwrap(), 0.0);
        assert!(matches!(
            excursion(&[]),
            Err(StatError::EmptySequence { .. })
        ));
    }

    #[test]
    fn test_directional_signs_rule() {
        let signs = directional_signs(TestId::NDirectionalRuns, &[2, 2, 2, 5, 7, 7, 9, 3, 1, 4, 4])
            .unwrap();
        assert_eq!(signs, vec![1, 1, 1, 1, 1, 1, -1, -1, 1, 1]);
    }

    #[test]
    fn test_n_increases_decreases() {
        let s = [2, 2, 2, 5, 7, 7, 9, 3, 1, 4, 4];
        assert_eq!(n_increases_decreases(&s).unwrap(), 8.0);
    }

    #[test]
    fn test_directional_runs() {
        let s = [2, 2, 2, 5, 7, 7, 9, 3, 1, 4, 4];
        // + + + + + + | - - | + +
        assert_eq!(n_directional_runs(&s).unwrap(), 3.0);
        assert_eq!(l_directional_runs(&s).unwrap(), 6.0);
    }

    #[test]
    fn test_directional_requires_two_symbols() {
        for s in [&[][..], &[7][..]] {
            assert!(matches!(
                n_directional_runs(s),
                Err(StatError::SequenceTooShort { needed: 2, .. })
            ));
        }
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(TestId::NMedianRuns, &[5, 1, 3]).unwrap(), 3.0);
        assert_eq!(median(TestId::NMedianRuns, &[4, 1, 2, 3]).unwrap(), 2.5);
    }

    #[test]
    fn test_median_runs_ties_count_high() {
        // median = 2; signs: - + + - + -> runs 4, longest 2
        let s = [1, 2, 3, 0, 2];
        assert_eq!(n_median_runs(&s).unwrap(), 4.0);
        assert_eq!(l_median_runs(&s).unwrap(), 2.0);
    }

    #[test]
    fn test_collision_trace() {
        // 1 2 3 [1] -> segment of 4; 4 5 2 6 after the reset never repeat
        let s = [1, 2, 3, 1, 4, 5, 2, 6];
        assert_eq!(collision_segments(&s), vec![4]);
        assert_eq!(avg_collision(&s).unwrap(), 4.0);
        assert_eq!(max_collision(&s).unwrap(), 4.0);
    }

    #[test]
    fn test_collision_multiple_segments() {
        // [0 0] [1 2 1] [3 3] -> 2, 3, 2
        let s = [0, 0, 1, 2, 1, 3, 3];
        assert_eq!(collision_segments(&s), vec![2, 3, 2]);
        assert!((avg_collision(&s).unwrap() - 7.0 / 3.0).abs() < 1e-12);
        assert_eq!(max_collision(&s).unwrap(), 3.0);
    }

    #[test]
    fn test_collision_without_repeat_fails() {
        assert!(matches!(
            avg_collision(&[0, 1, 2, 3]),
            Err(StatError::NoCollision { len: 4, .. })
        ));
    }

    #[test]
    fn test_periodicity_and_covariance() {
        let s = [1, 2, 1, 2, 1];
        assert_eq!(periodicity(&s, 2).unwrap(), 3.0);
        assert_eq!(covariance(&s, 2).unwrap(), 6.0);
        assert_eq!(periodicity(&s, 1).unwrap(), 0.0);
        assert_eq!(covariance(&s, 1).unwrap(), 8.0);
    }

    #[test]
    fn test_lag_out_of_range() {
        let s = [1, 2, 3];
        assert!(matches!(
            periodicity(&s, 0),
            Err(StatError::LagOutOfRange { lag: 0, .. })
        ));
        assert!(matches!(
            covariance(&s, 3),
            Err(StatError::LagOutOfRange { lag: 3, len: 3, .. })
        ));
    }

    #[test]
    fn test_push_decimal() {
        let mut buf = Vec::new();
        for v in [0u8, 7, 10, 99, 100, 255] {
            push_decimal(&mut buf, v);
            buf.push(b',');
        }
        assert_eq!(buf, b"0,7,10,99,100,255,");
    }

    #[test]
    fn test_compression_constant_smaller_than_random() {
        let constant = vec![3u8; 2000];
        let random = pseudo_random_nibbles(2000);
        let c = compression(&constant).unwrap();
        let r = compression(&random).unwrap();
        assert!(c > 0.0);
        assert!(c < r, "constant {c} should compress better than random {r}");
    }

    #[test]
    fn test_compression_known_length() {
        let s: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
        assert_eq!(compression(&s).unwrap(), 907.0);
    }

    #[test]
    fn test_run_tests_known_answer() {
        // Reference values for LCG seed 1, 1000 nibbles, all tests.
        let s = lcg_nibbles(1000, 1);
        let tx = run_tests(&s, &[1, 2, 8, 16, 32], &TestSelection::all()).unwrap();
        let expected = [
            92.46799999999985,
            684.0,
            5.0,
            541.0,
            505.0,
            10.0,
            5.5474860335195535,
            11.0,
            67.0,
            78.0,
            63.0,
            64.0,
            67.0,
            54789.0,
            56019.0,
            54025.0,
            54307.0,
            54307.0,
            612.0,
        ];
        assert_eq!(tx, expected);
    }

    #[test]
    fn test_run_tests_result_length() {
        let s = pseudo_random_nibbles(1000);
        let lags = [1, 2, 8, 16, 32];
        let tx = run_tests(&s, &lags, &TestSelection::all()).unwrap();
        // 9 single-valued tests plus periodicity and covariance at 5 lags
        assert_eq!(tx.len(), 9 + 2 * 5);
        assert_eq!(tx.len(), TestSelection::all().result_len(lags.len()));
    }

    #[test]
    fn test_run_tests_matches_individual_statistics() {
        let s = pseudo_random_nibbles(500);
        let lags = [2, 5];
        let tx = run_tests(&s, &lags, &TestSelection::all()).unwrap();
        let mut expected = Vec::new();
        for test in TestId::ALL {
            if test.uses_lag() {
                for &lag in &lags {
                    expected.push(run_single(&s, test, lag).unwrap());
                }
            } else {
                expected.push(run_single(&s, test, 0).unwrap());
            }
        }
        assert_eq!(tx, expected);
    }

    #[test]
    fn test_run_tests_subset_order() {
        let s = [1, 2, 1, 2, 1];
        let sel = TestSelection::from_ids(&[9, 8]).unwrap();
        assert_eq!(run_tests(&s, &[2], &sel).unwrap(), vec![3.0, 6.0]);
    }

    #[test]
    fn test_run_tests_propagates_failure() {
        let sel = TestSelection::single(TestId::MaxCollision);
        assert!(run_tests(&[0, 1, 2], &[1], &sel).is_err());
    }
}
