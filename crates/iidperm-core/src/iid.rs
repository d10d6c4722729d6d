//! IID validation phase: reference statistics, permutation campaign, counters
//! and verdict for one sequence.

use std::time::Instant;

use iidperm_tests::{TestSelection, run_tests};
use serde::Serialize;

use crate::campaign::{Execution, TrialMatrix, run_permutations};
use crate::config::Config;
use crate::counters::{Counters, calculate_counters};
use crate::error::Result;
use crate::symbols::read_sequence;

#[derive(Debug, Clone, Serialize)]
pub struct IidReport {
    pub n_symbols: usize,
    pub n_permutations: usize,
    pub test_ids: Vec<usize>,
    pub lags: Vec<usize>,
    pub labels: Vec<String>,
    /// Whether each position holds an integer-valued statistic.
    pub integer_valued: Vec<bool>,
    pub tx: Vec<f64>,
    pub ti: TrialMatrix,
    pub counters: Counters,
    pub iid: bool,
    /// Labels of the statistics that fell in a rejection tail.
    pub rejected: Vec<String>,
    /// Wall-clock seconds spent in the permutation campaign.
    pub elapsed_secs: f64,
}

/// Run the permutation test on `seq`.
pub fn validate_sequence(
    seq: &[u8],
    selection: &TestSelection,
    lags: &[usize],
    n_permutations: usize,
    execution: Execution,
) -> Result<IidReport> {
    log::debug!("computing reference statistics on {} symbols", seq.len());
    let tx = run_tests(seq, lags, selection)?;

    log::debug!("computing statistics over {n_permutations} permutations");
    let t0 = Instant::now();
    let ti = run_permutations(seq, n_permutations, selection, lags, execution)?;
    let elapsed_secs = t0.elapsed().as_secs_f64();

    let counters = calculate_counters(&tx, &ti)?;
    log::debug!("C0 = {:?}", counters.c0);
    log::debug!("C1 = {:?}", counters.c1);
    let iid = counters.iid_verdict(n_permutations)?;

    let labels = selection.labels(lags);
    let rejected: Vec<String> = counters
        .rejected_positions(n_permutations)
        .into_iter()
        .map(|u| labels[u].clone())
        .collect();
    if iid {
        log::info!("IID assumption validated");
    } else {
        log::info!("IID assumption rejected by {}", rejected.join(", "));
    }

    Ok(IidReport {
        n_symbols: seq.len(),
        n_permutations,
        test_ids: selection.ids(),
        lags: lags.to_vec(),
        labels,
        integer_valued: selection.integer_flags(lags),
        tx,
        ti,
        counters,
        iid,
        rejected,
        elapsed_secs,
    })
}

/// Read the configured sequence from the input file and validate it.
pub fn run_iid_validation(config: &Config) -> Result<IidReport> {
    let nist = &config.nist;
    let seq = read_sequence(
        &config.input_file,
        nist.n_symbols,
        config.symbol_width,
        nist.position,
    )?;
    validate_sequence(
        &seq,
        &nist.selection,
        &nist.lags,
        nist.n_permutations,
        config.execution(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use iidperm_tests::TestId;

    #[test]
    fn test_report_is_consistent() {
        let seq: Vec<u8> = (0..400u32).map(|i| ((i * 7 + i / 3) % 16) as u8).collect();
        let sel = TestSelection::from_ids(&[0, 4, 8]).unwrap();
        let r = validate_sequence(&seq, &sel, &[1, 3], 40, Execution::Sequential).unwrap();
        assert_eq!(r.labels, ["excursion", "n_median_runs", "periodicity1", "periodicity3"]);
        assert_eq!(r.integer_valued, [false, true, true, true]);
        assert_eq!(r.tx.len(), 4);
        assert_eq!(r.ti.len(), 40);
        assert_eq!(r.counters.len(), 4);
        assert_eq!(r.iid, r.rejected.is_empty());
        assert_eq!(r.iid, r.counters.iid_verdict(40).unwrap());
    }

    #[test]
    fn test_sorted_sequence_rejected() {
        // A sorted sequence has a single increasing run: every shuffle has
        // more directional runs, so C0 + C1 stays at zero.
        let seq: Vec<u8> = (0..256u32).map(|i| (i / 16) as u8).collect();
        let sel = TestSelection::single(TestId::NDirectionalRuns);
        let r = validate_sequence(&seq, &sel, &[1], 100, Execution::Parallel).unwrap();
        assert!(!r.iid);
        assert_eq!(r.rejected, ["n_directional_runs"]);
    }
}
