//! Most-common-value min-entropy of a symbol file.

use std::path::Path;

use serde::Serialize;

use crate::error::{IidError, Result};
use crate::symbols::{SymbolCounts, SymbolWidth, count_symbol_occurrences};

/// z-value of the 99% upper confidence bound on `p_max`.
const Z_99: f64 = 2.576;

#[derive(Debug, Clone, Serialize)]
pub struct MinEntropyReport {
    pub n_symbols: u64,
    pub occurrences: Vec<u64>,
    pub frequencies: Vec<f64>,
    pub p_max: f64,
    /// `-log2(p_max)`, bits per symbol.
    pub h_min: f64,
    /// Binomial standard error of `h_min`.
    pub h_min_sigma: f64,
    /// NIST estimate from the upper bound of `p_max`.
    pub h_min_nist: f64,
}

/// Min-entropy from symbol counts; `None` with fewer than two symbols.
pub fn min_entropy(counts: &SymbolCounts) -> Option<MinEntropyReport> {
    if counts.total < 2 {
        return None;
    }
    let n = counts.total as f64;
    let frequencies: Vec<f64> = counts.counts.iter().map(|&c| c as f64 / n).collect();
    let p_max = frequencies.iter().copied().fold(0.0, f64::max);

    let h_min = -p_max.log2();
    let h_min_sigma = (p_max * (1.0 - p_max) / n).sqrt() / (p_max * std::f64::consts::LN_2);
    let p_upper = (p_max + Z_99 * (p_max * (1.0 - p_max) / (n - 1.0)).sqrt()).min(1.0);
    let h_min_nist = -p_upper.log2();

    Some(MinEntropyReport {
        n_symbols: counts.total,
        occurrences: counts.counts.clone(),
        frequencies,
        p_max,
        h_min,
        h_min_sigma,
        h_min_nist,
    })
}

/// Min-entropy of a whole file.
pub fn file_min_entropy(path: &Path, width: SymbolWidth) -> Result<MinEntropyReport> {
    let counts = count_symbol_occurrences(path, width)?;
    let report = min_entropy(&counts).ok_or_else(|| IidError::InsufficientData {
        path: path.to_path_buf(),
        needed: width.bytes_for(2) as u64,
        available: width.bytes_for(counts.total as usize) as u64,
    })?;
    log::info!(
        "min-entropy {:.4} +- {:.4} bits/symbol, NIST min-entropy {:.4}",
        report.h_min,
        report.h_min_sigma,
        report.h_min_nist
    );
    Ok(report)
}
