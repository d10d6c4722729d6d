//! # iidperm-core
//!
//! Permutation-based IID validation of noise sources, after NIST SP 800-90B
//! section 5.1.
//!
//! ## Quick Start
//!
//! ```no_run
//! use iidperm_core::{Execution, validate_sequence};
//! use iidperm_tests::TestSelection;
//!
//! let seq: Vec<u8> = std::fs::read("noise.bin").unwrap().iter().map(|b| b & 0x0f).collect();
//! let report = validate_sequence(&seq, &TestSelection::all(), &[1, 2, 8, 16, 32], 10_000, Execution::Parallel).unwrap();
//! println!("IID: {} (rejected by {:?})", report.iid, report.rejected);
//! ```
//!
//! ## Architecture
//!
//! Symbol reader → reference statistics (Tx) → permutation campaign (Ti) →
//! C0/C1 counters → IID verdict
//!
//! Three analyses share that pipeline:
//! - **IID validation** ([`run_iid_validation`]): one campaign on the
//!   configured sequence, judged by the 0.05% tail rule.
//! - **Calibration** ([`run_calibration`]): many campaigns on one sequence,
//!   counted with the Tx and Tj-normalized conventions and compared with the
//!   expected binomial laws.
//! - **Min-entropy** ([`file_min_entropy`]): most-common-value estimate over
//!   the whole input file.
//!
//! The statistics themselves live in the `iidperm-tests` crate.

pub mod calibration;
pub mod campaign;
pub mod config;
pub mod counters;
pub mod error;
pub mod iid;
pub mod min_entropy;
pub mod results;
pub mod shuffle;
pub mod symbols;

pub use calibration::{
    CalibrationParams, CalibrationReport, CounterDistribution, DEFAULT_TIE_RETRY_LIMIT,
    HistogramBin, IterationRecord, Method, MethodOutcome, run_calibration,
    run_calibration_with_rng, tj_normalized_counters,
};
pub use campaign::{Execution, TrialMatrix, run_permutations, run_permutations_with_rng};
pub use config::{Config, ConfigFile, DEFAULT_CONFIG_FILE, NistConfig, Overrides, StatConfig};
pub use counters::{CounterAccumulator, Counters, calculate_counters, iid_result};
pub use error::{IidError, Result};
pub use iid::{IidReport, run_iid_validation, validate_sequence};
pub use min_entropy::{MinEntropyReport, file_min_entropy, min_entropy};
pub use results::{DEFAULT_OUTPUT_DIR, ResultsDir};
pub use shuffle::{fisher_yates, shuffled_copy};
pub use symbols::{
    ReadPosition, SymbolCounts, SymbolWidth, count_symbol_occurrences, read_sequence,
    symbols_from_bytes,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
