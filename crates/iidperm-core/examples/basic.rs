//! Basic IID validation example.
//!
//! Generates pseudo-random nibbles, runs a short permutation campaign
//! over every statistic, and prints the counters.
//!
//! Run: `cargo run --example basic`

use iidperm_core::{Execution, SymbolWidth, symbols_from_bytes, validate_sequence};
use iidperm_tests::TestSelection;
use rand::Rng;

fn main() {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..5_000).map(|_| rng.random()).collect();
    let seq = symbols_from_bytes(&bytes, SymbolWidth::Four);
    println!("Symbols: {}", seq.len());

    let lags = [1, 2, 8, 16, 32];
    let report = match validate_sequence(
        &seq,
        &TestSelection::all(),
        &lags,
        1_000,
        Execution::Parallel,
    ) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("validation failed: {e}");
            std::process::exit(1);
        }
    };

    println!("\n{:<24} {:>14} {:>6} {:>6}", "Statistic", "Tx", "C0", "C1");
    for (u, label) in report.labels.iter().enumerate() {
        println!(
            "{:<24} {:>14.4} {:>6} {:>6}",
            label, report.tx[u], report.counters.c0[u], report.counters.c1[u]
        );
    }
    println!(
        "\nIID: {} ({:.2}s)",
        if report.iid { "validated" } else { "rejected" },
        report.elapsed_secs
    );
}
