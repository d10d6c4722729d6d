//! CLI for iidperm: permutation-based IID validation of noise sources.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "iidperm")]
#[command(about = "iidperm: NIST SP 800-90B permutation testing of noise sources")]
#[command(version = iidperm_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the enabled analyses (IID validation, calibration, min-entropy) on a binary file.
    /// Values from the configuration file are overridden by the flags given here.
    Run {
        /// TOML configuration file (defaults to ./conf.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Input file (.bin or .dat)
        #[arg(short, long)]
        input_file: Option<PathBuf>,

        /// Run the IID validation
        #[arg(long, conflicts_with = "no_nist_test")]
        nist_test: bool,
        /// Skip the IID validation
        #[arg(long)]
        no_nist_test: bool,

        /// Run the counter calibration analysis
        #[arg(long, conflicts_with = "no_stat_analysis")]
        stat_analysis: bool,
        /// Skip the counter calibration analysis
        #[arg(long)]
        no_stat_analysis: bool,

        /// Estimate the min-entropy of the whole file
        #[arg(long, conflicts_with = "no_min_entropy")]
        min_entropy: bool,
        /// Skip the min-entropy estimate
        #[arg(long)]
        no_min_entropy: bool,

        /// Spread permutations over all processors
        #[arg(long, conflicts_with = "no_parallel")]
        parallel: bool,
        /// Run permutations on a single thread
        #[arg(long)]
        no_parallel: bool,

        /// Debug logging
        #[arg(short, long)]
        debug: bool,

        /// Bits per symbol: 1, 2, 4 or 8
        #[arg(long)]
        symbol_width: Option<u8>,

        /// Test ids for the IID validation (0-10), comma-separated
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        nist_selected_tests: Option<Vec<usize>>,

        /// Symbols read for the IID validation
        #[arg(long)]
        nist_n_symbols: Option<usize>,

        /// Permutations for the IID validation
        #[arg(long)]
        nist_n_permutations: Option<usize>,

        /// Read the sequence from the start of the file
        #[arg(long, conflicts_with = "last_seq")]
        first_seq: bool,
        /// Read the sequence from the end of the file
        #[arg(long)]
        last_seq: bool,

        /// Lags for periodicity and covariance, comma-separated
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        nist_p: Option<Vec<usize>>,

        /// Test ids for the calibration analysis (0-10), comma-separated
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        stat_selected_tests: Option<Vec<usize>>,

        /// Symbols read for the calibration analysis
        #[arg(long)]
        stat_n_symbols: Option<usize>,

        /// Permutations per calibration iteration
        #[arg(long)]
        stat_n_permutations: Option<usize>,

        /// Calibration iterations
        #[arg(long)]
        stat_n_iterations: Option<usize>,

        /// Lag for periodicity and covariance in the calibration analysis
        #[arg(long)]
        stat_p: Option<usize>,

        /// Re-draws allowed per tied pair in the Tj-normalized counters
        #[arg(long)]
        tie_retry_limit: Option<usize>,

        /// Directory that receives the per-run results directory
        #[arg(long, default_value = iidperm_core::DEFAULT_OUTPUT_DIR)]
        output: PathBuf,
    },

    /// List the permutation test statistics and their ids
    Tests {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Run {
            config,
            input_file,
            nist_test,
            no_nist_test,
            stat_analysis,
            no_stat_analysis,
            min_entropy,
            no_min_entropy,
            parallel,
            no_parallel,
            debug,
            symbol_width,
            nist_selected_tests,
            nist_n_symbols,
            nist_n_permutations,
            first_seq,
            last_seq,
            nist_p,
            stat_selected_tests,
            stat_n_symbols,
            stat_n_permutations,
            stat_n_iterations,
            stat_p,
            tie_retry_limit,
            output,
        } => commands::run::run(commands::run::RunCommandConfig {
            config_path: config.as_deref(),
            output_dir: &output,
            debug,
            symbol_width,
            overrides: iidperm_core::Overrides {
                input_file,
                nist_test: commands::flag_pair(nist_test, no_nist_test),
                stat_analysis: commands::flag_pair(stat_analysis, no_stat_analysis),
                min_entropy: commands::flag_pair(min_entropy, no_min_entropy),
                parallel: commands::flag_pair(parallel, no_parallel),
                first_seq: commands::flag_pair(first_seq, last_seq),
                nist_selected_tests,
                nist_n_symbols,
                nist_n_permutations,
                nist_p,
                stat_selected_tests,
                stat_n_symbols,
                stat_n_permutations,
                stat_n_iterations,
                stat_p,
                tie_retry_limit,
                ..Default::default()
            },
        }),
        Commands::Tests { json } => commands::catalog::run(json),
    };

    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "iidperm",
            "run",
            "-i",
            "noise.bin",
            "--no-parallel",
            "--last-seq",
            "--nist-selected-tests",
            "0,8,9",
            "--nist-p",
            "1,2",
            "--stat-p",
            "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                input_file,
                no_parallel,
                last_seq,
                nist_selected_tests,
                nist_p,
                stat_p,
                output,
                ..
            } => {
                assert_eq!(input_file, Some(PathBuf::from("noise.bin")));
                assert!(no_parallel);
                assert!(last_seq);
                assert_eq!(nist_selected_tests, Some(vec![0, 8, 9]));
                assert_eq!(nist_p, Some(vec![1, 2]));
                assert_eq!(stat_p, Some(3));
                assert_eq!(output, PathBuf::from("iid_results"));
            }
            Commands::Tests { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_conflicting_flags_rejected() {
        assert!(Cli::try_parse_from(["iidperm", "run", "--parallel", "--no-parallel"]).is_err());
        assert!(Cli::try_parse_from(["iidperm", "run", "--first-seq", "--last-seq"]).is_err());
    }

    #[test]
    fn test_parse_tests_command() {
        let cli = Cli::try_parse_from(["iidperm", "tests", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Tests { json: true }));
    }
}
