use std::path::Path;
use std::time::Instant;

use iidperm_core::{
    Config, Method, Overrides, ReadPosition, ResultsDir, SymbolWidth, file_min_entropy,
    read_sequence, run_calibration, run_iid_validation,
};

pub const EXIT_OK: i32 = 0;
pub const EXIT_BAD_CONFIG: i32 = 1;
pub const EXIT_FAILED_ANALYSIS: i32 = 2;

pub struct RunCommandConfig<'a> {
    pub config_path: Option<&'a Path>,
    pub output_dir: &'a Path,
    pub debug: bool,
    pub symbol_width: Option<u8>,
    pub overrides: Overrides,
}

pub fn run(cfg: RunCommandConfig<'_>) -> i32 {
    let mut overrides = cfg.overrides;
    if cfg.debug {
        overrides.debug = Some(true);
    }
    let config = match load_config(cfg.config_path, overrides, cfg.symbol_width) {
        Ok(config) => config,
        Err(e) => {
            super::init_logging(cfg.debug);
            log::error!("{e}");
            return EXIT_BAD_CONFIG;
        }
    };
    super::init_logging(config.debug);
    log::debug!("configuration: {config:?}");
    log::info!(
        "input {} (sha256 {})",
        config.input_file.display(),
        config.input_file_digest
    );

    let out = match ResultsDir::create(cfg.output_dir, &config.input_file) {
        Ok(out) => out,
        Err(e) => {
            log::error!("{e}");
            return EXIT_FAILED_ANALYSIS;
        }
    };
    if let Err(e) = out.write_configuration(&config) {
        log::error!("{e}");
        return EXIT_FAILED_ANALYSIS;
    }

    let mut failed = false;
    if config.nist_test {
        failed |= report_failure("IID validation", iid_validation(&config, &out));
    }
    if config.stat_analysis {
        failed |= report_failure("statistical analysis", statistical_analysis(&config, &out));
    }
    if config.min_entropy {
        failed |= report_failure("min-entropy", min_entropy(&config, &out));
    }

    println!("\nResults saved to: {}", out.path().display());
    if failed { EXIT_FAILED_ANALYSIS } else { EXIT_OK }
}

fn load_config(
    path: Option<&Path>,
    mut overrides: Overrides,
    symbol_width: Option<u8>,
) -> iidperm_core::Result<Config> {
    if let Some(bits) = symbol_width {
        let width = SymbolWidth::try_from(bits).map_err(iidperm_core::IidError::Config)?;
        overrides.symbol_width = Some(width);
    }
    Config::load(path, overrides)
}

fn report_failure(phase: &str, outcome: iidperm_core::Result<()>) -> bool {
    match outcome {
        Ok(()) => false,
        Err(e) => {
            log::error!("{phase} failed: {e}");
            true
        }
    }
}

fn iid_validation(config: &Config, out: &ResultsDir) -> iidperm_core::Result<()> {
    log::info!(
        "IID validation: {} symbols, {} permutations, tests {:?}, p = {:?}",
        config.nist.n_symbols,
        config.nist.n_permutations,
        config.nist.selection.ids(),
        config.nist.lags
    );
    let report = run_iid_validation(config)?;
    out.write_iid_report(&report)?;

    println!("\nIID validation ({:.1}s)", report.elapsed_secs);
    println!("{:<24} {:>14} {:>8} {:>8}", "Statistic", "Tx", "C0", "C1");
    println!("{}", "-".repeat(57));
    for (u, label) in report.labels.iter().enumerate() {
        let mark = if report.rejected.contains(label) { "  ✗" } else { "" };
        println!(
            "{:<24} {:>14.4} {:>8} {:>8}{mark}",
            label, report.tx[u], report.counters.c0[u], report.counters.c1[u]
        );
    }
    println!(
        "IID assumption: {}",
        if report.iid { "validated" } else { "rejected" }
    );
    Ok(())
}

fn statistical_analysis(config: &Config, out: &ResultsDir) -> iidperm_core::Result<()> {
    let stat = &config.stat;
    log::info!(
        "statistical analysis: {} symbols, {} permutations x {} iterations, tests {:?}, p = {}",
        stat.n_symbols,
        stat.n_permutations,
        stat.n_iterations,
        stat.selection.ids(),
        stat.lag
    );
    let t0 = Instant::now();
    let seq = read_sequence(
        &config.input_file,
        stat.n_symbols,
        config.symbol_width,
        ReadPosition::First,
    )?;
    let report = run_calibration(&seq, &config.calibration_params())?;
    out.write_calibration(
        &report,
        stat.n_symbols,
        stat.n_permutations,
        &stat.selection.ids(),
    )?;

    println!(
        "\nStatistical analysis ({:.1}s)",
        t0.elapsed().as_secs_f64()
    );
    println!(
        "{:<24} {:>6} {:>7} {:>9} {:>8} {:>9}",
        "Statistic", "Method", "p", "mean", "std", "chi2/ndf"
    );
    println!("{}", "-".repeat(68));
    for d in &report.distributions {
        let chi = d
            .reduced_chi_square
            .map(|c| format!("{c:.2}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:>6} {:>7.3} {:>9.2} {:>8.2} {:>9}",
            d.label, d.method, d.p, d.mean, d.std_dev, chi
        );
    }
    for method in [Method::Tx, Method::Tj] {
        println!(
            "IID verdicts ({method}): {:.1}%",
            report.pass_rate(method) * 100.0
        );
    }
    Ok(())
}

fn min_entropy(config: &Config, out: &ResultsDir) -> iidperm_core::Result<()> {
    let report = file_min_entropy(&config.input_file, config.symbol_width)?;
    out.write_min_entropy(&config.input_file, &report)?;
    println!(
        "\nMin-entropy: {:.4} ± {:.4} bits/symbol (NIST: {:.4}) over {} symbols",
        report.h_min, report.h_min_sigma, report.h_min_nist, report.n_symbols
    );
    Ok(())
}
