//! Run configuration: TOML file, command-line overrides and validation.
//!
//! The file has three sections, every key optional:
//!
//! ```toml
//! [global]
//! input_file = "noise.bin"
//! nist_test = true
//! stat_analysis = true
//! min_entropy = true
//! parallel = true
//! debug = false
//! symbol_width = 4
//!
//! [nist_test]
//! selected_tests = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10]
//! n_symbols = 1000000
//! n_permutations = 10000
//! first_seq = true
//! p = [1, 2, 8, 16, 32]
//!
//! [statistical_analysis]
//! selected_tests = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10]
//! n_symbols = 1000
//! n_permutations = 200
//! n_iterations = 500
//! p = 2
//! tie_retry_limit = 10000
//! ```
//!
//! Command-line values override file values; the merged result is validated
//! once into an immutable [`Config`] handed to every analysis phase.

use std::fs::File;
use std::path::{Path, PathBuf};

use iidperm_tests::{TestId, TestSelection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::calibration::{CalibrationParams, DEFAULT_TIE_RETRY_LIMIT};
use crate::campaign::Execution;
use crate::error::{IidError, Result};
use crate::symbols::{ReadPosition, SymbolWidth};

/// Configuration file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "conf.toml";

fn all_test_ids() -> Vec<usize> {
    TestId::ALL.iter().map(|t| t.id()).collect()
}

// ---------------------------------------------------------------------------
// File layer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub global: GlobalSection,
    pub nist_test: NistSection,
    pub statistical_analysis: StatSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalSection {
    pub input_file: Option<PathBuf>,
    pub nist_test: bool,
    pub stat_analysis: bool,
    pub min_entropy: bool,
    pub parallel: bool,
    pub debug: bool,
    pub symbol_width: SymbolWidth,
}

impl Default for GlobalSection {
    fn default() -> Self {
        Self {
            input_file: None,
            nist_test: true,
            stat_analysis: true,
            min_entropy: true,
            parallel: true,
            debug: false,
            symbol_width: SymbolWidth::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NistSection {
    pub selected_tests: Vec<usize>,
    pub n_symbols: usize,
    pub n_permutations: usize,
    pub first_seq: bool,
    pub p: Vec<usize>,
}

impl Default for NistSection {
    fn default() -> Self {
        Self {
            selected_tests: all_test_ids(),
            n_symbols: 1_000_000,
            n_permutations: 10_000,
            first_seq: true,
            p: vec![1, 2, 8, 16, 32],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatSection {
    pub selected_tests: Vec<usize>,
    pub n_symbols: usize,
    pub n_permutations: usize,
    pub n_iterations: usize,
    pub p: usize,
    pub tie_retry_limit: usize,
}

impl Default for StatSection {
    fn default() -> Self {
        Self {
            selected_tests: all_test_ids(),
            n_symbols: 1000,
            n_permutations: 200,
            n_iterations: 500,
            p: 2,
            tie_retry_limit: DEFAULT_TIE_RETRY_LIMIT,
        }
    }
}

impl ConfigFile {
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|source| IidError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| IidError::io(path, e))?;
        Self::parse(&text, path)
    }
}

/// Values given on the command line; `None` keeps the file value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub input_file: Option<PathBuf>,
    pub nist_test: Option<bool>,
    pub stat_analysis: Option<bool>,
    pub min_entropy: Option<bool>,
    pub parallel: Option<bool>,
    pub debug: Option<bool>,
    pub symbol_width: Option<SymbolWidth>,
    pub nist_selected_tests: Option<Vec<usize>>,
    pub nist_n_symbols: Option<usize>,
    pub nist_n_permutations: Option<usize>,
    pub first_seq: Option<bool>,
    pub nist_p: Option<Vec<usize>>,
    pub stat_selected_tests: Option<Vec<usize>>,
    pub stat_n_symbols: Option<usize>,
    pub stat_n_permutations: Option<usize>,
    pub stat_n_iterations: Option<usize>,
    pub stat_p: Option<usize>,
    pub tie_retry_limit: Option<usize>,
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

impl Overrides {
    fn apply(self, file: &mut ConfigFile) {
        let g = &mut file.global;
        if self.input_file.is_some() {
            g.input_file = self.input_file;
        }
        set(&mut g.nist_test, self.nist_test);
        set(&mut g.stat_analysis, self.stat_analysis);
        set(&mut g.min_entropy, self.min_entropy);
        set(&mut g.parallel, self.parallel);
        set(&mut g.debug, self.debug);
        set(&mut g.symbol_width, self.symbol_width);

        let n = &mut file.nist_test;
        set(&mut n.selected_tests, self.nist_selected_tests);
        set(&mut n.n_symbols, self.nist_n_symbols);
        set(&mut n.n_permutations, self.nist_n_permutations);
        set(&mut n.first_seq, self.first_seq);
        set(&mut n.p, self.nist_p);

        let s = &mut file.statistical_analysis;
        set(&mut s.selected_tests, self.stat_selected_tests);
        set(&mut s.n_symbols, self.stat_n_symbols);
        set(&mut s.n_permutations, self.stat_n_permutations);
        set(&mut s.n_iterations, self.stat_n_iterations);
        set(&mut s.p, self.stat_p);
        set(&mut s.tie_retry_limit, self.tie_retry_limit);
    }
}

// ---------------------------------------------------------------------------
// Validated configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NistConfig {
    pub selection: TestSelection,
    pub n_symbols: usize,
    pub n_permutations: usize,
    pub position: ReadPosition,
    pub lags: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct StatConfig {
    pub selection: TestSelection,
    pub n_symbols: usize,
    pub n_permutations: usize,
    pub n_iterations: usize,
    pub lag: usize,
    pub tie_retry_limit: usize,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub input_file: PathBuf,
    /// Lowercase hex SHA-256 of the input file.
    pub input_file_digest: String,
    /// Configuration file actually read, if any.
    pub config_file: Option<PathBuf>,
    pub nist_test: bool,
    pub stat_analysis: bool,
    pub min_entropy: bool,
    pub parallel: bool,
    pub debug: bool,
    pub symbol_width: SymbolWidth,
    pub nist: NistConfig,
    pub stat: StatConfig,
}

impl Config {
    /// Read `path` (or `conf.toml` in the working directory if it exists),
    /// apply `overrides` and validate.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        let config_file = match path {
            Some(p) => Some(p.to_path_buf()),
            None if default_path.is_file() => Some(default_path.to_path_buf()),
            None => None,
        };
        let mut file = match &config_file {
            Some(p) => {
                log::debug!("reading configuration from {}", p.display());
                ConfigFile::read(p)?
            }
            None => ConfigFile::default(),
        };
        overrides.apply(&mut file);
        Self::from_file(file, config_file)
    }

    /// Validate merged values.
    pub fn from_file(file: ConfigFile, config_file: Option<PathBuf>) -> Result<Self> {
        let ConfigFile {
            global,
            nist_test: nist,
            statistical_analysis: stat,
        } = file;

        let input_file = global
            .input_file
            .ok_or_else(|| invalid("input_file", "missing"))?;
        if !has_data_extension(&input_file) {
            return Err(invalid(
                "input_file",
                format!("{} must have a .bin or .dat extension", input_file.display()),
            ));
        }
        if !input_file.is_file() {
            return Err(invalid(
                "input_file",
                format!("{} does not exist", input_file.display()),
            ));
        }

        let width = global.symbol_width;
        let nist = NistConfig {
            selection: selection("nist_selected_tests", &nist.selected_tests)?,
            n_symbols: symbol_count("nist_n_symbols", nist.n_symbols, width)?,
            n_permutations: positive("nist_n_permutations", nist.n_permutations)?,
            position: if nist.first_seq {
                ReadPosition::First
            } else {
                ReadPosition::Last
            },
            lags: nist.p,
        };
        if nist.lags.is_empty() {
            return Err(invalid("nist_p", "at least one lag is required"));
        }
        for &p in &nist.lags {
            check_lag("nist_p", p, nist.n_symbols)?;
        }

        let stat = StatConfig {
            selection: selection("stat_selected_tests", &stat.selected_tests)?,
            n_symbols: symbol_count("stat_n_symbols", stat.n_symbols, width)?,
            n_permutations: positive("stat_n_permutations", stat.n_permutations)?,
            n_iterations: positive("n_iterations", stat.n_iterations)?,
            lag: stat.p,
            tie_retry_limit: stat.tie_retry_limit,
        };
        check_lag("stat_p", stat.lag, stat.n_symbols)?;

        let input_file_digest = file_digest(&input_file)?;
        Ok(Self {
            input_file,
            input_file_digest,
            config_file,
            nist_test: global.nist_test,
            stat_analysis: global.stat_analysis,
            min_entropy: global.min_entropy,
            parallel: global.parallel,
            debug: global.debug,
            symbol_width: width,
            nist,
            stat,
        })
    }

    pub fn execution(&self) -> Execution {
        Execution::from_flag(self.parallel)
    }

    pub fn calibration_params(&self) -> CalibrationParams {
        CalibrationParams {
            selection: self.stat.selection.clone(),
            lag: self.stat.lag,
            n_permutations: self.stat.n_permutations,
            n_iterations: self.stat.n_iterations,
            execution: self.execution(),
            tie_retry_limit: self.stat.tie_retry_limit,
        }
    }

    /// Effective configuration as pretty JSON; disabled phases are omitted.
    pub fn to_json(&self) -> Result<String> {
        let view = ConfigJson {
            input_file: &self.input_file,
            input_file_digest: &self.input_file_digest,
            config_file: self.config_file.as_deref(),
            nist_test: self.nist_test,
            statistical_analysis: self.stat_analysis,
            min_entropy: self.min_entropy,
            parallel: self.parallel,
            symbol_width: self.symbol_width,
            nist: self.nist_test.then(|| NistJson {
                selected_tests: self.nist.selection.ids(),
                n_symbols: self.nist.n_symbols,
                n_permutations: self.nist.n_permutations,
                first_seq: self.nist.position == ReadPosition::First,
                p: &self.nist.lags,
            }),
            stat: self.stat_analysis.then(|| StatJson {
                selected_tests: self.stat.selection.ids(),
                n_symbols: self.stat.n_symbols,
                n_permutations: self.stat.n_permutations,
                n_iterations: self.stat.n_iterations,
                p: self.stat.lag,
                tie_retry_limit: self.stat.tie_retry_limit,
            }),
        };
        Ok(serde_json::to_string_pretty(&view)?)
    }
}

#[derive(Serialize)]
struct ConfigJson<'a> {
    input_file: &'a Path,
    input_file_digest: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<&'a Path>,
    nist_test: bool,
    statistical_analysis: bool,
    min_entropy: bool,
    parallel: bool,
    symbol_width: SymbolWidth,
    #[serde(skip_serializing_if = "Option::is_none")]
    nist: Option<NistJson<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stat: Option<StatJson>,
}

#[derive(Serialize)]
struct NistJson<'a> {
    selected_tests: Vec<usize>,
    n_symbols: usize,
    n_permutations: usize,
    first_seq: bool,
    p: &'a [usize],
}

#[derive(Serialize)]
struct StatJson {
    selected_tests: Vec<usize>,
    n_symbols: usize,
    n_permutations: usize,
    n_iterations: usize,
    p: usize,
    tie_retry_limit: usize,
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn invalid(param: &str, reason: impl std::fmt::Display) -> IidError {
    IidError::Config(format!("\"{param}\": {reason}"))
}

fn has_data_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("bin") || e.eq_ignore_ascii_case("dat"))
}

fn selection(param: &str, ids: &[usize]) -> Result<TestSelection> {
    TestSelection::from_ids(ids).map_err(|e| invalid(param, e))
}

fn positive(param: &str, value: usize) -> Result<usize> {
    if value == 0 {
        return Err(invalid(param, "must be at least 1"));
    }
    Ok(value)
}

fn symbol_count(param: &str, n: usize, width: SymbolWidth) -> Result<usize> {
    let alphabet = width.alphabet_size();
    if n < alphabet {
        return Err(invalid(
            param,
            format!("{n} is smaller than the alphabet size {alphabet}"),
        ));
    }
    Ok(n)
}

fn check_lag(param: &str, p: usize, n_symbols: usize) -> Result<()> {
    if p == 0 || p >= n_symbols {
        return Err(invalid(
            param,
            format!("{p} out of range (0 < p < {n_symbols})"),
        ));
    }
    Ok(())
}

/// SHA-256 of a file, lowercase hex.
pub fn file_digest(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| IidError::io(path, e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| IidError::io(path, e))?;
    Ok(format!("{:x}", hasher.finalize()))
}
