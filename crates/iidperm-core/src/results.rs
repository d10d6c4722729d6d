//! Result files of a run.
//!
//! Layout under the output directory:
//!
//! ```text
//! <stem>@<YYYYMMDD_HHMMSS>/
//!   configuration.json
//!   IID_validation/
//!     test_values.json
//!     counter_values.csv
//!   statistical_analysis/
//!     countersTx_distribution/counter_values.csv
//!     countersTj_distribution/counter_values.csv
//!     counters_distribution.json
//!   min_entropy/
//!     min_entropy_values.csv
//! ```
//!
//! Counter files are appended to, one row per campaign, so a directory can
//! collect several runs.

use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::calibration::{CalibrationReport, Method};
use crate::config::Config;
use crate::counters::Counters;
use crate::error::{IidError, Result};
use crate::iid::IidReport;
use crate::min_entropy::MinEntropyReport;

pub const DEFAULT_OUTPUT_DIR: &str = "iid_results";
pub const IID_DIR: &str = "IID_validation";
pub const STAT_DIR: &str = "statistical_analysis";
pub const ENTROPY_DIR: &str = "min_entropy";

const COUNTER_HEADER: &str =
    "n_symbols,n_permutations,test_list,COUNTER_0,COUNTER_1,IID,process_time,date";
const ENTROPY_HEADER: &str =
    "input_file,n_symbols,occurrences,h_min,h_min_sigma,h_min_nist,date";

/// One row of a `counter_values.csv` file.
#[derive(Debug, Clone)]
pub struct CounterRow<'a> {
    pub n_symbols: usize,
    pub n_permutations: usize,
    pub test_ids: &'a [usize],
    pub counters: &'a Counters,
    pub iid: bool,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone)]
pub struct ResultsDir {
    root: PathBuf,
}

impl ResultsDir {
    /// Create `<output>/<stem>@<timestamp>` for `input_file`.
    pub fn create(output: &Path, input_file: &Path) -> Result<Self> {
        Self::create_at(output, input_file, SystemTime::now())
    }

    pub fn create_at(output: &Path, input_file: &Path, now: SystemTime) -> Result<Self> {
        let stem = input_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        let ts = now.duration_since(UNIX_EPOCH).unwrap_or_default();
        let root = output.join(format!("{stem}@{}", format_run_stamp(ts)));
        fs::create_dir_all(&root).map_err(|e| IidError::io(&root, e))?;
        log::debug!("results directory {}", root.display());
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    fn subdir(&self, parts: &[&str]) -> Result<PathBuf> {
        let mut dir = self.root.clone();
        dir.extend(parts);
        fs::create_dir_all(&dir).map_err(|e| IidError::io(&dir, e))?;
        Ok(dir)
    }

    pub fn write_configuration(&self, config: &Config) -> Result<PathBuf> {
        let path = self.root.join("configuration.json");
        write_file(&path, &config.to_json()?)?;
        Ok(path)
    }

    /// Write `test_values.json` and append the campaign row to the IID counter file.
    pub fn write_iid_report(&self, report: &IidReport) -> Result<()> {
        let dir = self.subdir(&[IID_DIR])?;
        write_file(
            &dir.join("test_values.json"),
            &serde_json::to_string_pretty(report)?,
        )?;
        append_counter_row(
            &dir.join("counter_values.csv"),
            &CounterRow {
                n_symbols: report.n_symbols,
                n_permutations: report.n_permutations,
                test_ids: &report.test_ids,
                counters: &report.counters,
                iid: report.iid,
                elapsed_secs: report.elapsed_secs,
            },
        )
    }

    /// Append one row per iteration and method, then write the fitted distributions.
    pub fn write_calibration(
        &self,
        report: &CalibrationReport,
        n_symbols: usize,
        n_permutations: usize,
        test_ids: &[usize],
    ) -> Result<()> {
        for method in [Method::Tx, Method::Tj] {
            let dir = self.subdir(&[STAT_DIR, method.dir_name()])?;
            let path = dir.join("counter_values.csv");
            for it in &report.iterations {
                let outcome = it.outcome(method);
                append_counter_row(
                    &path,
                    &CounterRow {
                        n_symbols,
                        n_permutations,
                        test_ids,
                        counters: &outcome.counters,
                        iid: outcome.iid,
                        elapsed_secs: outcome.elapsed_secs,
                    },
                )?;
            }
        }
        let dir = self.subdir(&[STAT_DIR])?;
        write_file(
            &dir.join("counters_distribution.json"),
            &serde_json::to_string_pretty(&report.distributions)?,
        )
    }

    pub fn write_min_entropy(&self, input_file: &Path, report: &MinEntropyReport) -> Result<()> {
        let dir = self.subdir(&[ENTROPY_DIR])?;
        let path = dir.join("min_entropy_values.csv");
        let mut w = open_append(&path, ENTROPY_HEADER)?;
        writeln!(
            w,
            "{},{},{},{},{},{},{}",
            csv_field(&input_file.display().to_string()),
            report.n_symbols,
            list_field(&report.occurrences),
            report.h_min,
            report.h_min_sigma,
            report.h_min_nist,
            now_iso8601()
        )
        .and_then(|_| w.flush())
        .map_err(|e| IidError::io(&path, e))
    }
}

/// Append one row to a counter file, writing the header if the file is new.
pub fn append_counter_row(path: &Path, row: &CounterRow<'_>) -> Result<()> {
    let mut w = open_append(path, COUNTER_HEADER)?;
    writeln!(
        w,
        "{},{},{},{},{},{},{:.6},{}",
        row.n_symbols,
        row.n_permutations,
        list_field(row.test_ids),
        list_field(&row.counters.c0),
        list_field(&row.counters.c1),
        row.iid,
        row.elapsed_secs,
        now_iso8601()
    )
    .and_then(|_| w.flush())
    .map_err(|e| IidError::io(path, e))
}

fn open_append(path: &Path, header: &str) -> Result<BufWriter<File>> {
    let is_new = !path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| IidError::io(path, e))?;
    let mut w = BufWriter::new(file);
    if is_new {
        writeln!(w, "{header}").map_err(|e| IidError::io(path, e))?;
    }
    Ok(w)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|e| IidError::io(path, e))
}

/// `"[a, b, c]"`, quoted so the commas stay inside one CSV field.
fn list_field<T: Display>(values: &[T]) -> String {
    let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("\"[{}]\"", items.join(", "))
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

// ---------------------------------------------------------------------------
// Timestamps (UTC, no leap seconds)
// ---------------------------------------------------------------------------

fn now_iso8601() -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format_iso8601(ts)
}

/// `2026-02-15T01:30:00Z`
fn format_iso8601(since_epoch: Duration) -> String {
    let t = UtcTime::from_unix(since_epoch.as_secs());
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        t.year, t.month, t.day, t.hour, t.minute, t.second
    )
}

/// `20260215_013000`
fn format_run_stamp(since_epoch: Duration) -> String {
    let t = UtcTime::from_unix(since_epoch.as_secs());
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        t.year, t.month, t.day, t.hour, t.minute, t.second
    )
}

#[derive(Debug, PartialEq, Eq)]
struct UtcTime {
    year: u64,
    month: u64,
    day: u64,
    hour: u64,
    minute: u64,
    second: u64,
}

impl UtcTime {
    /// Proleptic Gregorian calendar, counted in 400-year eras of 146097 days
    /// starting on 0000-03-01.
    fn from_unix(secs: u64) -> Self {
        let tod = secs % 86_400;
        let days = secs / 86_400 + 719_468;
        let era = days / 146_097;
        let doe = days % 146_097;
        let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        // months counted from March
        let mp = (5 * doy + 2) / 153;
        let month = if mp < 10 { mp + 3 } else { mp - 9 };
        Self {
            year: era * 400 + yoe + u64::from(month <= 2),
            month,
            day: doy - (153 * mp + 2) / 5 + 1,
            hour: tod / 3600,
            minute: tod / 60 % 60,
            second: tod % 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utc_from_unix() {
        assert_eq!(format_iso8601(Duration::ZERO), "1970-01-01T00:00:00Z");
        assert_eq!(
            format_iso8601(Duration::from_secs(1_709_210_096)),
            "2024-02-29T12:34:56Z"
        );
        assert_eq!(
            format_iso8601(Duration::from_secs(1_704_067_199)),
            "2023-12-31T23:59:59Z"
        );
        // 2000 is a leap year, 2100 is not
        assert_eq!(
            format_iso8601(Duration::from_secs(951_782_400)),
            "2000-02-29T00:00:00Z"
        );
        assert_eq!(
            format_iso8601(Duration::from_secs(4_107_542_400)),
            "2100-03-01T00:00:00Z"
        );
    }

    #[test]
    fn test_run_directory_name() {
        let tmp = tempfile::tempdir().unwrap();
        let now = UNIX_EPOCH + Duration::from_secs(1_709_210_096);
        let dir = ResultsDir::create_at(tmp.path(), Path::new("/data/noise.bin"), now).unwrap();
        assert_eq!(dir.path(), tmp.path().join("noise@20240229_123456"));
        assert!(dir.path().is_dir());
    }

    #[test]
    fn test_counter_rows_appended_under_one_header() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("counter_values.csv");
        let counters = Counters {
            c0: vec![10, 0],
            c1: vec![1, 2],
        };
        let row = CounterRow {
            n_symbols: 1000,
            n_permutations: 20,
            test_ids: &[0, 8],
            counters: &counters,
            iid: false,
            elapsed_secs: 0.25,
        };
        append_counter_row(&path, &row).unwrap();
        append_counter_row(&path, &row).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], COUNTER_HEADER);
        assert!(lines[1].starts_with("1000,20,\"[0, 8]\",\"[10, 0]\",\"[1, 2]\",false,0.250000,"));
        assert!(lines[1].ends_with('Z'));
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain.bin"), "plain.bin");
        assert_eq!(csv_field("a,b.bin"), "\"a,b.bin\"");
        assert_eq!(csv_field("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_min_entropy_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = ResultsDir::create(tmp.path(), Path::new("noise.bin")).unwrap();
        let report = MinEntropyReport {
            n_symbols: 4,
            occurrences: vec![3, 1],
            frequencies: vec![0.75, 0.25],
            p_max: 0.75,
            h_min: 0.415,
            h_min_sigma: 0.1,
            h_min_nist: 0.2,
        };
        dir.write_min_entropy(Path::new("noise.bin"), &report).unwrap();
        let text = fs::read_to_string(dir.path().join(ENTROPY_DIR).join("min_entropy_values.csv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], ENTROPY_HEADER);
        assert!(lines[1].starts_with("noise.bin,4,\"[3, 1]\",0.415,0.1,0.2,"));
    }
}
