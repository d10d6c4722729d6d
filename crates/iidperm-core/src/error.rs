//! Error type shared by every analysis phase.

use std::path::PathBuf;

use iidperm_tests::StatError;

#[derive(Debug, thiserror::Error)]
pub enum IidError {
    #[error(transparent)]
    Statistic(#[from] StatError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("insufficient data in {path}: need {needed} bytes, file has {available}")]
    InsufficientData {
        path: PathBuf,
        needed: u64,
        available: u64,
    },

    #[error("counter lengths must match: C0 ({c0}), C1 ({c1})")]
    CounterLengthMismatch { c0: usize, c1: usize },

    #[error("trial {trial} has {got} statistics, reference has {expected}")]
    TrialLengthMismatch {
        trial: usize,
        expected: usize,
        got: usize,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("counter distribution fit failed: {0}")]
    Fit(String),

    #[error("permutation worker panicked")]
    WorkerPanicked,
}

impl IidError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, IidError>;
