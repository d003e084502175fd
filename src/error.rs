use std::path::PathBuf;

use thiserror::Error;

/// Per-image failure of the detection model. Never fatal for a run.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("cannot read image {path:?}: {reason}")]
    Input { path: PathBuf, reason: String },
    #[error("inference failed for {path:?}: {reason}")]
    Inference { path: PathBuf, reason: String },
}

impl DetectError {
    pub fn input(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Input {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn inference(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Inference {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Error)]
#[error("failed to load model {model:?}: {reason}")]
pub struct ModelLoadError {
    pub model: PathBuf,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum RelocationError {
    #[error("no run directory found under {root:?}")]
    NoRunDirectory { root: PathBuf },
    #[error("annotated image {image} not found in {run_dir:?}")]
    NotFound { image: String, run_dir: PathBuf },
    #[error("failed to move {from:?} to {to:?}: {source}")]
    Io {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A detection that breaks the box or confidence invariants.
#[derive(Debug, Error, PartialEq)]
pub enum InvalidDetection {
    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),
    #[error("box ({xmin}, {ymin}, {xmax}, {ymax}) has min > max")]
    InvertedBox { xmin: f64, ymin: f64, xmax: f64, ymax: f64 },
    #[error("box coordinates must be finite")]
    NonFinite,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot connect to database {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("persistence failed: {0}")]
    Persistence(#[from] sqlx::Error),
    #[error("invalid detection: {0}")]
    Invalid(#[from] InvalidDetection),
    #[error("invalid table name {0:?}")]
    InvalidTableName(String),
    #[error("corrupt row {id}: {reason}")]
    CorruptRow { id: i64, reason: String },
    #[error("cannot format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

#[derive(Debug, Error)]
pub enum CleaningError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: cannot parse date {value:?}")]
    InvalidDate { row: usize, value: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
