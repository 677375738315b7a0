use std::{error::Error, fmt, io, path::PathBuf};

use machine_learning::MlErr;

/// The harness' result type.
pub type Result<T> = std::result::Result<T, HarnessErr>;

/// Failures of a training run or a sweep.
#[derive(Debug)]
pub enum HarnessErr {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Json(serde_json::Error),
    Model(MlErr),
    InvalidConfig(String),
    MalformedDataset {
        path: PathBuf,
        msg: String,
    },
    ClassOutOfRange {
        class: usize,
        classes: usize,
    },
    InvalidPercentage(f64),
    DegenerateDistances {
        points: usize,
    },
    BatchMismatch {
        rows: usize,
        labels: usize,
    },
    MetricsMismatch {
        got: usize,
        expected: usize,
    },
}

impl HarnessErr {
    /// Wraps an io error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for HarnessErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "io error on {}: {source}", path.display()),
            Self::Json(e) => write!(f, "json error: {e}"),
            Self::Model(e) => write!(f, "model error: {e}"),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::MalformedDataset { path, msg } => {
                write!(f, "malformed dataset file {}: {msg}", path.display())
            }
            Self::ClassOutOfRange { class, classes } => {
                write!(f, "class {class} is out of range for {classes} classes")
            }
            Self::InvalidPercentage(p) => write!(f, "invalid removal percentage {p}"),
            Self::DegenerateDistances { points } => write!(
                f,
                "cannot compute pairwise similarity thresholds over {points} point(s)"
            ),
            Self::BatchMismatch { rows, labels } => {
                write!(f, "batch has {rows} rows but {labels} labels")
            }
            Self::MetricsMismatch { got, expected } => {
                write!(f, "got scores for {got} classes, expected {expected}")
            }
        }
    }
}

impl Error for HarnessErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(e) => Some(e),
            Self::Model(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for HarnessErr {
    fn from(value: MlErr) -> Self {
        Self::Model(value)
    }
}

impl From<serde_json::Error> for HarnessErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
