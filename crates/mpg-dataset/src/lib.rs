//! Benchmark dataset boundary: the provider trait, a CSV-backed provider, and
//! the deterministic train/test split the promotion gate evaluates on.

use std::fmt;
use std::path::PathBuf;

use mpg_schemas::{FeatureMatrix, ShapeError};

mod provider;
mod split;

pub use provider::{CsvDatasetProvider, DatasetProvider, StaticDatasetProvider};
pub use split::{train_test_split, DatasetSplit, Partition, SplitParams};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    /// The source file does not exist.
    NotFound { location: PathBuf },
    /// The source exists but a record could not be read or parsed.
    Parse {
        location: PathBuf,
        line: u64,
        reason: String,
    },
    /// The configured target column is absent from the header.
    MissingColumn { column: String },
    /// Zero data rows.
    Empty,
    /// Features and targets disagree in length, or rows are ragged.
    Shape(String),
    /// The split parameters cannot produce two non-empty partitions.
    InvalidSplit(String),
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetError::NotFound { location } => {
                write!(f, "dataset not found at {}", location.display())
            }
            DatasetError::Parse {
                location,
                line,
                reason,
            } => write!(f, "dataset {} line {line}: {reason}", location.display()),
            DatasetError::MissingColumn { column } => {
                write!(f, "target column '{column}' not in dataset header")
            }
            DatasetError::Empty => write!(f, "dataset has no rows"),
            DatasetError::Shape(msg) => write!(f, "dataset shape error: {msg}"),
            DatasetError::InvalidSplit(msg) => write!(f, "invalid split: {msg}"),
        }
    }
}

impl std::error::Error for DatasetError {}

impl From<ShapeError> for DatasetError {
    fn from(e: ShapeError) -> Self {
        DatasetError::Shape(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Features plus regression targets, one target per feature row.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    feature_names: Vec<String>,
    features: FeatureMatrix,
    targets: Vec<f64>,
}

impl Dataset {
    pub fn new(
        feature_names: Vec<String>,
        features: FeatureMatrix,
        targets: Vec<f64>,
    ) -> Result<Self, DatasetError> {
        if features.rows() != targets.len() {
            return Err(DatasetError::Shape(format!(
                "{} feature rows but {} targets",
                features.rows(),
                targets.len()
            )));
        }
        if !features.is_empty() && features.cols() != feature_names.len() {
            return Err(DatasetError::Shape(format!(
                "{} feature columns but {} names",
                features.cols(),
                feature_names.len()
            )));
        }
        Ok(Self {
            feature_names,
            features,
            targets,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
