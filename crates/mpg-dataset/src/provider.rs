use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use mpg_schemas::FeatureMatrix;

use crate::{Dataset, DatasetError};

/// Source of the benchmark regression dataset.
///
/// Implementations must return the same rows in the same order on every
/// call; the split's determinism depends on it.
pub trait DatasetProvider {
    /// Human-readable source name for logs and reports.
    fn name(&self) -> String;

    fn fetch(&self) -> Result<Dataset, DatasetError>;
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Headered CSV: every column except `target_column` is a feature, in header
/// order. All cells must parse as finite `f64`.
#[derive(Debug, Clone)]
pub struct CsvDatasetProvider {
    path: PathBuf,
    target_column: String,
}

impl CsvDatasetProvider {
    pub fn new(path: impl Into<PathBuf>, target_column: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            target_column: target_column.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatasetProvider for CsvDatasetProvider {
    fn name(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    fn fetch(&self) -> Result<Dataset, DatasetError> {
        let file = File::open(&self.path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                DatasetError::NotFound {
                    location: self.path.clone(),
                }
            } else {
                self.parse_err(0, format!("open failed: {e}"))
            }
        })?;

        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

        let headers = rdr
            .headers()
            .map_err(|e| self.parse_err(1, e.to_string()))?
            .clone();
        let target_idx = headers
            .iter()
            .position(|h| h == self.target_column)
            .ok_or_else(|| DatasetError::MissingColumn {
                column: self.target_column.clone(),
            })?;
        let feature_names: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != target_idx)
            .map(|(_, h)| h.to_string())
            .collect();
        let width = headers.len();

        let mut cells: Vec<f64> = Vec::new();
        let mut targets: Vec<f64> = Vec::new();

        for rec in rdr.records() {
            let rec = rec.map_err(|e| {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                self.parse_err(line, e.to_string())
            })?;
            let line = rec.position().map(|p| p.line()).unwrap_or(0);
            if rec.len() != width {
                return Err(self.parse_err(
                    line,
                    format!("expected {width} fields, found {}", rec.len()),
                ));
            }
            for (i, field) in rec.iter().enumerate() {
                let v: f64 = field
                    .parse()
                    .map_err(|_| self.parse_err(line, format!("non-numeric value '{field}'")))?;
                if !v.is_finite() {
                    return Err(self.parse_err(line, format!("non-finite value '{field}'")));
                }
                if i == target_idx {
                    targets.push(v);
                } else {
                    cells.push(v);
                }
            }
        }

        if targets.is_empty() {
            return Err(DatasetError::Empty);
        }

        let features = FeatureMatrix::new(targets.len(), feature_names.len(), cells)?;
        Dataset::new(feature_names, features, targets)
    }
}

impl CsvDatasetProvider {
    fn parse_err(&self, line: u64, reason: String) -> DatasetError {
        DatasetError::Parse {
            location: self.path.clone(),
            line,
            reason,
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Serves a dataset already held in memory.
#[derive(Debug, Clone)]
pub struct StaticDatasetProvider {
    name: String,
    dataset: Dataset,
}

impl StaticDatasetProvider {
    pub fn new(name: impl Into<String>, dataset: Dataset) -> Self {
        Self {
            name: name.into(),
            dataset,
        }
    }
}

impl DatasetProvider for StaticDatasetProvider {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn fetch(&self) -> Result<Dataset, DatasetError> {
        if self.dataset.is_empty() {
            return Err(DatasetError::Empty);
        }
        Ok(self.dataset.clone())
    }
}
