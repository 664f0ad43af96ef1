use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Feature schema
// ---------------------------------------------------------------------------

/// Number of numeric fields in one benchmark row.
pub const FEATURE_COUNT: usize = 8;

/// Column order of the California housing benchmark. Order-sensitive: models
/// and the hosted endpoint both consume rows positionally.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "MedInc",
    "HouseAge",
    "AveRooms",
    "AveBedrms",
    "Population",
    "AveOccup",
    "Latitude",
    "Longitude",
];

/// Default regression target column of the benchmark CSV.
pub const DEFAULT_TARGET_COLUMN: &str = "MedHouseVal";

/// Smoke-test row used by the single-sample prediction check.
pub const SAMPLE_ROW: [f64; FEATURE_COUNT] = [-119.0, 37.83, 28.0, 583.0, 418.0, 721.0, 583.6, 12.68];

/// One fixed-schema input row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureRow(pub [f64; FEATURE_COUNT]);

impl FeatureRow {
    /// Build from a slice; `None` unless it holds exactly [`FEATURE_COUNT`] values.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        let arr: [f64; FEATURE_COUNT] = values.try_into().ok()?;
        Some(Self(arr))
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Baseline policy
// ---------------------------------------------------------------------------

/// What the promotion gate does when a baseline artifact exists but cannot
/// be loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineOnCorrupt {
    /// Treat it like a missing baseline: the comparison is skipped.
    #[default]
    Skip,
    /// Abort the run with a corrupt-artifact error.
    Fail,
}

impl BaselineOnCorrupt {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaselineOnCorrupt::Skip => "skip",
            BaselineOnCorrupt::Fail => "fail",
        }
    }
}

// ---------------------------------------------------------------------------
// Dense matrix
// ---------------------------------------------------------------------------

/// Error building a [`FeatureMatrix`] from ragged or mis-sized input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// `data.len()` is not `rows * cols`.
    CellCount { rows: usize, cols: usize, cells: usize },
    /// Row `row` has `found` values where `expected` were required.
    RaggedRow { row: usize, expected: usize, found: usize },
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeError::CellCount { rows, cols, cells } => {
                write!(f, "matrix shape {rows}x{cols} does not match {cells} cells")
            }
            ShapeError::RaggedRow {
                row,
                expected,
                found,
            } => write!(f, "row {row} has {found} values, expected {expected}"),
        }
    }
}

impl std::error::Error for ShapeError {}

/// Row-major dense matrix of feature values.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl FeatureMatrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, ShapeError> {
        if rows * cols != data.len() {
            return Err(ShapeError::CellCount {
                rows,
                cols,
                cells: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from nested rows. An empty input yields a 0x0 matrix.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, ShapeError> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, r) in rows.iter().enumerate() {
            if r.len() != cols {
                return Err(ShapeError::RaggedRow {
                    row: i,
                    expected: cols,
                    found: r.len(),
                });
            }
            data.extend_from_slice(r);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    pub fn from_feature_rows(rows: &[FeatureRow]) -> Self {
        let mut data = Vec::with_capacity(rows.len() * FEATURE_COUNT);
        for r in rows {
            data.extend_from_slice(&r.0);
        }
        Self {
            rows: rows.len(),
            cols: FEATURE_COUNT,
            data,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let start = i * self.cols;
        &self.data[start..start + self.cols]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.rows).map(move |i| self.row(i))
    }

    /// Raw row-major cells.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// New matrix holding the given rows, in the given order.
    ///
    /// Panics if an index is out of range; callers pass indices produced from
    /// `0..self.rows()`.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Self {
            rows: indices.len(),
            cols: self.cols,
            data,
        }
    }
}
