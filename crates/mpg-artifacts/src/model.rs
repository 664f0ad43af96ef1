use std::fmt;

use mpg_schemas::FeatureMatrix;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Prediction contract
// ---------------------------------------------------------------------------

/// Errors a model may raise on well-formed input.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictError {
    /// Input width does not match the model's feature count.
    FeatureCount { expected: usize, found: usize },
    /// The model produced NaN or infinity for `row`.
    NonFinite { row: usize },
}

impl fmt::Display for PredictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictError::FeatureCount { expected, found } => {
                write!(f, "expected {expected} features per row, got {found}")
            }
            PredictError::NonFinite { row } => write!(f, "non-finite prediction at row {row}"),
        }
    }
}

impl std::error::Error for PredictError {}

/// A loaded regression model.
///
/// `predict` returns exactly one value per input row. Implementations are
/// read-only once constructed.
pub trait Predictor: Send + Sync {
    /// Stable identifier of the trained model (from the artifact document).
    fn model_id(&self) -> &str;

    /// Input columns in the order `predict` consumes them.
    fn feature_names(&self) -> &[String];

    fn n_features(&self) -> usize {
        self.feature_names().len()
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, PredictError>;
}

// ---------------------------------------------------------------------------
// Model kinds
// ---------------------------------------------------------------------------

/// Per-feature standardization applied before the linear term:
/// `x' = (x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Serialized model parameters, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Linear {
        coefficients: Vec<f64>,
        intercept: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scaler: Option<StandardScaler>,
    },
    /// Dummy regressor: the same value for every row.
    Constant { value: f64 },
}

impl ModelSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelSpec::Linear { .. } => "linear",
            ModelSpec::Constant { .. } => "constant",
        }
    }
}

pub(crate) struct LinearModel {
    pub(crate) model_id: String,
    pub(crate) feature_names: Vec<String>,
    pub(crate) coefficients: Vec<f64>,
    pub(crate) intercept: f64,
    pub(crate) scaler: Option<StandardScaler>,
}

impl Predictor for LinearModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, PredictError> {
        check_width(self.n_features(), features)?;
        let mut out = Vec::with_capacity(features.rows());
        for (i, row) in features.iter_rows().enumerate() {
            let mut y = self.intercept;
            for (j, &x) in row.iter().enumerate() {
                let x = match &self.scaler {
                    Some(s) => (x - s.mean[j]) / s.scale[j],
                    None => x,
                };
                y += self.coefficients[j] * x;
            }
            if !y.is_finite() {
                return Err(PredictError::NonFinite { row: i });
            }
            out.push(y);
        }
        Ok(out)
    }
}

pub(crate) struct ConstantModel {
    pub(crate) model_id: String,
    pub(crate) feature_names: Vec<String>,
    pub(crate) value: f64,
}

impl Predictor for ConstantModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, PredictError> {
        check_width(self.n_features(), features)?;
        Ok(vec![self.value; features.rows()])
    }
}

fn check_width(expected: usize, features: &FeatureMatrix) -> Result<(), PredictError> {
    // A 0-row matrix built from no rows reports 0 columns; nothing to check.
    if features.is_empty() {
        return Ok(());
    }
    if features.cols() != expected {
        return Err(PredictError::FeatureCount {
            expected,
            found: features.cols(),
        });
    }
    Ok(())
}
