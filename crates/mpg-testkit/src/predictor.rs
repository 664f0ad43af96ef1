use mpg_artifacts::{PredictError, Predictor};
use mpg_schemas::FeatureMatrix;

/// How a [`ScriptedPredictor`] responds to `predict`.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedBehavior {
    /// One copy of the value per row.
    Constant(f64),
    /// One value too few.
    ShortVector,
    /// A NaN in the first slot.
    NaN,
    /// Always errors.
    Error,
}

/// In-memory predictor with scripted, possibly broken, behavior.
#[derive(Debug, Clone)]
pub struct ScriptedPredictor {
    pub model_id: String,
    pub feature_names: Vec<String>,
    pub behavior: ScriptedBehavior,
}

impl ScriptedPredictor {
    pub fn new(model_id: &str, behavior: ScriptedBehavior) -> Self {
        Self {
            model_id: model_id.to_string(),
            feature_names: crate::feature_names(),
            behavior,
        }
    }
}

impl Predictor for ScriptedPredictor {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, PredictError> {
        let n = features.rows();
        match self.behavior {
            ScriptedBehavior::Constant(v) => Ok(vec![v; n]),
            ScriptedBehavior::ShortVector => Ok(vec![0.0; n.saturating_sub(1)]),
            ScriptedBehavior::NaN => {
                let mut out = vec![0.0; n];
                if let Some(first) = out.first_mut() {
                    *first = f64::NAN;
                }
                Ok(out)
            }
            ScriptedBehavior::Error => Err(PredictError::FeatureCount {
                expected: 13,
                found: features.cols(),
            }),
        }
    }
}
