use std::fmt;
use std::path::Path;

use chrono::Utc;
use mpg_artifacts::{load_artifact, ArtifactError, Predictor};
use mpg_dataset::{train_test_split, DatasetProvider, Partition};
use mpg_schemas::{BaselineOnCorrupt, FeatureMatrix, FeatureRow, FEATURE_NAMES};
use uuid::Uuid;

use crate::reporter::{GateEvent, GateReporter};
use crate::types::{
    GateConfig, GateError, GateOutcome, GateReport, ModelEvaluation, ModelRole, SplitSummary,
};

// ============================================================================
// Loading seam
// ============================================================================

/// Resolves a storage location to a model.
pub trait ArtifactLoader {
    fn load(&self, location: &Path) -> Result<Box<dyn Predictor>, ArtifactError>;
}

/// Reads artifact documents from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArtifactLoader;

impl ArtifactLoader for FsArtifactLoader {
    fn load(&self, location: &Path) -> Result<Box<dyn Predictor>, ArtifactError> {
        Ok(Box::new(load_artifact(location)?))
    }
}

/// Everything one gate run needs.
pub struct GateInput<'a> {
    pub run_id: Uuid,
    pub config: &'a GateConfig,
    pub loader: &'a dyn ArtifactLoader,
    pub dataset: &'a dyn DatasetProvider,
}

// ============================================================================
// Public API
// ============================================================================

/// Run the promotion gate.
///
/// Order: load candidate (fatal), load baseline (missing → skip), split the
/// dataset, evaluate candidate (fatal), evaluate baseline (fatal), decide.
/// Both models see the identical test partition.
pub fn run_gate(
    input: &GateInput<'_>,
    reporter: &mut dyn GateReporter,
) -> Result<GateReport, GateError> {
    let config = input.config;

    // 1. Candidate: absence or corruption aborts before any metric is computed.
    let candidate = input
        .loader
        .load(&config.candidate)
        .map_err(|e| GateError::from_artifact(ModelRole::Candidate, e))?;
    reporter.report(&GateEvent::ArtifactLoaded {
        role: ModelRole::Candidate,
        model_id: candidate.model_id().to_string(),
        location: config.candidate.clone(),
    });

    // 2. Baseline: optional.
    let mut reasons: Vec<String> = Vec::new();
    let baseline = match load_baseline(input, reporter)? {
        BaselineState::Loaded(model, location) => Some((model, location)),
        BaselineState::Unavailable(reason) => {
            reporter.report(&GateEvent::BaselineUnavailable {
                reason: reason.clone(),
            });
            reasons.push(reason);
            None
        }
    };

    // 3. Fresh deterministic split.
    let source = input.dataset.name();
    let dataset = input
        .dataset
        .fetch()
        .map_err(|e| GateError::from_dataset(source.clone(), e))?;
    let split = train_test_split(&dataset, config.split)
        .map_err(|e| GateError::from_dataset(source.clone(), e))?;
    let fingerprint = split.fingerprint();
    reporter.report(&GateEvent::DatasetSplit {
        source: source.clone(),
        train_rows: split.train.len(),
        test_rows: split.test.len(),
        fingerprint: fingerprint.clone(),
    });

    // 4. Evaluate on the shared test partition.
    let columns = dataset.feature_names();
    let candidate_mse = evaluate_model(
        ModelRole::Candidate,
        candidate.as_ref(),
        columns,
        &split.test,
    )?;
    reporter.report(&GateEvent::ModelEvaluated {
        role: ModelRole::Candidate,
        model_id: candidate.model_id().to_string(),
        mse: candidate_mse,
    });

    let baseline_eval = match &baseline {
        Some((model, location)) => {
            let mse = evaluate_model(ModelRole::Baseline, model.as_ref(), columns, &split.test)?;
            reporter.report(&GateEvent::ModelEvaluated {
                role: ModelRole::Baseline,
                model_id: model.model_id().to_string(),
                mse,
            });
            Some(ModelEvaluation {
                role: ModelRole::Baseline,
                model_id: model.model_id().to_string(),
                location: location.clone(),
                mse,
            })
        }
        None => None,
    };

    // 5. Decide.
    let baseline_mse = baseline_eval.as_ref().map(|b| b.mse);
    let outcome = decide(candidate_mse, baseline_mse);
    if let (GateOutcome::Fail, Some(b)) = (outcome, baseline_mse) {
        reasons.push(format!(
            "New model MSE ({candidate_mse}) is not less than previous model MSE ({b})."
        ));
    }
    reporter.report(&GateEvent::Decided {
        outcome,
        candidate_mse,
        baseline_mse,
    });

    Ok(GateReport {
        run_id: input.run_id,
        created_at_utc: Utc::now(),
        outcome,
        candidate: ModelEvaluation {
            role: ModelRole::Candidate,
            model_id: candidate.model_id().to_string(),
            location: config.candidate.clone(),
            mse: candidate_mse,
        },
        baseline: baseline_eval,
        dataset_source: source,
        split: SplitSummary {
            test_ratio: split.params.test_ratio,
            seed: split.params.seed,
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            fingerprint,
        },
        reasons,
    })
}

/// Decision rule: PASS iff `candidate < baseline` (strict). No baseline →
/// SKIPPED_NO_BASELINE. Equal or worse → FAIL.
pub fn decide(candidate_mse: f64, baseline_mse: Option<f64>) -> GateOutcome {
    match baseline_mse {
        None => GateOutcome::SkippedNoBaseline,
        Some(b) if candidate_mse < b => GateOutcome::Pass,
        Some(_) => GateOutcome::Fail,
    }
}

/// Predict the partition's features and score against its targets.
///
/// `columns` names the partition's feature columns in order; the model must
/// consume exactly that order.
pub fn evaluate_model(
    role: ModelRole,
    model: &dyn Predictor,
    columns: &[String],
    test: &Partition,
) -> Result<f64, GateError> {
    let failure = |reason: String| GateError::PredictionFailure {
        role,
        model_id: model.model_id().to_string(),
        reason,
    };

    check_columns(model.feature_names(), columns).map_err(failure)?;
    let predictions = model
        .predict(&test.features)
        .map_err(|e| failure(e.to_string()))?;
    check_predictions(&predictions, test.len()).map_err(failure)?;
    mean_squared_error(&test.targets, &predictions).map_err(|e| failure(e.to_string()))
}

/// Predict a single fixed-schema row and return its value.
pub fn predict_one(model: &dyn Predictor, row: &FeatureRow) -> Result<f64, GateError> {
    let failure = |reason: String| GateError::PredictionFailure {
        role: ModelRole::Candidate,
        model_id: model.model_id().to_string(),
        reason,
    };
    check_columns(model.feature_names(), &FEATURE_NAMES).map_err(failure)?;
    let x = FeatureMatrix::from_feature_rows(std::slice::from_ref(row));
    let predictions = model.predict(&x).map_err(|e| failure(e.to_string()))?;
    check_predictions(&predictions, 1).map_err(failure)?;
    Ok(predictions[0])
}

// ============================================================================
// Metric
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricError {
    LengthMismatch { truth: usize, predicted: usize },
    Empty,
}

impl fmt::Display for MetricError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricError::LengthMismatch { truth, predicted } => write!(
                f,
                "{predicted} predictions for {truth} targets"
            ),
            MetricError::Empty => write!(f, "cannot score an empty target vector"),
        }
    }
}

impl std::error::Error for MetricError {}

/// Mean of squared residuals.
pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> Result<f64, MetricError> {
    if y_true.len() != y_pred.len() {
        return Err(MetricError::LengthMismatch {
            truth: y_true.len(),
            predicted: y_pred.len(),
        });
    }
    if y_true.is_empty() {
        return Err(MetricError::Empty);
    }
    let sum: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    Ok(sum / y_true.len() as f64)
}

// ============================================================================
// Helpers
// ============================================================================

enum BaselineState {
    Loaded(Box<dyn Predictor>, std::path::PathBuf),
    Unavailable(String),
}

fn load_baseline(
    input: &GateInput<'_>,
    reporter: &mut dyn GateReporter,
) -> Result<BaselineState, GateError> {
    let Some(location) = input.config.baseline.as_ref() else {
        return Ok(BaselineState::Unavailable(
            "no baseline configured; performance comparison skipped".to_string(),
        ));
    };

    match input.loader.load(location) {
        Ok(model) => {
            reporter.report(&GateEvent::ArtifactLoaded {
                role: ModelRole::Baseline,
                model_id: model.model_id().to_string(),
                location: location.clone(),
            });
            Ok(BaselineState::Loaded(model, location.clone()))
        }
        Err(ArtifactError::NotFound { location }) => Ok(BaselineState::Unavailable(format!(
            "previous model not found at {}; performance comparison skipped",
            location.display()
        ))),
        Err(e @ ArtifactError::Corrupt { .. }) => match input.config.baseline_on_corrupt {
            BaselineOnCorrupt::Skip => Ok(BaselineState::Unavailable(format!(
                "previous model unloadable ({e}); performance comparison skipped"
            ))),
            BaselineOnCorrupt::Fail => Err(GateError::from_artifact(ModelRole::Baseline, e)),
        },
    }
}

/// Model and input must agree on every column name and position.
fn check_columns<S: AsRef<str>>(expected: &[String], provided: &[S]) -> Result<(), String> {
    if expected.len() != provided.len() {
        return Err(format!(
            "model expects {} feature columns, input has {}",
            expected.len(),
            provided.len()
        ));
    }
    let mismatch = expected
        .iter()
        .zip(provided)
        .position(|(want, got)| want.as_str() != got.as_ref());
    match mismatch {
        Some(i) => Err(format!(
            "feature order mismatch at column {i}: model expects '{}', input has '{}'",
            expected[i],
            provided[i].as_ref()
        )),
        None => Ok(()),
    }
}

/// One finite value per row.
fn check_predictions(predictions: &[f64], rows: usize) -> Result<(), String> {
    if predictions.len() != rows {
        return Err(format!(
            "returned {} predictions for {} input rows",
            predictions.len(),
            rows
        ));
    }
    if let Some(i) = predictions.iter().position(|p| !p.is_finite()) {
        return Err(format!("non-finite prediction at row {i}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mse_of_known_residuals() {
        let mse = mean_squared_error(&[1.0, 2.0, 3.0, 4.0], &[1.0, 3.0, 1.0, 4.0]).unwrap();
        // (0 + 1 + 4 + 0) / 4
        assert_eq!(mse, 1.25);
    }

    #[test]
    fn mse_rejects_empty_and_mismatched() {
        assert_eq!(mean_squared_error(&[], &[]), Err(MetricError::Empty));
        assert_eq!(
            mean_squared_error(&[1.0], &[1.0, 2.0]),
            Err(MetricError::LengthMismatch {
                truth: 1,
                predicted: 2
            })
        );
    }

    #[test]
    fn decision_is_strictly_less_than() {
        assert_eq!(decide(0.40, Some(0.55)), GateOutcome::Pass);
        assert_eq!(decide(0.60, Some(0.55)), GateOutcome::Fail);
        assert_eq!(decide(0.55, Some(0.55)), GateOutcome::Fail);
        assert_eq!(decide(0.10, None), GateOutcome::SkippedNoBaseline);
        assert_eq!(decide(f64::NAN, Some(0.55)), GateOutcome::Fail);
    }

    #[test]
    fn prediction_shape_checks() {
        assert!(check_predictions(&[1.0, 2.0], 2).is_ok());
        assert!(check_predictions(&[1.0], 2)
            .unwrap_err()
            .contains("1 predictions for 2 input rows"));
        assert!(check_predictions(&[1.0, f64::INFINITY], 2)
            .unwrap_err()
            .contains("row 1"));
    }

    #[test]
    fn column_check_names_first_mismatch() {
        let model: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert!(check_columns(&model, &["a", "b", "c"]).is_ok());

        let err = check_columns(&model, &["a", "c", "b"]).unwrap_err();
        assert!(err.contains("column 1"), "{err}");
        assert!(err.contains("'b'") && err.contains("'c'"), "{err}");

        let err = check_columns(&model, &["a", "b"]).unwrap_err();
        assert!(err.contains("expects 3 feature columns, input has 2"), "{err}");
    }
}
