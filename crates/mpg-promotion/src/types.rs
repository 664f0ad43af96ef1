use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use mpg_artifacts::ArtifactError;
use mpg_dataset::{DatasetError, SplitParams};
use mpg_schemas::BaselineOnCorrupt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// What to compare and how to split.
#[derive(Debug, Clone, PartialEq)]
pub struct GateConfig {
    /// Artifact being evaluated for promotion. Required.
    pub candidate: PathBuf,
    /// Previously promoted artifact. `None` skips the comparison.
    pub baseline: Option<PathBuf>,
    pub baseline_on_corrupt: BaselineOnCorrupt,
    pub split: SplitParams,
}

impl GateConfig {
    pub fn new(candidate: impl Into<PathBuf>, baseline: Option<PathBuf>) -> Self {
        Self {
            candidate: candidate.into(),
            baseline,
            baseline_on_corrupt: BaselineOnCorrupt::default(),
            split: SplitParams::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Roles + errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    Candidate,
    Baseline,
}

impl ModelRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelRole::Candidate => "candidate",
            ModelRole::Baseline => "baseline",
        }
    }
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal gate errors. A missing baseline is not one of these; it is the
/// [`GateOutcome::SkippedNoBaseline`] outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum GateError {
    ArtifactNotFound {
        role: ModelRole,
        location: PathBuf,
    },
    ArtifactCorrupt {
        role: ModelRole,
        location: PathBuf,
        reason: String,
    },
    /// The model errored, or returned a wrong-sized or non-finite vector, on
    /// well-formed input.
    PredictionFailure {
        role: ModelRole,
        model_id: String,
        reason: String,
    },
    DatasetUnavailable {
        source: String,
        reason: String,
    },
}

impl GateError {
    pub(crate) fn from_artifact(role: ModelRole, e: ArtifactError) -> Self {
        match e {
            ArtifactError::NotFound { location } => GateError::ArtifactNotFound { role, location },
            ArtifactError::Corrupt { location, reason } => GateError::ArtifactCorrupt {
                role,
                location,
                reason,
            },
        }
    }

    pub(crate) fn from_dataset(source: String, e: DatasetError) -> Self {
        GateError::DatasetUnavailable {
            source,
            reason: e.to_string(),
        }
    }

    /// Stable machine-readable kind, used as the CLI error prefix.
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::ArtifactNotFound { .. } => "ARTIFACT_NOT_FOUND",
            GateError::ArtifactCorrupt { .. } => "ARTIFACT_CORRUPT",
            GateError::PredictionFailure { .. } => "PREDICTION_FAILURE",
            GateError::DatasetUnavailable { .. } => "DATASET_UNAVAILABLE",
        }
    }
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::ArtifactNotFound { role, location } => write!(
                f,
                "{}: {role} model not found at {}",
                self.kind(),
                location.display()
            ),
            GateError::ArtifactCorrupt {
                role,
                location,
                reason,
            } => write!(
                f,
                "{}: failed to load {role} model at {}: {reason}",
                self.kind(),
                location.display()
            ),
            GateError::PredictionFailure {
                role,
                model_id,
                reason,
            } => write!(
                f,
                "{}: {role} model '{model_id}' prediction failed: {reason}",
                self.kind()
            ),
            GateError::DatasetUnavailable { source, reason } => {
                write!(f, "{}: dataset {source}: {reason}", self.kind())
            }
        }
    }
}

impl std::error::Error for GateError {}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateOutcome {
    Pass,
    Fail,
    SkippedNoBaseline,
}

impl GateOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateOutcome::Pass => "PASS",
            GateOutcome::Fail => "FAIL",
            GateOutcome::SkippedNoBaseline => "SKIPPED_NO_BASELINE",
        }
    }
}

impl fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// One model's result on the shared test split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEvaluation {
    pub role: ModelRole,
    pub model_id: String,
    pub location: PathBuf,
    pub mse: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub test_ratio: f64,
    pub seed: u64,
    pub train_rows: usize,
    pub test_rows: usize,
    /// SHA-256 over both partitions; equal across runs with equal inputs.
    pub fingerprint: String,
}

/// Full gate result (serializable to JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    pub run_id: Uuid,
    pub created_at_utc: DateTime<Utc>,
    pub outcome: GateOutcome,
    pub candidate: ModelEvaluation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<ModelEvaluation>,
    pub dataset_source: String,
    pub split: SplitSummary,
    /// Human-readable reasons for FAIL or SKIPPED (empty on PASS).
    pub reasons: Vec<String>,
}

impl GateReport {
    pub fn baseline_mse(&self) -> Option<f64> {
        self.baseline.as_ref().map(|b| b.mse)
    }
}

/// Write the report as pretty-printed JSON to `out_dir/gate_report.json`.
/// Returns the path written.
pub fn write_gate_report_json(out_dir: &Path, report: &GateReport) -> io::Result<PathBuf> {
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join("gate_report.json");
    let json = serde_json::to_string_pretty(report).map_err(io::Error::other)?;
    std::fs::write(&path, format!("{json}\n"))?;
    Ok(path)
}
