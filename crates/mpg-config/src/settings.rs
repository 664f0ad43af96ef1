//! Typed views over the merged config document.
//!
//! Every key has a default except `dataset.path` (gate) and
//! `endpoint.project` / `endpoint.endpoint_id` (remote prediction), which are
//! checked when the view is built. CLI flags are applied on top by the caller.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use mpg_schemas::{BaselineOnCorrupt, DEFAULT_TARGET_COLUMN};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_CANDIDATE_PATH: &str = "models/model.json";
pub const DEFAULT_BASELINE_PATH: &str = "models/model_previous.json";
pub const DEFAULT_TEST_RATIO: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_ENDPOINT_BASE_URL: &str = "https://us-central1-aiplatform.googleapis.com";
pub const DEFAULT_ENDPOINT_LOCATION: &str = "us-central1";
pub const DEFAULT_TOKEN_ENV: &str = "MPG_ENDPOINT_TOKEN";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Raw document shape
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDocument {
    models: RawModels,
    dataset: RawDataset,
    split: SplitSettings,
    report: RawReport,
    endpoint: RawEndpoint,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawModels {
    candidate: PathBuf,
    /// `null` disables the comparison outright.
    baseline: Option<PathBuf>,
    baseline_on_corrupt: BaselineOnCorrupt,
}

impl Default for RawModels {
    fn default() -> Self {
        Self {
            candidate: PathBuf::from(DEFAULT_CANDIDATE_PATH),
            baseline: Some(PathBuf::from(DEFAULT_BASELINE_PATH)),
            baseline_on_corrupt: BaselineOnCorrupt::Skip,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawDataset {
    path: Option<PathBuf>,
    target_column: String,
}

impl Default for RawDataset {
    fn default() -> Self {
        Self {
            path: None,
            target_column: DEFAULT_TARGET_COLUMN.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawReport {
    out_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawEndpoint {
    base_url: String,
    project: Option<String>,
    location: String,
    endpoint_id: Option<String>,
    token_env: String,
    timeout_secs: u64,
}

impl Default for RawEndpoint {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ENDPOINT_BASE_URL.to_string(),
            project: None,
            location: DEFAULT_ENDPOINT_LOCATION.to_string(),
            endpoint_id: None,
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

fn parse_document(config_json: &Value) -> Result<RawDocument> {
    serde_json::from_value(config_json.clone()).context("config does not match the expected shape")
}

// ---------------------------------------------------------------------------
// Gate settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitSettings {
    /// Fraction of rows held out for evaluation, in (0, 1).
    pub test_ratio: f64,
    pub seed: u64,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            test_ratio: DEFAULT_TEST_RATIO,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSettings {
    /// Benchmark CSV. Required by the gate; optional for the load/predict checks.
    pub path: Option<PathBuf>,
    pub target_column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateSettings {
    pub candidate: PathBuf,
    pub baseline: Option<PathBuf>,
    pub baseline_on_corrupt: BaselineOnCorrupt,
    pub dataset: DatasetSettings,
    pub split: SplitSettings,
    pub report_out_dir: Option<PathBuf>,
}

impl GateSettings {
    /// Typed view of the merged document. Range checks are left to
    /// [`GateSettings::validate`] so callers can apply overrides first.
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let doc = parse_document(config_json)?;
        Ok(Self {
            candidate: doc.models.candidate,
            baseline: doc.models.baseline,
            baseline_on_corrupt: doc.models.baseline_on_corrupt,
            dataset: DatasetSettings {
                path: doc.dataset.path,
                target_column: doc.dataset.target_column,
            },
            split: doc.split,
            report_out_dir: doc.report.out_dir,
        })
    }

    /// Checks that hold regardless of which command uses the settings.
    pub fn validate(&self) -> Result<()> {
        let r = self.split.test_ratio;
        if !(r.is_finite() && r > 0.0 && r < 1.0) {
            bail!("CONFIG_INVALID split.test_ratio={} must lie in (0, 1)", r);
        }
        if self.dataset.target_column.trim().is_empty() {
            bail!("CONFIG_INVALID dataset.target_column is empty");
        }
        if self.candidate.as_os_str().is_empty() {
            bail!("CONFIG_INVALID models.candidate is empty");
        }
        Ok(())
    }

    /// The dataset path, or an error naming the key to set.
    pub fn require_dataset_path(&self) -> Result<&PathBuf> {
        self.dataset
            .path
            .as_ref()
            .context("CONFIG_MISSING dataset.path (or pass --dataset)")
    }
}

// ---------------------------------------------------------------------------
// Endpoint settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSettings {
    pub base_url: String,
    pub project: String,
    pub location: String,
    pub endpoint_id: String,
    /// NAME of the env var holding the bearer token. Never the token itself.
    pub token_env: String,
    pub timeout_secs: u64,
}

impl EndpointSettings {
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let raw = parse_document(config_json)?.endpoint;
        let project = non_blank(raw.project).context("CONFIG_MISSING endpoint.project")?;
        let endpoint_id =
            non_blank(raw.endpoint_id).context("CONFIG_MISSING endpoint.endpoint_id")?;
        if raw.base_url.trim().is_empty() {
            bail!("CONFIG_INVALID endpoint.base_url is empty");
        }
        if raw.timeout_secs == 0 {
            bail!("CONFIG_INVALID endpoint.timeout_secs must be > 0");
        }
        Ok(Self {
            base_url: raw.base_url.trim().to_string(),
            project,
            location: raw.location.trim().to_string(),
            endpoint_id,
            token_env: raw.token_env.trim().to_string(),
            timeout_secs: raw.timeout_secs,
        })
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
