use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mpg_artifacts::{write_artifact, ArtifactDocument, ModelSpec};
use mpg_dataset::Dataset;
use mpg_schemas::{FeatureMatrix, DEFAULT_TARGET_COLUMN, FEATURE_COUNT, FEATURE_NAMES};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use tempfile::TempDir;

mod predictor;

pub use predictor::{ScriptedBehavior, ScriptedPredictor};

/// Coefficients the synthetic targets are generated from (roughly what an
/// ordinary least-squares fit on the real benchmark produces).
pub const TRUE_COEFFICIENTS: [f64; FEATURE_COUNT] = [
    0.4367, 0.0094, -0.1073, 0.6451, -0.000004, -0.0038, -0.4213, -0.4345,
];
pub const TRUE_INTERCEPT: f64 = -36.94;

/// Half-width of the uniform noise added to every target.
pub const NOISE: f64 = 0.25;

/// Per-feature sampling ranges, same order as [`FEATURE_NAMES`].
const FEATURE_RANGES: [(f64, f64); FEATURE_COUNT] = [
    (0.5, 15.0),      // MedInc
    (1.0, 52.0),      // HouseAge
    (2.0, 10.0),      // AveRooms
    (0.8, 1.5),       // AveBedrms
    (3.0, 5000.0),    // Population
    (1.0, 6.0),       // AveOccup
    (32.5, 42.0),     // Latitude
    (-124.3, -114.3), // Longitude
];

/// Deterministic housing-like dataset with `n` rows.
pub fn synthetic_housing(n: usize, seed: u64) -> Dataset {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut cells = Vec::with_capacity(n * FEATURE_COUNT);
    let mut targets = Vec::with_capacity(n);

    for _ in 0..n {
        let mut y = TRUE_INTERCEPT;
        for (j, &(lo, hi)) in FEATURE_RANGES.iter().enumerate() {
            let x = rng.gen_range(lo..hi);
            y += TRUE_COEFFICIENTS[j] * x;
            cells.push(x);
        }
        y += rng.gen_range(-NOISE..NOISE);
        targets.push(y);
    }

    let features = FeatureMatrix::new(n, FEATURE_COUNT, cells)
        .expect("synthetic matrix shape is rows * FEATURE_COUNT");
    Dataset::new(feature_names(), features, targets).expect("one target per synthetic row")
}

pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Artifact builders
// ---------------------------------------------------------------------------

pub fn linear_artifact(
    model_id: &str,
    coefficients: [f64; FEATURE_COUNT],
    intercept: f64,
) -> ArtifactDocument {
    ArtifactDocument {
        schema_version: 1,
        model_id: model_id.to_string(),
        feature_names: feature_names(),
        model: ModelSpec::Linear {
            coefficients: coefficients.to_vec(),
            intercept,
            scaler: None,
        },
    }
}

/// The generating model; near-optimal on [`synthetic_housing`] data.
pub fn true_model(model_id: &str) -> ArtifactDocument {
    linear_artifact(model_id, TRUE_COEFFICIENTS, TRUE_INTERCEPT)
}

/// The generating model with the income coefficient damped; strictly worse.
pub fn degraded_model(model_id: &str) -> ArtifactDocument {
    let mut coefs = TRUE_COEFFICIENTS;
    coefs[0] *= 0.5;
    linear_artifact(model_id, coefs, TRUE_INTERCEPT)
}

pub fn constant_artifact(model_id: &str, value: f64) -> ArtifactDocument {
    ArtifactDocument {
        schema_version: 1,
        model_id: model_id.to_string(),
        feature_names: feature_names(),
        model: ModelSpec::Constant { value },
    }
}

// ---------------------------------------------------------------------------
// On-disk fixtures
// ---------------------------------------------------------------------------

/// Write `ds` as a headered CSV with the target in the last column.
pub fn write_dataset_csv(path: &Path, ds: &Dataset) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create dataset dir failed: {}", parent.display()))?;
    }
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("open dataset csv failed: {}", path.display()))?;

    let mut header: Vec<&str> = ds.feature_names().iter().map(|s| s.as_str()).collect();
    header.push(DEFAULT_TARGET_COLUMN);
    w.write_record(&header)?;

    for (row, target) in ds.features().iter_rows().zip(ds.targets()) {
        let mut rec: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        rec.push(target.to_string());
        w.write_record(&rec)?;
    }
    w.flush()?;
    Ok(())
}

/// Temporary project directory laid out like a real checkout:
/// `models/model.json`, `models/model_previous.json`, `data/housing.csv`.
pub struct GateWorkspace {
    dir: TempDir,
}

impl GateWorkspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp workspace")?;
        fs::create_dir_all(dir.path().join("models"))?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn candidate_path(&self) -> PathBuf {
        self.root().join("models").join("model.json")
    }

    pub fn baseline_path(&self) -> PathBuf {
        self.root().join("models").join("model_previous.json")
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.root().join("data").join("housing.csv")
    }

    pub fn write_candidate(&self, doc: &ArtifactDocument) -> Result<PathBuf> {
        let p = self.candidate_path();
        write_artifact(&p, doc).with_context(|| format!("write {}", p.display()))?;
        Ok(p)
    }

    pub fn write_baseline(&self, doc: &ArtifactDocument) -> Result<PathBuf> {
        let p = self.baseline_path();
        write_artifact(&p, doc).with_context(|| format!("write {}", p.display()))?;
        Ok(p)
    }

    /// Overwrite the baseline slot with bytes that are not an artifact.
    pub fn corrupt_baseline(&self) -> Result<PathBuf> {
        let p = self.baseline_path();
        fs::write(&p, b"\x80\x04\x95not-json")?;
        Ok(p)
    }

    pub fn write_dataset(&self, ds: &Dataset) -> Result<PathBuf> {
        let p = self.dataset_path();
        write_dataset_csv(&p, ds)?;
        Ok(p)
    }

    /// Write a gate config YAML pointing at this workspace's files.
    pub fn write_config(&self, extra_yaml: &str) -> Result<PathBuf> {
        let p = self.root().join("gate.yaml");
        let yaml = format!(
            "models:\n  candidate: \"{}\"\n  baseline: \"{}\"\ndataset:\n  path: \"{}\"\n{}",
            self.candidate_path().display(),
            self.baseline_path().display(),
            self.dataset_path().display(),
            extra_yaml
        );
        fs::write(&p, yaml)?;
        Ok(p)
    }
}
