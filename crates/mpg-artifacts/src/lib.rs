//! Model artifacts: the on-disk document, its loader, and the [`Predictor`]
//! capability the promotion gate consumes.
//!
//! # Loader contract
//! - Missing file → [`ArtifactError::NotFound`].
//! - Unreadable, unparseable, or structurally invalid document →
//!   [`ArtifactError::Corrupt`] with the cause.
//!
//! Artifacts are read-only once loaded.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use mpg_schemas::FeatureMatrix;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

mod model;

pub use model::{ModelSpec, PredictError, Predictor, StandardScaler};

use model::{ConstantModel, LinearModel};

/// Only document version this loader understands.
pub const ARTIFACT_SCHEMA_VERSION: i32 = 1;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    /// Nothing exists at the location.
    NotFound { location: PathBuf },
    /// Something exists but is not a usable artifact.
    Corrupt { location: PathBuf, reason: String },
}

impl ArtifactError {
    pub fn location(&self) -> &Path {
        match self {
            ArtifactError::NotFound { location } | ArtifactError::Corrupt { location, .. } => {
                location
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ArtifactError::NotFound { .. })
    }
}

impl fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactError::NotFound { location } => {
                write!(f, "artifact not found at {}", location.display())
            }
            ArtifactError::Corrupt { location, reason } => {
                write!(f, "artifact at {} is corrupt: {reason}", location.display())
            }
        }
    }
}

impl std::error::Error for ArtifactError {}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// On-disk artifact (JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDocument {
    pub schema_version: i32,
    pub model_id: String,
    /// Input columns in the order the model consumes them.
    pub feature_names: Vec<String>,
    pub model: ModelSpec,
}

impl ArtifactDocument {
    /// Structural checks beyond what serde enforces.
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version != ARTIFACT_SCHEMA_VERSION {
            return Err(format!(
                "unsupported schema_version {} (expected {})",
                self.schema_version, ARTIFACT_SCHEMA_VERSION
            ));
        }
        if self.model_id.trim().is_empty() {
            return Err("model_id is empty".to_string());
        }
        let n = self.feature_names.len();
        if n == 0 {
            return Err("feature_names is empty".to_string());
        }
        for (i, name) in self.feature_names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(format!("feature_names[{i}] is blank"));
            }
            if self.feature_names[..i].contains(name) {
                return Err(format!("feature_names has duplicate '{name}'"));
            }
        }
        match &self.model {
            ModelSpec::Linear {
                coefficients,
                intercept,
                scaler,
            } => {
                if coefficients.len() != n {
                    return Err(format!(
                        "linear model has {} coefficients for {} features",
                        coefficients.len(),
                        n
                    ));
                }
                if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                    return Err("linear model has non-finite parameters".to_string());
                }
                if let Some(s) = scaler {
                    if s.mean.len() != n || s.scale.len() != n {
                        return Err(format!(
                            "scaler has {}/{} mean/scale entries for {} features",
                            s.mean.len(),
                            s.scale.len(),
                            n
                        ));
                    }
                    if s.mean.iter().any(|m| !m.is_finite()) {
                        return Err("scaler mean has non-finite entries".to_string());
                    }
                    if s.scale.iter().any(|v| !v.is_finite() || *v == 0.0) {
                        return Err("scaler scale must be finite and non-zero".to_string());
                    }
                }
            }
            ModelSpec::Constant { value } => {
                if !value.is_finite() {
                    return Err("constant model value is non-finite".to_string());
                }
            }
        }
        Ok(())
    }

    fn into_predictor(self) -> Box<dyn Predictor> {
        let feature_names = self.feature_names;
        match self.model {
            ModelSpec::Linear {
                coefficients,
                intercept,
                scaler,
            } => Box::new(LinearModel {
                model_id: self.model_id,
                feature_names,
                coefficients,
                intercept,
                scaler,
            }),
            ModelSpec::Constant { value } => Box::new(ConstantModel {
                model_id: self.model_id,
                feature_names,
                value,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Loaded artifact
// ---------------------------------------------------------------------------

/// A validated artifact ready to predict.
pub struct LoadedArtifact {
    pub location: PathBuf,
    /// SHA-256 of the raw file bytes.
    pub content_hash: String,
    pub kind: &'static str,
    predictor: Box<dyn Predictor>,
}

impl Predictor for LoadedArtifact {
    fn model_id(&self) -> &str {
        self.predictor.model_id()
    }

    fn feature_names(&self) -> &[String] {
        self.predictor.feature_names()
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, PredictError> {
        self.predictor.predict(features)
    }
}

impl fmt::Debug for LoadedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedArtifact")
            .field("location", &self.location)
            .field("model_id", &self.model_id())
            .field("kind", &self.kind)
            .field("content_hash", &self.content_hash)
            .finish()
    }
}

/// Load and validate the artifact at `path`.
pub fn load_artifact(path: &Path) -> Result<LoadedArtifact, ArtifactError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ArtifactError::NotFound {
                location: path.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(ArtifactError::Corrupt {
                location: path.to_path_buf(),
                reason: format!("read failed: {e}"),
            })
        }
    };
    load_artifact_from_bytes(path, &bytes)
}

/// Parse and validate artifact bytes; `location` is used for reporting only.
pub fn load_artifact_from_bytes(
    location: &Path,
    bytes: &[u8],
) -> Result<LoadedArtifact, ArtifactError> {
    let corrupt = |reason: String| ArtifactError::Corrupt {
        location: location.to_path_buf(),
        reason,
    };

    let doc: ArtifactDocument =
        serde_json::from_slice(bytes).map_err(|e| corrupt(format!("parse failed: {e}")))?;
    doc.validate().map_err(corrupt)?;

    let kind = doc.model.kind();
    Ok(LoadedArtifact {
        location: location.to_path_buf(),
        content_hash: sha256_hex(bytes),
        kind,
        predictor: doc.into_predictor(),
    })
}

/// Write `doc` as pretty-printed JSON to `path`, creating parent directories.
pub fn write_artifact(path: &Path, doc: &ArtifactDocument) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(doc).map_err(io::Error::other)?;
    fs::write(path, format!("{json}\n"))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
