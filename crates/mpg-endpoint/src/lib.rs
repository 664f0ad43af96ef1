//! Client for a hosted regression-model prediction endpoint.
//!
//! One `POST ...:predict` per call with a bearer token. Failures are returned
//! to the caller as [`EndpointError`]; nothing is retried here.

use std::fmt;
use std::time::Duration;

use mpg_config::{EndpointSettings, ResolvedToken};
use mpg_schemas::FeatureRow;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// Where the deployed model lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTarget {
    pub base_url: String,
    pub project: String,
    pub location: String,
    pub endpoint_id: String,
}

impl EndpointTarget {
    pub fn from_settings(settings: &EndpointSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            project: settings.project.clone(),
            location: settings.location.clone(),
            endpoint_id: settings.endpoint_id.clone(),
        }
    }

    pub fn predict_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/endpoints/{}:predict",
            self.base_url.trim_end_matches('/'),
            self.project,
            self.location,
            self.endpoint_id
        )
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum EndpointError {
    /// Connection, TLS, or timeout failure.
    Transport(String),
    /// Non-success HTTP status.
    Api { status: u16, message: String },
    /// Response body is not the expected JSON shape.
    Decode(String),
    /// Client could not be constructed from its settings.
    Config(String),
    /// Bad request batch, or a response whose prediction count differs from
    /// the instance count.
    Schema(String),
}

impl fmt::Display for EndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointError::Transport(msg) => write!(f, "endpoint transport error: {msg}"),
            EndpointError::Api { status, message } => {
                write!(f, "endpoint api error status={status} message={message}")
            }
            EndpointError::Decode(msg) => write!(f, "endpoint response decode error: {msg}"),
            EndpointError::Config(msg) => write!(f, "endpoint config error: {msg}"),
            EndpointError::Schema(msg) => write!(f, "endpoint schema error: {msg}"),
        }
    }
}

impl std::error::Error for EndpointError {}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: &'a [FeatureRow],
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    pub predictions: Vec<f64>,
    #[serde(default)]
    pub deployed_model_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Best-effort message from an error body; falls back to the raw text.
fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => match (env.error.status, env.error.message) {
            (Some(s), Some(m)) => format!("{s}: {m}"),
            (_, Some(m)) => m,
            (Some(s), None) => s,
            (None, None) => "unknown".to_string(),
        },
        Err(_) if body.trim().is_empty() => "empty body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

/// Non-empty batch of finite rows.
pub fn validate_instances(instances: &[FeatureRow]) -> Result<(), EndpointError> {
    if instances.is_empty() {
        return Err(EndpointError::Schema("empty instance batch".to_string()));
    }
    if let Some(i) = instances.iter().position(|r| !r.is_finite()) {
        return Err(EndpointError::Schema(format!(
            "instance {i} contains a non-finite value"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait PredictionEndpoint: Send + Sync {
    fn target(&self) -> &EndpointTarget;

    /// One prediction per instance, in order.
    async fn predict(&self, instances: &[FeatureRow]) -> Result<PredictionResponse, EndpointError>;
}

/// reqwest-backed client. The bearer token is never logged.
#[derive(Clone)]
pub struct HttpPredictionEndpoint {
    http: reqwest::Client,
    target: EndpointTarget,
    token: ResolvedToken,
}

impl HttpPredictionEndpoint {
    pub fn new(
        target: EndpointTarget,
        token: ResolvedToken,
        timeout: Duration,
    ) -> Result<Self, EndpointError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EndpointError::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            http,
            target,
            token,
        })
    }

    pub fn from_settings(
        settings: &EndpointSettings,
        token: ResolvedToken,
    ) -> Result<Self, EndpointError> {
        if settings.base_url.trim().is_empty() {
            return Err(EndpointError::Config("endpoint.base_url is empty".to_string()));
        }
        Self::new(
            EndpointTarget::from_settings(settings),
            token,
            Duration::from_secs(settings.timeout_secs),
        )
    }
}

impl fmt::Debug for HttpPredictionEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPredictionEndpoint")
            .field("target", &self.target)
            .field("token", &self.token)
            .finish()
    }
}

#[async_trait::async_trait]
impl PredictionEndpoint for HttpPredictionEndpoint {
    fn target(&self) -> &EndpointTarget {
        &self.target
    }

    async fn predict(&self, instances: &[FeatureRow]) -> Result<PredictionResponse, EndpointError> {
        validate_instances(instances)?;

        let url = self.target.predict_url();
        debug!(url = %url, instances = instances.len(), "sending prediction request");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.token.expose())
            .json(&PredictRequest { instances })
            .send()
            .await
            .map_err(|e| EndpointError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| EndpointError::Transport(format!("read body failed: {e}")))?;

        if !status.is_success() {
            return Err(EndpointError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        let parsed: PredictionResponse =
            serde_json::from_str(&body).map_err(|e| EndpointError::Decode(e.to_string()))?;

        if parsed.predictions.len() != instances.len() {
            return Err(EndpointError::Schema(format!(
                "{} predictions for {} instances",
                parsed.predictions.len(),
                instances.len()
            )));
        }

        info!(
            endpoint_id = %self.target.endpoint_id,
            deployed_model_id = parsed.deployed_model_id.as_deref().unwrap_or("-"),
            predictions = parsed.predictions.len(),
            "prediction request succeeded"
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let t = EndpointTarget {
            base_url: "https://us-central1-aiplatform.googleapis.com/".to_string(),
            project: "p".to_string(),
            location: "us-central1".to_string(),
            endpoint_id: "123".to_string(),
        };
        assert_eq!(
            t.predict_url(),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/p/locations/us-central1/endpoints/123:predict"
        );
    }

    #[test]
    fn error_message_prefers_structured_body() {
        let body = r#"{"error":{"code":400,"message":"bad shape","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(api_error_message(body), "INVALID_ARGUMENT: bad shape");
        assert_eq!(api_error_message("upstream down\n"), "upstream down");
        assert_eq!(api_error_message(""), "empty body");
    }

    #[test]
    fn instances_must_be_non_empty_and_finite() {
        assert!(matches!(
            validate_instances(&[]),
            Err(EndpointError::Schema(_))
        ));
        let mut row = FeatureRow(mpg_schemas::SAMPLE_ROW);
        assert!(validate_instances(&[row]).is_ok());
        row.0[3] = f64::NAN;
        assert!(validate_instances(&[row]).is_err());
    }
}
