//! Bearer-token resolution for the hosted prediction endpoint.
//!
//! Config stores only the env var NAME (`endpoint.token_env`). The value is
//! read once here and handed to the client constructor; error messages name
//! the variable, never the value.

use anyhow::{bail, Result};

use crate::settings::EndpointSettings;

/// A resolved bearer token. **Redacted in `Debug` output.**
#[derive(Clone)]
pub struct ResolvedToken {
    pub env_var: String,
    value: String,
}

impl ResolvedToken {
    pub fn new(env_var: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
            value: value.into(),
        }
    }

    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Debug for ResolvedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedToken")
            .field("env_var", &self.env_var)
            .field("value", &"<REDACTED>")
            .finish()
    }
}

/// Read the token named by `settings.token_env`.
///
/// # Errors
/// SECRETS_MISSING with the env var NAME when it is unset or blank.
pub fn resolve_endpoint_token(settings: &EndpointSettings) -> Result<ResolvedToken> {
    let name = settings.token_env.as_str();
    if name.is_empty() {
        bail!("SECRETS_MISSING: endpoint.token_env is empty");
    }
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(ResolvedToken::new(name, v.trim())),
        _ => bail!(
            "SECRETS_MISSING: required env var '{}' (endpoint bearer token) is not set or empty",
            name
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_value() {
        let t = ResolvedToken::new("MPG_ENDPOINT_TOKEN", "ya29.supersecretvalue");
        let dbg = format!("{t:?}");
        assert!(dbg.contains("MPG_ENDPOINT_TOKEN"));
        assert!(!dbg.contains("supersecret"));
    }
}
