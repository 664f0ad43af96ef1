//! Layered YAML configuration for the promotion gate and endpoint client.
//!
//! Documents are merged in order (earlier = base, later = override), checked
//! for literal secrets, canonicalized to JSON, and hashed. Typed views over the
//! merged document live in [`settings`]; bearer tokens are resolved from the
//! environment by [`secrets`].

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

pub mod secrets;
pub mod settings;

pub use secrets::{resolve_endpoint_token, ResolvedToken};
pub use settings::{DatasetSettings, EndpointSettings, GateSettings, SplitSettings};

/// Known secret-like prefixes. If any leaf string value in the effective
/// config starts with one of these, loading aborts with CONFIG_SECRET_DETECTED.
/// Config carries env var NAMES only.
const SECRET_PREFIXES: &[&str] = &[
    "ya29.",      // Google OAuth access token
    "AIza",       // Google API key
    "sk-",        // OpenAI style
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "gho_",       // GitHub OAuth
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
    "Bearer ",    // pasted Authorization header
];

// ---------------------------------------------------------------------------
// Unused-key guard
// ---------------------------------------------------------------------------

/// Which command is consuming the config. Each mode reads a different subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    /// `mpg gate`, `mpg check-load`, `mpg predict-sample`.
    Gate,
    /// `mpg predict-remote`.
    Predict,
}

impl ConfigMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigMode::Gate => "GATE",
            ConfigMode::Predict => "PREDICT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

/// Leaves of the merged document that the current command never reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnusedKeyReport {
    pub mode: ConfigMode,
    /// Sorted JSON pointers.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Registry of consumed JSON-pointer prefixes per mode.
///
/// Must match what `settings.rs` actually reads. A prefix consumes every leaf
/// beneath it.
pub fn consumed_pointers_for_mode(mode: ConfigMode) -> &'static [&'static str] {
    match mode {
        ConfigMode::Gate => &[
            "/models/candidate",
            "/models/baseline",
            "/models/baseline_on_corrupt",
            "/dataset/path",
            "/dataset/target_column",
            "/split/test_ratio",
            "/split/seed",
            "/report/out_dir",
        ],
        ConfigMode::Predict => &[
            "/endpoint/base_url",
            "/endpoint/project",
            "/endpoint/location",
            "/endpoint/endpoint_id",
            "/endpoint/token_env",
            "/endpoint/timeout_secs",
        ],
    }
}

/// Produce an unused-key report for a given mode.
/// With `policy == Fail` an unclean report is an error; with `Warn` it is
/// always returned.
pub fn report_unused_keys(
    mode: ConfigMode,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed = consumed_pointers_for_mode(mode);
    let mut unused = Vec::new();
    visit_leaves(config_json, &mut |path: &[String], _: &Value| {
        if !consumed.iter().any(|ptr| covers(ptr, path)) {
            unused.push(to_pointer(path));
        }
    });
    unused.sort();

    let report = UnusedKeyReport {
        mode,
        unused_leaf_pointers: unused,
    };
    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS (mode={}): not read by this command: {}",
            mode.as_str(),
            summarize(&report.unused_leaf_pointers)
        );
    }
    Ok(report)
}

/// Depth-first walk handing every scalar to `visit` with its unescaped path.
/// Empty objects and arrays contribute no leaves.
fn visit_leaves(root: &Value, visit: &mut dyn FnMut(&[String], &Value)) {
    fn walk(v: &Value, path: &mut Vec<String>, visit: &mut dyn FnMut(&[String], &Value)) {
        match v {
            Value::Object(map) => {
                for (key, child) in map {
                    path.push(key.clone());
                    walk(child, path, visit);
                    path.pop();
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    path.push(i.to_string());
                    walk(child, path, visit);
                    path.pop();
                }
            }
            scalar => visit(path, scalar),
        }
    }
    walk(root, &mut Vec::new(), visit);
}

/// True when registry pointer `ptr` names `path` or one of its ancestors.
/// Registry pointers never contain `~` escapes.
fn covers(ptr: &str, path: &[String]) -> bool {
    let tokens: Vec<&str> = ptr.trim_matches('/').split('/').collect();
    tokens.len() <= path.len() && tokens.iter().zip(path).all(|(t, p)| *t == p.as_str())
}

/// RFC 6901 rendering of an unescaped path.
fn to_pointer(path: &[String]) -> String {
    path.iter()
        .map(|token| format!("/{}", token.replace('~', "~0").replace('/', "~1")))
        .collect()
}

fn summarize(pointers: &[String]) -> String {
    const SHOWN: usize = 12;
    let mut out = pointers
        .iter()
        .take(SHOWN)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if pointers.len() > SHOWN {
        out.push_str(&format!(" (+{} more)", pointers.len() - SHOWN));
    }
    out
}

// ---------------------------------------------------------------------------
// Loading + hashing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// An empty document; every typed setting falls back to its default.
    pub fn empty() -> Result<Self> {
        load_layered_yaml_from_strings(&[])
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        // An empty document parses as null; it contributes nothing.
        if v_json.is_null() {
            continue;
        }
        if !v_json.is_object() {
            bail!("CONFIG_NOT_A_MAPPING: each config layer must be a YAML mapping");
        }
        merge_into(&mut merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    // serde_json::Map is BTreeMap-backed (no preserve_order feature), so key
    // order in the source YAML does not reach the canonical form.
    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Overlay `layer` onto `base`. Mappings merge key by key; any other value
/// in `layer` replaces what was there.
fn merge_into(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base_map), Value::Object(layer_map)) => {
            for (key, value) in layer_map {
                match base_map.get_mut(&key) {
                    Some(slot) => merge_into(slot, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut offending: Option<String> = None;
    visit_leaves(v, &mut |path: &[String], leaf: &Value| {
        if offending.is_none() && leaf.as_str().is_some_and(looks_like_secret) {
            offending = Some(to_pointer(path));
        }
    });
    match offending {
        Some(ptr) => bail!("CONFIG_SECRET_DETECTED leaf={ptr} value=REDACTED"),
        None => Ok(()),
    }
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim_start();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}
