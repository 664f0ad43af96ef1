use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use mpg_artifacts::{load_artifact, Predictor};
use mpg_config::{
    report_unused_keys, resolve_endpoint_token, ConfigMode, EndpointSettings, GateSettings,
    LoadedConfig, UnusedKeyPolicy,
};
use mpg_dataset::{CsvDatasetProvider, SplitParams};
use mpg_endpoint::{HttpPredictionEndpoint, PredictionEndpoint};
use mpg_promotion::{
    predict_one, run_gate, write_gate_report_json, FsArtifactLoader, GateConfig, GateInput,
    GateOutcome, TracingReporter,
};
use mpg_schemas::{FeatureRow, FEATURE_COUNT, SAMPLE_ROW};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "mpg")]
#[command(about = "Model promotion gate CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Layered config paths in merge order (base -> env -> local...)
    #[arg(long = "config")]
    config_paths: Vec<String>,

    /// Reject config keys this command does not read (default: warn).
    #[arg(long, default_value_t = false)]
    strict_config: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare candidate vs baseline MSE on the benchmark split. Exits non-zero on FAIL.
    Gate {
        #[command(flatten)]
        cfg: ConfigArgs,

        /// Candidate artifact (overrides models.candidate)
        #[arg(long)]
        candidate: Option<PathBuf>,

        /// Baseline artifact (overrides models.baseline)
        #[arg(long, conflicts_with = "no_baseline")]
        baseline: Option<PathBuf>,

        /// Skip the comparison even if a baseline is configured
        #[arg(long, default_value_t = false)]
        no_baseline: bool,

        /// Benchmark CSV (overrides dataset.path)
        #[arg(long)]
        dataset: Option<PathBuf>,

        #[arg(long)]
        target_column: Option<String>,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        test_ratio: Option<f64>,

        /// Directory for gate_report.json (overrides report.out_dir)
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Treat SKIPPED_NO_BASELINE as a failure
        #[arg(long, default_value_t = false)]
        require_baseline: bool,
    },

    /// Load an artifact and print its identity
    CheckLoad {
        #[command(flatten)]
        cfg: ConfigArgs,

        /// Artifact path (defaults to models.candidate)
        #[arg(long)]
        artifact: Option<PathBuf>,
    },

    /// Predict one row locally and check exactly one value comes back
    PredictSample {
        #[command(flatten)]
        cfg: ConfigArgs,

        #[arg(long)]
        artifact: Option<PathBuf>,

        /// Comma-separated feature values (defaults to the built-in sample row)
        #[arg(long, allow_hyphen_values = true)]
        row: Option<String>,
    },

    /// Send rows to the hosted prediction endpoint
    PredictRemote {
        #[command(flatten)]
        cfg: ConfigArgs,

        /// Comma-separated feature values; repeat for a batch
        #[arg(long = "row", allow_hyphen_values = true)]
        rows: Vec<String>,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Gate {
            cfg,
            candidate,
            baseline,
            no_baseline,
            dataset,
            target_column,
            seed,
            test_ratio,
            report_dir,
            require_baseline,
        } => {
            let loaded = load_config(&cfg, ConfigMode::Gate)?;
            let mut settings = GateSettings::from_config_json(&loaded.config_json)?;

            if let Some(p) = candidate {
                settings.candidate = p;
            }
            if no_baseline {
                settings.baseline = None;
            } else if let Some(p) = baseline {
                settings.baseline = Some(p);
            }
            if let Some(p) = dataset {
                settings.dataset.path = Some(p);
            }
            if let Some(c) = target_column {
                settings.dataset.target_column = c;
            }
            if let Some(s) = seed {
                settings.split.seed = s;
            }
            if let Some(r) = test_ratio {
                settings.split.test_ratio = r;
            }
            if let Some(d) = report_dir {
                settings.report_out_dir = Some(d);
            }
            settings.validate()?;

            let provider = CsvDatasetProvider::new(
                settings.require_dataset_path()?.clone(),
                settings.dataset.target_column.clone(),
            );
            let config = GateConfig {
                candidate: settings.candidate.clone(),
                baseline: settings.baseline.clone(),
                baseline_on_corrupt: settings.baseline_on_corrupt,
                split: SplitParams {
                    test_ratio: settings.split.test_ratio,
                    seed: settings.split.seed,
                },
            };

            let run_id = Uuid::new_v4();
            let mut reporter = TracingReporter::new(run_id);
            let report = run_gate(
                &GateInput {
                    run_id,
                    config: &config,
                    loader: &FsArtifactLoader,
                    dataset: &provider,
                },
                &mut reporter,
            )?;

            println!("run_id={}", report.run_id);
            println!("config_hash={}", loaded.config_hash);
            println!("outcome={}", report.outcome);
            println!("candidate_mse={}", report.candidate.mse);
            println!("baseline_mse={}", opt_f64(report.baseline_mse()));
            println!("dataset={}", provider.path().display());
            println!("test_rows={}", report.split.test_rows);
            println!("split_fingerprint={}", report.split.fingerprint);
            for r in &report.reasons {
                println!("reason={r}");
            }

            if let Some(dir) = &settings.report_out_dir {
                let path = write_gate_report_json(dir, &report)
                    .with_context(|| format!("write gate report failed: {}", dir.display()))?;
                println!("report={}", path.display());
            }

            match report.outcome {
                GateOutcome::Pass => {}
                GateOutcome::SkippedNoBaseline if !require_baseline => {}
                GateOutcome::SkippedNoBaseline => {
                    bail!("GATE_SKIPPED: --require-baseline set but no baseline was available")
                }
                GateOutcome::Fail => bail!("GATE_FAILED: {}", report.reasons.join("; ")),
            }
        }

        Commands::CheckLoad { cfg, artifact } => {
            let loaded = load_config(&cfg, ConfigMode::Gate)?;
            let settings = GateSettings::from_config_json(&loaded.config_json)?;
            let path = artifact.unwrap_or(settings.candidate);

            let art = load_artifact(&path)?;
            println!("loaded=true");
            println!("location={}", art.location.display());
            println!("model_id={}", art.model_id());
            println!("kind={}", art.kind);
            println!("n_features={}", art.n_features());
            println!("content_hash={}", art.content_hash);
        }

        Commands::PredictSample { cfg, artifact, row } => {
            let loaded = load_config(&cfg, ConfigMode::Gate)?;
            let settings = GateSettings::from_config_json(&loaded.config_json)?;
            let path = artifact.unwrap_or(settings.candidate);
            let row = match row {
                Some(s) => parse_row(&s)?,
                None => FeatureRow(SAMPLE_ROW),
            };

            let art = load_artifact(&path)?;
            let y = predict_one(&art, &row)?;
            println!("model_id={}", art.model_id());
            println!("predictions=1");
            println!("prediction={y}");
        }

        Commands::PredictRemote { cfg, rows } => {
            let loaded = load_config(&cfg, ConfigMode::Predict)?;
            let settings = EndpointSettings::from_config_json(&loaded.config_json)?;
            let instances: Vec<FeatureRow> = if rows.is_empty() {
                vec![FeatureRow(SAMPLE_ROW)]
            } else {
                rows.iter().map(|r| parse_row(r)).collect::<Result<_>>()?
            };

            let token = resolve_endpoint_token(&settings)?;
            let client = HttpPredictionEndpoint::from_settings(&settings, token)?;
            let resp = client.predict(&instances).await?;

            let target = client.target();
            println!("endpoint_id={}", target.endpoint_id);
            println!("endpoint_url={}", target.predict_url());
            println!(
                "deployed_model_id={}",
                resp.deployed_model_id.as_deref().unwrap_or("NONE")
            );
            for p in &resp.predictions {
                println!("prediction={p}");
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = mpg_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
    }

    Ok(())
}

fn init_tracing() {
    // stdout carries key=value results; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Merge config layers (or start empty) and run the unused-key guard.
fn load_config(cfg: &ConfigArgs, mode: ConfigMode) -> Result<LoadedConfig> {
    let loaded = if cfg.config_paths.is_empty() {
        LoadedConfig::empty()?
    } else {
        let path_refs: Vec<&str> = cfg.config_paths.iter().map(|s| s.as_str()).collect();
        mpg_config::load_layered_yaml(&path_refs)?
    };

    let policy = if cfg.strict_config {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(mode, &loaded.config_json, policy)?;
    if !report.is_clean() {
        warn!(
            mode = mode.as_str(),
            unused = ?report.unused_leaf_pointers,
            "config keys not read by this command"
        );
    }
    info!(mode = mode.as_str(), config_hash = %loaded.config_hash, "config loaded");
    Ok(loaded)
}

fn parse_row(s: &str) -> Result<FeatureRow> {
    let values = s
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .with_context(|| format!("ROW_INVALID value '{}' is not a number", v.trim()))
        })
        .collect::<Result<Vec<f64>>>()?;
    let row = FeatureRow::from_slice(&values).with_context(|| {
        format!(
            "ROW_INVALID expected {} values, got {}",
            FEATURE_COUNT,
            values.len()
        )
    })?;
    if !row.is_finite() {
        bail!("ROW_INVALID all values must be finite");
    }
    Ok(row)
}

fn opt_f64(v: Option<f64>) -> String {
    match v {
        Some(x) => x.to_string(),
        None => "NONE".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_row_accepts_eight_values() {
        let row = parse_row("-119, 37.83, 28.0, 583.0, 418.0, 721.0, 583.6, 12.68").unwrap();
        assert_eq!(row, FeatureRow(SAMPLE_ROW));
    }

    #[test]
    fn parse_row_rejects_bad_input() {
        assert!(parse_row("1,2,3").is_err());
        assert!(parse_row("1,2,3,4,5,6,7,x").is_err());
        assert!(parse_row("1,2,3,4,5,6,7,NaN").is_err());
    }
}
