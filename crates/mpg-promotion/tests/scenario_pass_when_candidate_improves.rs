use anyhow::Result;
use mpg_dataset::{CsvDatasetProvider, StaticDatasetProvider};
use mpg_promotion::{
    run_gate, FsArtifactLoader, GateConfig, GateEvent, GateInput, GateOutcome, MemoryReporter,
    ModelRole,
};
use mpg_testkit::{degraded_model, synthetic_housing, true_model, GateWorkspace, NOISE};
use uuid::Uuid;

#[test]
fn passes_when_candidate_mse_is_lower() -> Result<()> {
    let ws = GateWorkspace::new()?;
    ws.write_candidate(&true_model("housing-v2"))?;
    ws.write_baseline(&degraded_model("housing-v1"))?;
    ws.write_dataset(&synthetic_housing(1_000, 7))?;

    let config = GateConfig::new(ws.candidate_path(), Some(ws.baseline_path()));
    let provider = CsvDatasetProvider::new(ws.dataset_path(), "MedHouseVal");
    let run_id = Uuid::new_v4();
    let mut reporter = MemoryReporter::new();

    let report = run_gate(
        &GateInput {
            run_id,
            config: &config,
            loader: &FsArtifactLoader,
            dataset: &provider,
        },
        &mut reporter,
    )?;

    assert_eq!(report.outcome, GateOutcome::Pass);
    assert!(report.reasons.is_empty(), "{:?}", report.reasons);
    assert_eq!(report.run_id, run_id);
    assert_eq!(report.candidate.model_id, "housing-v2");
    assert_eq!(report.split.test_rows, 200);
    assert_eq!(report.split.train_rows, 800);
    assert_eq!((report.split.test_ratio, report.split.seed), (0.2, 42));

    let baseline = report.baseline.as_ref().expect("baseline evaluated");
    assert_eq!(baseline.model_id, "housing-v1");
    assert!(report.candidate.mse < baseline.mse);
    // Uniform noise on [-NOISE, NOISE] has variance NOISE^2 / 3.
    assert!(report.candidate.mse < NOISE * NOISE, "mse={}", report.candidate.mse);
    Ok(())
}

#[test]
fn events_are_reported_in_procedure_order() -> Result<()> {
    let ws = GateWorkspace::new()?;
    ws.write_candidate(&true_model("cand"))?;
    ws.write_baseline(&degraded_model("base"))?;

    let config = GateConfig::new(ws.candidate_path(), Some(ws.baseline_path()));
    let provider = StaticDatasetProvider::new("synthetic", synthetic_housing(100, 1));
    let mut reporter = MemoryReporter::new();

    run_gate(
        &GateInput {
            run_id: Uuid::new_v4(),
            config: &config,
            loader: &FsArtifactLoader,
            dataset: &provider,
        },
        &mut reporter,
    )?;

    let kinds: Vec<&str> = reporter
        .events
        .iter()
        .map(|e| match e {
            GateEvent::ArtifactLoaded { role: ModelRole::Candidate, .. } => "load:candidate",
            GateEvent::ArtifactLoaded { role: ModelRole::Baseline, .. } => "load:baseline",
            GateEvent::BaselineUnavailable { .. } => "baseline_unavailable",
            GateEvent::DatasetSplit { .. } => "split",
            GateEvent::ModelEvaluated { role: ModelRole::Candidate, .. } => "eval:candidate",
            GateEvent::ModelEvaluated { role: ModelRole::Baseline, .. } => "eval:baseline",
            GateEvent::Decided { .. } => "decided",
        })
        .collect();

    assert_eq!(
        kinds,
        vec![
            "load:candidate",
            "load:baseline",
            "split",
            "eval:candidate",
            "eval:baseline",
            "decided"
        ]
    );
    Ok(())
}

#[test]
fn repeated_runs_are_idempotent() -> Result<()> {
    let ws = GateWorkspace::new()?;
    ws.write_candidate(&true_model("cand"))?;
    ws.write_baseline(&degraded_model("base"))?;
    ws.write_dataset(&synthetic_housing(300, 3))?;

    let config = GateConfig::new(ws.candidate_path(), Some(ws.baseline_path()));
    let provider = CsvDatasetProvider::new(ws.dataset_path(), "MedHouseVal");

    let run = || {
        run_gate(
            &GateInput {
                run_id: Uuid::new_v4(),
                config: &config,
                loader: &FsArtifactLoader,
                dataset: &provider,
            },
            &mut MemoryReporter::new(),
        )
    };
    let a = run()?;
    let b = run()?;

    assert_eq!(a.outcome, b.outcome);
    assert_eq!(a.split.fingerprint, b.split.fingerprint);
    assert_eq!(a.candidate.mse, b.candidate.mse);
    assert_eq!(a.baseline_mse(), b.baseline_mse());
    Ok(())
}
