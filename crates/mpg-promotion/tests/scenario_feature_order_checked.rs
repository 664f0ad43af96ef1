use std::fs;
use std::path::Path;

use anyhow::Result;
use mpg_dataset::{CsvDatasetProvider, Dataset};
use mpg_promotion::{
    predict_one, run_gate, FsArtifactLoader, GateConfig, GateError, GateEvent, GateInput,
    MemoryReporter, ModelRole,
};
use mpg_schemas::{FeatureRow, DEFAULT_TARGET_COLUMN, SAMPLE_ROW};
use mpg_testkit::{degraded_model, synthetic_housing, true_model, GateWorkspace};
use uuid::Uuid;

/// Same rows as `ds`, written with the feature columns in reverse order.
fn write_reversed_csv(path: &Path, ds: &Dataset) -> Result<()> {
    let mut header: Vec<&str> = ds.feature_names().iter().rev().map(|s| s.as_str()).collect();
    header.push(DEFAULT_TARGET_COLUMN);

    let mut lines = vec![header.join(",")];
    for (row, target) in ds.features().iter_rows().zip(ds.targets()) {
        let mut cells: Vec<String> = row.iter().rev().map(|v| v.to_string()).collect();
        cells.push(target.to_string());
        lines.push(cells.join(","));
    }

    fs::create_dir_all(path.parent().unwrap())?;
    fs::write(path, lines.join("\n") + "\n")?;
    Ok(())
}

#[test]
fn permuted_csv_header_fails_before_scoring() -> Result<()> {
    let ws = GateWorkspace::new()?;
    ws.write_candidate(&true_model("cand"))?;
    write_reversed_csv(&ws.dataset_path(), &synthetic_housing(200, 5))?;

    let config = GateConfig::new(ws.candidate_path(), None);
    let provider = CsvDatasetProvider::new(ws.dataset_path(), DEFAULT_TARGET_COLUMN);
    let mut reporter = MemoryReporter::new();
    let res = run_gate(
        &GateInput {
            run_id: Uuid::new_v4(),
            config: &config,
            loader: &FsArtifactLoader,
            dataset: &provider,
        },
        &mut reporter,
    );

    match res {
        Err(GateError::PredictionFailure { role, reason, .. }) => {
            assert_eq!(role, ModelRole::Candidate);
            assert!(reason.contains("feature order mismatch at column 0"), "{reason}");
            assert!(reason.contains("'MedInc'"), "{reason}");
        }
        other => panic!("expected PredictionFailure, got {other:?}"),
    }
    // No metric was produced from misaligned columns.
    assert!(!reporter
        .events
        .iter()
        .any(|e| matches!(e, GateEvent::ModelEvaluated { .. })));
    Ok(())
}

#[test]
fn baseline_with_other_column_order_is_fatal() -> Result<()> {
    let ws = GateWorkspace::new()?;
    ws.write_candidate(&true_model("cand"))?;
    let mut base = degraded_model("base");
    base.feature_names.swap(0, 1);
    ws.write_baseline(&base)?;

    let config = GateConfig::new(ws.candidate_path(), Some(ws.baseline_path()));
    let provider = mpg_dataset::StaticDatasetProvider::new("synthetic", synthetic_housing(100, 6));
    let res = run_gate(
        &GateInput {
            run_id: Uuid::new_v4(),
            config: &config,
            loader: &FsArtifactLoader,
            dataset: &provider,
        },
        &mut MemoryReporter::new(),
    );

    match res {
        Err(GateError::PredictionFailure { role, reason, .. }) => {
            assert_eq!(role, ModelRole::Baseline);
            assert!(reason.contains("column 0"), "{reason}");
        }
        other => panic!("expected PredictionFailure, got {other:?}"),
    }
    Ok(())
}

#[test]
fn single_sample_rejects_model_with_other_column_order() -> Result<()> {
    let ws = GateWorkspace::new()?;
    let mut doc = true_model("cand");
    doc.feature_names.reverse();
    let path = ws.write_candidate(&doc)?;
    let model = mpg_artifacts::load_artifact(&path)?;

    let err = predict_one(&model, &FeatureRow(SAMPLE_ROW)).unwrap_err();
    assert!(
        matches!(&err, GateError::PredictionFailure { reason, .. } if reason.contains("feature order mismatch")),
        "{err:?}"
    );
    Ok(())
}
