use std::fs;

use assert_cmd::Command;
use mpg_testkit::{true_model, GateWorkspace};
use predicates::prelude::*;

#[test]
fn check_load_prints_identity() -> anyhow::Result<()> {
    let ws = GateWorkspace::new()?;
    ws.write_candidate(&true_model("housing-v2"))?;

    Command::cargo_bin("mpg")?
        .current_dir(ws.root())
        .arg("check-load")
        .assert()
        .success()
        .stdout(predicate::str::contains("loaded=true"))
        .stdout(predicate::str::contains("model_id=housing-v2"))
        .stdout(predicate::str::contains("kind=linear"))
        .stdout(predicate::str::contains("n_features=8"));
    Ok(())
}

#[test]
fn check_load_fails_on_missing_and_corrupt() -> anyhow::Result<()> {
    let ws = GateWorkspace::new()?;

    Command::cargo_bin("mpg")?
        .current_dir(ws.root())
        .arg("check-load")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));

    fs::write(ws.candidate_path(), "not json")?;
    Command::cargo_bin("mpg")?
        .current_dir(ws.root())
        .arg("check-load")
        .assert()
        .failure()
        .stderr(predicate::str::contains("corrupt"));
    Ok(())
}

#[test]
fn predict_sample_returns_exactly_one_prediction() -> anyhow::Result<()> {
    let ws = GateWorkspace::new()?;
    let path = ws.write_candidate(&true_model("housing-v2"))?;

    Command::cargo_bin("mpg")?
        .args(["predict-sample", "--artifact"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("predictions=1"))
        .stdout(predicate::str::contains("prediction="));

    Command::cargo_bin("mpg")?
        .args(["predict-sample", "--row", "1,2,3", "--artifact"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ROW_INVALID"));
    Ok(())
}

#[test]
fn config_hash_is_printed() -> anyhow::Result<()> {
    let ws = GateWorkspace::new()?;
    let config = ws.write_config("split:\n  seed: 42\n")?;

    Command::cargo_bin("mpg")?
        .arg("config-hash")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::is_match("config_hash=[0-9a-f]{64}")?);
    Ok(())
}

#[test]
fn strict_config_rejects_unread_keys() -> anyhow::Result<()> {
    let ws = GateWorkspace::new()?;
    ws.write_candidate(&true_model("housing-v2"))?;
    let config = ws.write_config("extras:\n  typo_key: 1\n")?;

    Command::cargo_bin("mpg")?
        .current_dir(ws.root())
        .args(["check-load", "--strict-config", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("/extras/typo_key"));
    Ok(())
}
