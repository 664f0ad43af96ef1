use std::path::PathBuf;

use mpg_config::{load_layered_yaml_from_strings, EndpointSettings, GateSettings, LoadedConfig};
use mpg_schemas::BaselineOnCorrupt;

#[test]
fn empty_config_yields_conventional_defaults() {
    let loaded = LoadedConfig::empty().unwrap();
    let s = GateSettings::from_config_json(&loaded.config_json).unwrap();

    assert_eq!(s.candidate, PathBuf::from("models/model.json"));
    assert_eq!(s.baseline, Some(PathBuf::from("models/model_previous.json")));
    assert_eq!(s.baseline_on_corrupt, BaselineOnCorrupt::Skip);
    assert_eq!(s.dataset.target_column, "MedHouseVal");
    assert_eq!(s.split.test_ratio, 0.2);
    assert_eq!(s.split.seed, 42);
    assert!(s.dataset.path.is_none());
    assert!(s.require_dataset_path().is_err());
}

#[test]
fn null_baseline_disables_comparison() {
    let loaded = load_layered_yaml_from_strings(&["models:\n  baseline: null\n"]).unwrap();
    let s = GateSettings::from_config_json(&loaded.config_json).unwrap();
    assert_eq!(s.baseline, None);
}

#[test]
fn baseline_policy_parses() {
    let loaded =
        load_layered_yaml_from_strings(&["models:\n  baseline_on_corrupt: fail\n"]).unwrap();
    let s = GateSettings::from_config_json(&loaded.config_json).unwrap();
    assert_eq!(s.baseline_on_corrupt, BaselineOnCorrupt::Fail);

    let bad = load_layered_yaml_from_strings(&["models:\n  baseline_on_corrupt: maybe\n"]).unwrap();
    assert!(GateSettings::from_config_json(&bad.config_json).is_err());
}

#[test]
fn out_of_range_ratio_is_rejected() {
    for ratio in ["0", "1", "1.5", "-0.2"] {
        let yaml = format!("split:\n  test_ratio: {ratio}\n");
        let loaded = load_layered_yaml_from_strings(&[yaml.as_str()]).unwrap();
        let settings = GateSettings::from_config_json(&loaded.config_json).unwrap();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("split.test_ratio"), "{err}");
    }
}

#[test]
fn override_applied_before_validation_rescues_bad_ratio() {
    let loaded = load_layered_yaml_from_strings(&["split:\n  test_ratio: 1.5\n"]).unwrap();
    let mut settings = GateSettings::from_config_json(&loaded.config_json).unwrap();
    assert_eq!(settings.split.test_ratio, 1.5);

    settings.split.test_ratio = 0.25;
    settings.validate().unwrap();
}

#[test]
fn endpoint_requires_project_and_id() {
    let loaded = load_layered_yaml_from_strings(&["endpoint:\n  project: p\n"]).unwrap();
    let err = EndpointSettings::from_config_json(&loaded.config_json).unwrap_err();
    assert!(err.to_string().contains("endpoint.endpoint_id"), "{err}");

    let loaded = load_layered_yaml_from_strings(&[
        "endpoint:\n  project: california-dataset-001\n  endpoint_id: \"6780961986889908224\"\n",
    ])
    .unwrap();
    let s = EndpointSettings::from_config_json(&loaded.config_json).unwrap();
    assert_eq!(s.location, "us-central1");
    assert_eq!(s.token_env, "MPG_ENDPOINT_TOKEN");
    assert_eq!(s.timeout_secs, 30);
}
