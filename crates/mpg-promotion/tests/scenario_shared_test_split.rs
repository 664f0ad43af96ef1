use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use mpg_artifacts::{ArtifactError, PredictError, Predictor};
use mpg_dataset::{train_test_split, SplitParams, StaticDatasetProvider};
use mpg_promotion::{run_gate, ArtifactLoader, GateConfig, GateInput, MemoryReporter};
use mpg_schemas::FeatureMatrix;
use mpg_testkit::{feature_names, synthetic_housing};
use uuid::Uuid;

/// Records every matrix it is asked to predict.
#[derive(Clone)]
struct RecordingPredictor {
    id: String,
    names: Vec<String>,
    seen: Arc<Mutex<Vec<FeatureMatrix>>>,
}

impl Predictor for RecordingPredictor {
    fn model_id(&self) -> &str {
        &self.id
    }

    fn feature_names(&self) -> &[String] {
        &self.names
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, PredictError> {
        self.seen.lock().unwrap().push(features.clone());
        Ok(vec![0.0; features.rows()])
    }
}

struct RecordingLoader {
    seen: Arc<Mutex<Vec<FeatureMatrix>>>,
}

impl ArtifactLoader for RecordingLoader {
    fn load(&self, location: &Path) -> Result<Box<dyn Predictor>, ArtifactError> {
        Ok(Box::new(RecordingPredictor {
            id: location.display().to_string(),
            names: feature_names(),
            seen: Arc::clone(&self.seen),
        }))
    }
}

#[test]
fn both_models_see_the_identical_test_partition() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let loader = RecordingLoader {
        seen: Arc::clone(&seen),
    };
    let dataset = synthetic_housing(120, 4);
    let provider = StaticDatasetProvider::new("synthetic", dataset.clone());
    let config = GateConfig::new("a.json", Some(PathBuf::from("b.json")));

    let report = run_gate(
        &GateInput {
            run_id: Uuid::new_v4(),
            config: &config,
            loader: &loader,
            dataset: &provider,
        },
        &mut MemoryReporter::new(),
    )
    .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);

    // And it is exactly the seed-42 80/20 test partition.
    let expected = train_test_split(&dataset, SplitParams::default()).unwrap();
    assert_eq!(seen[0], expected.test.features);
    assert_eq!(report.split.fingerprint, expected.fingerprint());
    assert_eq!(report.split.test_rows, 24);
}
