//! Per-run reporting. A reporter is built for one gate invocation and passed
//! in explicitly; the gate never touches process-wide logging state itself.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::types::{GateOutcome, ModelRole};

/// Informational events emitted while a gate runs, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GateEvent {
    ArtifactLoaded {
        role: ModelRole,
        model_id: String,
        location: PathBuf,
    },
    BaselineUnavailable {
        reason: String,
    },
    DatasetSplit {
        source: String,
        train_rows: usize,
        test_rows: usize,
        fingerprint: String,
    },
    ModelEvaluated {
        role: ModelRole,
        model_id: String,
        mse: f64,
    },
    Decided {
        outcome: GateOutcome,
        candidate_mse: f64,
        baseline_mse: Option<f64>,
    },
}

pub trait GateReporter {
    fn report(&mut self, event: &GateEvent);
}

/// Emits every event through `tracing`, tagged with the run id.
#[derive(Debug, Clone)]
pub struct TracingReporter {
    run_id: Uuid,
}

impl TracingReporter {
    pub fn new(run_id: Uuid) -> Self {
        Self { run_id }
    }
}

impl GateReporter for TracingReporter {
    fn report(&mut self, event: &GateEvent) {
        match event {
            GateEvent::ArtifactLoaded {
                role,
                model_id,
                location,
            } => info!(
                run_id = %self.run_id,
                role = role.as_str(),
                model_id = %model_id,
                location = %location.display(),
                "loaded {role} model"
            ),
            GateEvent::BaselineUnavailable { reason } => warn!(
                run_id = %self.run_id,
                reason = %reason,
                "baseline unavailable; performance comparison will be skipped"
            ),
            GateEvent::DatasetSplit {
                source,
                train_rows,
                test_rows,
                fingerprint,
            } => info!(
                run_id = %self.run_id,
                source = %source,
                train_rows,
                test_rows,
                fingerprint = %fingerprint,
                "dataset split into training and testing sets"
            ),
            GateEvent::ModelEvaluated {
                role,
                model_id,
                mse,
            } => info!(
                run_id = %self.run_id,
                role = role.as_str(),
                model_id = %model_id,
                mse,
                "{role} model MSE: {mse}"
            ),
            GateEvent::Decided {
                outcome,
                candidate_mse,
                baseline_mse,
            } => info!(
                run_id = %self.run_id,
                outcome = outcome.as_str(),
                candidate_mse,
                baseline_mse = ?baseline_mse,
                "gate decided {outcome}"
            ),
        }
    }
}

/// Keeps events in memory for inspection.
#[derive(Debug, Clone, Default)]
pub struct MemoryReporter {
    pub events: Vec<GateEvent>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GateReporter for MemoryReporter {
    fn report(&mut self, event: &GateEvent) {
        self.events.push(event.clone());
    }
}
