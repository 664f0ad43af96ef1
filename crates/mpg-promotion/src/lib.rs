//! Model promotion gate: evaluate a candidate and an optional baseline on the
//! same held-out split and decide PASS / FAIL / SKIPPED_NO_BASELINE.

mod evaluator;
mod reporter;
mod types;

pub use evaluator::{
    decide, evaluate_model, mean_squared_error, predict_one, run_gate, ArtifactLoader,
    FsArtifactLoader, GateInput, MetricError,
};
pub use reporter::{GateEvent, GateReporter, MemoryReporter, TracingReporter};
pub use types::{
    write_gate_report_json, GateConfig, GateError, GateOutcome, GateReport, ModelEvaluation,
    ModelRole, SplitSummary,
};
