//! §6 Runner contract: `start(flow_id, pipelines, status_callback)`.

use std::sync::Arc;

use crate::ports::planner::PlannedPipeline;

/// One invocation of the runner's status callback (§4.D's reducer
/// input), before pipeline-id normalization.
pub struct RunnerEvent {
    pub pipeline_id: String,
    pub event: &'static str,
    pub success: Option<bool>,
    pub errors: Option<serde_json::Value>,
    pub stats: Option<serde_json::Value>,
}

pub trait PipelineRunner: Send + Sync {
    fn start(&self, flow_id: &str, pipelines: &[PlannedPipeline], callback: Arc<dyn Fn(RunnerEvent) + Send + Sync>);
}

/// Synchronously announces every planned pipeline as queued and
/// nothing more. A real runner re-emits `INPROGRESS`/terminal events on
/// its own schedule (spec.md §7); this stub exists to exercise the
/// callback wiring, not to simulate execution — it never fabricates a
/// `SUCCESS`/`FAILED` outcome on its own.
#[derive(Default)]
pub struct ImmediateRunner;

impl PipelineRunner for ImmediateRunner {
    fn start(&self, _flow_id: &str, pipelines: &[PlannedPipeline], callback: Arc<dyn Fn(RunnerEvent) + Send + Sync>) {
        for p in pipelines {
            callback(RunnerEvent {
                pipeline_id: p.pipeline_id.clone(),
                event: "queue",
                success: None,
                errors: None,
                stats: None,
            });
        }
    }
}

/// Accepts a flow's pipelines and never calls back, standing in for a
/// real runner that has been handed the graph but reports progress on
/// its own, external schedule. Useful wherever a test drives the
/// status callback sequence by hand instead of relying on a stub
/// runner's timing.
#[derive(Default)]
pub struct NoopRunner;

impl PipelineRunner for NoopRunner {
    fn start(&self, _flow_id: &str, _pipelines: &[PlannedPipeline], _callback: Arc<dyn Fn(RunnerEvent) + Send + Sync>) {
    }
}
