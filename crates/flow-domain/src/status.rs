//! The pipeline/flow status state machine (§3, §4.B, §4.D).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage-level status of a `Pipeline` row or a `DatasetRevision`
/// (flow). `Pending -> Running -> {Success | Failed}`; a dependency
/// cascade can jump `Pending -> Failed` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Pending,
    Running,
    Success,
    Failed,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Pending => "pending",
            PipelineState::Running => "running",
            PipelineState::Success => "success",
            PipelineState::Failed => "failed",
        }
    }

    /// The upper-case projection used in the revision's `pipelines`
    /// snapshot and in the `info` reader's `state` field (§4.D step 4,
    /// §4.F).
    pub fn to_snapshot_status(self) -> SnapshotStatus {
        match self {
            PipelineState::Pending => SnapshotStatus::Queued,
            PipelineState::Running => SnapshotStatus::InProgress,
            PipelineState::Success => SnapshotStatus::Succeeded,
            PipelineState::Failed => SnapshotStatus::Failed,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PipelineState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PipelineState::Pending),
            "running" => Ok(PipelineState::Running),
            "success" => Ok(PipelineState::Success),
            "failed" => Ok(PipelineState::Failed),
            other => Err(format!("unknown pipeline state: {other}")),
        }
    }
}

/// A `DatasetRevision`'s status is the same four-value enum as a
/// pipeline's (§4.B never produces anything else); kept as a distinct
/// alias so call sites read as "flow status" rather than "pipeline
/// status" where that distinction matters.
pub type FlowStatus = PipelineState;

/// The upper-case projection stored in a revision's `pipelines`
/// snapshot (§3, §4.D step 4) and returned by the info reader (§4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotStatus {
    #[serde(rename = "QUEUED")]
    Queued,
    #[serde(rename = "INPROGRESS")]
    InProgress,
    #[serde(rename = "SUCCEEDED")]
    Succeeded,
    #[serde(rename = "FAILED")]
    Failed,
}

impl fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SnapshotStatus::Queued => "QUEUED",
            SnapshotStatus::InProgress => "INPROGRESS",
            SnapshotStatus::Succeeded => "SUCCEEDED",
            SnapshotStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// §4.B `check_flow_status`: classify the presence of each pipeline
/// state among a flow's pipelines into the aggregate flow status.
/// A pure function of the four presence booleans — callers gather
/// these from whatever storage backs the registry.
pub fn aggregate_flow_status(
    any_running: bool,
    any_pending: bool,
    any_success: bool,
    any_failed: bool,
) -> FlowStatus {
    if any_running {
        return FlowStatus::Running;
    }
    if any_pending {
        return if any_success || any_failed {
            FlowStatus::Running
        } else {
            FlowStatus::Pending
        };
    }
    if any_failed {
        return FlowStatus::Failed;
    }
    FlowStatus::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_dominates() {
        assert_eq!(aggregate_flow_status(true, true, true, true), FlowStatus::Running);
    }

    #[test]
    fn mixed_pending_and_done_is_running() {
        assert_eq!(aggregate_flow_status(false, true, true, false), FlowStatus::Running);
        assert_eq!(aggregate_flow_status(false, true, false, true), FlowStatus::Running);
    }

    #[test]
    fn pure_pending() {
        assert_eq!(aggregate_flow_status(false, true, false, false), FlowStatus::Pending);
    }

    #[test]
    fn failed_with_no_pending() {
        assert_eq!(aggregate_flow_status(false, false, true, true), FlowStatus::Failed);
        assert_eq!(aggregate_flow_status(false, false, false, true), FlowStatus::Failed);
    }

    #[test]
    fn success_only_or_empty() {
        assert_eq!(aggregate_flow_status(false, false, true, false), FlowStatus::Success);
        assert_eq!(aggregate_flow_status(false, false, false, false), FlowStatus::Success);
    }
}
