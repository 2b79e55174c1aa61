//! §6 Planner contract: `plan(revision, spec, allowed_types) -> [(pipeline_id, details)]`.

use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct PlannedPipeline {
    pub pipeline_id: String,
    pub details: Value,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlannerError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unexpected(String),
}

pub trait Planner: Send + Sync {
    fn plan(&self, revision: i64, spec: &Value, allowed_types: &HashSet<String>) -> Result<Vec<PlannedPipeline>, PlannerError>;
}

/// Reads a `pipelines` array straight out of the submitted spec instead
/// of computing a real dependency graph from `allowed_types`, so
/// callers can exercise submission/reducer end to end without a real
/// planning service behind it (§4.C.1).
#[derive(Default)]
pub struct EchoPlanner;

impl Planner for EchoPlanner {
    fn plan(&self, _revision: i64, spec: &Value, _allowed_types: &HashSet<String>) -> Result<Vec<PlannedPipeline>, PlannerError> {
        match spec.get("pipelines") {
            None | Some(Value::Null) => Ok(vec![PlannedPipeline {
                pipeline_id: "default".to_string(),
                details: serde_json::json!({"title": "default"}),
            }]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    let id = item
                        .get("pipeline_id")
                        .or_else(|| item.get("id"))
                        .and_then(Value::as_str)
                        .ok_or_else(|| PlannerError::Validation("pipeline entry missing id".to_string()))?;
                    Ok(PlannedPipeline { pipeline_id: id.to_string(), details: item.clone() })
                })
                .collect(),
            Some(_) => Err(PlannerError::Validation("pipelines must be an array".to_string())),
        }
    }
}
