//! §3 Data model: `Dataset`, `DatasetRevision`, `Pipeline`, and the
//! typed views into their otherwise-opaque JSON blobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::status::{PipelineState, SnapshotStatus};

/// A logical job owned by a user. `identifier` is `"<owner>/<dataset_name>"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub identifier: String,
    pub owner: String,
    pub spec: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub certified: bool,
}

/// One submission of a dataset. `revision_id` is `"<dataset_identifier>/<revision>"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRevision {
    pub revision_id: String,
    pub dataset_id: String,
    pub revision: i64,
    pub status: PipelineState,
    pub errors: Value,
    pub stats: Value,
    pub logs: Value,
    /// pipeline_id -> snapshot, the materialized view that outlives the
    /// pipeline rows once the flow reaches a terminal status.
    pub pipelines: std::collections::BTreeMap<String, PipelineSnapshot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One node in a flow's execution graph, for one revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub pipeline_id: String,
    pub flow_id: String,
    pub title: Option<String>,
    pub pipeline_details: Value,
    pub status: PipelineState,
    pub errors: Value,
    pub stats: Value,
    pub logs: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pipeline {
    /// Parses the typed view of `pipeline_details` used by the cascade
    /// (§4.D step 2): the `dependencies` list. Unknown/absent fields are
    /// treated as "no dependencies" rather than an error — `pipeline_details`
    /// is otherwise opaque.
    pub fn dependencies(&self) -> Vec<Dependency> {
        parse_dependencies(&self.pipeline_details)
    }
}

/// One entry of `pipeline_details.dependencies`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub pipeline: String,
}

pub fn parse_dependencies(details: &Value) -> Vec<Dependency> {
    details
        .get("dependencies")
        .and_then(|d| d.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|d| d.get("pipeline").and_then(|p| p.as_str()))
                .map(|p| Dependency { pipeline: strip_dot_slash(p).to_string() })
                .collect()
        })
        .unwrap_or_default()
}

/// Strips a single leading `"./"` prefix, per §3/§4.D's pipeline id
/// normalization rule. Applied uniformly wherever a pipeline id is
/// read from planner output, a callback, or a dependency reference.
pub fn strip_dot_slash(id: &str) -> &str {
    id.strip_prefix("./").unwrap_or(id)
}

/// `(pipeline_id, details)` as produced by the external Planner
/// (§6 Planner contract).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDetails {
    pub title: Option<String>,
    pub dependencies: Vec<Dependency>,
    /// Everything else the planner attached, round-tripped untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// The materialized per-pipeline entry inside a revision's `pipelines`
/// snapshot (§3, §4.D step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub title: Option<String>,
    pub status: SnapshotStatus,
    pub stats: Value,
    pub error_log: Value,
}

/// Polymorphic revision selector (§4.B `get_revision`, §9 design note):
/// a tagged variant instead of an overloaded `"latest" | "successful" | int`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionKey {
    Latest,
    Successful,
    Exact(i64),
}

/// Typed view into the fields of `Dataset.spec.meta` the core reads and
/// writes (§9 design note). Every other field of `spec` round-trips
/// untouched through the opaque `Value`.
#[derive(Debug, Clone, Default)]
pub struct SpecMeta {
    pub ownerid: Option<String>,
    pub owner: Option<String>,
    pub dataset: Option<String>,
    pub findability: Option<String>,
}

impl SpecMeta {
    pub fn from_spec(spec: &Value) -> Self {
        let meta = spec.get("meta");
        Self {
            ownerid: meta.and_then(|m| m.get("ownerid")).and_then(|v| v.as_str()).map(String::from),
            owner: meta.and_then(|m| m.get("owner")).and_then(|v| v.as_str()).map(String::from),
            dataset: meta.and_then(|m| m.get("dataset")).and_then(|v| v.as_str()).map(String::from),
            findability: meta.and_then(|m| m.get("findability")).and_then(|v| v.as_str()).map(String::from),
        }
    }
}

/// Sets `spec.meta.update_time` (and, when provided, `create_time`) in
/// place, mirroring `config.update_time_setter` from the original
/// implementation. `spec` must already contain a `meta` object; if it
/// doesn't, one is created.
pub fn set_spec_time_field(spec: &mut Value, field: &str, value: DateTime<Utc>) {
    if !spec.get("meta").map(|m| m.is_object()).unwrap_or(false) {
        if let Some(obj) = spec.as_object_mut() {
            obj.insert("meta".to_string(), Value::Object(serde_json::Map::new()));
        }
    }
    if let Some(meta) = spec.get_mut("meta").and_then(|m| m.as_object_mut()) {
        meta.insert(field.to_string(), Value::String(value.to_rfc3339()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_leading_dot_slash() {
        assert_eq!(strip_dot_slash("./foo"), "foo");
        assert_eq!(strip_dot_slash("foo"), "foo");
    }

    #[test]
    fn parses_dependencies_defaulting_to_empty() {
        let details = json!({"title": "x"});
        assert!(parse_dependencies(&details).is_empty());

        let details = json!({"dependencies": [{"pipeline": "./a"}, {"pipeline": "b"}]});
        let deps = parse_dependencies(&details);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].pipeline, "a");
        assert_eq!(deps[1].pipeline, "b");
    }

    #[test]
    fn spec_meta_reads_known_fields() {
        let spec = json!({"meta": {"ownerid": "me", "dataset": "id", "findability": "published"}});
        let meta = SpecMeta::from_spec(&spec);
        assert_eq!(meta.ownerid.as_deref(), Some("me"));
        assert_eq!(meta.dataset.as_deref(), Some("id"));
        assert_eq!(meta.findability.as_deref(), Some("published"));
    }

    #[test]
    fn sets_time_field_in_place() {
        let mut spec = json!({"meta": {"ownerid": "me"}});
        let now = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        set_spec_time_field(&mut spec, "update_time", now);
        assert_eq!(spec["meta"]["update_time"], json!(now.to_rfc3339()));
    }
}
