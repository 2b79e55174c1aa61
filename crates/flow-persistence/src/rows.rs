//! Diesel row structs and the conversions to/from `flow_domain` types.
//! JSON columns round-trip through `serde_json::to_string`/`from_str`;
//! timestamp columns round-trip through Unix seconds.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use flow_domain::{Dataset, DatasetRevision, Pipeline, PipelineState};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::schema::{dataset, dataset_revision, pipelines};

fn to_ts(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

fn from_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}

fn to_json(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn from_json(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or(Value::Null)
}

#[derive(Debug, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = dataset)]
pub struct DatasetRow {
    pub identifier: String,
    pub owner: String,
    pub spec: String,
    pub created_at_ts: i64,
    pub updated_at_ts: i64,
    pub scheduled_for_ts: Option<i64>,
    pub certified: bool,
}

impl DatasetRow {
    pub fn from_domain(d: &Dataset) -> Self {
        Self {
            identifier: d.identifier.clone(),
            owner: d.owner.clone(),
            spec: to_json(&d.spec),
            created_at_ts: to_ts(d.created_at),
            updated_at_ts: to_ts(d.updated_at),
            scheduled_for_ts: d.scheduled_for.map(to_ts),
            certified: d.certified,
        }
    }

    pub fn into_domain(self) -> Dataset {
        Dataset {
            identifier: self.identifier,
            owner: self.owner,
            spec: from_json(&self.spec),
            created_at: from_ts(self.created_at_ts),
            updated_at: from_ts(self.updated_at_ts),
            scheduled_for: self.scheduled_for_ts.map(from_ts),
            certified: self.certified,
        }
    }
}

#[derive(Debug, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = dataset_revision)]
pub struct DatasetRevisionRow {
    pub revision_id: String,
    pub dataset_id: String,
    pub revision: i64,
    pub status: String,
    pub errors: String,
    pub stats: String,
    pub logs: String,
    pub pipelines: String,
    pub created_at_ts: i64,
    pub updated_at_ts: i64,
}

impl DatasetRevisionRow {
    pub fn from_domain(r: &DatasetRevision) -> Self {
        Self {
            revision_id: r.revision_id.clone(),
            dataset_id: r.dataset_id.clone(),
            revision: r.revision,
            status: r.status.as_str().to_string(),
            errors: to_json(&r.errors),
            stats: to_json(&r.stats),
            logs: to_json(&r.logs),
            pipelines: serde_json::to_string(&r.pipelines).unwrap_or_else(|_| "{}".to_string()),
            created_at_ts: to_ts(r.created_at),
            updated_at_ts: to_ts(r.updated_at),
        }
    }

    pub fn into_domain(self) -> DatasetRevision {
        let pipelines: BTreeMap<String, flow_domain::PipelineSnapshot> =
            serde_json::from_str(&self.pipelines).unwrap_or_default();
        DatasetRevision {
            revision_id: self.revision_id,
            dataset_id: self.dataset_id,
            revision: self.revision,
            status: PipelineState::from_str(&self.status).unwrap_or(PipelineState::Pending),
            errors: from_json(&self.errors),
            stats: from_json(&self.stats),
            logs: from_json(&self.logs),
            pipelines,
            created_at: from_ts(self.created_at_ts),
            updated_at: from_ts(self.updated_at_ts),
        }
    }
}

#[derive(Debug, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = pipelines)]
pub struct PipelineRow {
    pub pipeline_id: String,
    pub flow_id: String,
    pub title: Option<String>,
    pub pipeline_details: String,
    pub status: String,
    pub errors: String,
    pub stats: String,
    pub logs: String,
    pub created_at_ts: i64,
    pub updated_at_ts: i64,
}

impl PipelineRow {
    pub fn from_domain(p: &Pipeline) -> Self {
        Self {
            pipeline_id: p.pipeline_id.clone(),
            flow_id: p.flow_id.clone(),
            title: p.title.clone(),
            pipeline_details: to_json(&p.pipeline_details),
            status: p.status.as_str().to_string(),
            errors: to_json(&p.errors),
            stats: to_json(&p.stats),
            logs: to_json(&p.logs),
            created_at_ts: to_ts(p.created_at),
            updated_at_ts: to_ts(p.updated_at),
        }
    }

    pub fn into_domain(self) -> Pipeline {
        Pipeline {
            pipeline_id: self.pipeline_id,
            flow_id: self.flow_id,
            title: self.title,
            pipeline_details: from_json(&self.pipeline_details),
            status: PipelineState::from_str(&self.status).unwrap_or(PipelineState::Pending),
            errors: from_json(&self.errors),
            stats: from_json(&self.stats),
            logs: from_json(&self.logs),
            created_at: from_ts(self.created_at_ts),
            updated_at: from_ts(self.updated_at_ts),
        }
    }
}
