//! `POST /update` (§6): the runner's status callback relayed over
//! HTTP. Body `{pipeline_id, event, success, errors, log, stats}`,
//! response `{status, id, errors[]}`.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/update", post(update))
}

#[derive(Debug, Deserialize)]
struct UpdateRequest {
    pipeline_id: String,
    event: String,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    errors: Option<Value>,
    #[serde(default)]
    stats: Option<Value>,
    #[serde(default, rename = "log")]
    logs: Option<Value>,
}

async fn update(State(state): State<AppState>, Json(req): Json<UpdateRequest>) -> Json<flow_service::ReducerOutcome> {
    Json(
        state
            .reducer
            .apply(&req.pipeline_id, &req.event, req.success, req.errors, req.stats, req.logs, Utc::now())
            .await,
    )
}
