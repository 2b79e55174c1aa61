//! `POST /upload` (§6): header `auth-token` or query `jwt`, a JSON spec
//! body, `{success, dataset_id, flow_id, errors[]}` response.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use std::collections::HashMap;

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/upload", post(upload))
}

fn extract_token(headers: &HeaderMap, params: &HashMap<String, String>) -> String {
    headers
        .get("auth-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| params.get("jwt").cloned())
        .unwrap_or_default()
}

async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Json<flow_service::UploadOutcome> {
    let token = extract_token(&headers, &params);
    let contents = if body.is_empty() { None } else { serde_json::from_slice(&body).ok() };
    Json(state.submission.upload(&token, contents, Utc::now()).await)
}
