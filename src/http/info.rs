//! `GET /<owner>/<dataset>/<revision>` (§6, §4.F): `revision` is an
//! integer, `"latest"`, or `"successful"`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use flow_domain::RevisionKey;
use flow_service::{DatasetInfo, ServiceError};

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/:owner/:dataset/:revision", get(info))
}

fn parse_revision_key(raw: &str) -> RevisionKey {
    match raw {
        "latest" => RevisionKey::Latest,
        "successful" => RevisionKey::Successful,
        other => other.parse::<i64>().map(RevisionKey::Exact).unwrap_or(RevisionKey::Latest),
    }
}

async fn info(
    State(state): State<AppState>,
    Path((owner, dataset, revision)): Path<(String, String, String)>,
) -> Result<Json<DatasetInfo>, StatusCode> {
    let which = parse_revision_key(&revision);
    state.info.info(&owner, &dataset, which).map(Json).map_err(|e| match e {
        ServiceError::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    })
}
