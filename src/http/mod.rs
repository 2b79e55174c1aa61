//! Thin `axum` routing layer (§6): each handler extracts the request,
//! calls a core `flow-service` function, and serializes the result — no
//! business logic lives here, per `spec.md §1`'s non-goal on the HTTP
//! layer. Grounded in the wider pack's admin-HTTP style (see
//! `otap-dataflow`'s `admin` crate: a `Router` built from per-concern
//! route modules, a shared `Clone` `AppState`).

mod info;
mod update;
mod upload;

use std::sync::Arc;

use axum::Router;
use flow_service::{InfoReader, StatusReducer, SubmissionService};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub submission: Arc<SubmissionService>,
    pub reducer: Arc<StatusReducer>,
    pub info: Arc<InfoReader>,
}

/// Builds the full router, nested under `prefix` when non-empty
/// (`spec.md §6`: "mounted under a configurable prefix").
pub fn build_router(state: AppState, prefix: &str) -> Router {
    let routes = Router::new()
        .merge(upload::routes())
        .merge(update::routes())
        .merge(info::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if prefix.is_empty() || prefix == "/" {
        routes
    } else {
        Router::new().nest(prefix, routes)
    }
}
