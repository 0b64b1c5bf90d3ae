//! JSON admin API.
//!
//! Collections are wrapped as `{ "<entities>": [ ... ] }` and single entities
//! as `{ "<entity>": { ... } }`. Errors are `{ "error": "<message>" }`.

pub mod courses;
pub mod jobs;
pub mod records;

use std::sync::Arc;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rollcall_core::error::RollcallError;
use serde_json::{json, Value};
use tracing::error;

use crate::AppState;

/// Header naming the administrator for job attribution.
pub const ACTOR_HEADER: &str = "X-Rollcall-Actor";

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/courses", get(courses::list_courses).post(courses::create_course))
        .route("/courses/:id", get(courses::get_course))
        .route("/courses/:id/link", post(courses::link_course))
        .route("/courses/:id/unlink", post(courses::unlink_course))
        .route("/courses/:id/audit", post(courses::audit_course))
        .route(
            "/courses/:id/roster/:kind",
            get(courses::list_roster).post(courses::add_manual_record),
        )
        .route("/courses/:id/roster/:kind/csv", post(courses::import_csv))
        .route(
            "/courses/:id/roster/:kind/gradebook",
            post(courses::import_gradebook),
        )
        .route("/records/:id/invite", post(records::invite))
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/:id", get(jobs::get_job).delete(jobs::delete_job))
}

fn envelope(key: &str, value: impl serde::Serialize) -> Value {
    json!({ key: value })
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Map a core error onto an HTTP status.
fn error_response(e: RollcallError) -> Response {
    let status = match &e {
        RollcallError::NotFound(_) => StatusCode::NOT_FOUND,
        RollcallError::NotSetUp(_) | RollcallError::Import(_) | RollcallError::Config(_) => {
            StatusCode::BAD_REQUEST
        }
        RollcallError::InviteFailed(_) | RollcallError::Org(_) | RollcallError::Http(_) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %e, "request failed");
    }
    error_body(status, e.to_string())
}

fn actor(headers: &HeaderMap) -> String {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or("console")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_statuses() {
        let status = |e| error_response(e).status();
        assert_eq!(
            status(RollcallError::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(RollcallError::NotSetUp("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(RollcallError::InviteFailed("x".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(RollcallError::Job("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn actor_defaults_to_console() {
        let mut headers = HeaderMap::new();
        assert_eq!(actor(&headers), "console");
        headers.insert(ACTOR_HEADER, "prof".parse().unwrap());
        assert_eq!(actor(&headers), "prof");
    }
}
