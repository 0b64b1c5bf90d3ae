use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rollcall_core::membership::MembershipService;
use serde::Deserialize;

use super::{error_body, error_response};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    pub github_login: String,
}

/// `POST /records/:id/invite`
pub async fn invite(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<InviteRequest>,
) -> Response {
    let login = body.github_login.trim();
    if login.is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "githubLogin is required");
    }
    let service = MembershipService::new(state.repo.clone(), state.org_client.clone());
    match service.invite(&id, login).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => error_response(e),
    }
}
