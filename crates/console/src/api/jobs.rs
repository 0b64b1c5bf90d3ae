use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rollcall_core::db::sqlite::SqliteRepository;
use rollcall_core::jobs::JobEngine;
use serde::Deserialize;

use super::{envelope, error_body, error_response};
use crate::AppState;

const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub limit: Option<i64>,
}

fn engine(state: &AppState) -> JobEngine<SqliteRepository> {
    JobEngine::new(state.repo.clone())
}

fn job_not_found(id: i64) -> Response {
    error_body(StatusCode::NOT_FOUND, format!("job {id} not found"))
}

/// Most recent jobs first.
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListJobsQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 500);
    match engine(&state).list_jobs(limit).await {
        Ok(jobs) => (StatusCode::OK, Json(envelope("jobs", jobs))).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_job(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Response {
    match engine(&state).get_job(id).await {
        Ok(Some(job)) => (StatusCode::OK, Json(envelope("job", job))).into_response(),
        Ok(None) => job_not_found(id),
        Err(e) => error_response(e),
    }
}

pub async fn delete_job(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Response {
    match engine(&state).delete_job(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => job_not_found(id),
        Err(e) => error_response(e),
    }
}
