//! Course, roster and import endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use rollcall_core::connectors::{CsvRosterSource, GradebookRosterSource, RosterSource};
use rollcall_core::db::repository::{CourseRepository, RosterRepository};
use rollcall_core::db::sqlite::SqliteRepository;
use rollcall_core::membership::MembershipService;
use rollcall_core::models::course::Course;
use rollcall_core::models::roster::{RosterKind, RosterRow};
use rollcall_core::sync::{ImportOutcome, ManualEntry, SyncOrchestrator};
use serde::Deserialize;
use serde_json::json;

use super::{actor, envelope, error_body, error_response};
use crate::AppState;

fn orchestrator(state: &AppState) -> SyncOrchestrator<SqliteRepository> {
    SyncOrchestrator::new(state.repo.clone(), state.org_client.clone())
}

fn course_not_found(id: &str) -> Response {
    error_body(StatusCode::NOT_FOUND, format!("course '{id}' not found"))
}

fn import_response(outcome: ImportOutcome) -> Response {
    match outcome {
        ImportOutcome::Applied(summary) => {
            (StatusCode::OK, Json(envelope("summary", summary))).into_response()
        }
        ImportOutcome::Rejected(rows) => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": format!("{} rows could not be matched unambiguously", rows.len()),
                "rejected": rows,
            })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourse {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub gradebook_course_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCourse {
    pub external_org_ref: String,
    pub installation_ref: String,
}

pub async fn list_courses(State(state): State<Arc<AppState>>) -> Response {
    match state.repo.list_courses().await {
        Ok(courses) => (StatusCode::OK, Json(envelope("courses", courses))).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn create_course(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateCourse>,
) -> Response {
    let id = body.id.trim();
    if id.is_empty() || body.name.trim().is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "course id and name are required");
    }
    match state.repo.get_course(id).await {
        Ok(Some(_)) => {
            return error_body(StatusCode::CONFLICT, format!("course '{id}' already exists"))
        }
        Ok(None) => {}
        Err(e) => return error_response(e),
    }

    let mut course = Course::new(id, body.name.trim());
    course.gradebook_course_id = body.gradebook_course_id.filter(|g| !g.is_empty());
    match state.repo.upsert_course(&course).await {
        Ok(()) => (StatusCode::CREATED, Json(envelope("course", course))).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_course(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.repo.get_course(&id).await {
        Ok(Some(course)) => (StatusCode::OK, Json(envelope("course", course))).into_response(),
        Ok(None) => course_not_found(&id),
        Err(e) => error_response(e),
    }
}

pub async fn link_course(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<LinkCourse>,
) -> Response {
    if body.external_org_ref.is_empty() || body.installation_ref.is_empty() {
        return error_body(
            StatusCode::BAD_REQUEST,
            "externalOrgRef and installationRef are required",
        );
    }
    match state
        .repo
        .set_org_link(&id, &body.external_org_ref, &body.installation_ref)
        .await
    {
        Ok(true) => get_course(State(state), Path(id)).await,
        Ok(false) => course_not_found(&id),
        Err(e) => error_response(e),
    }
}

pub async fn unlink_course(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let service = MembershipService::new(state.repo.clone(), state.org_client.clone());
    match service.unlink(&id).await {
        Ok(course) => (StatusCode::OK, Json(envelope("course", course))).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn audit_course(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    match orchestrator(&state).audit_course(&id, &actor(&headers)).await {
        Ok(job) => (StatusCode::ACCEPTED, Json(envelope("job", job))).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn list_roster(
    State(state): State<Arc<AppState>>,
    Path((id, kind)): Path<(String, RosterKind)>,
) -> Response {
    match state.repo.get_course(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => return course_not_found(&id),
        Err(e) => return error_response(e),
    }
    match state.repo.list_records(&id, kind).await {
        Ok(records) => (StatusCode::OK, Json(envelope("records", records))).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn add_manual_record(
    State(state): State<Arc<AppState>>,
    Path((id, kind)): Path<(String, RosterKind)>,
    Json(row): Json<RosterRow>,
) -> Response {
    match orchestrator(&state).add_manual_record(&id, kind, &row).await {
        Ok(ManualEntry::Saved(record)) => {
            (StatusCode::CREATED, Json(envelope("record", record))).into_response()
        }
        Ok(ManualEntry::Rejected(rejected)) => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "record could not be matched unambiguously",
                "rejected": [rejected],
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn import_csv(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((id, kind)): Path<(String, RosterKind)>,
    body: String,
) -> Response {
    let source = CsvRosterSource::from_bytes("upload.csv", body);
    run_import(&state, &id, kind, &source, &actor(&headers)).await
}

pub async fn import_gradebook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((id, kind)): Path<(String, RosterKind)>,
) -> Response {
    let gradebook = &state.config.gradebook;
    if !gradebook.enabled {
        return error_body(
            StatusCode::BAD_REQUEST,
            "gradebook integration is not enabled",
        );
    }
    let course = match state.repo.get_course(&id).await {
        Ok(Some(course)) => course,
        Ok(None) => return course_not_found(&id),
        Err(e) => return error_response(e),
    };
    let Some(remote_id) = course.gradebook_course_id.as_deref() else {
        return error_body(
            StatusCode::BAD_REQUEST,
            format!("course '{id}' has no gradebook course id"),
        );
    };

    let source = GradebookRosterSource::new(&gradebook.base_url, &gradebook.api_token, remote_id, kind);
    run_import(&state, &id, kind, &source, &actor(&headers)).await
}

async fn run_import(
    state: &AppState,
    course_id: &str,
    kind: RosterKind,
    source: &dyn RosterSource,
    created_by: &str,
) -> Response {
    match orchestrator(state)
        .import_from(course_id, kind, source, created_by)
        .await
    {
        Ok(outcome) => import_response(outcome),
        Err(e) => error_response(e),
    }
}
