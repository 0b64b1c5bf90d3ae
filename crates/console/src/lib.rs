//! Rollcall Console: webhook endpoint and JSON admin API served over axum.

pub mod api;
pub mod webhook;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use rollcall_core::config::RollcallConfig;
use rollcall_core::db::sqlite::SqliteRepository;
use rollcall_core::org::OrgClient;
use tower_http::trace::TraceLayer;

/// Shared application state for all console routes.
pub struct AppState {
    pub repo: Arc<SqliteRepository>,
    pub config: RollcallConfig,
    pub org_client: Arc<dyn OrgClient>,
}

/// Build the console router with all routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/github", post(webhook::github_webhook))
        .merge(api::api_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
