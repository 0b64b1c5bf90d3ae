//! `POST /webhooks/github`: signed organization events.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use rollcall_core::webhooks::WebhookProcessor;
use tracing::error;

use crate::AppState;

pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

pub async fn github_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let processor = WebhookProcessor::new(state.repo.clone(), state.config.github.webhook_secret.as_str());

    match processor.handle(&body, signature).await {
        Ok(reply) => {
            let status =
                StatusCode::from_u16(reply.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, reply.body().to_string())
        }
        Err(e) => {
            error!(error = %e, "webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            )
        }
    }
}
