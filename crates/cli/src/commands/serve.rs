use std::sync::Arc;

use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info};

use super::{load_config, open_repository, org_client};

/// Run the `serve` command: start the webhook endpoint and admin API.
pub async fn run(config_path: &str, port: u16) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let repo = open_repository(&config).await?;

    if config.github.token.is_none() {
        info!("No GitHub token configured; invitations and audits will be unauthenticated");
    }

    let state = Arc::new(rollcall_console::AppState {
        repo,
        org_client: org_client(&config),
        config,
    });
    let app = rollcall_console::router(state)
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    println!("Rollcall listening on http://{}", addr);
    info!("Starting server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
