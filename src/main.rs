use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use queue_core::config::{api_base_url_from_env_value, duration_secs_from_env_value};
use queue_core::constants::{DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT};
use queue_core::{QueueConfig, QueueController, SessionContext};

/// Main entry point for the clinic queue service
///
/// Runs, until Ctrl-C:
/// - the queue poller, refreshing the controller's view from the clinic backend,
/// - the REST facade on port 3000 (configurable via QUEUE_REST_ADDR), with Swagger UI.
///
/// On shutdown the REST server drains, the controller is torn down so late store results
/// are discarded, and the poller is joined.
///
/// # Environment Variables
/// - `QUEUE_API_URL`: clinic backend base URL (default: "http://localhost:8000")
/// - `QUEUE_POLL_INTERVAL_SECS`: seconds between polls (default: 10)
/// - `QUEUE_REQUEST_TIMEOUT_SECS`: per-request timeout, at most the poll interval (default: 8)
/// - `QUEUE_SESSION_TOKEN`: staff session token sent to the backend (optional)
/// - `QUEUE_STAFF_ID`: staff identifier attached to command logs (optional)
/// - `QUEUE_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
///
/// # Returns
/// * `Ok(())` - If the service runs and shuts down cleanly
/// * `Err(anyhow::Error)` - If configuration is invalid or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic_queue_run=info".parse()?)
                .add_directive("queue_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let api_url = api_base_url_from_env_value(std::env::var("QUEUE_API_URL").ok());
    let poll_interval = duration_secs_from_env_value(
        "QUEUE_POLL_INTERVAL_SECS",
        std::env::var("QUEUE_POLL_INTERVAL_SECS").ok(),
        DEFAULT_POLL_INTERVAL,
    )?;
    let request_timeout = duration_secs_from_env_value(
        "QUEUE_REQUEST_TIMEOUT_SECS",
        std::env::var("QUEUE_REQUEST_TIMEOUT_SECS").ok(),
        DEFAULT_REQUEST_TIMEOUT,
    )?;
    let rest_addr = std::env::var("QUEUE_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(QueueConfig::new(api_url, poll_interval, request_timeout)?);
    let session = SessionContext::new(
        std::env::var("QUEUE_STAFF_ID").ok(),
        std::env::var("QUEUE_SESSION_TOKEN").ok(),
    );

    tracing::info!("++ Clinic queue backend at {}", cfg.api_base_url());
    tracing::info!("++ Starting clinic queue REST on {}", rest_addr);

    let controller = QueueController::with_http_store(cfg, session)?;
    let poller = controller.spawn_poller();

    let rest_app = api_rest::router(controller.clone());
    let listener = tokio::net::TcpListener::bind(&rest_addr)
        .await
        .with_context(|| format!("failed to bind REST address {rest_addr}"))?;
    axum::serve(listener, rest_app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    controller.shutdown();
    poller.shutdown().await;
    tracing::info!("-- Clinic queue stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {:?}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("-- Shutdown requested");
}
