use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::info;

use super::{
    services::{get_file, get_results, get_status, health, submit_job},
    state::AppState,
};
use crate::config::{Config, PlatformMode};
use crate::ledger::{JobStatusStore, cloud::CloudJobStatusStore, local::LocalJobStatusStore};
use crate::queue::{MessageBus, cloud::CloudMessageBus, local::LocalFileQueue};
use crate::storage::{DocumentStore, cloud::CloudObjectStore, local::LocalObjectStore};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Builds the three backend trait objects for the configured
/// `Platform:Mode`, shared by the gateway and every worker binary so all
/// processes agree on which storage/ledger/bus implementation is live.
pub async fn build_backends(
    config: &Config,
) -> Result<(Arc<dyn DocumentStore>, Arc<dyn JobStatusStore>, Arc<dyn MessageBus>), AnyError> {
    match config.platform.mode {
        PlatformMode::Dev => {
            let store = LocalObjectStore::new(&config.storage.root_path, &config.server.gateway_base_url)?;
            let ledger_root = config
                .storage
                .root_path
                .parent()
                .unwrap_or_else(|| std::path::Path::new("."))
                .join("ledger");
            let ledger = LocalJobStatusStore::new(&ledger_root)?;
            let bus = LocalFileQueue::new(
                &config.messaging.root_path,
                std::time::Duration::from_millis(config.messaging.poll_interval_ms),
            )?;
            Ok((Arc::new(store), Arc::new(ledger), Arc::new(bus)))
        }
        PlatformMode::Prod => {
            let storage_conn = config
                .azure
                .storage
                .connection_string
                .as_deref()
                .ok_or("Azure:Storage:ConnectionString is required in Prod")?;
            let bus_conn = config
                .azure
                .service_bus
                .connection_string
                .as_deref()
                .ok_or("Azure:ServiceBus:ConnectionString is required in Prod")?;

            let store = CloudObjectStore::new(storage_conn, &config.azure.storage.container_name)?;
            let ledger = CloudJobStatusStore::new(storage_conn).await?;
            let bus = CloudMessageBus::new(bus_conn);
            Ok((Arc::new(store), Arc::new(ledger), Arc::new(bus)))
        }
    }
}

/// Assembles the gateway's route table (spec §6, §4.9). Shared by `run`
/// and by integration tests, which drive it directly with `tower::
/// ServiceExt::oneshot` rather than binding a socket.
///
/// The body-limit layer is set well above `Server:MaxUploadBytes` so an
/// oversize submission reaches `validation::validate_file_size` and gets
/// the spec's documented 400 body (spec §8 scenario 5) instead of axum's
/// own 413 at the framework's 2 MiB default.
pub fn build_router(state: AppState) -> Router {
    let body_limit = (state.config.server.max_upload_bytes.as_u64() as usize)
        .saturating_mul(2)
        .max(16 * 1024 * 1024);

    Router::new()
        .route("/api/v1/jobs/submit", post(submit_job))
        .route("/api/v1/jobs/{job_id}/status", get(get_status))
        .route("/api/v1/jobs/{job_id}/results", get(get_results))
        .route("/api/v1/jobs/files/{*file_key}", get(get_file))
        .route("/health", get(health))
        .with_state(state)
        .layer(RequestDecompressionLayer::new())
        .layer(DefaultBodyLimit::max(body_limit))
}

pub async fn run(address: SocketAddr) -> Result<(), AnyError> {
    info!("loading configuration");
    let config = Config::load().map_err(|e| format!("failed to load config: {e}"))?;

    let (store, ledger, bus) = build_backends(&config).await?;
    let state = AppState::new(config, store, ledger, bus);
    let app = build_router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "document template & context engine gateway listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
