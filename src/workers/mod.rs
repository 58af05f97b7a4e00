//! Pipeline worker binaries (C5-C7, spec §4.4): each binds exactly one
//! topic to its handler via the configured `MessageBus` and runs until a
//! shutdown signal arrives. One process per stage, matching the spec's
//! "parallel OS-level processes host each worker" scheduling model (§5).

pub mod analysis;
pub mod ingestion;
pub mod parsing;

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::model::topics;
use crate::queue::MessageHandler;

/// Which pipeline stage a worker process should run. Matches one topic
/// each (spec §4.3): `job-requests`, `parsing-jobs`, `analysis-jobs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum WorkerStage {
    Ingestion,
    Parsing,
    Analysis,
}

impl WorkerStage {
    fn topic(self) -> &'static str {
        match self {
            WorkerStage::Ingestion => topics::JOB_REQUESTS,
            WorkerStage::Parsing => topics::PARSING_JOBS,
            WorkerStage::Analysis => topics::ANALYSIS_JOBS,
        }
    }
}

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Builds backends for `config`, binds the handler for `stage` to its
/// topic, and blocks until Ctrl+C/SIGTERM, then cancels the consume loop
/// so the in-flight message (if any) is not acked (spec §5 "Cancellation
/// & timeouts").
pub async fn run(config: Config, stage: WorkerStage) -> Result<(), AnyError> {
    let (store, ledger, bus) = crate::api::build_backends(&config).await?;

    let handler: Arc<dyn MessageHandler> = match stage {
        WorkerStage::Ingestion => Arc::new(ingestion::IngestionHandler::new(
            store.clone(),
            ledger.clone(),
            bus.clone(),
        )),
        WorkerStage::Parsing => Arc::new(parsing::ParsingHandler::new(
            store.clone(),
            ledger.clone(),
            bus.clone(),
        )),
        WorkerStage::Analysis => Arc::new(analysis::AnalysisHandler::new(store.clone(), ledger.clone())),
    };

    let topic = stage.topic();
    info!(?stage, topic, "worker starting consume loop");
    let consume = bus.start_consume(topic, handler).await?;

    shutdown_signal().await;
    info!(?stage, "shutdown signal received, cancelling consume loop");
    consume.cancel().await;
    bus.stop_all().await;

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
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
