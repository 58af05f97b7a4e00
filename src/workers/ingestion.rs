//! Ingestion worker (C5, spec §4.4.1): confirms the uploaded bytes or
//! document URL are reachable, then forwards the job unchanged to parsing.

use async_trait::async_trait;
use std::sync::Arc;

use crate::api::validation::validate_document_url;
use crate::ledger::JobStatusStore;
use crate::model::{self, JobRequest, JobStatus};
use crate::queue::{MessageBus, MessageHandler};
use crate::storage::DocumentStore;

pub struct IngestionHandler {
    store: Arc<dyn DocumentStore>,
    ledger: Arc<dyn JobStatusStore>,
    bus: Arc<dyn MessageBus>,
}

impl IngestionHandler {
    pub fn new(store: Arc<dyn DocumentStore>, ledger: Arc<dyn JobStatusStore>, bus: Arc<dyn MessageBus>) -> Self {
        Self { store, ledger, bus }
    }

    async fn run(&self, request: JobRequest) -> Result<(), String> {
        self.ledger
            .update_status(&request.job_id, JobStatus::Processing, "Document ingestion in progress")
            .await
            .map_err(|e| e.to_string())?;

        if let Some(file_path) = &request.file_path {
            if self.store.download(file_path).await.is_err() {
                self.ledger
                    .update_error(&request.job_id, "Document file not found")
                    .await
                    .map_err(|e| e.to_string())?;
                return Ok(());
            }
        } else if let Some(url) = &request.document_url {
            if validate_document_url(url).is_err() {
                self.ledger
                    .update_error(&request.job_id, "Document URL is not a valid absolute http/https URL")
                    .await
                    .map_err(|e| e.to_string())?;
                return Ok(());
            }
        }

        self.ledger
            .update_status(&request.job_id, JobStatus::ParsingInProgress, "Document validated, sent to parsing")
            .await
            .map_err(|e| e.to_string())?;

        let payload = serde_json::to_vec(&request).map_err(|e| e.to_string())?;
        self.bus
            .publish(model::topics::PARSING_JOBS, &payload)
            .await
            .map_err(|e| e.to_string())?;

        Ok(())
    }
}

#[async_trait]
impl MessageHandler for IngestionHandler {
    async fn handle(&self, payload: Vec<u8>) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let request: JobRequest = serde_json::from_slice(&payload)?;
        let job_id = request.job_id.clone();
        if let Err(e) = self.run(request).await {
            tracing::error!(job_id, error = %e, stage = "ingestion", "ingestion worker failed, marking job as errored");
            let _ = self.ledger.update_error(&job_id, &format!("Ingestion error: {e}")).await;
        }
        Ok(())
    }
}
