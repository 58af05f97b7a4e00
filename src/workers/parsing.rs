//! Parsing worker (C6, spec §4.4.2): dispatches to the format-specific
//! structural extractor, persists the `ParseResult`, and hands off to
//! analysis.

use async_trait::async_trait;
use std::sync::Arc;

use crate::ledger::JobStatusStore;
use crate::model::{self, AnalysisJob, JobRequest, JobStatus};
use crate::parsing::{self, ParseInput};
use crate::queue::{MessageBus, MessageHandler};
use crate::storage::DocumentStore;

pub struct ParsingHandler {
    store: Arc<dyn DocumentStore>,
    ledger: Arc<dyn JobStatusStore>,
    bus: Arc<dyn MessageBus>,
}

impl ParsingHandler {
    pub fn new(store: Arc<dyn DocumentStore>, ledger: Arc<dyn JobStatusStore>, bus: Arc<dyn MessageBus>) -> Self {
        Self { store, ledger, bus }
    }

    async fn run(&self, request: JobRequest) -> Result<(), String> {
        self.ledger
            .update_status(&request.job_id, JobStatus::ParsingInProgress, "Parsing document structure...")
            .await
            .map_err(|e| e.to_string())?;

        let input = match (&request.file_path, &request.document_url) {
            (Some(file_path), _) => {
                let bytes = self.store.download(file_path).await.map_err(|e| e.to_string())?;
                ParseInput::Bytes(bytes)
            }
            (None, Some(url)) => ParseInput::Url(url.clone()),
            (None, None) => return Err("job request has neither a file path nor a document URL".to_string()),
        };

        let handler = parsing::handler_for(request.document_type);
        let parse_result = match handler.parse(&request.job_id, input, self.store.as_ref()).await {
            Ok(result) => result,
            Err(e) => {
                self.ledger
                    .update_error(&request.job_id, &format!("Parsing error: {e}"))
                    .await
                    .map_err(|e| e.to_string())?;
                return Ok(());
            }
        };

        let parse_result_key = model::keys::parse_result(&request.job_id);
        let payload = serde_json::to_vec(&parse_result).map_err(|e| e.to_string())?;
        self.store
            .upload(&parse_result_key, payload, "application/json")
            .await
            .map_err(|e| e.to_string())?;

        self.ledger
            .update_status(&request.job_id, JobStatus::AnalysisInProgress, "Document parsed, sent to analysis")
            .await
            .map_err(|e| e.to_string())?;

        let analysis_job = AnalysisJob {
            job_id: request.job_id.clone(),
            parse_result_key,
            document_type: request.document_type,
        };
        let payload = serde_json::to_vec(&analysis_job).map_err(|e| e.to_string())?;
        self.bus
            .publish(model::topics::ANALYSIS_JOBS, &payload)
            .await
            .map_err(|e| e.to_string())?;

        Ok(())
    }
}

#[async_trait]
impl MessageHandler for ParsingHandler {
    async fn handle(&self, payload: Vec<u8>) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let request: JobRequest = serde_json::from_slice(&payload)?;
        let job_id = request.job_id.clone();
        if let Err(e) = self.run(request).await {
            tracing::error!(job_id, error = %e, stage = "parsing", "parsing worker failed, marking job as errored");
            let _ = self.ledger.update_error(&job_id, &format!("Parsing error: {e}")).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::local::LocalJobStatusStore;
    use crate::model::{self as m, DocumentType};
    use crate::queue::local::LocalFileQueue;
    use crate::storage::local::LocalObjectStore;
    use chrono::Utc;
    use std::time::Duration;

    #[tokio::test]
    async fn malformed_document_marks_job_failed_without_publishing() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn DocumentStore> =
            Arc::new(LocalObjectStore::new(dir.path().join("storage"), "http://localhost:8080").unwrap());
        let ledger: Arc<dyn JobStatusStore> = Arc::new(LocalJobStatusStore::new(dir.path().join("ledger")).unwrap());
        let bus: Arc<dyn MessageBus> =
            Arc::new(LocalFileQueue::new(dir.path().join("queues"), Duration::from_millis(20)).unwrap());

        let job_id = "job-bad-docx".to_string();
        ledger.create(&job_id).await.unwrap();
        let key = m::keys::document(&job_id, "bad.docx");
        store.upload(&key, b"not a zip".to_vec(), "application/octet-stream").await.unwrap();

        let handler = ParsingHandler::new(store, ledger.clone(), bus);
        let request = JobRequest {
            job_id: job_id.clone(),
            document_type: DocumentType::Docx,
            file_path: Some(key),
            document_url: None,
            file_name: Some("bad.docx".to_string()),
            created_at: Utc::now(),
        };
        handler.run(request).await.unwrap();

        let record = ledger.get(&job_id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.error_message.unwrap().starts_with("Parsing error:"));
    }
}
