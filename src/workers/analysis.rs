//! Analysis worker (C7, spec §4.4.3): loads a `ParseResult`, runs the
//! linguistic and CV analysis stages, and marks the job complete.

use async_trait::async_trait;
use std::sync::Arc;

use crate::analysis;
use crate::ledger::JobStatusStore;
use crate::model::{self, AnalysisJob, JobStatus, ParseResult};
use crate::queue::MessageHandler;
use crate::storage::DocumentStore;

pub struct AnalysisHandler {
    store: Arc<dyn DocumentStore>,
    ledger: Arc<dyn JobStatusStore>,
}

impl AnalysisHandler {
    pub fn new(store: Arc<dyn DocumentStore>, ledger: Arc<dyn JobStatusStore>) -> Self {
        Self { store, ledger }
    }

    async fn run(&self, job: AnalysisJob) -> Result<(), String> {
        self.ledger
            .update_status(&job.job_id, JobStatus::AnalysisInProgress, "Performing NLP and CV analysis")
            .await
            .map_err(|e| e.to_string())?;

        let raw = self.store.download(&job.parse_result_key).await.map_err(|e| e.to_string())?;
        let parse_result: ParseResult = serde_json::from_slice(&raw).map_err(|e| e.to_string())?;

        let (template_json, context_json) = analysis::analyze(&job.job_id, parse_result, self.store.as_ref())
            .await
            .map_err(|e| e.to_string())?;

        let template_key = model::keys::template_json(&job.job_id);
        let context_key = model::keys::context_json(&job.job_id);

        let template_bytes = serde_json::to_vec(&template_json).map_err(|e| e.to_string())?;
        let context_bytes = serde_json::to_vec(&context_json).map_err(|e| e.to_string())?;

        self.store
            .upload(&template_key, template_bytes, "application/json")
            .await
            .map_err(|e| e.to_string())?;
        self.store
            .upload(&context_key, context_bytes, "application/json")
            .await
            .map_err(|e| e.to_string())?;

        self.ledger
            .update_completion(&job.job_id, &template_key, &context_key)
            .await
            .map_err(|e| e.to_string())?;

        Ok(())
    }
}

#[async_trait]
impl MessageHandler for AnalysisHandler {
    async fn handle(&self, payload: Vec<u8>) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let job: AnalysisJob = serde_json::from_slice(&payload)?;
        let job_id = job.job_id.clone();
        if let Err(e) = self.run(job).await {
            tracing::error!(job_id, error = %e, stage = "analysis", "analysis worker failed, marking job as errored");
            let _ = self.ledger.update_error(&job_id, &format!("Analysis error: {e}")).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::local::LocalJobStatusStore;
    use crate::model::{ContentSection, DocumentType, SectionHierarchy, TemplateJson, VisualTheme};

    #[tokio::test]
    async fn completes_the_job_and_writes_both_result_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn DocumentStore> = Arc::new(
            crate::storage::local::LocalObjectStore::new(dir.path().join("storage"), "http://localhost:8080").unwrap(),
        );
        let ledger: Arc<dyn JobStatusStore> = Arc::new(LocalJobStatusStore::new(dir.path().join("ledger")).unwrap());

        let job_id = "job-analyze".to_string();
        ledger.create(&job_id).await.unwrap();

        let parse_result = ParseResult {
            template_json: TemplateJson {
                visual_theme: VisualTheme::default(),
                section_hierarchy: SectionHierarchy { sections: Vec::new() },
                logo_map: Vec::new(),
            },
            content_sections: vec![ContentSection {
                placeholder_id: "placeholder_section_1".to_string(),
                section_title: "Intro".to_string(),
                sample_text: "A calm and professional summary of the quarter.".to_string(),
                word_count: 8,
            }],
        };
        let parse_result_key = model::keys::parse_result(&job_id);
        store
            .upload(&parse_result_key, serde_json::to_vec(&parse_result).unwrap(), "application/json")
            .await
            .unwrap();

        let handler = AnalysisHandler::new(store.clone(), ledger.clone());
        let job = AnalysisJob { job_id: job_id.clone(), parse_result_key, document_type: DocumentType::Docx };
        handler.run(job).await.unwrap();

        let record = ledger.get(&job_id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Complete);
        assert!(record.template_json_key.is_some());
        assert!(record.context_json_key.is_some());
    }
}
