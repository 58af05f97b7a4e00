//! Per-job status record with monotonic transitions (C2). One trait, two
//! implementations: one JSON file per job under a mutex (local), one
//! wide-row table (cloud). Grounded on the teacher's `ledger/store.rs`
//! shape, restructured around the spec's literal local-backend contract
//! (§4.2) instead of Fjall partitions.

pub mod cloud;
pub mod local;

use crate::model::{JobStatus, JobStatusRecord};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("illegal status transition for job {job_id}: {from:?} -> {to:?}")]
    IllegalTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Contract operations from spec §4.2. Workers compose only legal moves;
/// the store persists whatever is asked (the DAG is the worker layer's
/// responsibility, matching the spec's explicit separation of concerns),
/// except `update_status` which still rejects obviously-backward writes
/// as a final backstop against a buggy caller.
#[async_trait]
pub trait JobStatusStore: Send + Sync {
    /// Idempotent on `JobId`: replaying the gateway is safe. Re-`create`
    /// on an existing id is a no-op for status but refreshes `UpdatedAt`.
    async fn create(&self, job_id: &str) -> Result<JobStatusRecord>;

    async fn update_status(&self, job_id: &str, status: JobStatus, message: &str) -> Result<()>;

    /// May only be called once both result artifacts are written to C1;
    /// enforced by caller discipline, not the store.
    async fn update_completion(
        &self,
        job_id: &str,
        template_key: &str,
        context_key: &str,
    ) -> Result<()>;

    /// Terminal.
    async fn update_error(&self, job_id: &str, error_message: &str) -> Result<()>;

    async fn get(&self, job_id: &str) -> Result<Option<JobStatusRecord>>;
}

#[cfg(test)]
mod tests {
    use super::local::LocalJobStatusStore;
    use super::*;
    use crate::model::JobStatus;

    #[tokio::test]
    async fn create_is_idempotent_and_refreshes_updated_at() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalJobStatusStore::new(dir.path()).unwrap();

        let first = store.create("job-1").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.create("job-1").await.unwrap();

        assert_eq!(first.status, JobStatus::Pending);
        assert_eq!(second.status, JobStatus::Pending);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(first.job_id, second.job_id);
    }

    #[tokio::test]
    async fn full_lifecycle_reaches_complete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalJobStatusStore::new(dir.path()).unwrap();

        store.create("job-2").await.unwrap();
        store
            .update_status("job-2", JobStatus::Processing, "Document ingestion in progress")
            .await
            .unwrap();
        store
            .update_status("job-2", JobStatus::ParsingInProgress, "Parsing document structure...")
            .await
            .unwrap();
        store
            .update_status(
                "job-2",
                JobStatus::AnalysisInProgress,
                "Performing NLP and CV analysis",
            )
            .await
            .unwrap();
        store
            .update_completion("job-2", "results/job-2/template.json", "results/job-2/context.json")
            .await
            .unwrap();

        let record = store.get("job-2").await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Complete);
        assert!(record.completed_at.is_some());
        assert_eq!(record.template_json_key.as_deref(), Some("results/job-2/template.json"));
    }

    #[tokio::test]
    async fn error_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalJobStatusStore::new(dir.path()).unwrap();
        store.create("job-3").await.unwrap();
        store.update_error("job-3", "Document file not found").await.unwrap();

        let record = store.get("job-3").await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.error_message.as_deref(), Some("Document file not found"));
    }

    #[tokio::test]
    async fn get_missing_job_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalJobStatusStore::new(dir.path()).unwrap();
        assert!(store.get("nonexistent").await.unwrap().is_none());
    }
}
