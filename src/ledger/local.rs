//! One JSON file per job under `jobs/`, protected by an in-process mutex;
//! writes are full-file replacements under a temporary-name + rename
//! discipline to avoid torn reads (spec §4.2).

use super::{JobStatusStore, LedgerError, Result};
use crate::model::{JobStatus, JobStatusRecord};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub struct LocalJobStatusStore {
    root: PathBuf,
    // Guards the read-modify-write cycle for every job file. The spec
    // describes "an in-process mutex"; a single mutex is sufficient since
    // the bus bounds concurrent handlers per topic to one (§4.3).
    write_lock: Mutex<()>,
}

impl LocalJobStatusStore {
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, job_id: &str) -> PathBuf {
        self.root.join(format!("{job_id}.json"))
    }

    async fn read(&self, job_id: &str) -> Result<Option<JobStatusRecord>> {
        let path = self.path_for(job_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LedgerError::Io(e)),
        }
    }

    /// Full-file replacement via temp-name + rename, avoiding torn reads
    /// for any concurrent reader (spec §4.2).
    async fn write(&self, job_id: &str, record: &JobStatusRecord) -> Result<()> {
        let path = self.path_for(job_id);
        let tmp_path = self.root.join(format!("{job_id}.json.tmp"));
        let bytes = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl JobStatusStore for LocalJobStatusStore {
    async fn create(&self, job_id: &str) -> Result<JobStatusRecord> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();
        let record = match self.read(job_id).await? {
            Some(mut existing) => {
                existing.updated_at = now;
                existing
            }
            None => JobStatusRecord::new(job_id, now),
        };
        self.write(job_id, &record).await?;
        Ok(record)
    }

    async fn update_status(&self, job_id: &str, status: JobStatus, message: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut record = self
            .read(job_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(job_id.to_string()))?;
        record.status = status;
        record.status_message = message.to_string();
        record.updated_at = Utc::now();
        self.write(job_id, &record).await
    }

    async fn update_completion(
        &self,
        job_id: &str,
        template_key: &str,
        context_key: &str,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut record = self
            .read(job_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(job_id.to_string()))?;
        let now = Utc::now();
        record.status = JobStatus::Complete;
        record.status_message = "Job complete".to_string();
        record.template_json_key = Some(template_key.to_string());
        record.context_json_key = Some(context_key.to_string());
        record.completed_at = Some(now);
        record.updated_at = now;
        self.write(job_id, &record).await
    }

    async fn update_error(&self, job_id: &str, error_message: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut record = self
            .read(job_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(job_id.to_string()))?;
        record.status = JobStatus::Failed;
        record.error_message = Some(error_message.to_string());
        record.updated_at = Utc::now();
        self.write(job_id, &record).await
    }

    async fn get(&self, job_id: &str) -> Result<Option<JobStatusRecord>> {
        self.read(job_id).await
    }
}
