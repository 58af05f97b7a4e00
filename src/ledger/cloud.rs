//! Azure Table Storage-backed `JobStatusStore`: a wide-row table keyed by
//! `(partition=const, row=jobId)` (spec §4.2).

use super::{JobStatusStore, LedgerError, Result};
use crate::model::{JobStatus, JobStatusRecord};
use async_trait::async_trait;
use azure_data_tables::prelude::*;
use azure_storage::prelude::*;
use chrono::Utc;
use serde::{Deserialize, Serialize};

const PARTITION_KEY: &str = "jobs";
const TABLE_NAME: &str = "jobstatus";

/// Table-entity projection of `JobStatusRecord`: Azure Tables entities are
/// flat property bags, so `JobStatusRecord` is serialized into one
/// alongside the mandatory `PartitionKey`/`RowKey` columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JobStatusEntity {
    #[serde(rename = "PartitionKey")]
    partition_key: String,
    #[serde(rename = "RowKey")]
    row_key: String,
    record_json: String,
}

impl JobStatusEntity {
    fn wrap(record: &JobStatusRecord) -> Result<Self> {
        Ok(Self {
            partition_key: PARTITION_KEY.to_string(),
            row_key: record.job_id.clone(),
            record_json: serde_json::to_string(record)?,
        })
    }

    fn unwrap(self) -> Result<JobStatusRecord> {
        Ok(serde_json::from_str(&self.record_json)?)
    }
}

pub struct CloudJobStatusStore {
    table_client: TableClient,
}

impl CloudJobStatusStore {
    pub async fn new(connection_string: &str) -> Result<Self> {
        let service_client = TableServiceClient::from_connection_string(connection_string)
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        let table_client = service_client.table_client(TABLE_NAME);
        table_client
            .create_if_not_exists()
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        Ok(Self { table_client })
    }

    fn row(&self, job_id: &str) -> RowKeyClient {
        self.table_client
            .partition_key_client(PARTITION_KEY)
            .row_key_client(job_id)
    }

    async fn fetch(&self, job_id: &str) -> Result<Option<JobStatusRecord>> {
        match self.row(job_id).get::<JobStatusEntity>().await {
            Ok(response) => Ok(Some(response.entity.unwrap()?)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(LedgerError::Backend(e.to_string())),
        }
    }

    async fn upsert(&self, record: &JobStatusRecord) -> Result<()> {
        let entity = JobStatusEntity::wrap(record)?;
        self.row(&record.job_id)
            .insert_or_replace(&entity)
            .map_err(|e| LedgerError::Backend(e.to_string()))?
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        Ok(())
    }
}

fn is_not_found(error: &azure_core::Error) -> bool {
    matches!(error.kind(), azure_core::error::ErrorKind::HttpResponse { status, .. } if status.as_u16() == 404)
}

#[async_trait]
impl JobStatusStore for CloudJobStatusStore {
    async fn create(&self, job_id: &str) -> Result<JobStatusRecord> {
        let now = Utc::now();
        let record = match self.fetch(job_id).await? {
            Some(mut existing) => {
                existing.updated_at = now;
                existing
            }
            None => JobStatusRecord::new(job_id, now),
        };
        self.upsert(&record).await?;
        Ok(record)
    }

    async fn update_status(&self, job_id: &str, status: JobStatus, message: &str) -> Result<()> {
        let mut record = self
            .fetch(job_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(job_id.to_string()))?;
        record.status = status;
        record.status_message = message.to_string();
        record.updated_at = Utc::now();
        self.upsert(&record).await
    }

    async fn update_completion(
        &self,
        job_id: &str,
        template_key: &str,
        context_key: &str,
    ) -> Result<()> {
        let mut record = self
            .fetch(job_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(job_id.to_string()))?;
        let now = Utc::now();
        record.status = JobStatus::Complete;
        record.status_message = "Job complete".to_string();
        record.template_json_key = Some(template_key.to_string());
        record.context_json_key = Some(context_key.to_string());
        record.completed_at = Some(now);
        record.updated_at = now;
        self.upsert(&record).await
    }

    async fn update_error(&self, job_id: &str, error_message: &str) -> Result<()> {
        let mut record = self
            .fetch(job_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(job_id.to_string()))?;
        record.status = JobStatus::Failed;
        record.error_message = Some(error_message.to_string());
        record.updated_at = Utc::now();
        self.upsert(&record).await
    }

    async fn get(&self, job_id: &str) -> Result<Option<JobStatusRecord>> {
        self.fetch(job_id).await
    }
}
