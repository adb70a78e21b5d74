use crate::models::Platform;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Mirrored job records expire after a week; the in-process map is the
/// source of truth while the process lives.
const JOB_MIRROR_TTL_SECS: u64 = 604_800;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub owner_id: String,
    pub platform: Platform,
    pub status: JobStatus,
    pub progress: u8,
    pub total_products: usize,
    pub processed_products: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Job registry backing the status endpoint. Writes land in an in-process
/// map and are mirrored to redis best effort so a restarted reader can
/// still answer for recent jobs.
#[derive(Clone)]
pub struct JobStore {
    jobs: Arc<Mutex<HashMap<Uuid, Job>>>,
    redis: Option<redis::Client>,
}

impl JobStore {
    pub fn new(redis: Option<redis::Client>) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            redis,
        }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    #[cfg(test)]
    pub async fn count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn create(&self, owner_id: &str, platform: Platform, total_products: usize) -> Job {
        let job = Job {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            platform,
            status: JobStatus::Queued,
            progress: 0,
            total_products,
            processed_products: 0,
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.jobs.lock().await.insert(job.id, job.clone());
        self.mirror(&job).await;
        job
    }

    pub async fn get(&self, id: Uuid) -> Option<Job> {
        if let Some(job) = self.jobs.lock().await.get(&id).cloned() {
            return Some(job);
        }
        let client = self.redis.as_ref()?;
        let mut conn = client.get_multiplexed_async_connection().await.ok()?;
        let raw: Option<String> = conn.get(Self::mirror_key(id)).await.ok().flatten();
        raw.and_then(|value| serde_json::from_str(&value).ok())
    }

    pub async fn mark_processing(&self, id: Uuid) {
        self.update(id, |job| {
            job.status = JobStatus::Processing;
        })
        .await;
    }

    pub async fn update_progress(&self, id: Uuid, progress: u8, processed_products: usize) {
        self.update(id, |job| {
            job.progress = progress.min(100);
            job.processed_products = processed_products;
        })
        .await;
    }

    pub async fn complete(&self, id: Uuid, catalog_id: Uuid) {
        self.update(id, |job| {
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.processed_products = job.total_products;
            job.result = Some(catalog_id);
            job.completed_at = Some(Utc::now());
        })
        .await;
    }

    pub async fn fail(&self, id: Uuid, error: impl Into<String>) {
        let error = error.into();
        self.update(id, move |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error);
            job.completed_at = Some(Utc::now());
        })
        .await;
    }

    /// Terminal states absorb later writes; a completed job never flips
    /// back to processing or failed.
    async fn update(&self, id: Uuid, apply: impl FnOnce(&mut Job)) {
        let mirrored = {
            let mut jobs = self.jobs.lock().await;
            match jobs.get_mut(&id) {
                Some(job) if !job.status.is_terminal() => {
                    apply(job);
                    Some(job.clone())
                }
                Some(_) => None,
                None => {
                    tracing::warn!(target = "catforge.worker", job_id = %id, "update for unknown job");
                    None
                }
            }
        };
        if let Some(job) = mirrored {
            self.mirror(&job).await;
        }
    }

    fn mirror_key(id: Uuid) -> String {
        format!("job:{id}")
    }

    async fn mirror(&self, job: &Job) {
        if let Some(client) = &self.redis
            && let Ok(mut conn) = client.get_multiplexed_async_connection().await
            && let Ok(json) = serde_json::to_string(job)
        {
            let _: Result<(), _> = conn
                .set_ex(Self::mirror_key(job.id), json, JOB_MIRROR_TTL_SECS)
                .await;
        }
    }
}
