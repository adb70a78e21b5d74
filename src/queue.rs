use crate::models::{ApiError, ProductSet};
use crate::worker::Orchestrator;
use tokio::{sync::mpsc, task::JoinHandle};
use uuid::Uuid;

/// Work handed from the submission handler to the background worker.
#[derive(Clone)]
pub struct JobPayload {
    pub job_id: Uuid,
    pub owner_id: String,
    pub catalog_name: String,
    pub products: ProductSet,
}

/// Bounded queue feeding a single worker task, so jobs run one at a time
/// in submission order. A full queue rejects the submission instead of
/// buffering unboundedly.
#[derive(Clone)]
pub struct CatalogQueue {
    tx: mpsc::Sender<JobPayload>,
}

impl CatalogQueue {
    pub fn spawn(orchestrator: Orchestrator) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<JobPayload>(queue_capacity_from_env());

        let handle = tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                let job_id = payload.job_id;
                orchestrator.process(payload).await;
                tracing::debug!(target = "catforge.worker", %job_id, "job drained");
            }
        });

        (Self { tx }, handle)
    }

    pub async fn enqueue(&self, payload: JobPayload) -> Result<(), ApiError> {
        self.tx.try_send(payload).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => ApiError {
                error: "queue_full".into(),
                detail: Some("too many jobs queued, retry later".into()),
            },
            mpsc::error::TrySendError::Closed(_) => ApiError {
                error: "queue_send_failed".into(),
                detail: Some("worker not available".into()),
            },
        })
    }
}

fn queue_capacity_from_env() -> usize {
    std::env::var("QUEUE_CAPACITY")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(64)
}
