use crate::catalog::CatalogStore;
use crate::jobs::JobStore;
use crate::llm::GenerationClient;
use crate::merge::merge_generated;
use crate::metrics;
use crate::optimize::{estimate_token_savings, optimize_for_generation};
use crate::queue::JobPayload;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub batch_size: usize,
    pub pause_between_batches: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let batch_size = std::env::var("BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(10);
        let pause_ms = std::env::var("BATCH_PAUSE_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(1000);
        Self {
            batch_size,
            pause_between_batches: Duration::from_millis(pause_ms),
        }
    }
}

/// Drives one job end to end: batches the products, generates copy per
/// batch, merges it back, and lands the result in a catalog. Any batch
/// failure fails the whole job; nothing half-written ever completes.
#[derive(Clone)]
pub struct Orchestrator {
    generator: GenerationClient,
    jobs: JobStore,
    catalogs: CatalogStore,
    config: WorkerConfig,
}

impl Orchestrator {
    pub fn new(
        generator: GenerationClient,
        jobs: JobStore,
        catalogs: CatalogStore,
        config: WorkerConfig,
    ) -> Self {
        Self {
            generator,
            jobs,
            catalogs,
            config,
        }
    }

    pub async fn process(&self, payload: JobPayload) {
        let job_id = payload.job_id;
        let platform = payload.products.platform();
        self.jobs.mark_processing(job_id).await;
        let catalog = self
            .catalogs
            .create_processing(&payload.owner_id, &payload.catalog_name, platform)
            .await;
        tracing::info!(
            target = "catforge.worker",
            %job_id,
            catalog_id = %catalog.id,
            platform = platform.as_str(),
            products = payload.products.len(),
            "job started"
        );

        match self.run_batches(&payload).await {
            Ok(merged) => {
                if let Err(err) = self.catalogs.insert_products(catalog.id, merged).await {
                    self.fail(job_id, catalog.id, err.to_string()).await;
                    return;
                }
                if let Err(err) = self.catalogs.finalize(catalog.id).await {
                    self.fail(job_id, catalog.id, err.to_string()).await;
                    return;
                }
                self.jobs.complete(job_id, catalog.id).await;
                metrics::inc_jobs("completed");
                tracing::info!(
                    target = "catforge.worker",
                    %job_id,
                    catalog_id = %catalog.id,
                    "job completed"
                );
            }
            Err(error) => self.fail(job_id, catalog.id, error).await,
        }
    }

    async fn run_batches(
        &self,
        payload: &JobPayload,
    ) -> Result<crate::models::ProductSet, String> {
        let platform = payload.products.platform();
        let batches = payload.products.chunks(self.config.batch_size);
        let total_batches = batches.len();
        let mut merged = payload.products.empty_like();
        let mut processed = 0usize;

        for (index, batch) in batches.into_iter().enumerate() {
            let started = Instant::now();
            let optimized = optimize_for_generation(&batch);
            tracing::debug!(
                target = "catforge.worker",
                job_id = %payload.job_id,
                batch = index + 1,
                of = total_batches,
                payload_products = optimized.len(),
                token_savings = estimate_token_savings(&batch, &optimized),
                "batch optimized"
            );

            // a batch of nothing but variation rows still has to land
            if optimized.is_empty() {
                merged.extend(batch.clone());
            } else {
                let generated = self
                    .generator
                    .generate(platform, &optimized)
                    .await
                    .map_err(|err| err.to_string())?;
                merged.extend(merge_generated(&batch, &generated));
            }

            processed += batch.len();
            let progress =
                ((index + 1) as f64 / total_batches as f64 * 100.0).round() as u8;
            self.jobs
                .update_progress(payload.job_id, progress, processed)
                .await;
            metrics::batch_elapsed(index + 1, started.elapsed().as_millis());

            if index + 1 < total_batches {
                tokio::time::sleep(self.config.pause_between_batches).await;
            }
        }

        Ok(merged)
    }

    async fn fail(&self, job_id: Uuid, catalog_id: Uuid, error: String) {
        tracing::error!(
            target = "catforge.worker",
            %job_id,
            %catalog_id,
            error = %error,
            "job failed"
        );
        self.jobs.fail(job_id, error.clone()).await;
        self.catalogs.mark_error(catalog_id, error).await;
        metrics::inc_jobs("failed");
    }
}
