mod cache;
mod catalog;
mod jobs;
mod llm;
mod merge;
mod metrics;
mod models;
mod optimize;
mod queue;
mod security;
mod validate;
mod worker;

use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use cache::ContentCache;
use catalog::{Catalog, CatalogStore, StoredProduct};
use jobs::{Job, JobStore};
use llm::{GenerationClient, GenerationConfig, openai::OpenAiBackend};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use models::{ApiError, ProductSet, flatten_variations};
use queue::{CatalogQueue, JobPayload};
use security::{AuthContext, AuthState, require_api_auth};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;
use validate::{ValidationIssue, validate};
use worker::{Orchestrator, WorkerConfig};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "catforge.api", "server crashed: {err}");
    }
}

async fn run() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let auth_state = AuthState::from_env();
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("prom recorder");
    let redis = std::env::var("REDIS_URL")
        .ok()
        .and_then(|u| redis::Client::open(u).ok());

    let cache = ContentCache::new(redis.clone(), cache::cache_ttl_from_env());
    let backend = Arc::new(OpenAiBackend::from_env()?);
    let generator = GenerationClient::new(backend, cache, GenerationConfig::from_env());
    let job_store = JobStore::new(redis);
    let catalog_store = CatalogStore::new();
    let orchestrator = Orchestrator::new(
        generator,
        job_store.clone(),
        catalog_store.clone(),
        WorkerConfig::from_env(),
    );
    let (queue, _worker) = CatalogQueue::spawn(orchestrator);

    let state = AppState {
        jobs: job_store,
        catalogs: catalog_store,
        queue,
        prometheus_handle,
    };

    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let protected = Router::new()
        .nest(
            "/catalogs",
            Router::new()
                .route("/woocommerce", post(submit_woocommerce))
                .route("/shopify", post(submit_shopify))
                .route("/{id}", get(get_catalog)),
        )
        .route("/jobs/{id}", get(get_job_status))
        .route_layer(middleware::from_fn_with_state(auth_state, require_api_auth));

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::extract::DefaultBodyLimit::max(body_limit_from_env()));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8000);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target = "catforge.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    jobs: JobStore,
    catalogs: CatalogStore,
    queue: CatalogQueue,
    prometheus_handle: PrometheusHandle,
}

/// Health and readiness check.
///
/// - Method: `GET`
/// - Path: `/health`
/// - Auth: none
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "catforge-api-rs",
    }))
}

async fn metrics_endpoint(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> axum::http::Response<String> {
    if let Ok(secret) = std::env::var("METRICS_KEY") {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return axum::http::Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .body("unauthorized".into())
                .unwrap();
        }
    }
    let body = state.prometheus_handle.render();
    axum::http::Response::builder()
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .unwrap()
}

fn body_limit_from_env() -> usize {
    std::env::var("REQUEST_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(10 * 1024 * 1024)
}

#[derive(Debug, Deserialize)]
struct SubmitWooRequest {
    #[serde(default = "default_catalog_name")]
    name: String,
    products: Vec<models::WooProduct>,
}

#[derive(Debug, Deserialize)]
struct SubmitShopifyRequest {
    #[serde(default = "default_catalog_name")]
    name: String,
    products: Vec<models::ShopifyProduct>,
}

fn default_catalog_name() -> String {
    "Generated Catalog".to_string()
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    job_id: String,
    status: &'static str,
    total_products: usize,
    warnings: Vec<ValidationIssue>,
}

/// Submit WooCommerce products for content generation.
///
/// - Method: `POST`
/// - Path: `/catalogs/woocommerce`
/// - Auth: `Authorization: Bearer <key>` or `X-Catforge-Key: <key>`
/// - Response: `202 Accepted` with the job id, or `400` with validation
///   errors and no job created.
async fn submit_woocommerce(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(payload): Json<SubmitWooRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    crate::metrics::inc_requests("/catalogs/woocommerce");
    // nested variation rows become standalone rows before validation
    let products = ProductSet::WooCommerce(flatten_variations(payload.products));
    submit(&state, context, payload.name, products).await
}

/// Submit Shopify products for content generation.
///
/// - Method: `POST`
/// - Path: `/catalogs/shopify`
async fn submit_shopify(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(payload): Json<SubmitShopifyRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    crate::metrics::inc_requests("/catalogs/shopify");
    let products = ProductSet::Shopify(payload.products);
    submit(&state, context, payload.name, products).await
}

async fn submit(
    state: &AppState,
    context: AuthContext,
    catalog_name: String,
    products: ProductSet,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let report = validate(&products);
    if !report.valid {
        return Err(AppError::Validation {
            errors: report.errors,
            warnings: report.warnings,
        });
    }

    let platform = products.platform();
    let total_products = products.len();
    let job = state
        .jobs
        .create(&context.user_id, platform, total_products)
        .await;
    info!(
        target = "catforge.api",
        user_id = %context.user_id,
        api_key = %context.api_key_id,
        job_id = %job.id,
        platform = platform.as_str(),
        products = total_products,
        "catalog job accepted",
    );

    let enqueue = state
        .queue
        .enqueue(JobPayload {
            job_id: job.id,
            owner_id: context.user_id,
            catalog_name,
            products,
        })
        .await;
    if let Err(err) = enqueue {
        state
            .jobs
            .fail(job.id, err.detail.clone().unwrap_or_else(|| err.error.clone()))
            .await;
        return Err(AppError::Queue(err));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id: job.id.to_string(),
            status: "queued",
            total_products,
            warnings: report.warnings,
        }),
    ))
}

/// Poll job progress.
///
/// - Method: `GET`
/// - Path: `/jobs/{id}`
async fn get_job_status(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<Job>, AppError> {
    let Ok(uuid) = Uuid::parse_str(&id) else {
        return Err(AppError::InvalidId("job"));
    };
    match state.jobs.get(uuid).await {
        // jobs are only visible to their owner
        Some(job) if job.owner_id == context.user_id => Ok(Json(job)),
        _ => Err(AppError::NotFound("job")),
    }
}

#[derive(Debug, Serialize)]
struct CatalogResponse {
    catalog: Catalog,
    products: Vec<StoredProduct>,
}

/// Fetch a finished catalog with its merged products.
///
/// - Method: `GET`
/// - Path: `/catalogs/{id}`
async fn get_catalog(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<CatalogResponse>, AppError> {
    let Ok(uuid) = Uuid::parse_str(&id) else {
        return Err(AppError::InvalidId("catalog"));
    };
    match state.catalogs.get(uuid).await {
        Some(catalog) if catalog.owner_id == context.user_id => {
            let products = state.catalogs.products(uuid).await;
            Ok(Json(CatalogResponse { catalog, products }))
        }
        _ => Err(AppError::NotFound("catalog")),
    }
}

#[derive(Debug)]
enum AppError {
    Validation {
        errors: Vec<ValidationIssue>,
        warnings: Vec<ValidationIssue>,
    },
    Queue(ApiError),
    InvalidId(&'static str),
    NotFound(&'static str),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation { errors, warnings } => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "validation_failed",
                    "errors": errors,
                    "warnings": warnings,
                })),
            )
                .into_response(),
            AppError::Queue(err) => {
                (StatusCode::SERVICE_UNAVAILABLE, Json(err)).into_response()
            }
            AppError::InvalidId(what) => (
                StatusCode::BAD_REQUEST,
                Json(ApiError {
                    error: format!("invalid_{what}_id"),
                    detail: None,
                }),
            )
                .into_response(),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Json(ApiError {
                    error: format!("{what}_not_found"),
                    detail: None,
                }),
            )
                .into_response(),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use llm::{GenerationBackend, GenerationError, PromptRef};
    use serde_json::{Value, json};

    struct EchoBackend;

    #[async_trait]
    impl GenerationBackend for EchoBackend {
        async fn generate_text(
            &self,
            _prompt: &PromptRef,
            products_json: &str,
        ) -> Result<String, GenerationError> {
            let submitted: Vec<Value> = serde_json::from_str(products_json).unwrap();
            let products: Vec<Value> = submitted
                .iter()
                .map(|item| json!({ "SKU": item["SKU"], "Description": "Generated copy" }))
                .collect();
            Ok(json!({ "products": products }).to_string())
        }
    }

    fn test_state() -> AppState {
        let jobs = JobStore::in_memory();
        let catalogs = CatalogStore::new();
        let generator = GenerationClient::new(
            Arc::new(EchoBackend),
            ContentCache::in_memory(),
            GenerationConfig {
                woocommerce: Some(PromptRef {
                    id: "pmpt_woo".into(),
                    version: None,
                }),
                shopify: None,
            },
        );
        let orchestrator = Orchestrator::new(
            generator,
            jobs.clone(),
            catalogs.clone(),
            WorkerConfig {
                batch_size: 10,
                pause_between_batches: std::time::Duration::ZERO,
            },
        );
        let (queue, _worker) = CatalogQueue::spawn(orchestrator);
        AppState {
            jobs,
            catalogs,
            queue,
            prometheus_handle: PrometheusBuilder::new().build_recorder().handle(),
        }
    }

    fn context() -> AuthContext {
        AuthContext {
            user_id: "user-1".into(),
            api_key_id: "key-01".into(),
        }
    }

    #[tokio::test]
    async fn invalid_products_are_rejected_before_any_job_exists() {
        let state = test_state();
        let products = ProductSet::WooCommerce(
            serde_json::from_value(json!([{ "Name": "No SKU or price" }])).unwrap(),
        );

        let result = submit(&state, context(), "Bad".into(), products).await;
        let Err(AppError::Validation { errors, .. }) = result else {
            panic!("expected a validation rejection");
        };
        assert!(!errors.is_empty());
        assert_eq!(state.jobs.count().await, 0);
    }

    #[tokio::test]
    async fn valid_submission_is_accepted_and_processed() {
        let state = test_state();
        let products = ProductSet::WooCommerce(
            serde_json::from_value(json!([
                {"Type": "simple", "SKU": "mug", "Name": "Mug",
                 "Regular price": 12, "Categories": "Kitchen"}
            ]))
            .unwrap(),
        );

        let (status, Json(body)) = submit(&state, context(), "Spring".into(), products)
            .await
            .unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body.status, "queued");
        assert_eq!(body.total_products, 1);
        assert!(body.warnings.is_empty());

        // drain the background worker
        let job_id = Uuid::parse_str(&body.job_id).unwrap();
        for _ in 0..50 {
            if let Some(job) = state.jobs.get(job_id).await
                && job.status.is_terminal()
            {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let job = state.jobs.get(job_id).await.unwrap();
        assert_eq!(job.status, jobs::JobStatus::Completed);
        let catalog = state.catalogs.get(job.result.unwrap()).await.unwrap();
        assert_eq!(catalog.owner_id, "user-1");
        assert_eq!(catalog.product_count, 1);
    }

    #[tokio::test]
    async fn jobs_are_invisible_to_other_users() {
        let state = test_state();
        let job = state
            .jobs
            .create("someone-else", models::Platform::WooCommerce, 1)
            .await;
        let result = get_job_status(
            State(state),
            Extension(context()),
            Path(job.id.to_string()),
        )
        .await;
        assert!(matches!(result, Err(AppError::NotFound("job"))));
    }
}
