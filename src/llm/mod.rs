pub mod openai;

use crate::cache::ContentCache;
use crate::models::{GeneratedContent, Platform};
use crate::optimize::OptimizedBatch;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct PromptRef {
    pub id: String,
    pub version: Option<String>,
}

/// Prompt wiring for the hosted generation service. Each platform has its
/// own published prompt; a platform without one configured fails fast at
/// generation time rather than at startup, so a single-platform deploy
/// only needs its own prompt id.
#[derive(Debug, Clone, Default)]
pub struct GenerationConfig {
    pub woocommerce: Option<PromptRef>,
    pub shopify: Option<PromptRef>,
}

impl GenerationConfig {
    pub fn from_env() -> Self {
        let prompt = |id_var: &str, version_var: &str| {
            std::env::var(id_var).ok().map(|id| PromptRef {
                id,
                version: std::env::var(version_var).ok(),
            })
        };
        Self {
            woocommerce: prompt(
                "OPENAI_PROMPT_WOOCOMMERCE_ID",
                "OPENAI_PROMPT_WOOCOMMERCE_VERSION",
            ),
            shopify: prompt("OPENAI_PROMPT_SHOPIFY_ID", "OPENAI_PROMPT_SHOPIFY_VERSION"),
        }
    }

    fn prompt_for(&self, platform: Platform) -> Result<&PromptRef, GenerationError> {
        let prompt = match platform {
            Platform::WooCommerce => self.woocommerce.as_ref(),
            Platform::Shopify => self.shopify.as_ref(),
        };
        prompt.ok_or_else(|| {
            GenerationError::PromptConfig(format!(
                "no prompt configured for platform {}",
                platform.as_str()
            ))
        })
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(String),
    #[error("generation response malformed: {0}")]
    Format(String),
    #[error("prompt configuration error: {0}")]
    PromptConfig(String),
}

/// Seam over the hosted model call. One implementation speaks HTTP; tests
/// substitute canned responses and count invocations.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Run the published prompt against a serialized product batch and
    /// return the raw model output text.
    async fn generate_text(
        &self,
        prompt: &PromptRef,
        products_json: &str,
    ) -> Result<String, GenerationError>;
}

#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    cache: ContentCache,
    config: GenerationConfig,
}

impl GenerationClient {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        cache: ContentCache,
        config: GenerationConfig,
    ) -> Self {
        Self {
            backend,
            cache,
            config,
        }
    }

    /// Produce marketing copy for one optimized batch. An identical batch
    /// seen within the cache TTL is served from the cache and costs no
    /// backend call.
    pub async fn generate(
        &self,
        platform: Platform,
        batch: &OptimizedBatch,
    ) -> Result<Vec<GeneratedContent>, GenerationError> {
        let prompt = self.config.prompt_for(platform)?;
        let payload = serde_json::to_string(batch)
            .map_err(|err| GenerationError::Format(err.to_string()))?;
        let key = ContentCache::content_key(&payload);

        if let Some(cached) = self.cache.get(&key).await {
            match parse_generated(&cached) {
                Ok(content) => {
                    tracing::info!(
                        target = "catforge.llm",
                        platform = platform.as_str(),
                        products = batch.len(),
                        "served batch from cache"
                    );
                    return Ok(content);
                }
                // a stale or corrupt entry falls through to regeneration
                Err(_) => self.cache.delete(&key).await,
            }
        }

        let raw = self.backend.generate_text(prompt, &payload).await?;
        let cleaned = strip_markdown_fence(&raw);
        let content = parse_generated(&cleaned)?;
        self.cache.set(&key, &cleaned).await;
        tracing::info!(
            target = "catforge.llm",
            platform = platform.as_str(),
            products = batch.len(),
            generated = content.len(),
            "generated batch"
        );
        Ok(content)
    }
}

/// Models wrap JSON answers in ``` fences often enough that stripping one
/// leading fence pair is table stakes.
pub fn strip_markdown_fence(input: &str) -> String {
    let trimmed = input.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut body = Vec::new();
    for line in trimmed.lines().skip(1) {
        if line.trim_start().starts_with("```") {
            break;
        }
        body.push(line);
    }
    body.join("\n")
}

/// Parse model output into content records. The contract is a JSON object
/// whose `products` key holds the array; anything else is a format error.
pub fn parse_generated(text: &str) -> Result<Vec<GeneratedContent>, GenerationError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| GenerationError::Format(format!("not valid JSON: {err}")))?;
    let products = value
        .get("products")
        .and_then(Value::as_array)
        .ok_or_else(|| GenerationError::Format("missing `products` array".into()))?;
    products
        .iter()
        .map(|item| {
            serde_json::from_value::<GeneratedContent>(item.clone())
                .map_err(|err| GenerationError::Format(format!("bad product entry: {err}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::OptimizedWooProduct;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedBackend {
        body: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerationBackend for CannedBackend {
        async fn generate_text(
            &self,
            _prompt: &PromptRef,
            _products_json: &str,
        ) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    fn config_with_woo() -> GenerationConfig {
        GenerationConfig {
            woocommerce: Some(PromptRef {
                id: "pmpt_woo".into(),
                version: None,
            }),
            shopify: None,
        }
    }

    fn woo_batch(sku: &str) -> OptimizedBatch {
        OptimizedBatch::WooCommerce(vec![OptimizedWooProduct {
            sku: sku.into(),
            name: Some("Mug".into()),
            product_type: Some("simple".into()),
            regular_price: None,
            sale_price: None,
            categories: None,
            tags: None,
            images: None,
            gtin: None,
            attributes: Vec::new(),
        }])
    }

    #[test]
    fn fence_stripping_handles_plain_and_fenced_payloads() {
        assert_eq!(strip_markdown_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(
            strip_markdown_fence("```json\n{\"a\":1}\n```"),
            "{\"a\":1}"
        );
        assert_eq!(strip_markdown_fence("  ```\n[]\n```  "), "[]");
    }

    #[test]
    fn parse_requires_a_products_array() {
        let ok = parse_generated(r#"{"products":[{"SKU":"mug","SEO Title":"Best Mug"}]}"#);
        assert_eq!(ok.unwrap()[0].sku.as_deref(), Some("mug"));

        let err = parse_generated(r#"{"items":[]}"#).unwrap_err();
        assert!(matches!(err, GenerationError::Format(_)));

        let err = parse_generated("not json").unwrap_err();
        assert!(matches!(err, GenerationError::Format(_)));
    }

    #[tokio::test]
    async fn identical_batches_hit_the_cache_once_generated() {
        let backend = Arc::new(CannedBackend {
            body: "```json\n{\"products\":[{\"SKU\":\"mug\",\"Description\":\"Fine mug\"}]}\n```"
                .into(),
            calls: AtomicUsize::new(0),
        });
        let client = GenerationClient::new(
            backend.clone(),
            ContentCache::in_memory(),
            config_with_woo(),
        );

        let first = client
            .generate(Platform::WooCommerce, &woo_batch("mug"))
            .await
            .unwrap();
        let second = client
            .generate(Platform::WooCommerce, &woo_batch("mug"))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        client
            .generate(Platform::WooCommerce, &woo_batch("tee"))
            .await
            .unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_prompt_is_a_config_error() {
        let backend = Arc::new(CannedBackend {
            body: r#"{"products":[]}"#.into(),
            calls: AtomicUsize::new(0),
        });
        let client = GenerationClient::new(
            backend.clone(),
            ContentCache::in_memory(),
            config_with_woo(),
        );
        let err = client
            .generate(Platform::Shopify, &OptimizedBatch::Shopify(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::PromptConfig(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }
}
