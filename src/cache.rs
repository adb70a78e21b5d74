use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// 30 days, matching how long a product list plausibly stays unchanged.
pub const DEFAULT_TTL_SECS: u64 = 2_592_000;

const KEY_PREFIX: &str = "ai:products";

pub fn cache_ttl_from_env() -> u64 {
    std::env::var("CACHE_TTL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TTL_SECS)
}

/// Content-addressed store for generated copy. Keys are derived from the
/// optimized payload, so an identical batch resubmitted within the TTL is
/// served without another generation call. Redis is best effort; every
/// entry also lives in an in-process map so cache hits survive a redis
/// outage within one process lifetime.
#[derive(Clone)]
pub struct ContentCache {
    redis: Option<redis::Client>,
    local: Arc<Mutex<HashMap<String, String>>>,
    ttl_secs: u64,
}

impl ContentCache {
    pub fn new(redis: Option<redis::Client>, ttl_secs: u64) -> Self {
        Self {
            redis,
            local: Arc::new(Mutex::new(HashMap::new())),
            ttl_secs,
        }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::new(None, DEFAULT_TTL_SECS)
    }

    /// Stable key for a serialized generation payload.
    pub fn content_key(payload: &str) -> String {
        let digest = Sha256::digest(payload.as_bytes());
        format!("{KEY_PREFIX}:{:x}", digest)
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        if let Some(hit) = self.local.lock().await.get(key).cloned() {
            tracing::debug!(target = "catforge.cache", key, source = "local", "cache hit");
            return Some(hit);
        }
        let client = self.redis.as_ref()?;
        let mut conn = client.get_multiplexed_async_connection().await.ok()?;
        let value: Option<String> = conn.get(key).await.ok().flatten();
        if let Some(value) = &value {
            tracing::debug!(target = "catforge.cache", key, source = "redis", "cache hit");
            self.local
                .lock()
                .await
                .insert(key.to_string(), value.clone());
        }
        value
    }

    pub async fn set(&self, key: &str, value: &str) {
        self.local
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        if let Some(client) = &self.redis
            && let Ok(mut conn) = client.get_multiplexed_async_connection().await
        {
            let outcome: Result<(), _> = conn.set_ex(key, value, self.ttl_secs).await;
            if let Err(err) = outcome {
                tracing::warn!(target = "catforge.cache", key, error = %err, "redis set failed");
            }
        }
    }

    pub async fn delete(&self, key: &str) {
        self.local.lock().await.remove(key);
        if let Some(client) = &self.redis
            && let Ok(mut conn) = client.get_multiplexed_async_connection().await
        {
            let _: Result<(), _> = conn.del(key).await;
        }
    }

    /// Drop every generation entry. Local map is cleared unconditionally;
    /// redis entries are swept by prefix.
    pub async fn clear(&self) {
        self.local.lock().await.clear();
        if let Some(client) = &self.redis
            && let Ok(mut conn) = client.get_multiplexed_async_connection().await
            && let Ok(keys) = conn.keys::<_, Vec<String>>(format!("{KEY_PREFIX}:*")).await
            && !keys.is_empty()
        {
            let _: Result<(), _> = conn.del(keys).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_key_is_stable_and_payload_sensitive() {
        let a = ContentCache::content_key(r#"[{"SKU":"mug"}]"#);
        let b = ContentCache::content_key(r#"[{"SKU":"mug"}]"#);
        let c = ContentCache::content_key(r#"[{"SKU":"tee"}]"#);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("ai:products:"));
        // sha-256 hex digest after the prefix
        assert_eq!(a.len(), "ai:products:".len() + 64);
    }

    #[tokio::test]
    async fn set_get_delete_round_trip_without_redis() {
        let cache = ContentCache::in_memory();
        let key = ContentCache::content_key("payload");
        assert!(cache.get(&key).await.is_none());

        cache.set(&key, r#"{"products":[]}"#).await;
        assert_eq!(cache.get(&key).await.as_deref(), Some(r#"{"products":[]}"#));

        cache.delete(&key).await;
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn clear_empties_the_local_map() {
        let cache = ContentCache::in_memory();
        cache.set("ai:products:one", "a").await;
        cache.set("ai:products:two", "b").await;
        cache.clear().await;
        assert!(cache.get("ai:products:one").await.is_none());
        assert!(cache.get("ai:products:two").await.is_none());
    }
}
