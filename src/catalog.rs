use crate::models::{Platform, ProductRecord, ProductSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("catalog not found: {0}")]
    NotFound(Uuid),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CatalogStatus {
    Draft,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub platform: Platform,
    pub status: CatalogStatus,
    pub product_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One persisted, merged product row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredProduct {
    pub id: Uuid,
    pub catalog_id: Uuid,
    #[serde(flatten)]
    pub record: ProductRecord,
    pub ai_generated: bool,
    pub generated_at: DateTime<Utc>,
}

/// Catalog persistence. A catalog is created as a processing placeholder
/// when its job starts, filled with merged rows on success, and finalized
/// (or marked errored) exactly once.
#[derive(Clone, Default)]
pub struct CatalogStore {
    catalogs: Arc<Mutex<HashMap<Uuid, Catalog>>>,
    products: Arc<Mutex<HashMap<Uuid, Vec<StoredProduct>>>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_processing(
        &self,
        owner_id: &str,
        name: &str,
        platform: Platform,
    ) -> Catalog {
        let now = Utc::now();
        let catalog = Catalog {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            platform,
            status: CatalogStatus::Processing,
            product_count: 0,
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.catalogs
            .lock()
            .await
            .insert(catalog.id, catalog.clone());
        catalog
    }

    pub async fn insert_products(
        &self,
        catalog_id: Uuid,
        merged: ProductSet,
    ) -> Result<Vec<Uuid>, PersistenceError> {
        if !self.catalogs.lock().await.contains_key(&catalog_id) {
            return Err(PersistenceError::NotFound(catalog_id));
        }
        let now = Utc::now();
        let rows: Vec<StoredProduct> = merged
            .into_records()
            .into_iter()
            .map(|record| StoredProduct {
                id: Uuid::new_v4(),
                catalog_id,
                record,
                ai_generated: true,
                generated_at: now,
            })
            .collect();
        let ids = rows.iter().map(|row| row.id).collect();
        self.products
            .lock()
            .await
            .entry(catalog_id)
            .or_default()
            .extend(rows);
        Ok(ids)
    }

    pub async fn finalize(&self, catalog_id: Uuid) -> Result<Catalog, PersistenceError> {
        let product_count = self
            .products
            .lock()
            .await
            .get(&catalog_id)
            .map(Vec::len)
            .unwrap_or(0);
        let mut catalogs = self.catalogs.lock().await;
        let catalog = catalogs
            .get_mut(&catalog_id)
            .ok_or(PersistenceError::NotFound(catalog_id))?;
        catalog.status = CatalogStatus::Completed;
        catalog.product_count = product_count;
        catalog.updated_at = Utc::now();
        Ok(catalog.clone())
    }

    pub async fn mark_error(&self, catalog_id: Uuid, error: impl Into<String>) {
        let mut catalogs = self.catalogs.lock().await;
        if let Some(catalog) = catalogs.get_mut(&catalog_id) {
            catalog.status = CatalogStatus::Error;
            catalog.error = Some(error.into());
            catalog.updated_at = Utc::now();
        }
    }

    pub async fn get(&self, catalog_id: Uuid) -> Option<Catalog> {
        self.catalogs.lock().await.get(&catalog_id).cloned()
    }

    pub async fn products(&self, catalog_id: Uuid) -> Vec<StoredProduct> {
        self.products
            .lock()
            .await
            .get(&catalog_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn woo_set(rows: serde_json::Value) -> ProductSet {
        ProductSet::WooCommerce(serde_json::from_value(rows).unwrap())
    }

    #[tokio::test]
    async fn catalog_fills_and_finalizes() {
        let store = CatalogStore::new();
        let catalog = store
            .create_processing("user-1", "Spring Catalog", Platform::WooCommerce)
            .await;
        assert_eq!(catalog.status, CatalogStatus::Processing);
        assert_eq!(catalog.product_count, 0);

        let ids = store
            .insert_products(
                catalog.id,
                woo_set(json!([
                    {"Type": "simple", "SKU": "a", "Name": "A", "Regular price": 1},
                    {"Type": "simple", "SKU": "b", "Name": "B", "Regular price": 2},
                ])),
            )
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);

        let finalized = store.finalize(catalog.id).await.unwrap();
        assert_eq!(finalized.status, CatalogStatus::Completed);
        assert_eq!(finalized.product_count, 2);

        let products = store.products(catalog.id).await;
        assert_eq!(products.len(), 2);
        assert!(products.iter().all(|p| p.ai_generated));
    }

    #[tokio::test]
    async fn inserting_into_a_missing_catalog_fails() {
        let store = CatalogStore::new();
        let err = store
            .insert_products(Uuid::new_v4(), woo_set(json!([])))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::NotFound(_)));
    }

    #[tokio::test]
    async fn mark_error_records_the_failure() {
        let store = CatalogStore::new();
        let catalog = store
            .create_processing("user-1", "Broken", Platform::Shopify)
            .await;
        store.mark_error(catalog.id, "generation request failed").await;
        let catalog = store.get(catalog.id).await.unwrap();
        assert_eq!(catalog.status, CatalogStatus::Error);
        assert_eq!(catalog.error.as_deref(), Some("generation request failed"));
    }
}
