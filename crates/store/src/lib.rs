//! Document-store access for the ingredient catalog.
//!
//! Provides the `DocumentStore` trait and two implementations: an HTTP
//! JSON backend and an in-memory backend for tests and seeding. The
//! engine only ever reads; all writes happen in the data pipeline.
//!
//! Records cross this boundary as raw `serde_json::Value`s; the typed
//! mapping (with defaults for missing fields) happens once, at the
//! snapshot boundary.

use std::collections::HashMap;
use std::future::Future;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use incimatch_model::StoreSnapshot;

/// Errors from document-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Store not available")]
    Unavailable,
}

/// The five source collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    BrandedIngredients,
    Incis,
    Suppliers,
    FunctionalCategories,
    ChemicalClasses,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BrandedIngredients => "branded_ingredients",
            Self::Incis => "inci",
            Self::Suppliers => "suppliers",
            Self::FunctionalCategories => "functional_categories",
            Self::ChemicalClasses => "chemical_classes",
        }
    }
}

/// Trait for document stores (HTTP API, in-memory, etc.)
///
/// This abstraction keeps graph building and catalog loading independent
/// of where the source collections live.
pub trait DocumentStore {
    /// Fetch every record in a collection.
    fn find_all(
        &self,
        collection: Collection,
    ) -> impl Future<Output = Result<Vec<Value>, StoreError>> + Send;

    /// Fetch records where `field` equals `value`.
    fn find_many(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> impl Future<Output = Result<Vec<Value>, StoreError>> + Send;

    /// Fetch the first record where `field` equals `value`.
    fn find_one(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> impl Future<Output = Result<Option<Value>, StoreError>> + Send;

    /// Check if the store is reachable.
    fn health_check(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Get the store name for logging.
    fn name(&self) -> &'static str;
}

/// HTTP document-store configuration.
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Base URL for the store's HTTP API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout_secs: 30,
        }
    }
}

/// HTTP JSON document store.
pub struct HttpStore {
    config: HttpStoreConfig,
    client: reqwest::Client,
}

impl HttpStore {
    /// Create a new HTTP store.
    pub fn new(config: HttpStoreConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    async fn fetch(&self, url: String, query: &[(&str, &str)]) -> Result<Vec<Value>, StoreError> {
        tracing::debug!(url = %url, "fetching collection");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::QueryFailed(format!("HTTP {}: {}", status, body)));
        }

        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| StoreError::ParseError(e.to_string()))
    }
}

impl DocumentStore for HttpStore {
    async fn find_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let url = format!("{}/collections/{}", self.config.base_url, collection.as_str());
        self.fetch(url, &[]).await
    }

    async fn find_many(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let url = format!("{}/collections/{}", self.config.base_url, collection.as_str());
        self.fetch(url, &[(field, value)]).await
    }

    async fn find_one(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<Option<Value>, StoreError> {
        Ok(self.find_many(collection, field, value).await?.into_iter().next())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .get(format!("{}/health", self.config.base_url))
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// In-memory document store for tests and seeding.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: HashMap<Collection, Vec<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a collection's records.
    pub fn insert(&mut self, collection: Collection, records: Vec<Value>) {
        self.collections.insert(collection, records);
    }

    /// Builder-style variant of `insert`.
    pub fn with_collection(mut self, collection: Collection, records: Vec<Value>) -> Self {
        self.insert(collection, records);
        self
    }
}

impl DocumentStore for MemoryStore {
    async fn find_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        Ok(self.collections.get(&collection).cloned().unwrap_or_default())
    }

    async fn find_many(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .collections
            .get(&collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| {
                        record.get(field).and_then(Value::as_str) == Some(value)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_one(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<Option<Value>, StoreError> {
        Ok(self.find_many(collection, field, value).await?.into_iter().next())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Read all five collections as one point-in-time snapshot.
///
/// Records that fail to deserialize are skipped with a warning; a
/// partially-cleaned store still yields a usable snapshot.
pub async fn load_snapshot<S: DocumentStore + Sync>(store: &S) -> Result<StoreSnapshot, StoreError> {
    let (ingredients, branded, suppliers, functional_categories, chemical_classes) = tokio::try_join!(
        load_collection(store, Collection::Incis),
        load_collection(store, Collection::BrandedIngredients),
        load_collection(store, Collection::Suppliers),
        load_collection(store, Collection::FunctionalCategories),
        load_collection(store, Collection::ChemicalClasses),
    )?;

    Ok(StoreSnapshot {
        ingredients,
        branded,
        suppliers,
        functional_categories,
        chemical_classes,
    })
}

async fn load_collection<S, T>(store: &S, collection: Collection) -> Result<Vec<T>, StoreError>
where
    S: DocumentStore + Sync,
    T: DeserializeOwned,
{
    let raw = store.find_all(collection).await?;
    let mut records = Vec::with_capacity(raw.len());
    for value in raw {
        match serde_json::from_value::<T>(value) {
            Ok(record) => records.push(record),
            Err(error) => {
                tracing::warn!(
                    collection = collection.as_str(),
                    %error,
                    "undeserializable record skipped"
                );
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_collection(
                Collection::Incis,
                vec![
                    json!({"_id": "i1", "inciName": "Aqua"}),
                    json!({"_id": "i2", "inciName": "Glycerin"}),
                    json!({"inciName": "no id, dropped at snapshot"}),
                ],
            )
            .with_collection(
                Collection::BrandedIngredients,
                vec![json!({
                    "_id": "b1",
                    "ingredient_name": "Hydrasoft",
                    "inci_ids": ["i1", "i2"]
                })],
            )
    }

    #[tokio::test]
    async fn test_find_all() {
        let records = store().find_all(Collection::Incis).await.unwrap();
        assert_eq!(records.len(), 3);

        let empty = store().find_all(Collection::Suppliers).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_find_many_and_one() {
        let store = store();
        let found = store
            .find_many(Collection::Incis, "inciName", "Aqua")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["_id"], "i1");

        let one = store
            .find_one(Collection::Incis, "inciName", "Glycerin")
            .await
            .unwrap();
        assert_eq!(one.unwrap()["_id"], "i2");

        let missing = store
            .find_one(Collection::Incis, "inciName", "Niacinamide")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_load_snapshot_skips_malformed_records() {
        let snapshot = load_snapshot(&store()).await.unwrap();
        // the record without an id cannot deserialize and is skipped
        assert_eq!(snapshot.ingredients.len(), 2);
        assert_eq!(snapshot.branded.len(), 1);
        assert_eq!(snapshot.branded[0].inci_ids, vec!["i1", "i2"]);
        assert!(snapshot.suppliers.is_empty());
    }
}
