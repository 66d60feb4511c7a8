use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::error::StoreError;
use crate::supabase::SupabaseClient;

/// A record persisted as one JSON document in a named collection.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn id(&self) -> Uuid;
}

/// Conjunction of top-level field equality conditions.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.conditions.push((field.to_string(), value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| doc.get(field).unwrap_or(&Value::Null) == expected)
    }

    /// Renders the filter as a PostgREST query string (without the leading `?`).
    pub fn to_query(&self) -> String {
        self.conditions
            .iter()
            .map(|(field, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => return format!("{}=is.null", field),
                    other => other.to_string(),
                };
                format!("{}=eq.{}", field, urlencoding::encode(&rendered))
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[async_trait]
pub trait Collection<T: Document>: Send + Sync {
    async fn insert(&self, doc: T) -> Result<T, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<T>, StoreError>;

    async fn find(&self, filter: &Filter) -> Result<Vec<T>, StoreError>;

    /// Replaces the stored document with the same id.
    async fn update(&self, doc: T) -> Result<T, StoreError>;

    /// Returns whether a document was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn all(&self) -> Result<Vec<T>, StoreError> {
        self.find(&Filter::new()).await
    }

    async fn get_required(&self, id: Uuid) -> Result<T, StoreError> {
        self.get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", T::COLLECTION, id)))
    }
}

/// Process-local collection, kept in insertion order.
pub struct MemoryCollection<T> {
    docs: RwLock<Vec<T>>,
}

impl<T: Document> MemoryCollection<T> {
    pub fn new() -> Self {
        Self { docs: RwLock::new(Vec::new()) }
    }
}

impl<T: Document> Default for MemoryCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Document> Collection<T> for MemoryCollection<T> {
    async fn insert(&self, doc: T) -> Result<T, StoreError> {
        let mut docs = self.docs.write().await;
        if docs.iter().any(|d| d.id() == doc.id()) {
            return Err(StoreError::Duplicate(format!("{} {}", T::COLLECTION, doc.id())));
        }
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn get(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        let docs = self.docs.read().await;
        Ok(docs.iter().find(|d| d.id() == id).cloned())
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<T>, StoreError> {
        let docs = self.docs.read().await;
        if filter.is_empty() {
            return Ok(docs.clone());
        }

        let mut found = Vec::new();
        for doc in docs.iter() {
            if filter.matches(&serde_json::to_value(doc)?) {
                found.push(doc.clone());
            }
        }
        Ok(found)
    }

    async fn update(&self, doc: T) -> Result<T, StoreError> {
        let mut docs = self.docs.write().await;
        let slot = docs
            .iter_mut()
            .find(|d| d.id() == doc.id())
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", T::COLLECTION, doc.id())))?;
        *slot = doc.clone();
        Ok(doc)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut docs = self.docs.write().await;
        let before = docs.len();
        docs.retain(|d| d.id() != id);
        Ok(docs.len() != before)
    }
}

/// Collection backed by a PostgREST table named after `T::COLLECTION`.
pub struct SupabaseCollection<T> {
    supabase: Arc<SupabaseClient>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Document> SupabaseCollection<T> {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase, _marker: PhantomData }
    }

    fn table_path(query: &str) -> String {
        if query.is_empty() {
            format!("/rest/v1/{}", T::COLLECTION)
        } else {
            format!("/rest/v1/{}?{}", T::COLLECTION, query)
        }
    }

    fn by_id(id: Uuid) -> String {
        Self::table_path(&format!("id=eq.{}", id))
    }

    fn decode_rows(rows: Vec<Value>) -> Result<Vec<T>, StoreError> {
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl<T: Document> Collection<T> for SupabaseCollection<T> {
    async fn insert(&self, doc: T) -> Result<T, StoreError> {
        let body = serde_json::to_value(&doc)?;
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            &Self::table_path(""),
            Some(body),
            Some(SupabaseClient::return_representation()),
        ).await?;

        Self::decode_rows(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Api {
                status: 500,
                message: format!("Insert into {} returned no rows", T::COLLECTION),
            })
    }

    async fn get(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        let rows: Vec<Value> = self.supabase.request(Method::GET, &Self::by_id(id), None).await?;
        Ok(Self::decode_rows(rows)?.into_iter().next())
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<T>, StoreError> {
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &Self::table_path(&filter.to_query()), None)
            .await?;
        Self::decode_rows(rows)
    }

    async fn update(&self, doc: T) -> Result<T, StoreError> {
        let id = doc.id();
        let body = serde_json::to_value(&doc)?;
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &Self::by_id(id),
            Some(body),
            Some(SupabaseClient::return_representation()),
        ).await?;

        Self::decode_rows(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", T::COLLECTION, id)))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &Self::by_id(id),
            None,
            Some(SupabaseClient::return_representation()),
        ).await?;
        Ok(!rows.is_empty())
    }
}

enum Backend {
    Memory(Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>),
    Supabase(Arc<SupabaseClient>),
}

/// Hands out typed collections. In memory mode every call for the same
/// document type returns the same shared collection.
pub struct DocumentStore {
    backend: Backend,
}

impl DocumentStore {
    pub fn from_config(config: &AppConfig) -> Self {
        if config.is_database_configured() {
            info!("Using Supabase document store at {}", config.supabase_url);
            Self::supabase(Arc::new(SupabaseClient::new(config)))
        } else {
            info!("Using in-memory document store");
            Self::in_memory()
        }
    }

    pub fn in_memory() -> Self {
        Self { backend: Backend::Memory(Mutex::new(HashMap::new())) }
    }

    pub fn supabase(client: Arc<SupabaseClient>) -> Self {
        Self { backend: Backend::Supabase(client) }
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(self.backend, Backend::Memory(_))
    }

    pub fn collection<T: Document>(&self) -> Arc<dyn Collection<T>> {
        match &self.backend {
            Backend::Supabase(client) => Arc::new(SupabaseCollection::<T>::new(client.clone())),
            Backend::Memory(collections) => {
                let mut collections = collections
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                let entry = collections
                    .entry(TypeId::of::<T>())
                    .or_insert_with(|| -> Arc<dyn Any + Send + Sync> {
                        debug!("Creating in-memory collection {}", T::COLLECTION);
                        Arc::new(MemoryCollection::<T>::new())
                    })
                    .clone();
                let collection: Arc<dyn Collection<T>> =
                    match entry.downcast::<MemoryCollection<T>>() {
                        Ok(collection) => collection,
                        // unreachable: entries are keyed by TypeId
                        Err(_) => Arc::new(MemoryCollection::<T>::new()),
                    };
                collection
            }
        }
    }
}
