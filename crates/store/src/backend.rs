use crate::error::{Result, StoreError};
use crate::query::{sort_documents, Query};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// One stored document: id plus its field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Deserialize the field map into a typed model.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }
}

/// Document store collaborator: get/list/set/update/delete over
/// collection-path-addressed documents. `path` is always a full collection
/// path (org prefix included); only [`crate::ScopedStore`] builds paths.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &str, id: &str) -> Result<Option<Document>>;
    async fn list(&self, path: &str, query: &Query) -> Result<Vec<Document>>;
    async fn set(&self, path: &str, id: &str, fields: Map<String, Value>) -> Result<()>;
    async fn update(&self, path: &str, id: &str, patch: Map<String, Value>) -> Result<()>;
    async fn delete(&self, path: &str, id: &str) -> Result<()>;
}

/// In-memory backend. Evaluates the full predicate set and server-side
/// ordering; used by tests and local runs.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Map<String, Value>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str, id: &str) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(path)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn list(&self, path: &str, query: &Query) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let mut docs: Vec<Document> = collections
            .get(path)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, fields)| query.predicates.iter().all(|p| p.matches(fields)))
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order_by {
            sort_documents(&mut docs, order);
        }
        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }
        Ok(docs)
    }

    async fn set(&self, path: &str, id: &str, fields: Map<String, Value>) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(path.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        Ok(())
    }

    async fn update(&self, path: &str, id: &str, patch: Map<String, Value>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(path)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", path, id)))?;
        for (field, value) in patch {
            doc.insert(field, value);
        }
        Ok(())
    }

    async fn delete(&self, path: &str, id: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(path) {
            docs.remove(id);
        }
        Ok(())
    }
}

/// Backend whose every call fails with [`StoreError::TransportUnavailable`].
/// Stands in for an unreachable primary transport in tests.
pub struct UnavailableStore;

#[async_trait]
impl DocumentStore for UnavailableStore {
    async fn get(&self, _path: &str, _id: &str) -> Result<Option<Document>> {
        Err(StoreError::TransportUnavailable("primary down".into()))
    }

    async fn list(&self, _path: &str, _query: &Query) -> Result<Vec<Document>> {
        Err(StoreError::TransportUnavailable("primary down".into()))
    }

    async fn set(&self, _path: &str, _id: &str, _fields: Map<String, Value>) -> Result<()> {
        Err(StoreError::TransportUnavailable("primary down".into()))
    }

    async fn update(&self, _path: &str, _id: &str, _patch: Map<String, Value>) -> Result<()> {
        Err(StoreError::TransportUnavailable("primary down".into()))
    }

    async fn delete(&self, _path: &str, _id: &str) -> Result<()> {
        Err(StoreError::TransportUnavailable("primary down".into()))
    }
}
