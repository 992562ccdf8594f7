use crate::backend::{Document, DocumentStore};
use crate::clock::Clock;
use crate::error::{Result, StoreError};
use crate::query::{sort_documents, Query};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;

const ORG_FIELD: &str = "orgId";

/// Per-request scope, derived from the authenticated actor's own org
/// membership. Never built from caller-supplied target text.
#[derive(Debug, Clone)]
pub struct OrgContext {
    pub org_id: String,
    pub actor_id: String,
}

/// CRUD façade that prefixes every collection path with the organization id,
/// guaranteeing tenant isolation at the access layer. Falls back to a
/// secondary transport when the primary one is unreachable.
pub struct ScopedStore {
    primary: Arc<dyn DocumentStore>,
    fallback: Option<Arc<dyn DocumentStore>>,
    ctx: OrgContext,
    clock: Arc<dyn Clock>,
}

impl ScopedStore {
    pub fn new(primary: Arc<dyn DocumentStore>, ctx: OrgContext, clock: Arc<dyn Clock>) -> Self {
        Self {
            primary,
            fallback: None,
            ctx,
            clock,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn DocumentStore>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn ctx(&self) -> &OrgContext {
        &self.ctx
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn path(&self, collection: &str) -> String {
        format!("orgs/{}/{}", self.ctx.org_id, collection)
    }

    fn timestamp(&self) -> Value {
        Value::String(self.clock.now().to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    /// Cross-org documents must never surface. Reaching this is a
    /// programming-contract violation: logged and aborted, not recovered.
    fn check_tenant(&self, doc: &Document) -> Result<()> {
        if let Some(org) = doc.fields.get(ORG_FIELD).and_then(Value::as_str) {
            if org != self.ctx.org_id {
                tracing::error!(
                    document = %doc.id,
                    document_org = %org,
                    scope_org = %self.ctx.org_id,
                    "tenant isolation violation"
                );
                return Err(StoreError::TenantIsolation(format!(
                    "document {} belongs to another org",
                    doc.id
                )));
            }
        }
        Ok(())
    }

    pub async fn read(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let path = self.path(collection);
        let doc = match self.primary.get(&path, id).await {
            Err(StoreError::TransportUnavailable(reason)) => {
                self.fallback_get(&path, id, &reason).await?
            }
            other => other?,
        };
        if let Some(doc) = &doc {
            self.check_tenant(doc)?;
        }
        Ok(doc)
    }

    /// List with server-side ordering where available; a query's
    /// `client_sort` is applied to the returned page here, producing
    /// approximate-to-page ordering under pagination.
    pub async fn list(&self, query: &Query) -> Result<Vec<Document>> {
        let path = self.path(&query.collection);
        let mut docs = match self.primary.list(&path, query).await {
            Err(StoreError::TransportUnavailable(reason)) => {
                self.fallback_list(&path, query, &reason).await?
            }
            other => other?,
        };
        for doc in &docs {
            self.check_tenant(doc)?;
        }
        if let Some(order) = &query.client_sort {
            sort_documents(&mut docs, order);
        }
        Ok(docs)
    }

    /// Create a document: stamps createdAt = updatedAt = now and
    /// createdBy = actor, and pins orgId to the scope. Returns the stamped
    /// document.
    pub async fn create(
        &self,
        collection: &str,
        id: &str,
        mut fields: Map<String, Value>,
    ) -> Result<Document> {
        let now = self.timestamp();
        fields.insert(ORG_FIELD.to_string(), Value::String(self.ctx.org_id.clone()));
        fields.insert("createdAt".to_string(), now.clone());
        fields.insert("updatedAt".to_string(), now);
        fields.insert(
            "createdBy".to_string(),
            Value::String(self.ctx.actor_id.clone()),
        );
        fields.insert("id".to_string(), Value::String(id.to_string()));

        let path = self.path(collection);
        match self.primary.set(&path, id, fields.clone()).await {
            Err(StoreError::TransportUnavailable(reason)) => {
                self.fallback_set(&path, id, fields.clone(), &reason).await?
            }
            other => other?,
        }
        Ok(Document::new(id, fields))
    }

    /// Append an immutable record: stamps createdAt only and pins orgId.
    /// Used for the append-only audit log.
    pub async fn append(
        &self,
        collection: &str,
        id: &str,
        mut fields: Map<String, Value>,
    ) -> Result<()> {
        fields.insert(ORG_FIELD.to_string(), Value::String(self.ctx.org_id.clone()));
        fields.insert("createdAt".to_string(), self.timestamp());
        fields.insert("id".to_string(), Value::String(id.to_string()));

        let path = self.path(collection);
        match self.primary.set(&path, id, fields.clone()).await {
            Err(StoreError::TransportUnavailable(reason)) => {
                self.fallback_set(&path, id, fields, &reason).await
            }
            other => other,
        }
    }

    /// Patch a document: stamps updatedAt = now and returns that stamp. The
    /// patch may not address another org.
    pub async fn write(
        &self,
        collection: &str,
        id: &str,
        mut patch: Map<String, Value>,
    ) -> Result<DateTime<Utc>> {
        if let Some(org) = patch.get(ORG_FIELD).and_then(Value::as_str) {
            if org != self.ctx.org_id {
                tracing::error!(
                    document = %id,
                    patch_org = %org,
                    scope_org = %self.ctx.org_id,
                    "tenant isolation violation in patch"
                );
                return Err(StoreError::TenantIsolation(format!(
                    "patch for {} addresses another org",
                    id
                )));
            }
        }
        let now = self.clock.now();
        patch.insert(
            "updatedAt".to_string(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );

        let path = self.path(collection);
        match self.primary.update(&path, id, patch.clone()).await {
            Err(StoreError::TransportUnavailable(reason)) => {
                self.fallback_update(&path, id, patch, &reason).await?
            }
            other => other?,
        }
        Ok(now)
    }

    pub async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let path = self.path(collection);
        match self.primary.delete(&path, id).await {
            Err(StoreError::TransportUnavailable(reason)) => {
                let fallback = self.fallback(&reason)?;
                fallback
                    .delete(&path, id)
                    .await
                    .map_err(exhaust_transports)
            }
            other => other,
        }
    }

    fn fallback(&self, reason: &str) -> Result<&Arc<dyn DocumentStore>> {
        match &self.fallback {
            Some(fallback) => {
                tracing::warn!(reason, "primary store transport unavailable, using fallback");
                Ok(fallback)
            }
            None => Err(StoreError::Unavailable(reason.to_string())),
        }
    }

    async fn fallback_get(&self, path: &str, id: &str, reason: &str) -> Result<Option<Document>> {
        let fallback = self.fallback(reason)?;
        fallback.get(path, id).await.map_err(exhaust_transports)
    }

    async fn fallback_list(
        &self,
        path: &str,
        query: &Query,
        reason: &str,
    ) -> Result<Vec<Document>> {
        let fallback = self.fallback(reason)?;
        fallback.list(path, query).await.map_err(exhaust_transports)
    }

    async fn fallback_set(
        &self,
        path: &str,
        id: &str,
        fields: Map<String, Value>,
        reason: &str,
    ) -> Result<()> {
        let fallback = self.fallback(reason)?;
        fallback
            .set(path, id, fields)
            .await
            .map_err(exhaust_transports)
    }

    async fn fallback_update(
        &self,
        path: &str,
        id: &str,
        patch: Map<String, Value>,
        reason: &str,
    ) -> Result<()> {
        let fallback = self.fallback(reason)?;
        fallback
            .update(path, id, patch)
            .await
            .map_err(exhaust_transports)
    }
}

/// A failure on the fallback transport surfaces as a retryable connectivity
/// error; everything else passes through unchanged.
fn exhaust_transports(err: StoreError) -> StoreError {
    match err {
        StoreError::TransportUnavailable(reason) => StoreError::Unavailable(reason),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryStore, UnavailableStore};
    use crate::clock::FixedClock;
    use crate::query::QueryBuilder;
    use chrono::TimeZone;
    use serde_json::json;

    fn ctx() -> OrgContext {
        OrgContext {
            org_id: "org1".into(),
            actor_id: "u1".into(),
        }
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 8, 28, 12, 0, 0).unwrap()))
    }

    fn fields(v: serde_json::Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_paths_are_org_prefixed() {
        let backend = Arc::new(MemoryStore::new());
        let store = ScopedStore::new(backend.clone(), ctx(), clock());
        store
            .create("tasks", "t1", fields(json!({"title": "a"})))
            .await
            .unwrap();

        // Document is addressable only under the scoped path.
        assert!(backend.get("orgs/org1/tasks", "t1").await.unwrap().is_some());
        assert!(backend.get("tasks", "t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_stamps_fields() {
        let backend = Arc::new(MemoryStore::new());
        let store = ScopedStore::new(backend, ctx(), clock());
        let doc = store
            .create("tasks", "t1", fields(json!({"title": "a"})))
            .await
            .unwrap();

        assert_eq!(doc.fields.get("orgId"), Some(&json!("org1")));
        assert_eq!(doc.fields.get("createdBy"), Some(&json!("u1")));
        assert_eq!(doc.fields.get("createdAt"), doc.fields.get("updatedAt"));
        assert_eq!(
            doc.fields.get("createdAt"),
            Some(&json!("2026-08-28T12:00:00.000000Z"))
        );
    }

    #[tokio::test]
    async fn test_write_stamps_updated_at_only() {
        let backend = Arc::new(MemoryStore::new());
        let store = ScopedStore::new(backend.clone(), ctx(), clock());
        store
            .create("tasks", "t1", fields(json!({"title": "a"})))
            .await
            .unwrap();

        let later = Utc.with_ymd_and_hms(2026, 8, 29, 9, 0, 0).unwrap();
        let store = ScopedStore::new(backend, ctx(), Arc::new(FixedClock(later)));
        store
            .write("tasks", "t1", fields(json!({"title": "b"})))
            .await
            .unwrap();

        let doc = store.read("tasks", "t1").await.unwrap().unwrap();
        assert_eq!(doc.fields.get("title"), Some(&json!("b")));
        assert_eq!(
            doc.fields.get("createdAt"),
            Some(&json!("2026-08-28T12:00:00.000000Z"))
        );
        assert_eq!(
            doc.fields.get("updatedAt"),
            Some(&json!("2026-08-29T09:00:00.000000Z"))
        );
    }

    #[tokio::test]
    async fn test_cross_org_document_is_rejected() {
        let backend = Arc::new(MemoryStore::new());
        // Seed a document under org1's path that claims to belong to org2.
        backend
            .set(
                "orgs/org1/tasks",
                "t1",
                fields(json!({"orgId": "org2", "title": "smuggled"})),
            )
            .await
            .unwrap();

        let store = ScopedStore::new(backend, ctx(), clock());
        let err = store.read("tasks", "t1").await.unwrap_err();
        assert!(matches!(err, StoreError::TenantIsolation(_)));
    }

    #[tokio::test]
    async fn test_patch_addressing_another_org_is_rejected() {
        let backend = Arc::new(MemoryStore::new());
        let store = ScopedStore::new(backend, ctx(), clock());
        store
            .create("tasks", "t1", fields(json!({"title": "a"})))
            .await
            .unwrap();

        let err = store
            .write("tasks", "t1", fields(json!({"orgId": "org2"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TenantIsolation(_)));
    }

    #[tokio::test]
    async fn test_fallback_engages_when_primary_unreachable() {
        let fallback = Arc::new(MemoryStore::new());
        let store = ScopedStore::new(Arc::new(UnavailableStore), ctx(), clock())
            .with_fallback(fallback.clone());

        store
            .create("tasks", "t1", fields(json!({"title": "a"})))
            .await
            .unwrap();
        let doc = store.read("tasks", "t1").await.unwrap().unwrap();
        assert_eq!(doc.fields.get("title"), Some(&json!("a")));
    }

    #[tokio::test]
    async fn test_both_transports_down_is_retryable() {
        let store = ScopedStore::new(Arc::new(UnavailableStore), ctx(), clock())
            .with_fallback(Arc::new(UnavailableStore));

        let err = store.read("tasks", "t1").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_no_fallback_surfaces_retryable_error() {
        let store = ScopedStore::new(Arc::new(UnavailableStore), ctx(), clock());
        let err = store.read("tasks", "t1").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_client_sort_applies_to_page() {
        let backend = Arc::new(MemoryStore::new());
        let store = ScopedStore::new(backend, ctx(), clock());
        for (id, name) in [("team2", "Zeta"), ("team1", "Alpha"), ("team3", "Midline")] {
            store
                .create("teams", id, fields(json!({"name": name})))
                .await
                .unwrap();
        }

        let query = QueryBuilder::new("teams").sorted_by_name().compose().unwrap();
        let docs = store.list(&query).await.unwrap();
        let names: Vec<&str> = docs
            .iter()
            .map(|d| d.fields.get("name").and_then(Value::as_str).unwrap())
            .collect();
        assert_eq!(names, vec!["Alpha", "Midline", "Zeta"]);
    }
}
