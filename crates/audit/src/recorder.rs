use crate::diff::diff;
use serde_json::Value;
use std::sync::Arc;
use taskhub_authz::Actor;
use taskhub_models::{ActionType, AuditLogEntry};
use taskhub_store::ScopedStore;
use uuid::Uuid;

const AUDIT_COLLECTION: &str = "audit_logs";

/// Appends immutable, actor-attributed audit entries with a field-level
/// before/after diff. Best-effort by contract: a failed audit write must
/// never block or roll back the primary mutation, so failures go to the
/// observability sink and `record` returns nothing.
pub struct AuditRecorder {
    store: Arc<ScopedStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<ScopedStore>) -> Self {
        Self { store }
    }

    pub async fn record(
        &self,
        actor: &Actor,
        action_type: ActionType,
        entity_id: &str,
        entity_name: Option<String>,
        before: Option<&Value>,
        after: Option<&Value>,
    ) {
        let changes = diff(before, after);
        let entry = AuditLogEntry {
            id: Uuid::new_v4().to_string(),
            org_id: actor.org_id.clone(),
            actor_id: actor.id.clone(),
            actor_email: actor.email.clone(),
            action_type,
            entity_type: action_type.entity_type(),
            entity_id: entity_id.to_string(),
            entity_name,
            changes: if changes.is_empty() {
                None
            } else {
                Some(changes)
            },
            created_at: self.store.now(),
        };

        let fields = match serde_json::to_value(&entry) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) | Err(_) => {
                tracing::error!(
                    entry_id = %entry.id,
                    action = %action_type,
                    "audit entry did not serialize to an object, dropping"
                );
                return;
            }
        };

        if let Err(err) = self.store.append(AUDIT_COLLECTION, &entry.id, fields).await {
            tracing::error!(
                entry_id = %entry.id,
                action = %action_type,
                entity_id = %entity_id,
                error = %err,
                "audit write failed"
            );
        }
    }
}
