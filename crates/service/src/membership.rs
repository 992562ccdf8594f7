// Two-step membership linking for team/project creation.
//
// The entity document and the per-user back-reference arrays live in
// separate documents, so the link is not atomic: each user patch is a
// separate write, racing with any concurrent edit of the same array
// (last write wins). On failure the saga compensates by unlinking the
// back-references it already applied; the caller then deletes the entity.

use crate::error::{Result, ServiceError};
use serde_json::Value;
use taskhub_store::ScopedStore;

const USER_COLLECTION: &str = "users";

pub(crate) struct MembershipLink<'a> {
    /// users.* array holding ids the user manages.
    pub managed_field: &'a str,
    /// users.* array holding ids the user belongs to.
    pub member_field: &'a str,
}

pub(crate) const TEAM_LINK: MembershipLink<'static> = MembershipLink {
    managed_field: "managedTeamIds",
    member_field: "teamIds",
};

pub(crate) const PROJECT_LINK: MembershipLink<'static> = MembershipLink {
    managed_field: "managedProjectIds",
    member_field: "projectIds",
};

/// Add `entity_id` to the back-reference arrays of every listed manager and
/// member. On the first failure, already-applied links are removed
/// (best-effort) and the error is returned for the caller to compensate the
/// entity write.
pub(crate) async fn link_members(
    store: &ScopedStore,
    link: &MembershipLink<'_>,
    entity_id: &str,
    manager_ids: &[String],
    member_ids: &[String],
) -> Result<()> {
    let mut applied: Vec<(String, &str)> = Vec::new();

    let steps = manager_ids
        .iter()
        .map(|id| (id, link.managed_field))
        .chain(member_ids.iter().map(|id| (id, link.member_field)));

    for (user_id, field) in steps {
        match add_back_reference(store, user_id, field, entity_id).await {
            Ok(()) => applied.push((user_id.clone(), field)),
            Err(err) => {
                tracing::error!(
                    entity = %entity_id,
                    user = %user_id,
                    field,
                    error = %err,
                    "membership link failed, compensating"
                );
                unlink_applied(store, &applied, entity_id).await;
                return Err(err);
            }
        }
    }
    Ok(())
}

async fn add_back_reference(
    store: &ScopedStore,
    user_id: &str,
    field: &str,
    entity_id: &str,
) -> Result<()> {
    let doc = store
        .read(USER_COLLECTION, user_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("users/{}", user_id)))?;

    let mut ids: Vec<Value> = doc
        .fields
        .get(field)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if ids.iter().any(|v| v.as_str() == Some(entity_id)) {
        return Ok(());
    }
    ids.push(Value::String(entity_id.to_string()));

    let mut patch = serde_json::Map::new();
    patch.insert(field.to_string(), Value::Array(ids));
    store.write(USER_COLLECTION, user_id, patch).await?;
    Ok(())
}

/// Best-effort removal of already-applied links during compensation. A
/// failure here leaves a dangling back-reference to an entity that is about
/// to be deleted; it is logged, not propagated.
async fn unlink_applied(store: &ScopedStore, applied: &[(String, &str)], entity_id: &str) {
    for (user_id, field) in applied {
        if let Err(err) = remove_back_reference(store, user_id, field, entity_id).await {
            tracing::error!(
                entity = %entity_id,
                user = %user_id,
                field,
                error = %err,
                "membership compensation failed"
            );
        }
    }
}

async fn remove_back_reference(
    store: &ScopedStore,
    user_id: &str,
    field: &str,
    entity_id: &str,
) -> Result<()> {
    let doc = store
        .read(USER_COLLECTION, user_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("users/{}", user_id)))?;

    let ids: Vec<Value> = doc
        .fields
        .get(field)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter(|v| v.as_str() != Some(entity_id))
        .collect();

    let mut patch = serde_json::Map::new();
    patch.insert(field.to_string(), Value::Array(ids));
    store.write(USER_COLLECTION, user_id, patch).await?;
    Ok(())
}
