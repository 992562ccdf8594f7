// Request orchestration. Every mutating request runs
// authorize -> (transition) -> write -> record; reads run
// compose -> list. Store handles, the authorizer and the audit recorder are
// passed in by the process bootstrap, never held as module state.

pub mod comments;
pub mod error;
mod membership;
pub mod projects;
pub mod session;
pub mod tasks;
pub mod teams;
#[cfg(test)]
mod testutil;
pub mod users;

pub use comments::CommentService;
pub use error::{Result, ServiceError};
pub use projects::ProjectService;
pub use session::{CurrentUser, IdentityInfo, Session, SessionManager};
pub use tasks::TaskService;
pub use teams::TeamService;
pub use users::UserService;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use taskhub_store::ScopedStore;

/// Serialize an entity into a document field map.
pub(crate) fn fields_of<T: Serialize>(entity: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(ServiceError::Validation(
            "entity did not serialize to an object".into(),
        )),
        Err(err) => Err(taskhub_store::StoreError::from(err).into()),
    }
}

/// Snapshot an entity for audit diffing.
pub(crate) fn snapshot<T: Serialize>(entity: &T) -> Option<Value> {
    serde_json::to_value(entity).ok()
}

/// Read one typed entity or fail with NotFound.
pub(crate) async fn load<T: DeserializeOwned>(
    store: &ScopedStore,
    collection: &str,
    id: &str,
) -> Result<T> {
    let doc = store
        .read(collection, id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("{}/{}", collection, id)))?;
    Ok(doc.deserialize()?)
}
