use crate::error::Result;
use crate::{fields_of, load};
use serde_json::json;
use std::sync::Arc;
use taskhub_authz::{Action, Actor, Resource, RoleAuthorizer};
use taskhub_models::{Comment, CreateComment, Task};
use taskhub_store::{OrderBy, QueryBuilder, ScopedStore, StoreError};
use uuid::Uuid;
use validator::Validate;

const COLLECTION: &str = "comments";
const TASK_COLLECTION: &str = "tasks";

/// Task comments. Commenting is gated on task access; deletion on authorship
/// or manager rank. Comments are conversational, not audited.
pub struct CommentService {
    store: Arc<ScopedStore>,
    authz: RoleAuthorizer,
}

impl CommentService {
    pub fn new(store: Arc<ScopedStore>, authz: RoleAuthorizer) -> Self {
        Self { store, authz }
    }

    pub async fn create(&self, actor: &Actor, cmd: CreateComment) -> Result<Comment> {
        cmd.validate()?;

        let task: Task = load(&self.store, TASK_COLLECTION, &cmd.task_id).await?;
        self.authz
            .authorize(actor, Action::Comment, &Resource::Task(&task))?;

        let now = self.store.now();
        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            org_id: actor.org_id.clone(),
            task_id: cmd.task_id,
            content: cmd.content,
            author_id: actor.id.clone(),
            created_at: now,
            updated_at: now,
        };
        let doc = self
            .store
            .create(COLLECTION, &comment.id, fields_of(&comment)?)
            .await?;
        Ok(doc.deserialize()?)
    }

    /// Comments on one task, oldest first. Filter and order are on different
    /// fields, so ordering falls back to a client-side sort.
    pub async fn list_for_task(&self, actor: &Actor, task_id: &str) -> Result<Vec<Comment>> {
        let task: Task = load(&self.store, TASK_COLLECTION, task_id).await?;
        self.authz
            .authorize(actor, Action::Read, &Resource::Task(&task))?;

        let query = QueryBuilder::new(COLLECTION)
            .where_eq("taskId", json!(task_id))
            .order_by(OrderBy::asc("createdAt"))
            .with_client_sort_fallback()
            .compose()
            .map_err(StoreError::from)?;
        let docs = self.store.list(&query).await?;
        docs.iter()
            .map(|doc| doc.deserialize().map_err(Into::into))
            .collect()
    }

    pub async fn delete(&self, actor: &Actor, comment_id: &str) -> Result<()> {
        let comment: Comment = load(&self.store, COLLECTION, comment_id).await?;
        self.authz
            .authorize(actor, Action::Delete, &Resource::Comment(&comment))?;
        self.store.delete(COLLECTION, comment_id).await?;
        Ok(())
    }
}
