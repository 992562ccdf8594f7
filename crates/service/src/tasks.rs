use crate::error::Result;
use crate::{fields_of, load, snapshot};
use serde_json::{json, Value};
use std::sync::Arc;
use taskhub_audit::AuditRecorder;
use taskhub_authz::{Action, Actor, Resource, RoleAuthorizer};
use taskhub_models::{
    ActionType, CreateTask, Role, Task, TaskStatus, UpdateTask, UpdateTaskStatus,
};
use taskhub_store::{QueryBuilder, ScopedStore, StoreError};
use uuid::Uuid;
use validator::Validate;

const COLLECTION: &str = "tasks";

pub struct TaskService {
    store: Arc<ScopedStore>,
    authz: RoleAuthorizer,
    recorder: Arc<AuditRecorder>,
}

impl TaskService {
    pub fn new(store: Arc<ScopedStore>, authz: RoleAuthorizer, recorder: Arc<AuditRecorder>) -> Self {
        Self {
            store,
            authz,
            recorder,
        }
    }

    pub async fn create(&self, actor: &Actor, cmd: CreateTask) -> Result<Task> {
        cmd.validate()?;

        let now = self.store.now();
        let task = Task {
            id: Uuid::new_v4().to_string(),
            org_id: actor.org_id.clone(),
            title: cmd.title,
            project_id: cmd.project_id,
            team_id: cmd.team_id,
            assignee_ids: cmd.assignee_ids,
            status: TaskStatus::Backlog,
            priority: cmd.priority,
            due_date: cmd.due_date,
            tags: cmd.tags,
            checklist: vec![],
            attachments: vec![],
            created_by: actor.id.clone(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.authz
            .authorize(actor, Action::Create, &Resource::Task(&task))?;

        let doc = self
            .store
            .create(COLLECTION, &task.id, fields_of(&task)?)
            .await?;
        let created: Task = doc.deserialize()?;

        self.recorder
            .record(
                actor,
                ActionType::TaskCreated,
                &created.id,
                Some(created.title.clone()),
                None,
                snapshot(&created).as_ref(),
            )
            .await;
        Ok(created)
    }

    pub async fn get(&self, actor: &Actor, task_id: &str) -> Result<Task> {
        let task: Task = load(&self.store, COLLECTION, task_id).await?;
        self.authz
            .authorize(actor, Action::Read, &Resource::Task(&task))?;
        Ok(task)
    }

    /// Tasks visible to the actor, optionally narrowed to a status set.
    /// Employees see assigned tasks only; managers and admins see the org.
    /// Ordering degrades to a client-side dueDate sort when the filter
    /// combination would need a composite index.
    pub async fn list(&self, actor: &Actor, statuses: Option<Vec<TaskStatus>>) -> Result<Vec<Task>> {
        let mut builder = QueryBuilder::new(COLLECTION).with_client_sort_fallback();
        if actor.role < Role::Manager {
            builder = builder.where_array_contains("assigneeIds", json!(actor.id));
        }
        if let Some(statuses) = statuses {
            let values = statuses
                .into_iter()
                .map(|s| serde_json::to_value(s).map_err(StoreError::from))
                .collect::<std::result::Result<Vec<Value>, _>>()?;
            builder = builder.where_in("status", values);
        }

        let query = builder.compose().map_err(StoreError::from)?;
        let docs = self.store.list(&query).await?;
        let tasks: Vec<Task> = docs
            .iter()
            .map(|doc| doc.deserialize())
            .collect::<std::result::Result<_, _>>()?;

        // The query already scoped employee reads to assignments; the
        // authorizer still gets the last word (disabled accounts).
        for task in &tasks {
            self.authz
                .authorize(actor, Action::Read, &Resource::Task(task))?;
        }
        Ok(tasks)
    }

    /// Tasks in one project, dueDate-ascending.
    pub async fn list_by_project(&self, actor: &Actor, project_id: &str) -> Result<Vec<Task>> {
        let mut builder = QueryBuilder::new(COLLECTION)
            .with_client_sort_fallback()
            .where_eq("projectId", json!(project_id));
        if actor.role < Role::Manager {
            builder = builder.where_array_contains("assigneeIds", json!(actor.id));
        }
        let query = builder.compose().map_err(StoreError::from)?;
        let docs = self.store.list(&query).await?;
        docs.iter()
            .map(|doc| doc.deserialize().map_err(Into::into))
            .collect()
    }

    pub async fn update(&self, actor: &Actor, task_id: &str, cmd: UpdateTask) -> Result<Task> {
        cmd.validate()?;

        let before: Task = load(&self.store, COLLECTION, task_id).await?;
        self.authz
            .authorize(actor, Action::Update, &Resource::Task(&before))?;

        let mut after = before.clone();
        let mut patch = serde_json::Map::new();
        if let Some(title) = cmd.title {
            patch.insert("title".to_string(), Value::String(title.clone()));
            after.title = title;
        }
        if let Some(assignees) = cmd.assignee_ids {
            patch.insert(
                "assigneeIds".to_string(),
                serde_json::to_value(&assignees).map_err(StoreError::from)?,
            );
            after.assignee_ids = assignees;
        }
        if let Some(priority) = cmd.priority {
            patch.insert(
                "priority".to_string(),
                serde_json::to_value(priority).map_err(StoreError::from)?,
            );
            after.priority = priority;
        }
        if let Some(due) = cmd.due_date {
            patch.insert(
                "dueDate".to_string(),
                serde_json::to_value(due).map_err(StoreError::from)?,
            );
            after.due_date = Some(due);
        }
        if let Some(tags) = cmd.tags {
            patch.insert(
                "tags".to_string(),
                serde_json::to_value(&tags).map_err(StoreError::from)?,
            );
            after.tags = tags;
        }

        after.updated_at = self.store.write(COLLECTION, task_id, patch).await?;

        self.recorder
            .record(
                actor,
                ActionType::TaskUpdated,
                task_id,
                Some(after.title.clone()),
                snapshot(&before).as_ref(),
                snapshot(&after).as_ref(),
            )
            .await;
        Ok(after)
    }

    /// Move a task through the workflow:
    /// authorize -> transition -> write -> record.
    ///
    /// There is no conditional write guarding concurrent moves of the same
    /// task: the last write wins on status, and each caller's audit entry is
    /// recorded independently.
    pub async fn update_status(&self, actor: &Actor, cmd: UpdateTaskStatus) -> Result<Task> {
        let before: Task = load(&self.store, COLLECTION, &cmd.task_id).await?;
        self.authz
            .authorize(actor, Action::ChangeStatus, &Resource::Task(&before))?;

        let mut after = taskhub_workflow::transition(&before, cmd.requested_status, self.store.now())?;

        let mut patch = serde_json::Map::new();
        patch.insert(
            "status".to_string(),
            serde_json::to_value(after.status).map_err(StoreError::from)?,
        );
        if after.status == TaskStatus::Done {
            patch.insert(
                "completedAt".to_string(),
                serde_json::to_value(after.completed_at).map_err(StoreError::from)?,
            );
        }

        after.updated_at = self.store.write(COLLECTION, &cmd.task_id, patch).await?;

        self.recorder
            .record(
                actor,
                ActionType::TaskUpdated,
                &cmd.task_id,
                Some(after.title.clone()),
                snapshot(&before).as_ref(),
                snapshot(&after).as_ref(),
            )
            .await;
        Ok(after)
    }

    /// Mark one checklist item completed, stamped with the acting user and
    /// the current time.
    pub async fn complete_checklist_item(
        &self,
        actor: &Actor,
        task_id: &str,
        item_id: &str,
    ) -> Result<Task> {
        let before: Task = load(&self.store, COLLECTION, task_id).await?;
        self.authz
            .authorize(actor, Action::Update, &Resource::Task(&before))?;

        let mut after = before.clone();
        let now = self.store.now();
        let item = after
            .checklist
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| crate::ServiceError::NotFound(format!("checklist item {}", item_id)))?;
        item.completed = true;
        item.completed_at = Some(now);
        item.completed_by = Some(actor.id.clone());

        let mut patch = serde_json::Map::new();
        patch.insert(
            "checklist".to_string(),
            serde_json::to_value(&after.checklist).map_err(StoreError::from)?,
        );
        after.updated_at = self.store.write(COLLECTION, task_id, patch).await?;

        self.recorder
            .record(
                actor,
                ActionType::TaskUpdated,
                task_id,
                Some(after.title.clone()),
                snapshot(&before).as_ref(),
                snapshot(&after).as_ref(),
            )
            .await;
        Ok(after)
    }

    pub async fn delete(&self, actor: &Actor, task_id: &str) -> Result<()> {
        let before: Task = load(&self.store, COLLECTION, task_id).await?;
        self.authz
            .authorize(actor, Action::Delete, &Resource::Task(&before))?;

        self.store.delete(COLLECTION, task_id).await?;

        self.recorder
            .record(
                actor,
                ActionType::TaskDeleted,
                task_id,
                Some(before.title.clone()),
                snapshot(&before).as_ref(),
                None,
            )
            .await;
        Ok(())
    }
}
