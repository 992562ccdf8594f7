use crate::error::Result;
use crate::membership::{link_members, PROJECT_LINK};
use crate::{fields_of, load, snapshot};
use serde_json::Value;
use std::sync::Arc;
use taskhub_audit::AuditRecorder;
use taskhub_authz::{Action, Actor, Resource, RoleAuthorizer};
use taskhub_models::{ActionType, CreateProject, Project, ProjectStatus, UpdateProject};
use taskhub_store::{QueryBuilder, ScopedStore, StoreError};
use uuid::Uuid;
use validator::Validate;

const COLLECTION: &str = "projects";

pub struct ProjectService {
    store: Arc<ScopedStore>,
    authz: RoleAuthorizer,
    recorder: Arc<AuditRecorder>,
}

impl ProjectService {
    pub fn new(store: Arc<ScopedStore>, authz: RoleAuthorizer, recorder: Arc<AuditRecorder>) -> Self {
        Self {
            store,
            authz,
            recorder,
        }
    }

    /// Create a project and link manager/member back-references, saga-style
    /// like team creation.
    pub async fn create(&self, actor: &Actor, cmd: CreateProject) -> Result<Project> {
        cmd.validate()?;

        let now = self.store.now();
        let project = Project {
            id: Uuid::new_v4().to_string(),
            org_id: actor.org_id.clone(),
            name: cmd.name,
            team_id: cmd.team_id,
            status: ProjectStatus::Active,
            manager_ids: cmd.manager_ids,
            member_ids: cmd.member_ids,
            start_date: cmd.start_date,
            end_date: cmd.end_date,
            created_by: actor.id.clone(),
            created_at: now,
            updated_at: now,
        };
        self.authz
            .authorize(actor, Action::Create, &Resource::Project(&project))?;

        let doc = self
            .store
            .create(COLLECTION, &project.id, fields_of(&project)?)
            .await?;
        let created: Project = doc.deserialize()?;

        if let Err(err) = link_members(
            &self.store,
            &PROJECT_LINK,
            &created.id,
            &created.manager_ids,
            &created.member_ids,
        )
        .await
        {
            if let Err(del_err) = self.store.delete(COLLECTION, &created.id).await {
                tracing::error!(project = %created.id, error = %del_err, "project compensation delete failed");
            }
            return Err(err);
        }

        self.recorder
            .record(
                actor,
                ActionType::ProjectCreated,
                &created.id,
                Some(created.name.clone()),
                None,
                snapshot(&created).as_ref(),
            )
            .await;
        Ok(created)
    }

    pub async fn get(&self, actor: &Actor, project_id: &str) -> Result<Project> {
        let project: Project = load(&self.store, COLLECTION, project_id).await?;
        self.authz
            .authorize(actor, Action::Read, &Resource::Project(&project))?;
        Ok(project)
    }

    /// All projects in the org, alphabetical by name (client-side sort).
    pub async fn list(&self, actor: &Actor) -> Result<Vec<Project>> {
        let probe = Project {
            id: String::new(),
            org_id: actor.org_id.clone(),
            name: String::new(),
            team_id: None,
            status: ProjectStatus::Active,
            manager_ids: vec![],
            member_ids: vec![],
            start_date: None,
            end_date: None,
            created_by: String::new(),
            created_at: self.store.now(),
            updated_at: self.store.now(),
        };
        self.authz
            .authorize(actor, Action::Read, &Resource::Project(&probe))?;

        let query = QueryBuilder::new(COLLECTION)
            .sorted_by_name()
            .compose()
            .map_err(StoreError::from)?;
        let docs = self.store.list(&query).await?;
        docs.iter()
            .map(|doc| doc.deserialize().map_err(Into::into))
            .collect()
    }

    /// Update name/status/dates. Membership edits are the caller's to
    /// propagate symmetrically.
    pub async fn update(
        &self,
        actor: &Actor,
        project_id: &str,
        cmd: UpdateProject,
    ) -> Result<Project> {
        cmd.validate()?;

        let before: Project = load(&self.store, COLLECTION, project_id).await?;
        self.authz
            .authorize(actor, Action::Update, &Resource::Project(&before))?;

        let mut after = before.clone();
        let mut patch = serde_json::Map::new();
        if let Some(name) = cmd.name {
            patch.insert("name".to_string(), Value::String(name.clone()));
            after.name = name;
        }
        if let Some(status) = cmd.status {
            patch.insert("status".to_string(), serde_json::to_value(status).map_err(StoreError::from)?);
            after.status = status;
        }
        if let Some(start) = cmd.start_date {
            patch.insert("startDate".to_string(), serde_json::to_value(start).map_err(StoreError::from)?);
            after.start_date = Some(start);
        }
        if let Some(end) = cmd.end_date {
            patch.insert("endDate".to_string(), serde_json::to_value(end).map_err(StoreError::from)?);
            after.end_date = Some(end);
        }

        after.updated_at = self.store.write(COLLECTION, project_id, patch).await?;

        self.recorder
            .record(
                actor,
                ActionType::ProjectUpdated,
                project_id,
                Some(after.name.clone()),
                snapshot(&before).as_ref(),
                snapshot(&after).as_ref(),
            )
            .await;
        Ok(after)
    }

    pub async fn delete(&self, actor: &Actor, project_id: &str) -> Result<()> {
        let before: Project = load(&self.store, COLLECTION, project_id).await?;
        self.authz
            .authorize(actor, Action::Delete, &Resource::Project(&before))?;

        self.store.delete(COLLECTION, project_id).await?;

        self.recorder
            .record(
                actor,
                ActionType::ProjectDeleted,
                project_id,
                Some(before.name.clone()),
                snapshot(&before).as_ref(),
                None,
            )
            .await;
        Ok(())
    }
}
