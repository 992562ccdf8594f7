use crate::error::Result;
use crate::membership::{link_members, TEAM_LINK};
use crate::{fields_of, load, snapshot};
use serde_json::Value;
use std::sync::Arc;
use taskhub_audit::AuditRecorder;
use taskhub_authz::{Action, Actor, Resource, RoleAuthorizer};
use taskhub_models::{ActionType, CreateTeam, Team, UpdateTeam};
use taskhub_store::{QueryBuilder, ScopedStore, StoreError};
use uuid::Uuid;
use validator::Validate;

const COLLECTION: &str = "teams";

pub struct TeamService {
    store: Arc<ScopedStore>,
    authz: RoleAuthorizer,
    recorder: Arc<AuditRecorder>,
}

impl TeamService {
    pub fn new(store: Arc<ScopedStore>, authz: RoleAuthorizer, recorder: Arc<AuditRecorder>) -> Self {
        Self {
            store,
            authz,
            recorder,
        }
    }

    /// Create a team and link every listed manager/member user record with a
    /// back-reference. The link runs as a saga: if any back-reference write
    /// fails, applied links are unlinked and the team document is deleted.
    pub async fn create(&self, actor: &Actor, cmd: CreateTeam) -> Result<Team> {
        cmd.validate()?;

        let now = self.store.now();
        let team = Team {
            id: Uuid::new_v4().to_string(),
            org_id: actor.org_id.clone(),
            name: cmd.name,
            description: cmd.description,
            manager_ids: cmd.manager_ids,
            member_ids: cmd.member_ids,
            created_by: actor.id.clone(),
            created_at: now,
            updated_at: now,
        };
        self.authz
            .authorize(actor, Action::Create, &Resource::Team(&team))?;

        let doc = self
            .store
            .create(COLLECTION, &team.id, fields_of(&team)?)
            .await?;
        let created: Team = doc.deserialize()?;

        if let Err(err) = link_members(
            &self.store,
            &TEAM_LINK,
            &created.id,
            &created.manager_ids,
            &created.member_ids,
        )
        .await
        {
            if let Err(del_err) = self.store.delete(COLLECTION, &created.id).await {
                tracing::error!(team = %created.id, error = %del_err, "team compensation delete failed");
            }
            return Err(err);
        }

        self.recorder
            .record(
                actor,
                ActionType::TeamCreated,
                &created.id,
                Some(created.name.clone()),
                None,
                snapshot(&created).as_ref(),
            )
            .await;
        Ok(created)
    }

    pub async fn get(&self, actor: &Actor, team_id: &str) -> Result<Team> {
        let team: Team = load(&self.store, COLLECTION, team_id).await?;
        self.authz
            .authorize(actor, Action::Read, &Resource::Team(&team))?;
        Ok(team)
    }

    /// All teams in the org, alphabetical by name (client-side sort).
    pub async fn list(&self, actor: &Actor) -> Result<Vec<Team>> {
        let probe = Team {
            id: String::new(),
            org_id: actor.org_id.clone(),
            name: String::new(),
            description: None,
            manager_ids: vec![],
            member_ids: vec![],
            created_by: String::new(),
            created_at: self.store.now(),
            updated_at: self.store.now(),
        };
        self.authz
            .authorize(actor, Action::Read, &Resource::Team(&probe))?;

        let query = QueryBuilder::new(COLLECTION)
            .sorted_by_name()
            .compose()
            .map_err(StoreError::from)?;
        let docs = self.store.list(&query).await?;
        docs.iter()
            .map(|doc| doc.deserialize().map_err(Into::into))
            .collect()
    }

    /// Update name/description. Membership list changes are a separate
    /// concern: edits must be propagated to user back-references
    /// symmetrically by the caller.
    pub async fn update(&self, actor: &Actor, team_id: &str, cmd: UpdateTeam) -> Result<Team> {
        cmd.validate()?;

        let before: Team = load(&self.store, COLLECTION, team_id).await?;
        self.authz
            .authorize(actor, Action::Update, &Resource::Team(&before))?;

        let mut after = before.clone();
        let mut patch = serde_json::Map::new();
        if let Some(name) = cmd.name {
            patch.insert("name".to_string(), Value::String(name.clone()));
            after.name = name;
        }
        if let Some(description) = cmd.description {
            patch.insert(
                "description".to_string(),
                Value::String(description.clone()),
            );
            after.description = Some(description);
        }

        after.updated_at = self.store.write(COLLECTION, team_id, patch).await?;

        self.recorder
            .record(
                actor,
                ActionType::TeamUpdated,
                team_id,
                Some(after.name.clone()),
                snapshot(&before).as_ref(),
                snapshot(&after).as_ref(),
            )
            .await;
        Ok(after)
    }

    pub async fn delete(&self, actor: &Actor, team_id: &str) -> Result<()> {
        let before: Team = load(&self.store, COLLECTION, team_id).await?;
        self.authz
            .authorize(actor, Action::Delete, &Resource::Team(&before))?;

        self.store.delete(COLLECTION, team_id).await?;

        self.recorder
            .record(
                actor,
                ActionType::TeamDeleted,
                team_id,
                Some(before.name.clone()),
                snapshot(&before).as_ref(),
                None,
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_user, test_env};
    use taskhub_models::Role;

    fn create_cmd() -> CreateTeam {
        CreateTeam {
            name: "Night shift".into(),
            description: Some("After-hours crew".into()),
            manager_ids: vec!["m1".into()],
            member_ids: vec!["e1".into(), "e2".into()],
        }
    }

    #[tokio::test]
    async fn test_create_links_back_references() {
        // Scenario E.
        let env = test_env().await;
        seed_user(&env, "m1", Role::Manager).await;
        seed_user(&env, "e1", Role::Employee).await;
        seed_user(&env, "e2", Role::Employee).await;

        let service = TeamService::new(env.store.clone(), RoleAuthorizer::new(), env.recorder.clone());
        let team = service.create(&env.admin, create_cmd()).await.unwrap();

        let manager: taskhub_models::User = load(&env.store, "users", "m1").await.unwrap();
        assert!(manager.managed_team_ids.contains(&team.id));
        for member in ["e1", "e2"] {
            let user: taskhub_models::User = load(&env.store, "users", member).await.unwrap();
            assert!(user.team_ids.contains(&team.id));
        }
    }

    #[tokio::test]
    async fn test_create_compensates_on_link_failure() {
        let env = test_env().await;
        seed_user(&env, "m1", Role::Manager).await;
        // e1 exists, e2 does not: the second member link fails.
        seed_user(&env, "e1", Role::Employee).await;

        let service = TeamService::new(env.store.clone(), RoleAuthorizer::new(), env.recorder.clone());
        let err = service.create(&env.admin, create_cmd()).await.unwrap_err();
        assert!(matches!(err, crate::ServiceError::NotFound(_)));

        // Team document was compensated away and applied links removed.
        let query = QueryBuilder::new("teams").compose().unwrap();
        assert!(env.store.list(&query).await.unwrap().is_empty());
        let e1: taskhub_models::User = load(&env.store, "users", "e1").await.unwrap();
        assert!(e1.team_ids.is_empty());
        let m1: taskhub_models::User = load(&env.store, "users", "m1").await.unwrap();
        assert!(m1.managed_team_ids.is_empty());
    }

    #[tokio::test]
    async fn test_employee_cannot_create_team() {
        let env = test_env().await;
        let service = TeamService::new(env.store.clone(), RoleAuthorizer::new(), env.recorder.clone());
        let err = service.create(&env.employee, create_cmd()).await.unwrap_err();
        assert!(matches!(err, crate::ServiceError::Authz(_)));
    }

    #[tokio::test]
    async fn test_update_audits_changed_fields() {
        let env = test_env().await;
        seed_user(&env, "m1", Role::Manager).await;
        seed_user(&env, "e1", Role::Employee).await;
        seed_user(&env, "e2", Role::Employee).await;
        let service = TeamService::new(env.store.clone(), RoleAuthorizer::new(), env.recorder.clone());
        let team = service.create(&env.admin, create_cmd()).await.unwrap();

        let updated = service
            .update(
                &env.admin,
                &team.id,
                UpdateTeam {
                    name: Some("Day shift".into()),
                    description: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Day shift");

        let entries = env.audit_entries().await;
        let entry = entries
            .iter()
            .find(|e| e.action_type == ActionType::TeamUpdated)
            .unwrap();
        let changes = entry.changes.as_ref().unwrap();
        assert!(changes.contains_key("name"));
        assert!(!changes.contains_key("description"));
    }
}
