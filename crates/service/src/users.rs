use crate::error::Result;
use crate::{load, snapshot};
use serde_json::Value;
use std::sync::Arc;
use taskhub_audit::AuditRecorder;
use taskhub_authz::{Action, Actor, Resource, RoleAuthorizer};
use taskhub_models::{
    ActionType, ChangeUserRole, ChangeUserStatus, UpdateProfile, User, UserStatus,
};
use taskhub_store::{OrderBy, QueryBuilder, ScopedStore, StoreError};
use validator::Validate;

const COLLECTION: &str = "users";

pub struct UserService {
    store: Arc<ScopedStore>,
    authz: RoleAuthorizer,
    recorder: Arc<AuditRecorder>,
}

impl UserService {
    pub fn new(store: Arc<ScopedStore>, authz: RoleAuthorizer, recorder: Arc<AuditRecorder>) -> Self {
        Self {
            store,
            authz,
            recorder,
        }
    }

    pub async fn get(&self, actor: &Actor, user_id: &str) -> Result<User> {
        let user: User = load(&self.store, COLLECTION, user_id).await?;
        self.authz
            .authorize(actor, Action::Read, &Resource::User(&user))?;
        Ok(user)
    }

    /// Org directory, alphabetical by display name.
    pub async fn list(&self, actor: &Actor) -> Result<Vec<User>> {
        let query = QueryBuilder::new(COLLECTION)
            .order_by(OrderBy::asc("displayName"))
            .compose()
            .map_err(StoreError::from)?;
        let docs = self.store.list(&query).await?;
        let users: Vec<User> = docs
            .iter()
            .map(|doc| doc.deserialize())
            .collect::<std::result::Result<_, _>>()?;
        for user in &users {
            self.authz
                .authorize(actor, Action::Read, &Resource::User(user))?;
        }
        Ok(users)
    }

    /// Non-privileged profile fields. Permitted on oneself; otherwise admin.
    pub async fn update_profile(
        &self,
        actor: &Actor,
        user_id: &str,
        cmd: UpdateProfile,
    ) -> Result<User> {
        cmd.validate()?;

        let before: User = load(&self.store, COLLECTION, user_id).await?;
        self.authz
            .authorize(actor, Action::UpdateProfile, &Resource::User(&before))?;

        let mut after = before.clone();
        let mut patch = serde_json::Map::new();
        patch.insert(
            "displayName".to_string(),
            Value::String(cmd.display_name.clone()),
        );
        after.display_name = cmd.display_name;

        after.updated_at = self.store.write(COLLECTION, user_id, patch).await?;

        self.recorder
            .record(
                actor,
                ActionType::UserUpdated,
                user_id,
                Some(after.display_name.clone()),
                snapshot(&before).as_ref(),
                snapshot(&after).as_ref(),
            )
            .await;
        Ok(after)
    }

    /// Privileged: admin only, never on oneself.
    pub async fn change_role(&self, actor: &Actor, cmd: ChangeUserRole) -> Result<User> {
        let before: User = load(&self.store, COLLECTION, &cmd.user_id).await?;
        self.authz
            .authorize(actor, Action::ChangeRole, &Resource::User(&before))?;

        let mut after = before.clone();
        let mut patch = serde_json::Map::new();
        patch.insert(
            "role".to_string(),
            serde_json::to_value(cmd.role).map_err(StoreError::from)?,
        );
        after.role = cmd.role;

        after.updated_at = self.store.write(COLLECTION, &cmd.user_id, patch).await?;

        self.recorder
            .record(
                actor,
                ActionType::UserRoleChanged,
                &cmd.user_id,
                Some(after.display_name.clone()),
                snapshot(&before).as_ref(),
                snapshot(&after).as_ref(),
            )
            .await;
        Ok(after)
    }

    /// Privileged: admin only, never on oneself. Disabling gets its own audit
    /// label; other status moves are plain updates.
    pub async fn change_status(&self, actor: &Actor, cmd: ChangeUserStatus) -> Result<User> {
        let before: User = load(&self.store, COLLECTION, &cmd.user_id).await?;
        self.authz
            .authorize(actor, Action::ChangeUserStatus, &Resource::User(&before))?;

        let mut after = before.clone();
        let mut patch = serde_json::Map::new();
        patch.insert(
            "status".to_string(),
            serde_json::to_value(cmd.status).map_err(StoreError::from)?,
        );
        after.status = cmd.status;

        after.updated_at = self.store.write(COLLECTION, &cmd.user_id, patch).await?;

        let action_type = if cmd.status == UserStatus::Disabled {
            ActionType::UserDisabled
        } else {
            ActionType::UserUpdated
        };
        self.recorder
            .record(
                actor,
                action_type,
                &cmd.user_id,
                Some(after.display_name.clone()),
                snapshot(&before).as_ref(),
                snapshot(&after).as_ref(),
            )
            .await;
        Ok(after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{actor, seed_user, test_env};
    use taskhub_models::Role;

    #[tokio::test]
    async fn test_user_updates_own_display_name() {
        let env = test_env().await;
        seed_user(&env, "e1", Role::Employee).await;
        let service = UserService::new(env.store.clone(), RoleAuthorizer::new(), env.recorder.clone());

        let updated = service
            .update_profile(
                &actor("e1", Role::Employee),
                "e1",
                UpdateProfile {
                    display_name: "Jo Field".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.display_name, "Jo Field");

        // Another employee may not.
        let err = service
            .update_profile(
                &actor("e2", Role::Employee),
                "e1",
                UpdateProfile {
                    display_name: "Hijacked".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, crate::ServiceError::Authz(_)));
    }

    #[tokio::test]
    async fn test_admin_cannot_change_own_role() {
        let env = test_env().await;
        seed_user(&env, "a1", Role::Admin).await;
        let service = UserService::new(env.store.clone(), RoleAuthorizer::new(), env.recorder.clone());

        let err = service
            .change_role(
                &env.admin,
                ChangeUserRole {
                    user_id: "a1".into(),
                    role: Role::Employee,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, crate::ServiceError::Authz(_)));
    }

    #[tokio::test]
    async fn test_role_change_is_audited_with_distinct_label() {
        let env = test_env().await;
        seed_user(&env, "e1", Role::Employee).await;
        let service = UserService::new(env.store.clone(), RoleAuthorizer::new(), env.recorder.clone());

        let promoted = service
            .change_role(
                &env.admin,
                ChangeUserRole {
                    user_id: "e1".into(),
                    role: Role::Manager,
                },
            )
            .await
            .unwrap();
        assert_eq!(promoted.role, Role::Manager);

        let entries = env.audit_entries().await;
        let entry = entries
            .iter()
            .find(|e| e.action_type == ActionType::UserRoleChanged)
            .unwrap();
        let changes = entry.changes.as_ref().unwrap();
        assert_eq!(
            changes["role"].after,
            Some(serde_json::json!("manager"))
        );
    }

    #[tokio::test]
    async fn test_disable_uses_dedicated_audit_label() {
        let env = test_env().await;
        seed_user(&env, "e1", Role::Employee).await;
        let service = UserService::new(env.store.clone(), RoleAuthorizer::new(), env.recorder.clone());

        service
            .change_status(
                &env.admin,
                ChangeUserStatus {
                    user_id: "e1".into(),
                    status: UserStatus::Disabled,
                },
            )
            .await
            .unwrap();

        let entries = env.audit_entries().await;
        assert!(entries
            .iter()
            .any(|e| e.action_type == ActionType::UserDisabled));

        // Re-activation is an ordinary user update.
        service
            .change_status(
                &env.admin,
                ChangeUserStatus {
                    user_id: "e1".into(),
                    status: UserStatus::Active,
                },
            )
            .await
            .unwrap();
        let entries = env.audit_entries().await;
        assert!(entries
            .iter()
            .any(|e| e.action_type == ActionType::UserUpdated));
    }
}
