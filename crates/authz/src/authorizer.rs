use crate::error::{AuthzError, DenyReason, Result};
use std::collections::HashSet;
use taskhub_models::{Comment, Project, Role, Task, Team, User, UserStatus};

/// Action an actor attempts against a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    Comment,
    ChangeStatus,
    UpdateProfile,
    ChangeRole,
    ChangeUserStatus,
}

/// Manager-scoped resource reference used for ownership checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Team(String),
    Project(String),
}

/// The acting user, reduced to what authorization needs: role, status and
/// ownership sets. Built once per request from the session's profile.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: String,
    pub org_id: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub managed_team_ids: HashSet<String>,
    pub managed_project_ids: HashSet<String>,
}

impl Actor {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            org_id: user.org_id.clone(),
            email: user.email.clone(),
            role: user.role,
            status: user.status,
            managed_team_ids: user.managed_team_ids.iter().cloned().collect(),
            managed_project_ids: user.managed_project_ids.iter().cloned().collect(),
        }
    }
}

#[derive(Debug)]
pub enum Resource<'a> {
    Task(&'a Task),
    Team(&'a Team),
    Project(&'a Project),
    User(&'a User),
    Comment(&'a Comment),
}

/// Evaluates whether an actor (role + ownership sets) may perform an action
/// on an entity. Denials carry the attempted action and failed check for
/// logging, but display a uniform message.
#[derive(Debug, Clone, Default)]
pub struct RoleAuthorizer;

impl RoleAuthorizer {
    pub fn new() -> Self {
        Self
    }

    /// Disabled accounts fail every check immediately, regardless of role.
    fn require_enabled(&self, actor: &Actor, action: Action) -> Result<()> {
        if actor.status == UserStatus::Disabled {
            tracing::warn!(actor = %actor.id, ?action, "denied: account disabled");
            return Err(AuthzError::denied(action, DenyReason::AccountDisabled));
        }
        Ok(())
    }

    fn require_role(&self, actor: &Actor, action: Action, required: Role) -> Result<()> {
        if actor.role >= required {
            Ok(())
        } else {
            Err(AuthzError::denied(action, DenyReason::MinimumRole(required)))
        }
    }

    /// May the actor manage the given team/project? Admins bypass ownership;
    /// managers need the id in their ownership set.
    pub fn can_manage(&self, actor: &Actor, scope: &Scope) -> bool {
        if actor.status == UserStatus::Disabled {
            return false;
        }
        match actor.role {
            Role::Admin => true,
            Role::Manager => match scope {
                Scope::Team(id) => actor.managed_team_ids.contains(id),
                Scope::Project(id) => actor.managed_project_ids.contains(id),
            },
            Role::Employee => false,
        }
    }

    fn require_manage(&self, actor: &Actor, action: Action, scope: &Scope) -> Result<()> {
        self.require_role(actor, action, Role::Manager)?;
        if self.can_manage(actor, scope) {
            Ok(())
        } else {
            Err(AuthzError::denied(action, DenyReason::Ownership))
        }
    }

    /// Task read/comment access: manager role or assignment.
    fn require_task_access(&self, actor: &Actor, action: Action, task: &Task) -> Result<()> {
        if actor.role >= Role::Manager || task.is_assignee(&actor.id) {
            Ok(())
        } else {
            Err(AuthzError::denied(action, DenyReason::NotAssignee))
        }
    }

    pub fn authorize(&self, actor: &Actor, action: Action, resource: &Resource) -> Result<()> {
        self.require_enabled(actor, action)?;

        match resource {
            Resource::Task(task) => match action {
                Action::Read | Action::Comment => self.require_task_access(actor, action, task),
                // Status moves share the read gate; done-immutability is the
                // workflow's to enforce.
                Action::Update | Action::ChangeStatus => {
                    self.require_task_access(actor, action, task)
                }
                Action::Create => Ok(()),
                Action::Delete => self.require_role(actor, action, Role::Manager),
                _ => Err(AuthzError::denied(action, DenyReason::MinimumRole(Role::Admin))),
            },
            Resource::Team(team) => match action {
                Action::Read => Ok(()),
                Action::Create => self.require_role(actor, action, Role::Manager),
                Action::Update | Action::Delete => {
                    self.require_manage(actor, action, &Scope::Team(team.id.clone()))
                }
                _ => Err(AuthzError::denied(action, DenyReason::MinimumRole(Role::Admin))),
            },
            Resource::Project(project) => match action {
                Action::Read => Ok(()),
                Action::Create => self.require_role(actor, action, Role::Manager),
                Action::Update | Action::Delete => {
                    self.require_manage(actor, action, &Scope::Project(project.id.clone()))
                }
                _ => Err(AuthzError::denied(action, DenyReason::MinimumRole(Role::Admin))),
            },
            Resource::User(user) => match action {
                Action::Read => Ok(()),
                // Non-privileged profile fields: always permitted on self.
                Action::UpdateProfile => {
                    if actor.id == user.id {
                        Ok(())
                    } else {
                        self.require_role(actor, action, Role::Admin)
                    }
                }
                // Privileged fields: admin only, and never on oneself.
                Action::ChangeRole | Action::ChangeUserStatus => {
                    self.require_role(actor, action, Role::Admin)?;
                    if actor.id == user.id {
                        Err(AuthzError::denied(action, DenyReason::SelfPrivilegeChange))
                    } else {
                        Ok(())
                    }
                }
                _ => Err(AuthzError::denied(action, DenyReason::MinimumRole(Role::Admin))),
            },
            Resource::Comment(comment) => match action {
                Action::Delete => {
                    if comment.author_id == actor.id || actor.role >= Role::Manager {
                        Ok(())
                    } else {
                        Err(AuthzError::denied(action, DenyReason::MinimumRole(Role::Manager)))
                    }
                }
                _ => Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use taskhub_models::{TaskPriority, TaskStatus};

    fn actor(id: &str, role: Role, status: UserStatus) -> Actor {
        Actor {
            id: id.into(),
            org_id: "org1".into(),
            email: format!("{}@example.com", id),
            role,
            status,
            managed_team_ids: HashSet::new(),
            managed_project_ids: HashSet::new(),
        }
    }

    fn task(assignees: &[&str]) -> Task {
        Task {
            id: "t1".into(),
            org_id: "org1".into(),
            title: "Fix handrail".into(),
            project_id: None,
            team_id: None,
            assignee_ids: assignees.iter().map(|s| s.to_string()).collect(),
            status: TaskStatus::Backlog,
            priority: TaskPriority::Medium,
            due_date: None,
            tags: vec![],
            checklist: vec![],
            attachments: vec![],
            created_by: "m1".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
        }
    }

    fn team(id: &str) -> Team {
        Team {
            id: id.into(),
            org_id: "org1".into(),
            name: "Night shift".into(),
            description: None,
            manager_ids: vec![],
            member_ids: vec![],
            created_by: "a1".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn user(id: &str, role: Role) -> User {
        User {
            id: id.into(),
            org_id: "org1".into(),
            email: format!("{}@example.com", id),
            display_name: id.to_uppercase(),
            role,
            status: UserStatus::Active,
            managed_team_ids: vec![],
            managed_project_ids: vec![],
            team_ids: vec![],
            project_ids: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_monotonicity() {
        // Any action permitted for a lower role is permitted for a higher one.
        let authz = RoleAuthorizer::new();
        let t = task(&[]);
        let roles = [Role::Employee, Role::Manager, Role::Admin];
        for action in [Action::Read, Action::Create, Action::Update, Action::Delete] {
            let mut allowed_below = false;
            for role in roles {
                let ok = authz
                    .authorize(&actor("u", role, UserStatus::Active), action, &Resource::Task(&t))
                    .is_ok();
                assert!(
                    !allowed_below || ok,
                    "{:?} allowed for a lower role but not {:?}",
                    action,
                    role
                );
                allowed_below = ok;
            }
        }
    }

    #[test]
    fn test_unassigned_employee_cannot_read_task() {
        // Scenario C: employee u1 not in assigneeIds, not a manager.
        let authz = RoleAuthorizer::new();
        let t = task(&["someone-else"]);
        let err = authz
            .authorize(
                &actor("u1", Role::Employee, UserStatus::Active),
                Action::Read,
                &Resource::Task(&t),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "not authorized");
    }

    #[test]
    fn test_assignee_can_read_and_move_task() {
        let authz = RoleAuthorizer::new();
        let t = task(&["u1"]);
        let a = actor("u1", Role::Employee, UserStatus::Active);
        assert!(authz.authorize(&a, Action::Read, &Resource::Task(&t)).is_ok());
        assert!(authz.authorize(&a, Action::ChangeStatus, &Resource::Task(&t)).is_ok());
        assert!(authz.authorize(&a, Action::Comment, &Resource::Task(&t)).is_ok());
        // Assignment does not grant deletion.
        assert!(authz.authorize(&a, Action::Delete, &Resource::Task(&t)).is_err());
    }

    #[test]
    fn test_disabled_admin_is_denied_everything() {
        // Scenario D: disabled status beats admin rank.
        let authz = RoleAuthorizer::new();
        let t = task(&["u2"]);
        let a = actor("u2", Role::Admin, UserStatus::Disabled);
        for action in [Action::Read, Action::Create, Action::Update, Action::Delete] {
            let err = authz
                .authorize(&a, action, &Resource::Task(&t))
                .unwrap_err();
            assert!(err.requires_sign_out());
        }
        assert!(!authz.can_manage(&a, &Scope::Team("team1".into())));
    }

    #[test]
    fn test_manager_ownership_check() {
        let authz = RoleAuthorizer::new();
        let owned = team("team1");
        let other = team("team2");

        let mut m = actor("m1", Role::Manager, UserStatus::Active);
        m.managed_team_ids.insert("team1".into());

        assert!(authz.authorize(&m, Action::Update, &Resource::Team(&owned)).is_ok());
        assert!(authz.authorize(&m, Action::Update, &Resource::Team(&other)).is_err());

        // Admin bypasses ownership entirely.
        let a = actor("a1", Role::Admin, UserStatus::Active);
        assert!(authz.authorize(&a, Action::Update, &Resource::Team(&other)).is_ok());
    }

    #[test]
    fn test_self_profile_exemption() {
        let authz = RoleAuthorizer::new();
        let me = user("u1", Role::Employee);
        let a = actor("u1", Role::Employee, UserStatus::Active);

        assert!(authz
            .authorize(&a, Action::UpdateProfile, &Resource::User(&me))
            .is_ok());
        // Never one's own role or status, even for admins.
        let admin_user = user("a1", Role::Admin);
        let admin = actor("a1", Role::Admin, UserStatus::Active);
        assert!(authz
            .authorize(&admin, Action::ChangeRole, &Resource::User(&admin_user))
            .is_err());
        assert!(authz
            .authorize(&admin, Action::ChangeRole, &Resource::User(&me))
            .is_ok());
        assert!(authz
            .authorize(&a, Action::ChangeRole, &Resource::User(&me))
            .is_err());
    }

    #[test]
    fn test_comment_deletion() {
        let authz = RoleAuthorizer::new();
        let comment = Comment {
            id: "c1".into(),
            org_id: "org1".into(),
            task_id: "t1".into(),
            content: "looks done to me".into(),
            author_id: "u1".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let author = actor("u1", Role::Employee, UserStatus::Active);
        let bystander = actor("u2", Role::Employee, UserStatus::Active);
        let manager = actor("m1", Role::Manager, UserStatus::Active);

        assert!(authz
            .authorize(&author, Action::Delete, &Resource::Comment(&comment))
            .is_ok());
        assert!(authz
            .authorize(&bystander, Action::Delete, &Resource::Comment(&comment))
            .is_err());
        assert!(authz
            .authorize(&manager, Action::Delete, &Resource::Comment(&comment))
            .is_ok());
    }
}
