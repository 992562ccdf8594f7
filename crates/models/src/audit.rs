use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    User,
    Team,
    Project,
    Task,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityType::User => write!(f, "user"),
            EntityType::Team => write!(f, "team"),
            EntityType::Project => write!(f, "project"),
            EntityType::Task => write!(f, "task"),
        }
    }
}

/// Audited action kinds: entity+verb for the four entity types, plus the two
/// user lifecycle actions that get their own label.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    UserCreated,
    UserUpdated,
    UserDeleted,
    UserDisabled,
    UserRoleChanged,
    TeamCreated,
    TeamUpdated,
    TeamDeleted,
    ProjectCreated,
    ProjectUpdated,
    ProjectDeleted,
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
}

impl ActionType {
    pub fn entity_type(&self) -> EntityType {
        match self {
            ActionType::UserCreated
            | ActionType::UserUpdated
            | ActionType::UserDeleted
            | ActionType::UserDisabled
            | ActionType::UserRoleChanged => EntityType::User,
            ActionType::TeamCreated | ActionType::TeamUpdated | ActionType::TeamDeleted => {
                EntityType::Team
            }
            ActionType::ProjectCreated
            | ActionType::ProjectUpdated
            | ActionType::ProjectDeleted => EntityType::Project,
            ActionType::TaskCreated | ActionType::TaskUpdated | ActionType::TaskDeleted => {
                EntityType::Task
            }
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionType::UserCreated => "user_created",
            ActionType::UserUpdated => "user_updated",
            ActionType::UserDeleted => "user_deleted",
            ActionType::UserDisabled => "user_disabled",
            ActionType::UserRoleChanged => "user_role_changed",
            ActionType::TeamCreated => "team_created",
            ActionType::TeamUpdated => "team_updated",
            ActionType::TeamDeleted => "team_deleted",
            ActionType::ProjectCreated => "project_created",
            ActionType::ProjectUpdated => "project_updated",
            ActionType::ProjectDeleted => "project_deleted",
            ActionType::TaskCreated => "task_created",
            ActionType::TaskUpdated => "task_updated",
            ActionType::TaskDeleted => "task_deleted",
        };
        write!(f, "{}", s)
    }
}

/// One field-level before/after pair inside an audit entry. Either side may
/// be absent (creation has no `before`, deletion has no `after`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<serde_json::Value>,
}

/// Append-only audit record of a mutation, attributed to the acting user.
/// Never mutated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: String,
    pub org_id: String,
    pub actor_id: String,
    pub actor_email: String,
    pub action_type: ActionType,
    pub entity_type: EntityType,
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<BTreeMap<String, FieldChange>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_labels() {
        assert_eq!(ActionType::TaskUpdated.to_string(), "task_updated");
        assert_eq!(ActionType::UserRoleChanged.to_string(), "user_role_changed");
        assert_eq!(
            serde_json::to_string(&ActionType::ProjectDeleted).unwrap(),
            "\"project_deleted\""
        );
    }

    #[test]
    fn test_action_type_entity_type() {
        assert_eq!(ActionType::UserDisabled.entity_type(), EntityType::User);
        assert_eq!(ActionType::TaskCreated.entity_type(), EntityType::Task);
    }
}
