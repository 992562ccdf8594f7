// Typed mutation commands. Each command enumerates exactly the fields it may
// touch, so a mutation can never overwrite unrelated fields and the audit
// diff is computed from typed before/after snapshots.

use crate::project::ProjectStatus;
use crate::task::{TaskPriority, TaskStatus};
use crate::user::{Role, UserStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTeam {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    pub description: Option<String>,

    pub manager_ids: Vec<String>,
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateTeam {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,

    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateProject {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    pub team_id: Option<String>,
    pub manager_ids: Vec<String>,
    pub member_ids: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateProject {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,

    pub status: Option<ProjectStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTask {
    #[validate(length(min = 1, max = 500))]
    pub title: String,

    pub project_id: Option<String>,
    pub team_id: Option<String>,
    pub assignee_ids: Vec<String>,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateTask {
    #[validate(length(min = 1, max = 500))]
    pub title: Option<String>,

    pub assignee_ids: Option<Vec<String>>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
}

/// Status moves go through their own command so the workflow check cannot be
/// bypassed by a general update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTaskStatus {
    pub task_id: String,
    pub requested_status: TaskStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateProfile {
    #[validate(length(min = 1, max = 255))]
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeUserRole {
    pub user_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeUserStatus {
    pub user_id: String,
    pub status: UserStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateComment {
    pub task_id: String,

    #[validate(length(min = 1, max = 10_000))]
    pub content: String,
}
