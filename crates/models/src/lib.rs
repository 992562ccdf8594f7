// Core domain types shared by every crate in the workspace.
// All persisted shapes serialize with camelCase field names, matching the
// document layout of the hosted store.

pub mod audit;
pub mod command;
pub mod comment;
pub mod organization;
pub mod project;
pub mod task;
pub mod team;
pub mod user;

// Re-export commonly used types
pub use audit::{ActionType, AuditLogEntry, EntityType, FieldChange};
pub use command::{
    ChangeUserRole, ChangeUserStatus, CreateComment, CreateProject, CreateTask, CreateTeam,
    UpdateProfile, UpdateProject, UpdateTask, UpdateTaskStatus, UpdateTeam,
};
pub use comment::Comment;
pub use organization::Organization;
pub use project::{Project, ProjectStatus};
pub use task::{AttachmentMeta, ChecklistItem, Task, TaskPriority, TaskStatus};
pub use team::Team;
pub use user::{normalize_email, Role, User, UserStatus};
