use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comment on a task. Deletable by its author or by any manager/admin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub org_id: String,
    pub task_id: String,
    pub content: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
