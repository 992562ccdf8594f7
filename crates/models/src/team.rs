use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Team of users within an organization.
///
/// `manager_ids`/`member_ids` are mirrored onto each listed user's
/// `managed_team_ids`/`team_ids` when the team is created. Later membership
/// edits must be propagated symmetrically by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub org_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub manager_ids: Vec<String>,
    #[serde(default)]
    pub member_ids: Vec<String>,

    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
