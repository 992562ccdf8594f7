use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

lazy_static::lazy_static! {
    static ref EMAIL_REGEX: regex::Regex =
        regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// Role hierarchy used for minimum-role authorization checks.
/// Variant order matters: the derived `Ord` gives employee < manager < admin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Manager,
    Admin,
}

impl Role {
    /// Numeric rank: employee=1, manager=2, admin=3.
    pub fn rank(&self) -> u8 {
        match self {
            Role::Employee => 1,
            Role::Manager => 2,
            Role::Admin => 3,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Employee => write!(f, "employee"),
            Role::Manager => write!(f, "manager"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
    Disabled,
}

/// Store-backed user profile. Users are never hard-deleted; status moves to
/// `Disabled` instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub org_id: String,

    /// Lowercase-normalized, unique within the organization.
    pub email: String,
    pub display_name: String,

    pub role: Role,
    pub status: UserStatus,

    /// Ownership sets: ids a manager may act on, distinct from role.
    #[serde(default)]
    pub managed_team_ids: Vec<String>,
    #[serde(default)]
    pub managed_project_ids: Vec<String>,

    /// Membership sets (back-references maintained on team/project creation).
    #[serde(default)]
    pub team_ids: Vec<String>,
    #[serde(default)]
    pub project_ids: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lowercase-normalize an email address. Returns `None` when the input does
/// not look like an address at all.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if EMAIL_REGEX.is_match(&email) {
        Some(email)
    } else {
        None
    }
}

/// Domain part of a normalized email address.
pub fn email_domain(email: &str) -> Option<&str> {
    email.rsplit_once('@').map(|(_, domain)| domain)
}
