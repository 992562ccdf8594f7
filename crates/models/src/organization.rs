use crate::user::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Organization (tenant). Every other entity references it by id, and no
/// entity is ever readable or writable outside its own organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub name: String,

    /// Email domains whose users are provisioned into this organization on
    /// first successful authentication.
    #[serde(default)]
    pub allowed_email_domains: Vec<String>,

    /// Role assigned to newly provisioned users.
    pub default_role: Role,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn allows_domain(&self, domain: &str) -> bool {
        self.allowed_email_domains
            .iter()
            .any(|d| d.eq_ignore_ascii_case(domain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_allows_domain_case_insensitive() {
        let org = Organization {
            id: "org1".into(),
            name: "Acme".into(),
            allowed_email_domains: vec!["acme.com".into()],
            default_role: Role::Employee,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(org.allows_domain("acme.com"));
        assert!(org.allows_domain("ACME.com"));
        assert!(!org.allows_domain("other.com"));
    }
}
