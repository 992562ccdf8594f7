use crate::error::{Result, ServiceError};
use crate::{fields_of, snapshot};
use serde_json::json;
use std::sync::Arc;
use taskhub_audit::AuditRecorder;
use taskhub_authz::{Action, Actor, AuthzError, DenyReason};
use taskhub_models::user::email_domain;
use taskhub_models::{normalize_email, ActionType, Organization, User, UserStatus};
use taskhub_store::{
    Clock, DocumentStore, OrgContext, QueryBuilder, ScopedStore, StoreError,
};

const ORG_COLLECTION: &str = "organizations";
const USER_COLLECTION: &str = "users";

/// What the identity provider vouches for. Kept separate from the
/// store-backed profile; the two are composed exactly once, here.
#[derive(Debug, Clone)]
pub struct IdentityInfo {
    pub user_id: String,
    pub email: String,
    pub email_verified: bool,
}

/// Identity + profile, assembled at session establishment. Call sites work
/// with this composed struct, never with an ad-hoc merge.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub identity: IdentityInfo,
    pub profile: User,
}

impl CurrentUser {
    pub fn actor(&self) -> Actor {
        Actor::from_user(&self.profile)
    }
}

/// An established request scope: the composed user plus the org-scoped store
/// handle derived from their membership.
pub struct Session {
    pub current_user: CurrentUser,
    pub store: Arc<ScopedStore>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("current_user", &self.current_user)
            .finish_non_exhaustive()
    }
}

/// Resolves an authenticated identity to an organization and a store-backed
/// profile, provisioning the profile on first successful authentication.
pub struct SessionManager {
    primary: Arc<dyn DocumentStore>,
    fallback: Option<Arc<dyn DocumentStore>>,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(primary: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            primary,
            fallback: None,
            clock,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn DocumentStore>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub async fn establish(&self, identity: IdentityInfo) -> Result<Session> {
        let email = normalize_email(&identity.email)
            .ok_or_else(|| ServiceError::Validation(format!("invalid email: {}", identity.email)))?;
        let domain = email_domain(&email)
            .ok_or_else(|| ServiceError::Validation(format!("invalid email: {}", email)))?
            .to_string();

        let org = self.find_org_for_domain(&domain).await?;

        let store = Arc::new(
            {
                let store = ScopedStore::new(
                    self.primary.clone(),
                    OrgContext {
                        org_id: org.id.clone(),
                        actor_id: identity.user_id.clone(),
                    },
                    self.clock.clone(),
                );
                match &self.fallback {
                    Some(fallback) => store.with_fallback(fallback.clone()),
                    None => store,
                }
            },
        );

        let profile = match store.read(USER_COLLECTION, &identity.user_id).await? {
            Some(doc) => doc.deserialize::<User>().map_err(ServiceError::from)?,
            None => self.provision(&store, &org, &identity, &email).await?,
        };

        // A disabled account fails at the boundary, before any action; the
        // caller must force a sign-out.
        if profile.status == UserStatus::Disabled {
            return Err(AuthzError::denied(Action::Read, DenyReason::AccountDisabled).into());
        }

        Ok(Session {
            current_user: CurrentUser {
                identity: IdentityInfo {
                    email: email.clone(),
                    ..identity
                },
                profile,
            },
            store,
        })
    }

    /// Create the store-backed profile on first authentication.
    async fn provision(
        &self,
        store: &Arc<ScopedStore>,
        org: &Organization,
        identity: &IdentityInfo,
        email: &str,
    ) -> Result<User> {
        // Email is unique within the org.
        let taken = QueryBuilder::new(USER_COLLECTION)
            .where_eq("email", json!(email))
            .compose()
            .map_err(StoreError::from)?;
        if !store.list(&taken).await?.is_empty() {
            return Err(ServiceError::Validation(format!(
                "email {} is already registered in this organization",
                email
            )));
        }

        let display_name = email
            .split('@')
            .next()
            .unwrap_or(email)
            .to_string();
        let now = self.clock.now();
        let user = User {
            id: identity.user_id.clone(),
            org_id: org.id.clone(),
            email: email.to_string(),
            display_name,
            role: org.default_role,
            status: if identity.email_verified {
                UserStatus::Active
            } else {
                UserStatus::Pending
            },
            managed_team_ids: vec![],
            managed_project_ids: vec![],
            team_ids: vec![],
            project_ids: vec![],
            created_at: now,
            updated_at: now,
        };

        let doc = store
            .create(USER_COLLECTION, &user.id, fields_of(&user)?)
            .await?;
        let created: User = doc.deserialize()?;

        tracing::info!(user = %created.id, org = %org.id, "provisioned user on first auth");
        let recorder = AuditRecorder::new(store.clone());
        recorder
            .record(
                &Actor::from_user(&created),
                ActionType::UserCreated,
                &created.id,
                Some(created.display_name.clone()),
                None,
                snapshot(&created).as_ref(),
            )
            .await;

        Ok(created)
    }

    /// Resolve an organization by allowed email domain. Runs before any org
    /// scope exists, so it addresses the organizations collection directly.
    async fn find_org_for_domain(&self, domain: &str) -> Result<Organization> {
        let query = QueryBuilder::new(ORG_COLLECTION)
            .where_array_contains("allowedEmailDomains", json!(domain))
            .compose()
            .map_err(StoreError::from)?;

        let docs = match self.primary.list(ORG_COLLECTION, &query).await {
            Err(StoreError::TransportUnavailable(reason)) => match &self.fallback {
                Some(fallback) => fallback
                    .list(ORG_COLLECTION, &query)
                    .await
                    .map_err(|err| match err {
                        StoreError::TransportUnavailable(r) => StoreError::Unavailable(r),
                        other => other,
                    })?,
                None => return Err(StoreError::Unavailable(reason).into()),
            },
            other => other?,
        };

        let orgs: Vec<Organization> = docs
            .iter()
            .map(|doc| doc.deserialize())
            .collect::<std::result::Result<_, _>>()?;
        orgs.into_iter()
            .find(|org| org.allows_domain(domain))
            .ok_or_else(|| ServiceError::EmailDomainNotAllowed(domain.to_string()))
    }
}
