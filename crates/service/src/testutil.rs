// Shared fixtures for service tests: an in-memory backend scoped to one org,
// a fixed clock, and ready-made actors.

use crate::fields_of;
use chrono::{TimeZone, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use taskhub_audit::AuditRecorder;
use taskhub_authz::Actor;
use taskhub_models::{AuditLogEntry, Role, User, UserStatus};
use taskhub_store::{
    Clock, FixedClock, MemoryStore, OrgContext, QueryBuilder, ScopedStore,
};

pub(crate) struct TestEnv {
    pub store: Arc<ScopedStore>,
    pub recorder: Arc<AuditRecorder>,
    pub admin: Actor,
    pub employee: Actor,
}

impl TestEnv {
    pub async fn audit_entries(&self) -> Vec<AuditLogEntry> {
        let query = QueryBuilder::new("audit_logs").compose().unwrap();
        self.store
            .list(&query)
            .await
            .unwrap()
            .iter()
            .map(|doc| doc.deserialize().unwrap())
            .collect()
    }
}

pub(crate) async fn test_env() -> TestEnv {
    let backend = Arc::new(MemoryStore::new());
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2026, 8, 28, 12, 0, 0).unwrap(),
    ));
    let store = Arc::new(ScopedStore::new(
        backend,
        OrgContext {
            org_id: "org1".into(),
            actor_id: "a1".into(),
        },
        clock,
    ));
    let recorder = Arc::new(AuditRecorder::new(store.clone()));
    TestEnv {
        store,
        recorder,
        admin: actor("a1", Role::Admin),
        employee: actor("e0", Role::Employee),
    }
}

pub(crate) fn actor(id: &str, role: Role) -> Actor {
    Actor {
        id: id.into(),
        org_id: "org1".into(),
        email: format!("{}@example.com", id),
        role,
        status: UserStatus::Active,
        managed_team_ids: HashSet::new(),
        managed_project_ids: HashSet::new(),
    }
}

pub(crate) async fn seed_user(env: &TestEnv, id: &str, role: Role) {
    let now = env.store.now();
    let user = User {
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
        created_at: now,
        updated_at: now,
    };
    env.store
        .create("users", id, fields_of(&user).unwrap())
        .await
        .unwrap();
}
