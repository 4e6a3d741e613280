// Collaborator traits injected into the engine - separating concerns for testability

use chrono::{DateTime, Duration, Utc};
use std::cell::Cell;
use std::collections::HashMap;

use super::audit::AuditEntry;
use crate::definition::{InstanceId, RoleId, TenantId, UserId};
use crate::errors::EngineResult;
use crate::instance::InstanceState;

/// Resolves role assignments to concrete users
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait RoleResolver {
    /// Users holding any of `role_ids` within `tenant_id`
    fn resolve_role_to_users(&self, role_ids: &[RoleId], tenant_id: TenantId)
        -> EngineResult<Vec<UserId>>;
}

/// Source of "now" for audit timestamps
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Persistence primitives used under the caller's unit of work
pub trait InstanceRepository {
    fn load_instance(&self, id: InstanceId) -> EngineResult<InstanceState>;

    fn insert_instance(&mut self, state: InstanceState) -> EngineResult<()>;

    fn replace_instance_state(&mut self, state: InstanceState) -> EngineResult<()>;

    fn last_audit_entry(&self, id: InstanceId) -> EngineResult<Option<AuditEntry>>;

    fn append_audit_entry(&mut self, entry: AuditEntry) -> EngineResult<()>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

/// Role membership table held in memory; unknown roles have no members
#[derive(Debug, Default, Clone)]
pub struct StaticRoleResolver {
    members: HashMap<(TenantId, RoleId), Vec<UserId>>,
}

impl StaticRoleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, tenant_id: TenantId, role_id: RoleId, users: &[UserId]) -> Self {
        self.members
            .entry((tenant_id, role_id))
            .or_default()
            .extend_from_slice(users);
        self
    }
}

impl RoleResolver for StaticRoleResolver {
    fn resolve_role_to_users(
        &self,
        role_ids: &[RoleId],
        tenant_id: TenantId,
    ) -> EngineResult<Vec<UserId>> {
        let mut users: Vec<UserId> = role_ids
            .iter()
            .filter_map(|role| self.members.get(&(tenant_id, *role)))
            .flatten()
            .copied()
            .collect();
        users.sort_unstable();
        users.dedup();
        Ok(users)
    }
}
