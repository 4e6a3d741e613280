// Instance state record and its current-position entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::lifecycle::LifecycleStatus;
use super::variables::{merge_variables, Variable};
use crate::definition::{Assignment, InstanceId, TenantId, UserId};
use crate::errors::{EngineError, EngineResult};
use crate::guard::Variables;

/// One concurrently active node of an instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub node_id: String,
    pub label: String,
    /// Users allowed to act here; role assignments are already resolved
    pub processors: Vec<UserId>,
    /// Assignment as authored on the node (method + raw ids)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Assignment>,
    /// Outgoing edge ids, ascending by sort
    pub available_edges: Vec<String>,
}

impl Position {
    pub fn can_be_handled_by(&self, user: UserId) -> bool {
        self.processors.contains(&user)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceState {
    pub id: InstanceId,
    pub definition_id: u64,
    pub tenant_id: TenantId,
    pub title: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    /// Exactly one entry while no parallel gateways exist
    pub positions: Vec<Position>,
    pub variables: Variables,
    pub related_persons: BTreeSet<UserId>,
    pub is_ended: bool,
    pub is_denied: bool,
}

impl InstanceState {
    /// A fresh, not yet positioned instance
    pub fn new(
        id: InstanceId,
        definition_id: u64,
        tenant_id: TenantId,
        title: &str,
        created_by: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            definition_id,
            tenant_id,
            title: title.to_string(),
            created_by,
            created_at,
            positions: Vec::new(),
            variables: Variables::new(),
            related_persons: BTreeSet::new(),
            is_ended: false,
            is_denied: false,
        }
    }

    // TODO: pick the position by node id once parallel gateways add more than one
    pub fn current_position(&self) -> EngineResult<&Position> {
        self.positions
            .first()
            .ok_or_else(|| EngineError::InvalidTransition {
                edge_id: String::new(),
                reason: format!("instance {} has no current position", self.id),
            })
    }

    pub fn status(&self) -> LifecycleStatus {
        LifecycleStatus::from_flags(self.is_ended, self.is_denied)
    }

    pub fn apply_status(&mut self, status: LifecycleStatus) {
        self.is_ended = status == LifecycleStatus::Ended;
        self.is_denied = status == LifecycleStatus::Denied;
    }

    pub fn merge_variables(&mut self, incoming: &[Variable]) {
        merge_variables(&mut self.variables, incoming);
    }

    /// Record that `users` held or touched this instance.
    pub fn relate<I: IntoIterator<Item = UserId>>(&mut self, users: I) {
        self.related_persons.extend(users);
    }

    pub fn is_related(&self, user: UserId) -> bool {
        self.related_persons.contains(&user)
    }
}
