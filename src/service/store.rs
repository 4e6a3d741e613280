// In-memory instance store with staged, all-or-nothing units of work

use std::collections::HashMap;
use tracing::debug;

use crate::definition::InstanceId;
use crate::engine::{AuditEntry, InstanceRepository};
use crate::errors::{EngineError, EngineResult};
use crate::instance::InstanceState;

/// Repository access scoped to one action.
///
/// Writes are staged until [`UnitOfWork::commit`]; dropping the unit of work
/// without committing throws them away.
pub trait UnitOfWork: InstanceRepository {
    fn commit(self: Box<Self>) -> EngineResult<()>;
}

/// A store that hands out units of work and answers committed reads
pub trait TransactionalStore {
    fn begin(&mut self) -> Box<dyn UnitOfWork + '_>;

    /// Committed state of one instance
    fn instance(&self, id: InstanceId) -> EngineResult<InstanceState>;

    /// Committed audit entries of one instance, oldest first
    fn audit_trail(&self, id: InstanceId) -> Vec<AuditEntry>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryInstanceStore {
    instances: HashMap<InstanceId, InstanceState>,
    audit: HashMap<InstanceId, Vec<AuditEntry>>,
}

impl InMemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl TransactionalStore for InMemoryInstanceStore {
    fn begin(&mut self) -> Box<dyn UnitOfWork + '_> {
        Box::new(MemoryUnitOfWork {
            store: self,
            staged_instances: HashMap::new(),
            staged_audit: Vec::new(),
        })
    }

    fn instance(&self, id: InstanceId) -> EngineResult<InstanceState> {
        self.instances
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("instance", id.to_string()))
    }

    fn audit_trail(&self, id: InstanceId) -> Vec<AuditEntry> {
        self.audit.get(&id).cloned().unwrap_or_default()
    }
}

struct MemoryUnitOfWork<'s> {
    store: &'s mut InMemoryInstanceStore,
    staged_instances: HashMap<InstanceId, InstanceState>,
    staged_audit: Vec<AuditEntry>,
}

impl MemoryUnitOfWork<'_> {
    fn exists(&self, id: InstanceId) -> bool {
        self.staged_instances.contains_key(&id) || self.store.instances.contains_key(&id)
    }
}

impl InstanceRepository for MemoryUnitOfWork<'_> {
    fn load_instance(&self, id: InstanceId) -> EngineResult<InstanceState> {
        match self.staged_instances.get(&id) {
            Some(state) => Ok(state.clone()),
            None => self.store.instance(id),
        }
    }

    fn insert_instance(&mut self, state: InstanceState) -> EngineResult<()> {
        if self.exists(state.id) {
            return Err(EngineError::Repository(format!(
                "instance {} already exists",
                state.id
            )));
        }
        self.staged_instances.insert(state.id, state);
        Ok(())
    }

    fn replace_instance_state(&mut self, state: InstanceState) -> EngineResult<()> {
        if !self.exists(state.id) {
            return Err(EngineError::Repository(format!(
                "instance {} does not exist",
                state.id
            )));
        }
        self.staged_instances.insert(state.id, state);
        Ok(())
    }

    fn last_audit_entry(&self, id: InstanceId) -> EngineResult<Option<AuditEntry>> {
        let staged = self.staged_audit.iter().rev().find(|e| e.instance_id == id);
        let committed = || self.store.audit.get(&id).and_then(|trail| trail.last());
        Ok(staged.or_else(committed).cloned())
    }

    fn append_audit_entry(&mut self, entry: AuditEntry) -> EngineResult<()> {
        self.staged_audit.push(entry);
        Ok(())
    }
}

impl UnitOfWork for MemoryUnitOfWork<'_> {
    fn commit(self: Box<Self>) -> EngineResult<()> {
        let MemoryUnitOfWork {
            store,
            staged_instances,
            staged_audit,
        } = *self;

        debug!(
            instances = staged_instances.len(),
            audit_entries = staged_audit.len(),
            "Committing unit of work"
        );
        store.instances.extend(staged_instances);
        for entry in staged_audit {
            store.audit.entry(entry.instance_id).or_default().push(entry);
        }
        Ok(())
    }
}
