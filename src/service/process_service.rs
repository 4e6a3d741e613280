// Process service: runs each engine action inside one unit of work

use tracing::info;

use super::store::{InMemoryInstanceStore, TransactionalStore};
use crate::config::{AuditLabels, EngineConfig, EngineSettings};
use crate::definition::{InstanceId, ProcessGraph, UserId};
use crate::engine::{
    AuditEntry, Clock, DenyAction, HandleAction, InstanceRepository, RoleResolver, StartRequest,
    SystemClock, Transition, TransitionEngine,
};
use crate::errors::EngineResult;
use crate::instance::InstanceState;
use crate::observability::engine_metrics;
use crate::reachability::{render_chain, ChainNode};
use crate::telemetry::{create_instance_span, generate_correlation_id};

/// One process definition bound to its collaborators and a store.
pub struct ProcessService<R, C = SystemClock, S = InMemoryInstanceStore> {
    graph: ProcessGraph,
    roles: R,
    clock: C,
    store: S,
    settings: EngineSettings,
    labels: AuditLabels,
}

impl<R, C, S> ProcessService<R, C, S>
where
    R: RoleResolver,
    C: Clock,
    S: TransactionalStore,
{
    pub fn new(graph: ProcessGraph, roles: R, clock: C, store: S) -> Self {
        Self {
            graph,
            roles,
            clock,
            store,
            settings: EngineSettings::default(),
            labels: AuditLabels::default(),
        }
    }

    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.settings = config.engine;
        self.labels = config.audit.clone();
        self
    }

    pub fn graph(&self) -> &ProcessGraph {
        &self.graph
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create and persist a new instance.
    pub fn start(&mut self, request: &StartRequest, creator: UserId) -> EngineResult<InstanceState> {
        let correlation_id = generate_correlation_id();
        let span = create_instance_span(
            "start",
            Some(request.instance_id),
            Some(creator),
            &correlation_id,
        );
        let _entered = span.enter();

        let engine = TransitionEngine::new(&self.graph, &self.roles, &self.clock)
            .with_settings(self.settings)
            .with_labels(self.labels.clone());

        let result = crate::time_operation!(
            "start",
            engine.start(request, creator).and_then(|transition| {
                let mut uow = self.store.begin();
                uow.insert_instance(transition.state.clone())?;
                persist_entries(uow.as_mut(), &transition)?;
                uow.commit()?;
                Ok(transition)
            })
        );

        match result {
            Ok(Transition { state, entries }) => {
                engine_metrics().record_start(entries.len(), gateway_hops(&entries));
                Ok(state)
            }
            Err(e) => {
                engine_metrics().record_failure(&e);
                Err(e)
            }
        }
    }

    /// Move an instance along one edge and persist the result atomically.
    pub fn handle(&mut self, actor: UserId, action: &HandleAction) -> EngineResult<InstanceState> {
        let correlation_id = generate_correlation_id();
        let span = create_instance_span(
            "handle",
            Some(action.process_instance_id),
            Some(actor),
            &correlation_id,
        );
        let _entered = span.enter();

        let engine = TransitionEngine::new(&self.graph, &self.roles, &self.clock)
            .with_settings(self.settings)
            .with_labels(self.labels.clone());

        let result = crate::time_operation!("handle", {
            let mut uow = self.store.begin();
            uow.load_instance(action.process_instance_id)
                .and_then(|state| {
                    let last = uow
                        .last_audit_entry(state.id)?
                        .map(|entry| entry.created_at);
                    engine.handle(&state, last, actor, action)
                })
                .and_then(|transition| {
                    uow.replace_instance_state(transition.state.clone())?;
                    persist_entries(uow.as_mut(), &transition)?;
                    uow.commit()?;
                    Ok(transition)
                })
        });

        match result {
            Ok(Transition { state, entries }) => {
                engine_metrics().record_handle(entries.len(), gateway_hops(&entries));
                Ok(state)
            }
            Err(e) => {
                engine_metrics().record_failure(&e);
                Err(e)
            }
        }
    }

    /// Deny an instance at its current position.
    pub fn deny(&mut self, actor: UserId, action: &DenyAction) -> EngineResult<InstanceState> {
        let correlation_id = generate_correlation_id();
        let span = create_instance_span(
            "deny",
            Some(action.process_instance_id),
            Some(actor),
            &correlation_id,
        );
        let _entered = span.enter();

        let engine = TransitionEngine::new(&self.graph, &self.roles, &self.clock)
            .with_settings(self.settings)
            .with_labels(self.labels.clone());

        let result = crate::time_operation!("deny", {
            let mut uow = self.store.begin();
            uow.load_instance(action.process_instance_id)
                .and_then(|state| {
                    let last = uow
                        .last_audit_entry(state.id)?
                        .map(|entry| entry.created_at);
                    engine.deny(&state, last, actor, action)
                })
                .and_then(|transition| {
                    uow.replace_instance_state(transition.state.clone())?;
                    persist_entries(uow.as_mut(), &transition)?;
                    uow.commit()?;
                    Ok(transition)
                })
        });

        match result {
            Ok(Transition { state, entries }) => {
                engine_metrics().record_deny(entries.len());
                Ok(state)
            }
            Err(e) => {
                engine_metrics().record_failure(&e);
                Err(e)
            }
        }
    }

    /// Classified chain for a stored instance.
    pub fn chain(&self, instance_id: InstanceId) -> EngineResult<Vec<ChainNode>> {
        let state = self.store.instance(instance_id)?;
        let position = state.current_position()?;
        render_chain(&self.graph, &position.node_id, self.settings.detect_cycles)
    }

    pub fn history(&self, instance_id: InstanceId) -> Vec<AuditEntry> {
        self.store.audit_trail(instance_id)
    }

    pub fn instance(&self, instance_id: InstanceId) -> EngineResult<InstanceState> {
        self.store.instance(instance_id)
    }
}

fn persist_entries<U>(repository: &mut U, transition: &Transition) -> EngineResult<()>
where
    U: InstanceRepository + ?Sized,
{
    for entry in &transition.entries {
        repository.append_audit_entry(entry.clone())?;
    }
    info!(
        instance_id = %transition.state.id,
        audit_entries = transition.entries.len(),
        "Transition staged"
    );
    Ok(())
}

/// Gateways crossed: every hop after the first, closing entries excluded
fn gateway_hops(entries: &[AuditEntry]) -> usize {
    entries
        .iter()
        .filter(|entry| !entry.is_closing())
        .count()
        .saturating_sub(1)
}
