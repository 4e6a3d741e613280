// Transition engine: validation, gateway resolution and state advancement
//
// The engine never mutates the state it is given. Every operation works on a
// copy and returns it with the audit entries to persist, so a failed action
// leaves nothing behind for the caller to undo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::audit::AuditEntry;
use super::traits::{Clock, RoleResolver};
use crate::config::{AuditLabels, EngineSettings};
use crate::definition::{Assignment, Edge, InstanceId, Node, NodeKind, ProcessGraph, TenantId, UserId};
use crate::errors::{EngineError, EngineResult};
use crate::guard::{self, Variables};
use crate::instance::{
    next_status, validate_variables, InstanceState, LifecycleEvent, LifecycleStatus, Position,
    Variable,
};

/// Approve/handle request: move along `edge_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleAction {
    pub edge_id: String,
    pub process_instance_id: InstanceId,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DenyAction {
    pub process_instance_id: InstanceId,
    #[serde(default)]
    pub remarks: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub instance_id: InstanceId,
    pub definition_id: u64,
    pub tenant_id: TenantId,
    pub title: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

/// Result of one action: the next state and the entries to append, in order
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: InstanceState,
    pub entries: Vec<AuditEntry>,
}

/// Accumulates audit entries for one action, chaining elapsed times
struct AuditTrail<'s> {
    instance_id: InstanceId,
    title: &'s str,
    actor_id: UserId,
    remarks: &'s str,
    now: DateTime<Utc>,
    last_at: DateTime<Utc>,
    entries: Vec<AuditEntry>,
}

impl<'s> AuditTrail<'s> {
    fn record(&mut self, source: &Node, target: Option<&Node>, edge_label: &str) {
        let elapsed = (self.now - self.last_at).to_std().unwrap_or(Duration::ZERO);
        self.entries.push(AuditEntry {
            instance_id: self.instance_id,
            title: self.title.to_string(),
            source_node_id: source.id.clone(),
            source_label: source.label.clone(),
            target_node_id: target.map(|t| t.id.clone()),
            edge_label: edge_label.to_string(),
            actor_id: self.actor_id,
            created_at: self.now,
            elapsed,
            remarks: self.remarks.to_string(),
        });
        self.last_at = self.now;
    }
}

pub struct TransitionEngine<'a> {
    graph: &'a ProcessGraph,
    roles: &'a dyn RoleResolver,
    clock: &'a dyn Clock,
    settings: EngineSettings,
    labels: AuditLabels,
}

impl<'a> TransitionEngine<'a> {
    pub fn new(graph: &'a ProcessGraph, roles: &'a dyn RoleResolver, clock: &'a dyn Clock) -> Self {
        Self {
            graph,
            roles,
            clock,
            settings: EngineSettings::default(),
            labels: AuditLabels::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_labels(mut self, labels: AuditLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Create a new instance positioned at the first concrete node after start.
    pub fn start(&self, request: &StartRequest, creator: UserId) -> EngineResult<Transition> {
        validate_variables(&request.variables)?;

        let start = self.graph.start_node()?;
        let first_edge = self
            .graph
            .edges_by_source(&start.id)
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::structure(&start.id, "start node has no outgoing edge"))?;

        let now = self.clock.now();
        let mut state = InstanceState::new(
            request.instance_id,
            request.definition_id,
            request.tenant_id,
            &request.title,
            creator,
            now,
        );
        state.merge_variables(&request.variables);

        let entries = self.advance(&mut state, first_edge, creator, "", now)?;
        state.relate([creator]);

        info!(
            instance_id = %state.id,
            node_id = %state.current_position()?.node_id,
            hops = entries.len(),
            "Instance started"
        );
        Ok(Transition { state, entries })
    }

    /// Preconditions for moving along `action.edge_id`, checked in order.
    pub fn validate_handle(
        &self,
        state: &InstanceState,
        actor: UserId,
        action: &HandleAction,
    ) -> EngineResult<&'a Edge> {
        let edge = self.graph.edge_by_id(&action.edge_id)?;

        let position = state.current_position()?;
        if edge.source != position.node_id {
            return Err(EngineError::InvalidTransition {
                edge_id: edge.id.clone(),
                reason: format!(
                    "edge leaves '{}' but the instance is at '{}'",
                    edge.source, position.node_id
                ),
            });
        }

        self.ensure_active(state)?;
        ensure_permission(position, actor)?;
        Ok(edge)
    }

    /// Preconditions for denial: no edge, otherwise the same chain.
    pub fn validate_deny(&self, state: &InstanceState, actor: UserId) -> EngineResult<()> {
        let position = state.current_position()?;
        self.ensure_active(state)?;
        ensure_permission(position, actor)
    }

    fn ensure_active(&self, state: &InstanceState) -> EngineResult<()> {
        match state.status() {
            LifecycleStatus::Active => Ok(()),
            LifecycleStatus::Ended => Err(EngineError::TerminalState {
                instance_id: state.id,
                state: "ended",
            }),
            LifecycleStatus::Denied => Err(EngineError::TerminalState {
                instance_id: state.id,
                state: "denied",
            }),
        }
    }

    /// Process one handle action.
    ///
    /// `last_entry_at` is the timestamp of the instance's latest audit entry;
    /// when absent the instance creation time is used.
    pub fn handle(
        &self,
        state: &InstanceState,
        last_entry_at: Option<DateTime<Utc>>,
        actor: UserId,
        action: &HandleAction,
    ) -> EngineResult<Transition> {
        validate_variables(&action.variables)?;
        let edge = self
            .validate_handle(state, actor, action)
            .inspect_err(|e| {
                warn!(
                    instance_id = %state.id,
                    edge_id = %action.edge_id,
                    actor_id = %actor,
                    error = %e,
                    "Handle rejected"
                );
            })?;

        let mut working = state.clone();
        working.merge_variables(&action.variables);

        let since = last_entry_at.unwrap_or(state.created_at);
        let entries = self.advance(&mut working, edge, actor, &action.remarks, since)?;
        working.relate([actor]);

        info!(
            instance_id = %working.id,
            edge_id = %edge.id,
            actor_id = %actor,
            node_id = %working.current_position()?.node_id,
            hops = entries.len(),
            "Instance advanced"
        );
        Ok(Transition {
            state: working,
            entries,
        })
    }

    /// Deny the instance at its current position.
    pub fn deny(
        &self,
        state: &InstanceState,
        last_entry_at: Option<DateTime<Utc>>,
        actor: UserId,
        action: &DenyAction,
    ) -> EngineResult<Transition> {
        self.validate_deny(state, actor).inspect_err(|e| {
            warn!(instance_id = %state.id, actor_id = %actor, error = %e, "Deny rejected");
        })?;

        let position = state.current_position()?;
        let node = self.graph.node_by_id(&position.node_id)?;

        let mut working = state.clone();
        let status = next_status(working.id, working.status(), &LifecycleEvent::Deny);
        working.apply_status(status);
        working.relate([actor]);

        let mut trail = AuditTrail {
            instance_id: working.id,
            title: &state.title,
            actor_id: actor,
            remarks: &action.remarks,
            now: self.clock.now(),
            last_at: last_entry_at.unwrap_or(state.created_at),
            entries: Vec::with_capacity(1),
        };
        trail.record(node, None, &self.labels.denied_label);

        info!(instance_id = %working.id, actor_id = %actor, node_id = %node.id, "Instance denied");
        Ok(Transition {
            state: working,
            entries: trail.entries,
        })
    }

    /// Follow `edge` through any chain of gateways to a concrete node, then
    /// reposition `state` there. Returns one audit entry per hop, plus a
    /// closing entry when an end node is reached.
    fn advance(
        &self,
        state: &mut InstanceState,
        edge: &'a Edge,
        actor: UserId,
        remarks: &str,
        since: DateTime<Utc>,
    ) -> EngineResult<Vec<AuditEntry>> {
        let title = state.title.clone();
        let mut trail = AuditTrail {
            instance_id: state.id,
            title: &title,
            actor_id: actor,
            remarks,
            now: self.clock.now(),
            last_at: since,
            entries: Vec::new(),
        };

        let mut edge = edge;
        let mut gateway_hops = 0usize;
        let target = loop {
            let source = self.graph.node_by_id(&edge.source)?;
            let target = self.graph.target_of(edge)?;
            trail.record(source, Some(target), &edge.label);

            match target.kind {
                NodeKind::UserTask | NodeKind::End => break target,
                NodeKind::ExclusiveGateway => {
                    gateway_hops += 1;
                    if gateway_hops > self.settings.max_gateway_hops {
                        return Err(EngineError::structure(
                            &target.id,
                            format!(
                                "gateway chain exceeds {} hops without reaching a task or end",
                                self.settings.max_gateway_hops
                            ),
                        ));
                    }
                    edge = self.resolve_gateway(target, &state.variables)?;
                }
                NodeKind::Start => {
                    return Err(EngineError::UnsupportedNodeKind {
                        node_id: target.id.clone(),
                        kind: target.kind.to_string(),
                    })
                }
            }
        };

        let position = self.position_for(target, state.tenant_id)?;
        state.relate(position.processors.iter().copied());
        state.positions = vec![position];

        let reached_end = target.kind == NodeKind::End;
        let status = next_status(state.id, state.status(), &LifecycleEvent::Advance { reached_end });
        state.apply_status(status);
        if reached_end {
            trail.record(target, None, &self.labels.ended_label);
        }

        Ok(trail.entries)
    }

    /// First outgoing edge, by ascending sort, whose guard holds.
    pub fn resolve_gateway(&self, gateway: &Node, variables: &Variables) -> EngineResult<&'a Edge> {
        let edges = self.graph.edges_by_source(&gateway.id);
        if edges.is_empty() {
            return Err(EngineError::structure(&gateway.id, "gateway has no outgoing edges"));
        }

        for edge in edges {
            let expression = edge
                .guard_expression()
                .ok_or_else(|| EngineError::structure(&gateway.id, "gateway edge missing condition"))?;
            if guard::evaluate(expression, variables)? {
                debug!(gateway_id = %gateway.id, edge_id = %edge.id, "Gateway resolved");
                return Ok(edge);
            }
        }

        Err(EngineError::NoMatchingTransition {
            gateway_id: gateway.id.clone(),
        })
    }

    /// Position record for `node`, with role assignments resolved.
    pub fn position_for(&self, node: &Node, tenant_id: TenantId) -> EngineResult<Position> {
        let processors = match &node.assignment {
            None => Vec::new(),
            Some(Assignment::Person(users)) => users.clone(),
            Some(Assignment::Role(role_ids)) => {
                self.roles.resolve_role_to_users(role_ids, tenant_id)?
            }
        };

        Ok(Position {
            node_id: node.id.clone(),
            label: node.label.clone(),
            processors,
            origin: node.assignment.clone(),
            available_edges: self
                .graph
                .edges_by_source(&node.id)
                .into_iter()
                .map(|e| e.id.clone())
                .collect(),
        })
    }
}

fn ensure_permission(position: &Position, actor: UserId) -> EngineResult<()> {
    if position.can_be_handled_by(actor) {
        Ok(())
    } else {
        Err(EngineError::Permission {
            actor_id: actor,
            node_id: position.node_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ProcessDefinition;
    use crate::engine::traits::{ManualClock, MockClock, MockRoleResolver, StaticRoleResolver};
    use chrono::TimeZone;

    const REQUESTER: UserId = 1;
    const MANAGER: UserId = 2;
    const CLERK: UserId = 3;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    /// start -> submit -> gw -> (manager | clerk) -> end
    fn expense_graph() -> ProcessGraph {
        ProcessGraph::new(ProcessDefinition::new(
            vec![
                Node::new("start", NodeKind::Start, "Start", 1),
                Node::new("submit", NodeKind::UserTask, "Submit", 2)
                    .with_assignment(Assignment::Person(vec![REQUESTER])),
                Node::new("gw", NodeKind::ExclusiveGateway, "Amount", 3),
                Node::new("manager", NodeKind::UserTask, "Manager approval", 4)
                    .with_assignment(Assignment::Role(vec![10])),
                Node::new("clerk", NodeKind::UserTask, "Clerk approval", 4)
                    .with_assignment(Assignment::Person(vec![CLERK])),
                Node::new("end", NodeKind::End, "Done", 5),
            ],
            vec![
                Edge::new("e0", "start", "submit", 1).with_label("create"),
                Edge::new("e1", "submit", "gw", 1).with_label("submit"),
                Edge::new("e2", "gw", "manager", 1)
                    .with_guard("{{amount}} &gt; 100")
                    .with_label("large"),
                Edge::new("e3", "gw", "clerk", 2)
                    .with_guard("{{amount}} &lt;= 100")
                    .with_label("small"),
                Edge::new("e4", "manager", "end", 1).with_label("approve"),
                Edge::new("e5", "clerk", "end", 1).with_label("approve"),
            ],
        ))
        .unwrap()
    }

    fn roles() -> StaticRoleResolver {
        StaticRoleResolver::new().with_role(100, 10, &[MANAGER])
    }

    fn start_request(amount: f64) -> StartRequest {
        StartRequest {
            instance_id: 1,
            definition_id: 1,
            tenant_id: 100,
            title: "Travel".to_string(),
            variables: vec![Variable::new("amount", amount)],
        }
    }

    fn handle(edge_id: &str, variables: Vec<Variable>) -> HandleAction {
        HandleAction {
            edge_id: edge_id.to_string(),
            process_instance_id: 1,
            remarks: "ok".to_string(),
            variables,
        }
    }

    #[test]
    fn test_start_positions_first_task() {
        let graph = expense_graph();
        let roles = roles();
        let clock = ManualClock::new(t0());
        let engine = TransitionEngine::new(&graph, &roles, &clock);

        let Transition { state, entries } = engine.start(&start_request(50.0), REQUESTER).unwrap();

        let position = state.current_position().unwrap();
        assert_eq!(position.node_id, "submit");
        assert_eq!(position.processors, vec![REQUESTER]);
        assert_eq!(position.available_edges, vec!["e1"]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source_node_id, "start");
        assert_eq!(entries[0].elapsed, Duration::ZERO);
        assert!(state.is_related(REQUESTER));
        assert_eq!(state.status(), LifecycleStatus::Active);
    }

    #[test]
    fn test_handle_through_gateway_picks_matching_branch() {
        let graph = expense_graph();
        let roles = roles();
        let clock = ManualClock::new(t0());
        let engine = TransitionEngine::new(&graph, &roles, &clock);
        let started = engine.start(&start_request(50.0), REQUESTER).unwrap();

        clock.advance(chrono::Duration::minutes(5));
        let next = engine
            .handle(&started.state, Some(t0()), REQUESTER, &handle("e1", vec![]))
            .unwrap();

        assert_eq!(next.state.current_position().unwrap().node_id, "clerk");
        assert_eq!(next.entries.len(), 2);
        assert_eq!(next.entries[0].target_node_id.as_deref(), Some("gw"));
        assert_eq!(next.entries[0].elapsed, Duration::from_secs(300));
        assert_eq!(next.entries[1].source_node_id, "gw");
        assert_eq!(next.entries[1].target_node_id.as_deref(), Some("clerk"));
        assert_eq!(next.entries[1].edge_label, "small");
        assert_eq!(next.entries[1].elapsed, Duration::ZERO);
        assert!(next.state.is_related(CLERK));
    }

    #[test]
    fn test_action_variables_override_before_guards() {
        let graph = expense_graph();
        let roles = roles();
        let clock = ManualClock::new(t0());
        let engine = TransitionEngine::new(&graph, &roles, &clock);
        let started = engine.start(&start_request(50.0), REQUESTER).unwrap();

        let next = engine
            .handle(
                &started.state,
                None,
                REQUESTER,
                &handle("e1", vec![Variable::new("amount", 500.0)]),
            )
            .unwrap();

        let position = next.state.current_position().unwrap();
        assert_eq!(position.node_id, "manager");
        assert_eq!(position.processors, vec![MANAGER]);
        assert_eq!(position.origin, Some(Assignment::Role(vec![10])));
    }

    #[test]
    fn test_reaching_end_closes_instance() {
        let graph = expense_graph();
        let roles = roles();
        let clock = ManualClock::new(t0());
        let engine = TransitionEngine::new(&graph, &roles, &clock);
        let started = engine.start(&start_request(50.0), REQUESTER).unwrap();
        let at_clerk = engine
            .handle(&started.state, None, REQUESTER, &handle("e1", vec![]))
            .unwrap();

        let done = engine
            .handle(&at_clerk.state, None, CLERK, &handle("e5", vec![]))
            .unwrap();

        assert!(done.state.is_ended);
        assert!(!done.state.is_denied);
        assert_eq!(done.entries.len(), 2);
        assert_eq!(done.entries[1].source_node_id, "end");
        assert!(done.entries[1].is_closing());
        assert_eq!(done.entries[1].edge_label, "ended");
    }

    #[test]
    fn test_preconditions_in_order() {
        let graph = expense_graph();
        let roles = roles();
        let clock = ManualClock::new(t0());
        let engine = TransitionEngine::new(&graph, &roles, &clock);
        let state = engine.start(&start_request(50.0), REQUESTER).unwrap().state;

        let err = engine.handle(&state, None, REQUESTER, &handle("nope", vec![])).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: "edge", .. }));

        let err = engine.handle(&state, None, REQUESTER, &handle("e4", vec![])).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));

        let mut ended = state.clone();
        ended.is_ended = true;
        let err = engine.handle(&ended, None, MANAGER, &handle("e1", vec![])).unwrap_err();
        assert_eq!(err, EngineError::TerminalState { instance_id: 1, state: "ended" });

        let mut denied = state.clone();
        denied.is_denied = true;
        let err = engine.handle(&denied, None, MANAGER, &handle("e1", vec![])).unwrap_err();
        assert_eq!(err, EngineError::TerminalState { instance_id: 1, state: "denied" });

        let err = engine.handle(&state, None, MANAGER, &handle("e1", vec![])).unwrap_err();
        assert!(matches!(err, EngineError::Permission { actor_id: MANAGER, .. }));
    }

    #[test]
    fn test_failed_guard_leaves_input_untouched() {
        let graph = expense_graph();
        let roles = roles();
        let clock = ManualClock::new(t0());
        let engine = TransitionEngine::new(&graph, &roles, &clock);
        let state = engine.start(&start_request(50.0), REQUESTER).unwrap().state;
        let before = state.clone();

        let err = engine
            .handle(
                &state,
                None,
                REQUESTER,
                &handle("e1", vec![Variable::new("amount", "lots")]),
            )
            .unwrap_err();

        assert!(matches!(err, EngineError::Evaluation { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn test_no_matching_guard() {
        let definition = ProcessDefinition::new(
            vec![
                Node::new("start", NodeKind::Start, "Start", 1),
                Node::new("gw", NodeKind::ExclusiveGateway, "Gate", 2),
                Node::new("end", NodeKind::End, "End", 3),
            ],
            vec![
                Edge::new("e1", "start", "gw", 1),
                Edge::new("e2", "gw", "end", 1).with_guard("flag == true"),
            ],
        );
        let graph = ProcessGraph::new(definition).unwrap();
        let roles = roles();
        let clock = ManualClock::new(t0());
        let engine = TransitionEngine::new(&graph, &roles, &clock);

        let mut request = start_request(0.0);
        request.variables = vec![Variable::new("flag", false)];
        assert_eq!(
            engine.start(&request, REQUESTER).unwrap_err(),
            EngineError::NoMatchingTransition { gateway_id: "gw".to_string() }
        );
    }

    #[test]
    fn test_gateway_hop_limit() {
        let definition = ProcessDefinition::new(
            vec![
                Node::new("start", NodeKind::Start, "Start", 1),
                Node::new("g1", NodeKind::ExclusiveGateway, "G1", 2),
                Node::new("g2", NodeKind::ExclusiveGateway, "G2", 3),
                Node::new("end", NodeKind::End, "End", 4),
            ],
            vec![
                Edge::new("e1", "start", "g1", 1),
                Edge::new("e2", "g1", "g2", 1).with_guard("true"),
                Edge::new("e3", "g2", "end", 1).with_guard("true"),
            ],
        );
        let graph = ProcessGraph::new(definition).unwrap();
        let roles = roles();
        let clock = ManualClock::new(t0());

        let limited = TransitionEngine::new(&graph, &roles, &clock).with_settings(EngineSettings {
            max_gateway_hops: 1,
            detect_cycles: true,
        });
        assert!(matches!(
            limited.start(&start_request(0.0), REQUESTER),
            Err(EngineError::Structure { id, .. }) if id == "g2"
        ));

        let unlimited = TransitionEngine::new(&graph, &roles, &clock);
        let started = unlimited.start(&start_request(0.0), REQUESTER).unwrap();
        assert!(started.state.is_ended);
        // three hops plus the closing entry
        assert_eq!(started.entries.len(), 4);
    }

    #[test]
    fn test_deny_keeps_position() {
        let graph = expense_graph();
        let roles = roles();
        let clock = ManualClock::new(t0());
        let engine = TransitionEngine::new(&graph, &roles, &clock).with_labels(AuditLabels {
            ended_label: "ended".to_string(),
            denied_label: "rejected".to_string(),
        });
        let state = engine.start(&start_request(50.0), REQUESTER).unwrap().state;

        let denied = engine
            .deny(
                &state,
                None,
                REQUESTER,
                &DenyAction { process_instance_id: 1, remarks: "no budget".to_string() },
            )
            .unwrap();

        assert!(denied.state.is_denied);
        assert_eq!(denied.state.positions, state.positions);
        assert_eq!(denied.entries.len(), 1);
        assert_eq!(denied.entries[0].edge_label, "rejected");
        assert_eq!(denied.entries[0].remarks, "no budget");

        let again = engine.deny(
            &denied.state,
            None,
            REQUESTER,
            &DenyAction { process_instance_id: 1, remarks: String::new() },
        );
        assert!(matches!(again, Err(EngineError::TerminalState { state: "denied", .. })));
    }

    #[test]
    fn test_role_resolution_failure_propagates() {
        let graph = expense_graph();
        let mut roles = MockRoleResolver::new();
        roles
            .expect_resolve_role_to_users()
            .withf(|role_ids, tenant_id| role_ids.to_vec() == vec![10] && *tenant_id == 100)
            .times(1)
            .returning(|_, tenant_id| {
                Err(EngineError::RoleResolution {
                    tenant_id,
                    reason: "directory offline".to_string(),
                })
            });
        let mut clock = MockClock::new();
        clock.expect_now().returning(t0);

        let engine = TransitionEngine::new(&graph, &roles, &clock);
        let err = engine
            .start(
                &StartRequest {
                    variables: vec![Variable::new("amount", 500.0)],
                    ..start_request(0.0)
                },
                REQUESTER,
            )
            .and_then(|started| {
                engine.handle(&started.state, None, REQUESTER, &handle("e1", vec![]))
            })
            .unwrap_err();

        assert!(matches!(err, EngineError::RoleResolution { tenant_id: 100, .. }));
    }
}
