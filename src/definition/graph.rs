// Immutable, validated view over a process definition

use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::types::{Edge, Node, NodeKind, ProcessDefinition};
use crate::errors::{EngineError, EngineResult};

/// Queryable process graph.
///
/// Construction validates the structural invariants (unique ids, edges that
/// resolve on both ends, guarded gateway exits) so every later lookup can
/// assume a consistent definition. The graph is never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ProcessGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    node_index: HashMap<String, usize>,
    edge_index: HashMap<String, usize>,
    /// Edge positions per source node, ascending by edge sort
    outgoing: HashMap<String, Vec<usize>>,
}

impl ProcessGraph {
    pub fn new(definition: ProcessDefinition) -> EngineResult<Self> {
        let ProcessDefinition { nodes, edges } = definition;

        let mut node_index = HashMap::with_capacity(nodes.len());
        for (position, node) in nodes.iter().enumerate() {
            if node_index.insert(node.id.clone(), position).is_some() {
                return Err(EngineError::structure(&node.id, "duplicate node id"));
            }
        }

        let mut edge_index = HashMap::with_capacity(edges.len());
        let mut outgoing: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, edge) in edges.iter().enumerate() {
            if edge_index.insert(edge.id.clone(), position).is_some() {
                return Err(EngineError::structure(&edge.id, "duplicate edge id"));
            }
            if !node_index.contains_key(&edge.source) {
                return Err(EngineError::structure(
                    &edge.id,
                    format!("source node '{}' does not exist", edge.source),
                ));
            }
            if !node_index.contains_key(&edge.target) {
                return Err(EngineError::structure(
                    &edge.id,
                    format!("target node '{}' does not exist", edge.target),
                ));
            }
            outgoing.entry(edge.source.clone()).or_default().push(position);
        }

        // Stable sort: equal sort values keep definition order
        for positions in outgoing.values_mut() {
            positions.sort_by_key(|&p| edges[p].sort);
        }

        let graph = Self {
            nodes,
            edges,
            node_index,
            edge_index,
            outgoing,
        };
        graph.validate_gateways()?;

        debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Process graph built"
        );
        Ok(graph)
    }

    fn validate_gateways(&self) -> EngineResult<()> {
        for node in self
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::ExclusiveGateway)
        {
            for edge in self.edges_by_source(&node.id) {
                if edge.guard_expression().is_none() {
                    return Err(EngineError::structure(
                        &edge.id,
                        format!("edge leaving gateway '{}' has no condition", node.id),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn node_by_id(&self, id: &str) -> EngineResult<&Node> {
        self.node_index
            .get(id)
            .map(|&p| &self.nodes[p])
            .ok_or_else(|| EngineError::not_found("node", id))
    }

    pub fn edge_by_id(&self, id: &str) -> EngineResult<&Edge> {
        self.edge_index
            .get(id)
            .map(|&p| &self.edges[p])
            .ok_or_else(|| EngineError::not_found("edge", id))
    }

    /// Edges leaving `node_id`, ascending by sort; empty when there are none.
    pub fn edges_by_source(&self, node_id: &str) -> Vec<&Edge> {
        self.outgoing
            .get(node_id)
            .map(|positions| positions.iter().map(|&p| &self.edges[p]).collect())
            .unwrap_or_default()
    }

    pub fn has_outgoing(&self, node_id: &str) -> bool {
        self.outgoing.get(node_id).is_some_and(|p| !p.is_empty())
    }

    /// The unique start node.
    pub fn start_node(&self) -> EngineResult<&Node> {
        let mut starts = self.nodes.iter().filter(|n| n.kind == NodeKind::Start);
        match (starts.next(), starts.next()) {
            (Some(start), None) => Ok(start),
            (None, _) => Err(EngineError::structure("definition", "no start node")),
            (Some(first), Some(second)) => Err(EngineError::structure(
                &second.id,
                format!("more than one start node (first is '{}')", first.id),
            )),
        }
    }

    pub fn target_of(&self, edge: &Edge) -> EngineResult<&Node> {
        self.node_by_id(&edge.target)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Ids of every node with no outgoing edge
    pub fn terminal_ids(&self) -> HashSet<&str> {
        self.nodes
            .iter()
            .filter(|n| !self.has_outgoing(&n.id))
            .map(|n| n.id.as_str())
            .collect()
    }
}
