//! Structural reachability over a process graph.
//!
//! Enumerates every start-to-terminal path (guards ignored), counts how
//! many paths each node lies on, and classifies the visible nodes of a
//! definition against an instance's current position for chain display.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::definition::{NodeKind, ProcessGraph};
use crate::errors::{EngineError, EngineResult};

/// Ordered node ids from the start node to a node with no outgoing edge
pub type Path = Vec<String>;

/// Enumerate every structural path from the start node.
///
/// When `detect_cycles` is set a node repeated on the path being walked is a
/// structure error; otherwise the definition is trusted to be acyclic.
pub fn enumerate_paths(graph: &ProcessGraph, detect_cycles: bool) -> EngineResult<Vec<Path>> {
    let start = graph.start_node()?;
    let mut paths = Vec::new();
    let mut current = Vec::new();
    walk(graph, &start.id, detect_cycles, &mut current, &mut paths)?;
    debug!(paths = paths.len(), "Enumerated process paths");
    Ok(paths)
}

fn walk(
    graph: &ProcessGraph,
    node_id: &str,
    detect_cycles: bool,
    current: &mut Path,
    paths: &mut Vec<Path>,
) -> EngineResult<()> {
    if detect_cycles && current.iter().any(|id| id == node_id) {
        return Err(EngineError::structure(node_id, "cycle detected"));
    }
    current.push(node_id.to_string());

    let edges = graph.edges_by_source(node_id);
    if edges.is_empty() {
        paths.push(current.clone());
    } else {
        for edge in edges {
            walk(graph, &edge.target, detect_cycles, current, paths)?;
        }
    }

    current.pop();
    Ok(())
}

/// Number of paths containing each node id
pub fn obligatory_counts(paths: &[Path]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for path in paths {
        for node_id in path {
            *counts.entry(node_id.as_str()).or_insert(0) += 1;
        }
    }
    counts
}

/// A node is obligatory when every path passes through it.
pub fn is_obligatory(counts: &HashMap<&str, usize>, total_paths: usize, node_id: &str) -> bool {
    total_paths > 0 && counts.get(node_id).copied().unwrap_or(0) == total_paths
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainNodeStatus {
    Completed,
    Current,
    Pending,
}

impl ChainNodeStatus {
    /// Classify a node's sort against the current node's sort.
    pub fn classify(node_sort: i64, kind: NodeKind, current_sort: i64) -> Self {
        match node_sort.cmp(&current_sort) {
            std::cmp::Ordering::Less => ChainNodeStatus::Completed,
            std::cmp::Ordering::Greater => ChainNodeStatus::Pending,
            // An ended instance shows its terminal as done
            std::cmp::Ordering::Equal if kind == NodeKind::End => ChainNodeStatus::Completed,
            std::cmp::Ordering::Equal => ChainNodeStatus::Current,
        }
    }
}

/// One entry of the rendered process chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainNode {
    pub id: String,
    pub label: String,
    pub obligatory: bool,
    pub status: ChainNodeStatus,
    pub sort: i64,
    pub node_kind: NodeKind,
}

/// Classified list of the visible nodes, ascending by sort.
///
/// Hidden nodes are left out of the list but still take part in path
/// enumeration, so they affect which nodes count as obligatory.
pub fn render_chain(
    graph: &ProcessGraph,
    current_node_id: &str,
    detect_cycles: bool,
) -> EngineResult<Vec<ChainNode>> {
    let current_sort = graph.node_by_id(current_node_id)?.sort;
    let paths = enumerate_paths(graph, detect_cycles)?;
    let counts = obligatory_counts(&paths);

    let mut chain: Vec<ChainNode> = graph
        .nodes()
        .iter()
        .filter(|node| !node.hidden)
        .map(|node| ChainNode {
            id: node.id.clone(),
            label: node.label.clone(),
            obligatory: is_obligatory(&counts, paths.len(), &node.id),
            status: ChainNodeStatus::classify(node.sort, node.kind, current_sort),
            sort: node.sort,
            node_kind: node.kind,
        })
        .collect();
    chain.sort_by_key(|node| node.sort);
    Ok(chain)
}
