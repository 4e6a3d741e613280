// Process Definition Module - typed nodes/edges and the validated graph view

pub mod types;
pub mod graph;

pub use types::{
    Assignment, Edge, InstanceId, Node, NodeKind, ProcessDefinition, RoleId, TenantId, UserId,
};
pub use graph::ProcessGraph;
