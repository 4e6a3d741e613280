// Process Engine Library - graph-driven approval workflow execution
// This exposes the core components for embedding, testing and the CLI

pub mod errors;
pub mod definition;
pub mod guard;
pub mod reachability;
pub mod instance;
pub mod engine;
pub mod service;
pub mod config;
pub mod telemetry;
pub mod observability;

// Re-export key types for easy access
pub use errors::{EngineError, EngineResult};
pub use definition::{Assignment, Edge, Node, NodeKind, ProcessDefinition, ProcessGraph};
pub use guard::{evaluate, normalize, Guard, VariableValue, Variables};
pub use reachability::{enumerate_paths, render_chain, ChainNode, ChainNodeStatus, Path};
pub use instance::{InstanceState, LifecycleStatus, Position, Variable};
pub use engine::{
    AuditEntry, Clock, DenyAction, HandleAction, InstanceRepository, ManualClock, RoleResolver,
    StartRequest, StaticRoleResolver, SystemClock, Transition, TransitionEngine,
};
pub use service::{InMemoryInstanceStore, ProcessService, TransactionalStore, UnitOfWork};
pub use config::{config, init_config, AuditLabels, EngineConfig, EngineSettings, ObservabilityConfig};
pub use telemetry::{create_instance_span, generate_correlation_id, init_telemetry};
pub use observability::{engine_metrics, EngineMetrics, EngineStats, OperationTimer};
