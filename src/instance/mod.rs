// Instance Module - live state of one running process instance
//
// Instance state is mutated only by the transition engine, one action at a
// time; the lifecycle machine decides the terminal flags.

pub mod variables;
pub mod state;
pub mod lifecycle;

pub use variables::{merge_variables, validate_variables, Variable};
pub use state::{InstanceState, Position};
pub use lifecycle::{next_status, InstanceLifecycle, LifecycleEvent, LifecycleStatus};
