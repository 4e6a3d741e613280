// Transition Engine Module
//
// Validates one user action against the process graph and instance state,
// resolves exclusive gateway chains, and produces the next instance state
// together with one audit entry per hop taken.

pub mod traits;
pub mod audit;
pub mod transition;

pub use audit::{format_elapsed, AuditEntry};
pub use traits::{Clock, InstanceRepository, ManualClock, RoleResolver, StaticRoleResolver, SystemClock};
pub use transition::{DenyAction, HandleAction, StartRequest, Transition, TransitionEngine};
