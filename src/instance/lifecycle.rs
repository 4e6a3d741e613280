// Instance lifecycle: Active -> Ended | Denied
//
// Ended and Denied are terminal; every event is ignored there.

use serde::{Deserialize, Serialize};
use statig::prelude::*;
use tracing::{debug, info};

use crate::definition::InstanceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleStatus {
    Active,
    Ended,
    Denied,
}

impl LifecycleStatus {
    pub fn from_flags(is_ended: bool, is_denied: bool) -> Self {
        if is_ended {
            LifecycleStatus::Ended
        } else if is_denied {
            LifecycleStatus::Denied
        } else {
            LifecycleStatus::Active
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, LifecycleStatus::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The instance moved to a new position
    Advance { reached_end: bool },
    Deny,
}

pub struct InstanceLifecycle {
    pub instance_id: InstanceId,
    /// Mirrors the machine's current state
    pub status: LifecycleStatus,
}

impl InstanceLifecycle {
    pub fn new(instance_id: InstanceId) -> Self {
        Self {
            instance_id,
            status: LifecycleStatus::Active,
        }
    }
}

#[state_machine(initial = "State::active()", state(derive(Debug)))]
impl InstanceLifecycle {
    #[state]
    fn active(&mut self, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::Advance { reached_end: true } => {
                info!(instance_id = %self.instance_id, "Instance ended");
                self.status = LifecycleStatus::Ended;
                Transition(State::ended())
            }
            LifecycleEvent::Advance { reached_end: false } => Handled,
            LifecycleEvent::Deny => {
                info!(instance_id = %self.instance_id, "Instance denied");
                self.status = LifecycleStatus::Denied;
                Transition(State::denied())
            }
        }
    }

    #[state]
    fn ended(&mut self, event: &LifecycleEvent) -> Outcome<State> {
        debug!(instance_id = %self.instance_id, ?event, "Ignoring event on ended instance");
        Handled
    }

    #[state]
    fn denied(&mut self, event: &LifecycleEvent) -> Outcome<State> {
        debug!(instance_id = %self.instance_id, ?event, "Ignoring event on denied instance");
        Handled
    }
}

/// Rebuild the machine at `current` and feed it `event`.
pub fn next_status(
    instance_id: InstanceId,
    current: LifecycleStatus,
    event: &LifecycleEvent,
) -> LifecycleStatus {
    let mut machine = InstanceLifecycle::new(instance_id).state_machine();
    match current {
        LifecycleStatus::Active => {}
        LifecycleStatus::Ended => machine.handle(&LifecycleEvent::Advance { reached_end: true }),
        LifecycleStatus::Denied => machine.handle(&LifecycleEvent::Deny),
    }
    machine.handle(event);
    machine.inner().status
}
