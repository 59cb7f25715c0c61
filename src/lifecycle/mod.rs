//! Lifecycle management for controller components

use crate::error::{ControlError, Result};

/// Trait for components that follow a lifecycle pattern
pub trait LifecycleNode: Send {
    /// Configure the node
    fn on_configure(&mut self) -> Result<()>;

    /// Activate the node
    fn on_activate(&mut self) -> Result<()>;

    /// Deactivate the node
    fn on_deactivate(&mut self) -> Result<()>;

    /// Clean up the node
    fn on_cleanup(&mut self) -> Result<()>;
}

/// Base implementation for lifecycle nodes
#[derive(Debug, Clone)]
pub struct LifecycleNodeBase {
    pub name: String,
    state: State,
}

/// State of a lifecycle node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unconfigured,
    Inactive,
    Active,
    Finalized,
}

impl LifecycleNodeBase {
    /// Create a new lifecycle node base
    pub fn new(name: &str) -> Self {
        LifecycleNodeBase {
            name: name.to_string(),
            state: State::Unconfigured,
        }
    }

    /// Get the current state
    pub fn get_state(&self) -> State {
        self.state
    }

    /// Move to `to`, provided the node is currently in `from`
    pub fn transition(&mut self, from: State, to: State) -> Result<()> {
        if self.state != from {
            return Err(ControlError::Lifecycle(format!(
                "{}: cannot go from {:?} to {:?} (expected {:?})",
                self.name, self.state, to, from
            )));
        }
        self.state = to;
        Ok(())
    }

    /// Mark the node as finalized; no further transitions are accepted
    pub fn finalize(&mut self) {
        self.state = State::Finalized;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nominal_sequence() {
        let mut base = LifecycleNodeBase::new("test");
        assert_eq!(base.get_state(), State::Unconfigured);
        base.transition(State::Unconfigured, State::Inactive).unwrap();
        base.transition(State::Inactive, State::Active).unwrap();
        base.transition(State::Active, State::Inactive).unwrap();
        base.transition(State::Inactive, State::Unconfigured).unwrap();
    }

    #[test]
    fn test_illegal_transition_is_rejected() {
        let mut base = LifecycleNodeBase::new("test");
        let err = base.transition(State::Inactive, State::Active).unwrap_err();
        assert!(matches!(err, ControlError::Lifecycle(_)));
        assert_eq!(base.get_state(), State::Unconfigured);

        base.finalize();
        assert!(base.transition(State::Unconfigured, State::Inactive).is_err());
    }
}
