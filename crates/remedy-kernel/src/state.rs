//! Control-loop state machine
//!
//! Phases advance strictly Monitor -> Analyze -> Plan -> Execute ->
//! Update within a tick. `Paused` is reachable from any working phase and
//! requires an explicit resume; `ShutDown` is the only terminal state.

use remedy_core::RemedyError;
use serde::{Deserialize, Serialize};

/// Control-loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    /// Between ticks
    Idle,
    Monitoring,
    Analyzing,
    Planning,
    Executing,
    Updating,
    /// Autonomous execution halted; manual intervention required
    Paused,
    /// Terminal
    ShutDown,
}

/// States reachable from `from`.
#[must_use]
pub fn allowed_transitions(from: LoopState) -> Vec<LoopState> {
    use LoopState::*;
    match from {
        Idle => vec![Monitoring, ShutDown],
        Monitoring => vec![Analyzing, Paused, ShutDown],
        // Analyze may short-circuit straight to the safe hold execution.
        Analyzing => vec![Planning, Executing, Paused, ShutDown],
        Planning => vec![Executing, Paused, ShutDown],
        Executing => vec![Updating, Paused, ShutDown],
        Updating => vec![Idle, ShutDown],
        Paused => vec![Idle, ShutDown],
        ShutDown => vec![],
    }
}

/// Validate a state transition.
pub fn validate_transition(from: LoopState, to: LoopState) -> Result<(), RemedyError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(RemedyError::IllegalTransition {
            from: format!("{from:?}"),
            to: format!("{to:?}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_phases_chain() {
        use LoopState::*;
        for (from, to) in [
            (Idle, Monitoring),
            (Monitoring, Analyzing),
            (Analyzing, Planning),
            (Planning, Executing),
            (Executing, Updating),
            (Updating, Idle),
        ] {
            validate_transition(from, to).unwrap();
        }
    }

    #[test]
    fn short_circuit_skips_planning() {
        validate_transition(LoopState::Analyzing, LoopState::Executing).unwrap();
    }

    #[test]
    fn shutdown_is_terminal() {
        assert!(allowed_transitions(LoopState::ShutDown).is_empty());
        assert!(validate_transition(LoopState::ShutDown, LoopState::Idle).is_err());
    }

    #[test]
    fn paused_requires_explicit_resume() {
        assert!(validate_transition(LoopState::Paused, LoopState::Monitoring).is_err());
        validate_transition(LoopState::Paused, LoopState::Idle).unwrap();
    }

    #[test]
    fn backward_transitions_rejected() {
        assert!(validate_transition(LoopState::Executing, LoopState::Monitoring).is_err());
        assert!(validate_transition(LoopState::Updating, LoopState::Executing).is_err());
    }
}
