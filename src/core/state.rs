//! # Subsystem lifecycle states.
//!
//! The lifecycle is a closed five-state machine:
//!
//! ```text
//!            ┌─────────────► RUNNING ◄──────┐
//!            │                 │  ▲         │
//!  INIT ─────┤                 ▼  │         │
//!            │              STOPPED ◄───► ERROR
//!            │                 │            │
//!            └──────────────► DESTROYED ◄───┘
//! ```
//!
//! `INIT` is the birth state and is never re-entered. `DESTROYED` is
//! absorbing: once committed, no further transition is possible ("no
//! resurrection"). Every other pair of distinct states is reachable.
//!
//! Transitions are only committed by the owning subsystem's worker; external
//! code observes states through [`SystemMap::state_of`](crate::SystemMap::state_of)
//! or [`Subsystem::state`](crate::Subsystem::state).

use std::fmt;

/// Lifecycle state of a subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Constructed, worker attached, nothing committed yet.
    Init,
    /// The start hook has run and all parents admitted the transition.
    Running,
    /// Stopped on request; may be restarted.
    Stopped,
    /// Faulted; stays until externally transitioned.
    Error,
    /// Torn down. Terminal.
    Destroyed,
}

impl State {
    /// Returns `true` if this state admits a transition to `target`.
    ///
    /// `Destroyed` admits nothing, `Init` is never a target, and a
    /// same-state transition is a no-op rather than an error.
    pub fn can_transition(self, target: State) -> bool {
        self != State::Destroyed && target != State::Init && self != target
    }

    /// Returns `true` once this state can never change again.
    pub fn is_terminal(self) -> bool {
        self == State::Destroyed
    }

    /// Returns `true` if a parent in this state lets its children proceed
    /// with a start: the parent is either up, or fully torn down and about
    /// to leave the child's parent set.
    pub(crate) fn admits_children(self) -> bool {
        matches!(self, State::Running | State::Destroyed)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            State::Init => "init",
            State::Running => "running",
            State::Stopped => "stopped",
            State::Error => "error",
            State::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Init => "INIT",
            State::Running => "RUNNING",
            State::Stopped => "STOPPED",
            State::Error => "ERROR",
            State::Destroyed => "DESTROYED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::State::*;

    #[test]
    fn destroyed_is_absorbing() {
        for target in [Init, Running, Stopped, Error, Destroyed] {
            assert!(!Destroyed.can_transition(target));
        }
        assert!(Destroyed.is_terminal());
    }

    #[test]
    fn init_is_never_a_target() {
        for from in [Init, Running, Stopped, Error] {
            assert!(!from.can_transition(Init));
        }
    }

    #[test]
    fn same_state_is_a_noop() {
        for s in [Init, Running, Stopped, Error, Destroyed] {
            assert!(!s.can_transition(s));
        }
    }

    #[test]
    fn every_live_state_can_degrade_and_die() {
        for from in [Init, Running, Stopped, Error] {
            assert!(from.can_transition(Destroyed));
        }
        assert!(Running.can_transition(Stopped));
        assert!(Running.can_transition(Error));
        assert!(Stopped.can_transition(Running));
        assert!(Error.can_transition(Running));
    }

    #[test]
    fn only_running_and_destroyed_parents_admit_children() {
        assert!(Running.admits_children());
        assert!(Destroyed.admits_children());
        assert!(!Init.admits_children());
        assert!(!Stopped.admits_children());
        assert!(!Error.admits_children());
    }
}
