//! # Lifecycle events exchanged between subsystems.
//!
//! An [`Event`] records one committed (or requested) state transition and
//! travels on the bus of the subsystem that must react to it. The
//! [`Origin`] says who the event is about, *relative to the receiver*:
//!
//! - [`Origin::Own`]: a trigger this subsystem sent to itself
//!   (`start`/`stop`/`error`/`destroy`). Carries the *target* state.
//! - [`Origin::Parent`]: a parent committed a new state. Carries the
//!   parent's *new* state.
//! - [`Origin::Child`]: a child committed a new state.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Per-bus delivery is FIFO already; `seq` lets a consumer
//! that merges events from several subsystems order them after the fact.
//!
//! ## Flow example
//! ```text
//! cam.start()
//!   → {Own, cam, RUNNING} on cam's bus
//!   → cam worker: on_start(), commit RUNNING
//!       → {Child, cam, RUNNING} on each running parent's bus
//!       → {Parent, cam, RUNNING} on each live child's bus
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::core::{State, Tag};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Who a lifecycle event originates from, relative to the receiving
/// subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A parent of the receiver changed state.
    Parent,
    /// A child of the receiver changed state.
    Child,
    /// The receiver itself requested a transition.
    Own,
}

/// One lifecycle transition, as seen by the subsystem that dequeues it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Who this event is about, relative to the receiver.
    pub origin: Origin,
    /// Tag of the subsystem the event is about (the receiver itself for
    /// [`Origin::Own`]).
    pub tag: Tag,
    /// The new (or requested) state of that subsystem.
    pub state: State,
}

impl Event {
    /// Creates an event with the next sequence number.
    pub fn new(origin: Origin, tag: Tag, state: State) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            origin,
            tag,
            state,
        }
    }

    /// Shorthand for a self-trigger event.
    pub(crate) fn own(tag: Tag, state: State) -> Self {
        Self::new(Origin::Own, tag, state)
    }

    /// Shorthand for a parent-transition notification.
    pub(crate) fn from_parent(tag: Tag, state: State) -> Self {
        Self::new(Origin::Parent, tag, state)
    }

    /// Shorthand for a child-transition notification.
    pub(crate) fn from_child(tag: Tag, state: State) -> Self {
        Self::new(Origin::Child, tag, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let t = Tag::next();
        let a = Event::own(t, State::Running);
        let b = Event::from_parent(t, State::Stopped);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn constructors_set_origin() {
        let t = Tag::next();
        assert_eq!(Event::own(t, State::Running).origin, Origin::Own);
        assert_eq!(Event::from_parent(t, State::Error).origin, Origin::Parent);
        assert_eq!(Event::from_child(t, State::Destroyed).origin, Origin::Child);
    }
}
