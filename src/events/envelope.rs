//! # Extended bus payload.
//!
//! A subsystem's bus normally carries lifecycle [`Event`]s only. Subsystems
//! that also exchange application messages use [`Envelope`]: a tagged union
//! of the lifecycle arm and one user payload type. The worker handles the
//! [`Envelope::Lifecycle`] arm itself and hands [`Envelope::User`] to
//! [`Hooks::on_message`](crate::Hooks::on_message).
//!
//! The payload type is fixed per subsystem via the
//! [`Hooks::Msg`](crate::Hooks::Msg) associated type; plain subsystems use
//! `()` and never see the `User` arm.

use crate::events::Event;

/// One item on a subsystem's bus: a lifecycle event or a user payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope<M = ()> {
    /// A lifecycle transition notification; dispatched by the core.
    Lifecycle(Event),
    /// An application message; forwarded to `Hooks::on_message`.
    User(M),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{State, Tag};
    use crate::events::Origin;

    #[test]
    fn arms_are_distinguishable() {
        let ev = Event::new(Origin::Own, Tag::next(), State::Running);
        let a: Envelope<u32> = Envelope::Lifecycle(ev);
        let b: Envelope<u32> = Envelope::User(9);
        assert!(matches!(a, Envelope::Lifecycle(e) if e == ev));
        assert!(matches!(b, Envelope::User(9)));
    }
}
