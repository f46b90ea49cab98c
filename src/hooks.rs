//! # Lifecycle hooks: the subsystem extension surface.
//!
//! A subsystem's behavior is injected through [`Hooks`], an async trait with
//! empty defaults. The worker invokes exactly one hook per bus event; hooks
//! receive the subsystem handle so they can trigger further transitions,
//! push application messages, or read the registry.
//!
//! ## Rules
//! - Hooks run **on the subsystem's worker**: a blocking hook stalls only
//!   that subsystem, never its relatives.
//! - A panicking hook is caught by the worker; the subsystem converges to
//!   `ERROR` and keeps serving its bus (see [`Subsystem`]).
//! - The default [`Hooks::on_parent`] inherits the parent's transition:
//!   a parent that starts, stops, errors or is destroyed drags this
//!   subsystem along. Override it to customize the policy — the common
//!   variation is calling [`Subsystem::stop`] instead of
//!   [`Subsystem::destroy`] when the parent goes away.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use subvisor::{Event, Hooks, Subsystem};
//!
//! struct Camera;
//!
//! #[async_trait]
//! impl Hooks for Camera {
//!     type Msg = ();
//!
//!     async fn on_start(&self, sys: &Subsystem) {
//!         println!("{}: sensor powered", sys.name());
//!     }
//!
//!     async fn on_child(&self, _sys: &Subsystem, event: Event) {
//!         println!("child {} is now {}", event.tag, event.state);
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::core::{State, Subsystem};
use crate::events::Event;

/// User-overridable reactions to lifecycle events.
///
/// `Msg` is the application payload this subsystem accepts on its bus via
/// [`Subsystem::send`]; use `()` when the subsystem only handles lifecycle
/// traffic.
#[async_trait]
pub trait Hooks: Send + Sync + 'static {
    /// Application message type carried on the bus next to lifecycle events.
    type Msg: Send + 'static;

    /// Runs before the `RUNNING` state is committed.
    async fn on_start(&self, _sys: &Subsystem<Self::Msg>) {}

    /// Runs before the `STOPPED` state is committed.
    async fn on_stop(&self, _sys: &Subsystem<Self::Msg>) {}

    /// Runs before the `ERROR` state is committed.
    async fn on_error(&self, _sys: &Subsystem<Self::Msg>) {}

    /// Runs during teardown, before the bus is terminated.
    async fn on_destroy(&self, _sys: &Subsystem<Self::Msg>) {}

    /// Reaction to a parent's committed transition.
    ///
    /// The default inherits the parent's state: if a parent starts, this
    /// subsystem starts; if it stops, errors or is destroyed, so does this
    /// one. Overrides that still want part of the cascade should trigger it
    /// themselves; there is no separate base implementation to call.
    async fn on_parent(&self, sys: &Subsystem<Self::Msg>, event: Event) {
        match event.state {
            State::Running => sys.start(),
            State::Stopped => sys.stop(),
            State::Error => sys.error(),
            State::Destroyed => sys.destroy(),
            State::Init => {}
        }
    }

    /// Reaction to a child's committed transition. Default: ignore.
    ///
    /// Parents do not follow children anywhere automatically; in particular
    /// a child's `ERROR` is only visible here, never cascaded.
    async fn on_child(&self, _sys: &Subsystem<Self::Msg>, _event: Event) {}

    /// Handles an application message pushed via [`Subsystem::send`].
    async fn on_message(&self, _sys: &Subsystem<Self::Msg>, _msg: Self::Msg) {}
}

/// The empty hooks implementation: lifecycle traffic only, all defaults.
pub struct NoHooks;

#[async_trait]
impl Hooks for NoHooks {
    type Msg = ();
}

/// Hooks implementation that logs every callback to stdout.
///
/// Enabled via the `logging` feature. Useful for demos and debugging; the
/// parent cascade matches the default policy.
#[cfg(feature = "logging")]
pub struct LogHooks;

#[cfg(feature = "logging")]
#[async_trait]
impl Hooks for LogHooks {
    type Msg = ();

    async fn on_start(&self, sys: &Subsystem) {
        println!("[start] tag={} name={}", sys.tag(), sys.name());
    }

    async fn on_stop(&self, sys: &Subsystem) {
        println!("[stop] tag={} name={}", sys.tag(), sys.name());
    }

    async fn on_error(&self, sys: &Subsystem) {
        println!("[error] tag={} name={}", sys.tag(), sys.name());
    }

    async fn on_destroy(&self, sys: &Subsystem) {
        println!("[destroy] tag={} name={}", sys.tag(), sys.name());
    }

    async fn on_parent(&self, sys: &Subsystem, event: Event) {
        println!(
            "[parent] name={} src={} new={}",
            sys.name(),
            event.tag,
            event.state
        );
        match event.state {
            State::Running => sys.start(),
            State::Stopped => sys.stop(),
            State::Error => sys.error(),
            State::Destroyed => sys.destroy(),
            State::Init => {}
        }
    }

    async fn on_child(&self, sys: &Subsystem, event: Event) {
        println!(
            "[child] name={} src={} new={}",
            sys.name(),
            event.tag,
            event.state
        );
    }
}
