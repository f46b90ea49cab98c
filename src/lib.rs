//! # subvisor
//!
//! **Subvisor** is a hierarchical subsystem lifecycle coordination library.
//!
//! It organizes long-lived components ("subsystems") into a parent/child
//! dependency graph and drives them through a shared lifecycle
//! (`INIT → RUNNING / STOPPED / ERROR → DESTROYED`) by passing events across
//! per-subsystem buses. Each subsystem runs its event loop on its own worker
//! task, reacts to parent transitions, and notifies relatives when its own
//! state changes. A child never commits `RUNNING` before its parents are up;
//! destroying a node cascades through its descendants without stranding
//! anyone on a dangling reference.
//!
//! ## Features
//!
//! | Area              | Description                                                      | Key types / traits               |
//! |-------------------|------------------------------------------------------------------|----------------------------------|
//! | **Subsystems**    | Dependency-aware components with triggers and a worker loop.     | [`Subsystem`], [`ParentRef`]     |
//! | **Hooks**         | Async callbacks for every lifecycle transition + user messages.  | [`Hooks`], [`NoHooks`]           |
//! | **Registry**      | Shared map of `{tag → state}` with snapshot introspection.       | [`SystemMap`], [`SnapshotEntry`] |
//! | **Events**        | Per-subsystem FIFO bus with terminator semantics.                | [`Bus`], [`Event`], [`Envelope`] |
//! | **Errors**        | Typed construction/registration errors.                          | [`RuntimeError`]                 |
//! | **Configuration** | Registry capacity.                                               | [`Config`]                       |
//!
//! ## Optional features
//! - `logging`: exports [`LogHooks`], a println-based hooks implementation
//!   _(demo/reference only)_.
//!
//! ```no_run
//! use subvisor::{State, Subsystem, SystemMap};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let map = SystemMap::default();
//!
//!     // A tiny rig: the camera only runs while the OS does.
//!     let os = Subsystem::spawn("os", &map, &[])?;
//!     let cam = Subsystem::spawn("camera", &map, &[os.as_parent()])?;
//!
//!     os.start();
//!     // The parent's RUNNING commit cascades into the camera.
//!     while cam.state() != State::Running {
//!         tokio::task::yield_now().await;
//!     }
//!
//!     // Tearing down the root tears down the whole graph.
//!     os.destroy();
//!     cam.join().await;
//!     os.join().await;
//!     Ok(())
//! }
//! ```
//!
//! ---

mod config;
mod core;
mod error;
mod events;
mod hooks;

// ---- Public re-exports ----

pub use crate::core::{ParentRef, SnapshotEntry, State, Subsystem, SystemMap, Tag};
pub use config::Config;
pub use error::RuntimeError;
pub use events::{Bus, Envelope, Event, Origin};
pub use hooks::{Hooks, NoHooks};

// Optional: expose a simple built-in logging hooks impl (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use hooks::LogHooks;
