//! Coordinator core: states, tags, the shared registry, and the subsystem.
//!
//! ## Files & responsibilities
//! - **state.rs**: the five-state lifecycle and its transition table.
//! - **tag.rs**: opaque unique subsystem identifiers (`0x55......`).
//! - **map.rs**: [`SystemMap`], the authoritative registry
//!   `{tag → (state, name, weak link)}`; capacity-checked inserts, copy-out
//!   reads, snapshot/dump for debugging.
//! - **subsystem.rs**: [`Subsystem`] — bus, worker loop, triggers, the
//!   wait-for-parents gate, and commit fan-out.
//!
//! ## Wiring (module-level flow)
//! ```text
//! Application code
//!   └─ creates SystemMap, spawns Subsystems against it (parents by ParentRef)
//!
//! trigger (any thread)          worker (one per subsystem)
//!   start/stop/error/destroy      loop: bus.recv()
//!     └─► {Own, target} ─► Bus ─►   ├─ Own    → hook → commit through gate
//!   relatives' commits              ├─ Parent → cancel/topology → on_parent
//!     └─► {Parent|Child, new} ─►    ├─ Child  → topology → on_child
//!   sys.send(msg)                   └─ User   → on_message
//!     └─► User(msg) ─────────►
//!
//! commit_state(target)
//!   ├─ gate: starts wait until every parent is RUNNING or DESTROYED;
//!   │        a consumed cancel abandons the pending start
//!   ├─ state + SystemMap entry updated under the state lock
//!   └─ fan-out: {Child, tag, new} → running parents
//!               {Parent, tag, new} → live children
//! ```
//!
//! ## Teardown timeline
//! ```text
//! destroy() → cancel raised → {Own, DESTROYED} on the bus
//! → worker: on_destroy → bus.terminate() → commit DESTROYED (+ fan-out)
//! → worker observes terminator and exits → join()
//! → last handle drops → SystemMap entry removed
//! ```

mod map;
mod state;
pub(crate) mod subsystem;
mod tag;

pub use map::{SnapshotEntry, SystemMap};
pub use state::State;
pub use subsystem::{ParentRef, Subsystem};
pub use tag::Tag;
