//! # Subsystem: a lifecycle-managed component in a dependency graph.
//!
//! Each [`Subsystem`] owns a bus, a worker, a parent/child topology and a
//! five-state lifecycle. Triggers (`start`/`stop`/`error`/`destroy`) enqueue
//! events onto the subsystem's own bus; the worker dequeues one event at a
//! time, runs the matching [`Hooks`] callback, and commits the transition
//! through the wait-for-parents gate before notifying relatives.
//!
//! ## Architecture
//! ```text
//! sys.start() ──► {Own, RUNNING} ──► Bus ──► worker loop
//!                                              │
//!                                      dispatch by origin
//!                                      ├─ Own    → hook → commit_state
//!                                      │            │
//!                                      │            ├─ gate: wait until every
//!                                      │            │  parent is RUNNING or
//!                                      │            │  DESTROYED (starts only)
//!                                      │            ├─ write state + registry
//!                                      │            └─ fan-out:
//!                                      │               {Child, tag, new} → running parents
//!                                      │               {Parent, tag, new} → live children
//!                                      ├─ Parent → topology/cancel upkeep → on_parent
//!                                      └─ Child  → topology upkeep → on_child
//! ```
//!
//! ## Rules
//! - **One committer**: only the subsystem's own worker mutates its state.
//! - **Gated starts**: a transition to `RUNNING` waits until every parent is
//!   `RUNNING` or `DESTROYED`; degradations and teardown commit immediately,
//!   so a subsystem can always be stopped or destroyed no matter what its
//!   parents are doing.
//! - **Cancel flag**: one-shot override consumed inside the gate check. A
//!   consumed cancel abandons the pending start instead of committing it.
//! - **Lock discipline**: a subsystem never takes another subsystem's state
//!   lock. Cross-subsystem traffic is bus pushes and registry reads only,
//!   and bus pushes never block.
//! - **Teardown**: the DESTROY event raises cancel, runs `on_destroy`,
//!   terminates the bus, then commits; the worker exits on the terminator
//!   and the registry entry disappears when the last handle drops.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::FutureExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::map::SystemMap;
use crate::core::{State, Tag};
use crate::error::RuntimeError;
use crate::events::{Bus, Envelope, Event, Origin};
use crate::hooks::{Hooks, NoHooks};

/// Cross-subsystem surface of one subsystem, object-safe so that parents and
/// children of different message types can reference each other. The
/// registry stores `Weak<dyn Link>`.
pub(crate) trait Link: Send + Sync + 'static {
    fn tag(&self) -> Tag;
    /// Enqueues a lifecycle event and wakes a gate wait in progress.
    fn deliver(&self, event: Event);
    fn attach_child(&self, child: Tag);
    fn parent_tags(&self) -> Vec<Tag>;
}

/// Fields guarded by the state lock: the committed state and the topology.
struct Gate {
    state: State,
    parents: BTreeSet<Tag>,
    children: BTreeSet<Tag>,
}

/// Outcome of one gate predicate evaluation.
enum GateCheck {
    /// Commit may proceed.
    Pass,
    /// A consumed cancel broke the wait: drop the pending transition.
    Abandon,
    /// Parents not ready; wait for the next wakeup.
    Wait,
}

/// Shared core of a subsystem; every handle and the worker hold an `Arc`.
struct Shared<M> {
    tag: Tag,
    name: String,
    map: SystemMap,
    bus: Bus<Envelope<M>>,
    gate: Mutex<Gate>,
    /// One-shot gate override. Set from any thread, consumed inside the
    /// gate check while the state lock is held.
    cancel: AtomicBool,
    /// Wakes the gate wait. Every bus push notifies it so late cancels and
    /// parent transitions are always observed.
    proceed: Notify,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<M: Send + 'static> Shared<M> {
    fn lock_gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().expect("subsystem state lock poisoned")
    }

    fn push_lifecycle(&self, event: Event) {
        self.bus.push(Envelope::Lifecycle(event));
        self.proceed.notify_one();
    }

    /// Evaluates the wait-for-parents predicate once.
    ///
    /// Starts are the only gated transitions: a subsystem may always
    /// degrade or tear down, it may never run before its parents. A parent
    /// that has vanished from the registry counts as passed (its teardown
    /// already completed and its handle was dropped).
    fn gate_check(&self, target: State) -> GateCheck {
        let gate = self.lock_gate();
        if target != State::Running || gate.parents.is_empty() {
            return GateCheck::Pass;
        }
        let ready = gate.parents.iter().all(|p| match self.map.state_of(*p) {
            Ok(state) => state.admits_children(),
            Err(_) => true,
        });
        if ready {
            return GateCheck::Pass;
        }
        if self.cancel.swap(false, AtomicOrdering::SeqCst) {
            return GateCheck::Abandon;
        }
        GateCheck::Wait
    }

    /// Commits `target` once the gate admits it, then fans the transition
    /// out to relatives.
    ///
    /// The state write, the registry update and the fan-out pushes happen
    /// under the state lock, so an observer that sees a fan-out event will
    /// read at least this state from the registry. Re-testing the predicate
    /// after every wakeup makes the wait spurious-wakeup safe.
    async fn commit_state(&self, target: State) {
        if !self.lock_gate().state.can_transition(target) {
            return;
        }
        loop {
            match self.gate_check(target) {
                GateCheck::Pass => break,
                GateCheck::Abandon => return,
                GateCheck::Wait => self.proceed.notified().await,
            }
        }

        let mut gate = self.lock_gate();
        // The lock was released between the last check and here; the only
        // other writer of `state` is this worker, but a terminal commit must
        // still win over anything queued behind it.
        if !gate.state.can_transition(target) {
            return;
        }
        gate.state = target;
        self.map.update_state(self.tag, target);

        let to_parents = Event::from_child(self.tag, target);
        for parent in &gate.parents {
            if let Ok((state, link)) = self.map.get(*parent) {
                if state == State::Running {
                    if let Some(link) = link.upgrade() {
                        link.deliver(to_parents);
                    }
                }
            }
        }
        let to_children = Event::from_parent(self.tag, target);
        for child in &gate.children {
            if let Ok((state, link)) = self.map.get(*child) {
                if state != State::Destroyed {
                    if let Some(link) = link.upgrade() {
                        link.deliver(to_children);
                    }
                }
            }
        }
        drop(gate);
        self.proceed.notify_one();
    }
}

impl<M: Send + 'static> Link for Shared<M> {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn deliver(&self, event: Event) {
        self.push_lifecycle(event);
    }

    fn attach_child(&self, child: Tag) {
        self.lock_gate().children.insert(child);
    }

    fn parent_tags(&self) -> Vec<Tag> {
        self.lock_gate().parents.iter().copied().collect()
    }
}

impl<M> Drop for Shared<M> {
    fn drop(&mut self) {
        self.map.remove(self.tag);
    }
}

/// Type-erased reference to a subsystem, used in a child's parent list.
///
/// Obtained via [`Subsystem::as_parent`]; erasure lets subsystems with
/// different message types depend on each other.
#[derive(Clone)]
pub struct ParentRef {
    link: Arc<dyn Link>,
}

impl ParentRef {
    /// Tag of the referenced subsystem.
    pub fn tag(&self) -> Tag {
        self.link.tag()
    }
}

impl fmt::Debug for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ParentRef").field(&self.link.tag()).finish()
    }
}

/// Handle to one lifecycle-managed subsystem.
///
/// Cheap to clone; all clones and the worker share the same core. `M` is the
/// application message type accepted by [`Subsystem::send`] (`()` for plain
/// lifecycle-only subsystems).
///
/// ### Teardown contract
/// Call [`Subsystem::destroy`] (or [`Subsystem::shutdown`]) before dropping
/// the last handle. Dropping every handle while the bus is still open leaves
/// a spawned worker parked forever; that is a programming error, not a leak
/// the crate can recover from.
pub struct Subsystem<M = ()> {
    shared: Arc<Shared<M>>,
    hooks: Arc<dyn Hooks<Msg = M>>,
}

impl Subsystem<()> {
    /// Builds a subsystem with [`NoHooks`] and no worker; the caller drives
    /// the loop via [`Subsystem::run`] or [`Subsystem::handle_bus_message`].
    pub fn build(
        name: impl Into<String>,
        map: &SystemMap,
        parents: &[ParentRef],
    ) -> Result<Self, RuntimeError> {
        Self::build_with(name, map, parents, Arc::new(NoHooks))
    }

    /// Builds a subsystem with [`NoHooks`] and spawns its worker task.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(
        name: impl Into<String>,
        map: &SystemMap,
        parents: &[ParentRef],
    ) -> Result<Self, RuntimeError> {
        Self::spawn_with(name, map, parents, Arc::new(NoHooks))
    }
}

impl<M: Send + 'static> Subsystem<M> {
    /// Builds a subsystem with custom hooks and no worker.
    ///
    /// Construction registers the subsystem (`INIT`) with the map and links
    /// it under each declared parent.
    ///
    /// ### Errors
    /// - [`RuntimeError::ParentUnavailable`] — a declared parent is
    ///   destroyed or no longer registered
    /// - [`RuntimeError::CycleDetected`] — the parent list would close a
    ///   dependency cycle (defensive: tags are allocated fresh before
    ///   linking, so the constructors alone cannot produce one)
    /// - [`RuntimeError::RegistryFull`] — the map is at capacity
    pub fn build_with<H>(
        name: impl Into<String>,
        map: &SystemMap,
        parents: &[ParentRef],
        hooks: Arc<H>,
    ) -> Result<Self, RuntimeError>
    where
        H: Hooks<Msg = M>,
    {
        let name = name.into();
        let tag = Tag::next();

        let mut parent_tags = BTreeSet::new();
        for parent in parents {
            let ptag = parent.link.tag();
            match map.state_of(ptag) {
                Ok(state) if !state.is_terminal() => {}
                _ => return Err(RuntimeError::ParentUnavailable { tag: ptag }),
            }
            parent_tags.insert(ptag);
        }
        reject_cycles(&name, tag, map, &parent_tags)?;

        let shared = Arc::new(Shared {
            tag,
            name,
            map: map.clone(),
            bus: Bus::new(),
            gate: Mutex::new(Gate {
                state: State::Init,
                parents: parent_tags,
                children: BTreeSet::new(),
            }),
            cancel: AtomicBool::new(false),
            proceed: Notify::new(),
            worker: Mutex::new(None),
        });

        let shared_dyn: Arc<dyn Link> = shared.clone();
        let weak: Weak<dyn Link> = Arc::downgrade(&shared_dyn);
        map.insert(tag, &shared.name, weak)?;
        for parent in parents {
            parent.link.attach_child(tag);
        }

        let hooks: Arc<dyn Hooks<Msg = M>> = hooks;
        Ok(Self { shared, hooks })
    }

    /// Builds a subsystem with custom hooks and spawns its worker task.
    ///
    /// Must be called within a tokio runtime. The worker runs until the bus
    /// is terminated by a destroy; await it with [`Subsystem::join`].
    pub fn spawn_with<H>(
        name: impl Into<String>,
        map: &SystemMap,
        parents: &[ParentRef],
        hooks: Arc<H>,
    ) -> Result<Self, RuntimeError>
    where
        H: Hooks<Msg = M>,
    {
        let sys = Self::build_with(name, map, parents, hooks)?;
        let worker = {
            let sys = sys.clone();
            tokio::spawn(async move { sys.run().await })
        };
        *sys.shared
            .worker
            .lock()
            .expect("worker slot lock poisoned") = Some(worker);
        Ok(sys)
    }

    /// Returns a type-erased reference usable in another subsystem's parent
    /// list.
    pub fn as_parent(&self) -> ParentRef {
        let link: Arc<dyn Link> = self.shared.clone();
        ParentRef { link }
    }

    /// Requests a transition to `RUNNING`.
    ///
    /// Enqueues the event and returns immediately; no-op once destroyed.
    pub fn start(&self) {
        self.shared
            .push_lifecycle(Event::own(self.shared.tag, State::Running));
    }

    /// Requests a transition to `STOPPED`.
    pub fn stop(&self) {
        self.shared
            .push_lifecycle(Event::own(self.shared.tag, State::Stopped));
    }

    /// Requests a transition to `ERROR`.
    pub fn error(&self) {
        self.shared
            .push_lifecycle(Event::own(self.shared.tag, State::Error));
    }

    /// Requests teardown. Idempotent; a second call is a silent no-op.
    ///
    /// Also raises the cancel flag so a start parked in the gate abandons
    /// its wait and the worker gets to the teardown event.
    pub fn destroy(&self) {
        self.shared.cancel.store(true, AtomicOrdering::SeqCst);
        self.shared
            .push_lifecycle(Event::own(self.shared.tag, State::Destroyed));
    }

    /// Pushes an application message onto this subsystem's bus; it is
    /// dispatched to [`Hooks::on_message`]. Dropped once destroyed.
    pub fn send(&self, msg: M) {
        self.shared.bus.push(Envelope::User(msg));
        self.shared.proceed.notify_one();
    }

    /// Current committed state.
    pub fn state(&self) -> State {
        self.shared.lock_gate().state
    }

    /// Unique tag.
    pub fn tag(&self) -> Tag {
        self.shared.tag
    }

    /// Human label given at construction.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Tags currently in the parent set.
    pub fn parents(&self) -> Vec<Tag> {
        self.shared.parent_tags()
    }

    /// Tags currently in the child set.
    pub fn children(&self) -> Vec<Tag> {
        self.shared.lock_gate().children.iter().copied().collect()
    }

    /// Drives the worker loop until the bus terminates.
    ///
    /// Exactly one task may drive a given subsystem at a time; `spawn`
    /// variants call this from the spawned worker.
    pub async fn run(&self) {
        while self.handle_bus_message().await {}
    }

    /// Drives the worker loop until the bus terminates or `token` fires.
    ///
    /// Cancellation is only observed between events: an in-flight hook
    /// always finishes.
    pub async fn run_until(&self, token: CancellationToken) {
        loop {
            let next = tokio::select! {
                _ = token.cancelled() => break,
                envelope = self.shared.bus.recv() => envelope,
            };
            match next {
                Some(envelope) => self.dispatch(envelope).await,
                None => {
                    self.shared.proceed.notify_one();
                    break;
                }
            }
        }
    }

    /// Consumes and dispatches one bus item.
    ///
    /// Returns `false` once the terminator has been observed; bespoke worker
    /// loops call this directly.
    pub async fn handle_bus_message(&self) -> bool {
        match self.shared.bus.recv().await {
            Some(envelope) => {
                self.dispatch(envelope).await;
                true
            }
            None => {
                // Unblock anything still parked on the gate.
                self.shared.proceed.notify_one();
                false
            }
        }
    }

    /// Awaits the worker spawned by the `spawn` constructors.
    ///
    /// Returns immediately if none was spawned or it was already joined.
    pub async fn join(&self) {
        let worker = self
            .shared
            .worker
            .lock()
            .expect("worker slot lock poisoned")
            .take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }

    /// Convenience teardown: [`Subsystem::destroy`] then
    /// [`Subsystem::join`].
    pub async fn shutdown(&self) {
        self.destroy();
        self.join().await;
    }

    async fn dispatch(&self, envelope: Envelope<M>) {
        match envelope {
            Envelope::Lifecycle(event) => match event.origin {
                Origin::Own => self.handle_own(event).await,
                Origin::Parent => self.handle_parent(event).await,
                Origin::Child => self.handle_child(event).await,
            },
            Envelope::User(msg) => {
                if guard(self.hooks.on_message(self, msg)).await.is_err() {
                    self.error();
                }
            }
        }
        self.shared.proceed.notify_one();
    }

    async fn handle_own(&self, event: Event) {
        let hook = match event.state {
            State::Running => guard(self.hooks.on_start(self)).await,
            State::Error => guard(self.hooks.on_error(self)).await,
            State::Stopped => {
                let hook = guard(self.hooks.on_stop(self)).await;
                self.shared.cancel.store(true, AtomicOrdering::SeqCst);
                hook
            }
            State::Destroyed => {
                self.shared.cancel.store(true, AtomicOrdering::SeqCst);
                // Teardown proceeds whether or not the hook panics.
                let _ = guard(self.hooks.on_destroy(self)).await;
                self.shared.bus.terminate();
                Ok(())
            }
            // No trigger produces an INIT target.
            State::Init => return,
        };
        if hook.is_err() && event.state != State::Error {
            // Panicked hook: converge to ERROR instead of committing the
            // requested state. An on_error panic falls through to the
            // commit below, so a panic loop cannot form.
            self.error();
            return;
        }
        self.shared.commit_state(event.state).await;
    }

    async fn handle_parent(&self, event: Event) {
        match event.state {
            State::Destroyed => {
                self.shared.lock_gate().parents.remove(&event.tag);
                self.shared.cancel.store(true, AtomicOrdering::SeqCst);
            }
            State::Error => {
                self.shared.cancel.store(true, AtomicOrdering::SeqCst);
            }
            _ => {}
        }
        if guard(self.hooks.on_parent(self, event)).await.is_err() {
            self.error();
        }
    }

    async fn handle_child(&self, event: Event) {
        if event.state == State::Destroyed {
            self.shared.lock_gate().children.remove(&event.tag);
        }
        if guard(self.hooks.on_child(self, event)).await.is_err() {
            self.error();
        }
    }
}

impl<M> Clone for Subsystem<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            hooks: Arc::clone(&self.hooks),
        }
    }
}

impl<M: Send + 'static> fmt::Debug for Subsystem<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subsystem")
            .field("tag", &self.shared.tag)
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Isolates a hook invocation from the worker, like subscriber workers do:
/// a panic is caught and reported to the caller instead of killing the loop.
async fn guard<F: Future<Output = ()>>(fut: F) -> Result<(), ()> {
    AssertUnwindSafe(fut).catch_unwind().await.map_err(|_| ())
}

/// Walks the ancestors of every declared parent; registering `tag` under
/// them must not make `tag` its own ancestor.
///
/// Defensive boundary guard: the constructors allocate `tag` fresh right
/// before this walk and nothing rewires an existing subsystem's parents, so
/// no graph built through this crate can trip it today. It stays at the
/// boundary so any future parent-rewiring path keeps rejecting cycles, and
/// its unit tests drive it directly with rigged links to prove the error
/// path fires.
fn reject_cycles(
    name: &str,
    tag: Tag,
    map: &SystemMap,
    declared: &BTreeSet<Tag>,
) -> Result<(), RuntimeError> {
    let mut pending: Vec<Tag> = declared.iter().copied().collect();
    let mut seen: BTreeSet<Tag> = BTreeSet::new();
    while let Some(ancestor) = pending.pop() {
        if ancestor == tag {
            return Err(RuntimeError::CycleDetected {
                name: name.to_owned(),
                tag: ancestor,
            });
        }
        if !seen.insert(ancestor) {
            continue;
        }
        if let Ok((_, link)) = map.get(ancestor) {
            if let Some(link) = link.upgrade() {
                pending.extend(link.parent_tags());
            }
        }
    }
    Ok(())
}
