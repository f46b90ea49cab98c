//! End-to-end lifecycle coordination tests.
//!
//! Each test builds a small dependency graph against one `SystemMap`, drives
//! it through triggers, and asserts on the states the registry and the
//! handles expose. Assertions on "eventually" conditions poll with a bounded
//! timeout instead of sleeping blind.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use subvisor::{Config, Event, Hooks, RuntimeError, State, Subsystem, SystemMap};
use tokio_util::sync::CancellationToken;

const SETTLE: Duration = Duration::from_secs(5);

/// Polls `cond` until it holds or the settle timeout elapses.
async fn eventually(cond: impl Fn() -> bool) -> bool {
    tokio::time::timeout(SETTLE, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .is_ok()
}

async fn settles<M: Send + 'static>(sys: &Subsystem<M>, target: State) {
    assert!(
        eventually(|| sys.state() == target).await,
        "{} did not settle at {target}, stuck at {}",
        sys.name(),
        sys.state()
    );
}

/// A window long enough for a wrong transition to become visible.
async fn grace() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// =============================================================================
// Single subsystem
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_root_runs_and_tears_down() {
    let map = SystemMap::default();
    let root = Subsystem::spawn("root", &map, &[]).unwrap();
    let tag = root.tag();

    root.start();
    settles(&root, State::Running).await;
    assert_eq!(map.state_of(tag).unwrap(), State::Running);

    root.destroy();
    settles(&root, State::Destroyed).await;
    root.join().await;

    // The committed terminal state stays readable until the handle drops.
    assert_eq!(map.state_of(tag).unwrap(), State::Destroyed);
    drop(root);
    assert!(matches!(
        map.state_of(tag),
        Err(RuntimeError::NotFound { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn destroy_is_idempotent() {
    let map = SystemMap::default();
    let root = Subsystem::spawn("root", &map, &[]).unwrap();

    root.start();
    settles(&root, State::Running).await;

    root.destroy();
    root.destroy();
    settles(&root, State::Destroyed).await;
    root.join().await;

    // Triggers on a destroyed subsystem are silently dropped.
    root.start();
    root.error();
    grace().await;
    assert_eq!(root.state(), State::Destroyed);
    assert_eq!(map.state_of(root.tag()).unwrap(), State::Destroyed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn start_when_running_is_a_noop() {
    let map = SystemMap::default();
    let root = Subsystem::spawn("root", &map, &[]).unwrap();

    root.start();
    settles(&root, State::Running).await;
    root.start();
    grace().await;
    assert_eq!(root.state(), State::Running);

    root.shutdown().await;
}

// =============================================================================
// Parent/child startup and cascades
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn child_start_waits_for_parent() {
    let map = SystemMap::default();
    let parent = Subsystem::spawn("parent", &map, &[]).unwrap();
    let child = Subsystem::spawn("child", &map, &[parent.as_parent()]).unwrap();

    // Started first, the child must hold at INIT while its parent idles.
    child.start();
    grace().await;
    assert_eq!(child.state(), State::Init);
    assert_eq!(parent.state(), State::Init);

    parent.start();
    settles(&parent, State::Running).await;
    settles(&child, State::Running).await;

    parent.destroy();
    child.join().await;
    parent.join().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn error_cascades_and_rig_restarts() {
    let map = SystemMap::default();
    let parent = Subsystem::spawn("parent", &map, &[]).unwrap();
    let child = Subsystem::spawn("child", &map, &[parent.as_parent()]).unwrap();

    parent.start();
    child.start();
    settles(&parent, State::Running).await;
    settles(&child, State::Running).await;

    // Fault the parent: the child inherits the error.
    parent.error();
    settles(&parent, State::Error).await;
    settles(&child, State::Error).await;

    // Restart the parent: the RUNNING commit cascades back down.
    parent.start();
    settles(&parent, State::Running).await;
    settles(&child, State::Running).await;

    parent.destroy();
    settles(&child, State::Destroyed).await;
    child.join().await;
    parent.join().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn destroy_breaks_a_pending_start() {
    let map = SystemMap::default();
    let parent = Subsystem::spawn("parent", &map, &[]).unwrap();
    let child = Subsystem::spawn("child", &map, &[parent.as_parent()]).unwrap();

    // The child parks in the wait-for-parents gate.
    child.start();
    grace().await;
    assert_eq!(child.state(), State::Init);

    // Destroying it directly must break the wait; the parent never starts.
    child.destroy();
    assert!(
        eventually(|| {
            let s = child.state();
            assert!(
                s == State::Init || s == State::Destroyed,
                "child leaked through the gate into {s}"
            );
            s == State::Destroyed
        })
        .await,
        "child never tore down"
    );
    child.join().await;
    assert_eq!(parent.state(), State::Init);

    parent.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn diamond_starts_and_tears_down() {
    let map = SystemMap::default();
    let a = Subsystem::spawn("a", &map, &[]).unwrap();
    let b = Subsystem::spawn("b", &map, &[a.as_parent()]).unwrap();
    let c = Subsystem::spawn("c", &map, &[a.as_parent()]).unwrap();
    let d = Subsystem::spawn("d", &map, &[b.as_parent(), c.as_parent()]).unwrap();

    a.start();
    for sys in [&a, &b, &c, &d] {
        settles(sys, State::Running).await;
    }

    a.destroy();
    for sys in [&a, &b, &c, &d] {
        settles(sys, State::Destroyed).await;
    }
    for sys in [&d, &c, &b, &a] {
        sys.join().await;
    }
}

// =============================================================================
// Hook customization
// =============================================================================

/// Ignores every parent transition; used to observe topology upkeep without
/// the default cascade.
struct Detached;

#[async_trait]
impl Hooks for Detached {
    type Msg = ();

    async fn on_parent(&self, _sys: &Subsystem, _event: Event) {}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn destroyed_parent_leaves_the_parent_set() {
    let map = SystemMap::default();
    let parent = Subsystem::spawn("parent", &map, &[]).unwrap();
    let child =
        Subsystem::spawn_with("child", &map, &[parent.as_parent()], Arc::new(Detached)).unwrap();

    parent.start();
    settles(&parent, State::Running).await;
    child.start();
    settles(&child, State::Running).await;
    assert_eq!(child.parents(), vec![parent.tag()]);

    parent.destroy();
    settles(&parent, State::Destroyed).await;
    parent.join().await;

    // No cascade, but the dead parent is garbage-collected from the set.
    assert!(eventually(|| child.parents().is_empty()).await);
    assert_eq!(child.state(), State::Running);

    child.shutdown().await;
}

/// Parent teardown demotes this subsystem instead of destroying it.
struct StopOnParentLoss;

#[async_trait]
impl Hooks for StopOnParentLoss {
    type Msg = ();

    async fn on_parent(&self, sys: &Subsystem, event: Event) {
        match event.state {
            State::Running => sys.start(),
            State::Stopped | State::Destroyed => sys.stop(),
            State::Error => sys.error(),
            State::Init => {}
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parent_loss_policy_can_stop_instead_of_destroy() {
    let map = SystemMap::default();
    let parent = Subsystem::spawn("parent", &map, &[]).unwrap();
    let child = Subsystem::spawn_with(
        "child",
        &map,
        &[parent.as_parent()],
        Arc::new(StopOnParentLoss),
    )
    .unwrap();

    parent.start();
    settles(&child, State::Running).await;

    parent.destroy();
    parent.join().await;
    settles(&child, State::Stopped).await;

    child.shutdown().await;
    assert_eq!(child.state(), State::Destroyed);
}

/// Panics on start; the worker must convert that into ERROR and keep going.
struct FaultyStart;

#[async_trait]
impl Hooks for FaultyStart {
    type Msg = ();

    async fn on_start(&self, _sys: &Subsystem) {
        panic!("sensor init failed");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panicking_hook_marks_error_and_keeps_serving() {
    let map = SystemMap::default();
    let sys = Subsystem::spawn_with("flaky", &map, &[], Arc::new(FaultyStart)).unwrap();

    sys.start();
    settles(&sys, State::Error).await;
    assert_eq!(map.state_of(sys.tag()).unwrap(), State::Error);

    // The worker survived the panic and still processes events.
    sys.stop();
    settles(&sys, State::Stopped).await;

    sys.shutdown().await;
    assert_eq!(sys.state(), State::Destroyed);
}

/// Collects application messages from the bus.
struct Collector {
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Hooks for Collector {
    type Msg = String;

    async fn on_message(&self, _sys: &Subsystem<String>, msg: String) {
        self.seen.lock().unwrap().push(msg);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn user_messages_ride_the_same_bus() {
    let map = SystemMap::default();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sys = Subsystem::spawn_with(
        "mailbox",
        &map,
        &[],
        Arc::new(Collector { seen: seen.clone() }),
    )
    .unwrap();

    sys.start();
    sys.send("ping".to_owned());
    sys.send("pong".to_owned());

    assert!(eventually(|| seen.lock().unwrap().len() == 2).await);
    assert_eq!(*seen.lock().unwrap(), vec!["ping", "pong"]);

    sys.shutdown().await;
    // Dropped, not delivered: the bus is terminated.
    sys.send("late".to_owned());
    grace().await;
    assert_eq!(seen.lock().unwrap().len(), 2);
}

// =============================================================================
// Bespoke worker loops and introspection
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn run_until_stops_consuming_on_token() {
    let map = SystemMap::default();
    let sys = Subsystem::build("manual", &map, &[]).unwrap();
    let token = CancellationToken::new();

    let driver = {
        let sys = sys.clone();
        let token = token.clone();
        tokio::spawn(async move { sys.run_until(token).await })
    };

    sys.start();
    settles(&sys, State::Running).await;

    token.cancel();
    driver.await.unwrap();

    // The loop stopped without touching the subsystem's state.
    assert_eq!(sys.state(), State::Running);
    assert!(!map.is_empty());

    // A fresh driver can pick the bus back up and finish the teardown.
    sys.destroy();
    sys.run().await;
    assert_eq!(sys.state(), State::Destroyed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn handle_bus_message_reports_the_terminator() {
    let map = SystemMap::default();
    let sys = Subsystem::build("manual", &map, &[]).unwrap();

    sys.start();
    assert!(sys.handle_bus_message().await);
    assert_eq!(sys.state(), State::Running);

    sys.destroy();
    assert!(sys.handle_bus_message().await);
    assert_eq!(sys.state(), State::Destroyed);

    // Terminator observed: false now and on every further call.
    assert!(!sys.handle_bus_message().await);
    assert!(!sys.handle_bus_message().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn snapshot_reflects_the_rig() {
    let map = SystemMap::new(Config { max_subsystems: 8 });
    let os = Subsystem::spawn("os", &map, &[]).unwrap();
    let cam = Subsystem::spawn("camera", &map, &[os.as_parent()]).unwrap();

    os.start();
    settles(&cam, State::Running).await;

    let rows = map.snapshot();
    assert_eq!(rows.len(), 2);
    assert!(rows
        .iter()
        .any(|r| r.name == "os" && r.state == State::Running));
    assert!(rows
        .iter()
        .any(|r| r.name == "camera" && r.state == State::Running));

    let mut dump = String::new();
    map.dump(&mut dump).unwrap();
    assert!(dump.contains("os"));
    assert!(dump.contains("camera"));
    assert!(dump.contains("RUNNING"));

    os.destroy();
    cam.join().await;
    os.join().await;
}
