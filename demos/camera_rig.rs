//! # Demo: camera_rig
//!
//! A three-subsystem rig: an OS node at the root and two dependents
//! (camera, metadata) that only run while the OS does.
//!
//! Demonstrates how to:
//! - Spawn subsystems against a shared `SystemMap` with declared parents.
//! - Let the default parent cascade start/err/restart the whole rig.
//! - Inspect the registry with `SystemMap::dump`.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► spawn os / camera / metadata (camera, metadata depend on os)
//!   ├─► os.start()        → cascade: everything RUNNING
//!   ├─► os.error()        → cascade: everything ERROR
//!   ├─► os.start()        → cascade: everything RUNNING again
//!   └─► os.destroy()      → cascade: everything DESTROYED, workers exit
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example camera_rig --features logging
//! ```

use std::time::Duration;

use subvisor::{LogHooks, State, Subsystem, SystemMap};

async fn settle(rig: &[&Subsystem], state: State) {
    for sys in rig {
        while sys.state() != state {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

fn dump(map: &SystemMap) {
    let mut out = String::new();
    map.dump(&mut out).expect("formatting registry dump");
    println!("--- registry ---\n{out}----------------");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let map = SystemMap::default();

    // 1) Build the rig. LogHooks prints every callback (demo only); the
    //    parent cascade is the default policy.
    let os = Subsystem::spawn_with("os", &map, &[], std::sync::Arc::new(LogHooks))?;
    let cam = Subsystem::spawn_with(
        "camera",
        &map,
        &[os.as_parent()],
        std::sync::Arc::new(LogHooks),
    )?;
    let meta = Subsystem::spawn_with(
        "metadata",
        &map,
        &[os.as_parent()],
        std::sync::Arc::new(LogHooks),
    )?;
    let rig = [&os, &cam, &meta];

    // 2) Start the root; the dependents follow it up.
    os.start();
    cam.start();
    meta.start();
    settle(&rig, State::Running).await;
    println!(">> all subsystems started");
    dump(&map);

    // 3) Fault the root; the error cascades down.
    println!(">> triggering error on the os subsystem");
    os.error();
    settle(&rig, State::Error).await;
    dump(&map);

    // 4) Restart the root; the rig comes back.
    println!(">> restarting the os subsystem");
    os.start();
    settle(&rig, State::Running).await;
    dump(&map);

    // 5) Tear down from the root and join every worker.
    println!(">> destroying the rig");
    os.destroy();
    settle(&rig, State::Destroyed).await;
    for sys in rig {
        sys.join().await;
    }
    dump(&map);

    Ok(())
}
