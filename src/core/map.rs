//! # System map — the shared subsystem registry.
//!
//! [`SystemMap`] is the authoritative, externally visible record of every
//! live subsystem: `tag → (state, name, weak link)`. Subsystems consult it
//! inside the wait-for-parents gate, fan-out walks it to find relatives'
//! buses, and debug tooling dumps it.
//!
//! ## Rules
//! - The map **never owns** a subsystem: entries hold `Weak` references, and
//!   the entry is removed when the last handle drops. A committed
//!   `DESTROYED` state therefore stays readable until the owner lets go.
//! - Readers get **copies** of `(state, link)`; no internal reference ever
//!   escapes the lock.
//! - Capacity is checked on insert ([`RuntimeError::RegistryFull`]);
//!   removal is idempotent.
//!
//! Creating the map is the system bootstrap: one map per coordinated scope,
//! sized via [`Config::max_subsystems`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use crate::config::Config;
use crate::core::subsystem::Link;
use crate::core::{State, Tag};
use crate::error::RuntimeError;

/// One registry record.
struct Slot {
    state: State,
    name: String,
    link: Weak<dyn Link>,
}

/// A row of [`SystemMap::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// Subsystem tag.
    pub tag: Tag,
    /// Human label given at construction.
    pub name: String,
    /// Last committed state.
    pub state: State,
}

impl fmt::Display for SnapshotEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:<9} {}", self.tag, self.state.to_string(), self.name)
    }
}

/// Shared registry of subsystems, cheap to clone.
///
/// All subsystems coordinated together are built against the same map; it is
/// what a child's gate reads to decide whether its parents are far enough
/// along.
#[derive(Clone)]
pub struct SystemMap {
    inner: Arc<MapInner>,
}

struct MapInner {
    max: u32,
    entries: RwLock<HashMap<Tag, Slot>>,
}

impl SystemMap {
    /// Bootstraps a registry for at most `cfg.max_subsystems` subsystems.
    pub fn new(cfg: Config) -> Self {
        Self {
            inner: Arc::new(MapInner {
                max: cfg.max_subsystems,
                entries: RwLock::new(HashMap::with_capacity(cfg.max_subsystems as usize)),
            }),
        }
    }

    /// Configured maximum subsystem count.
    pub fn capacity(&self) -> u32 {
        self.inner.max
    }

    /// Number of currently registered subsystems.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Returns `true` if `tag` is currently registered.
    pub fn contains(&self, tag: Tag) -> bool {
        self.read().contains_key(&tag)
    }

    /// Last committed state of `tag`.
    ///
    /// Fails with [`RuntimeError::NotFound`] once the subsystem's last
    /// handle has been dropped (or if it was never registered here).
    pub fn state_of(&self, tag: Tag) -> Result<State, RuntimeError> {
        self.read()
            .get(&tag)
            .map(|slot| slot.state)
            .ok_or(RuntimeError::NotFound { tag })
    }

    /// Registers a new subsystem in `Init` state.
    pub(crate) fn insert(
        &self,
        tag: Tag,
        name: &str,
        link: Weak<dyn Link>,
    ) -> Result<(), RuntimeError> {
        let mut entries = self.write();
        if entries.len() >= self.inner.max as usize {
            return Err(RuntimeError::RegistryFull { max: self.inner.max });
        }
        entries.insert(
            tag,
            Slot {
                state: State::Init,
                name: name.to_owned(),
                link,
            },
        );
        Ok(())
    }

    /// Removes `tag`. Removing an absent tag is a no-op.
    pub(crate) fn remove(&self, tag: Tag) {
        self.write().remove(&tag);
    }

    /// Overwrites the recorded state of `tag`. No-op for an absent tag.
    pub(crate) fn update_state(&self, tag: Tag, state: State) {
        if let Some(slot) = self.write().get_mut(&tag) {
            slot.state = state;
        }
    }

    /// Copy-out lookup: `(state, link)` for `tag`.
    pub(crate) fn get(&self, tag: Tag) -> Result<(State, Weak<dyn Link>), RuntimeError> {
        self.read()
            .get(&tag)
            .map(|slot| (slot.state, Weak::clone(&slot.link)))
            .ok_or(RuntimeError::NotFound { tag })
    }

    /// Copies every entry out for inspection, sorted by tag.
    pub fn snapshot(&self) -> Vec<SnapshotEntry> {
        let mut rows: Vec<SnapshotEntry> = self
            .read()
            .iter()
            .map(|(tag, slot)| SnapshotEntry {
                tag: *tag,
                name: slot.name.clone(),
                state: slot.state,
            })
            .collect();
        rows.sort_by_key(|row| row.tag);
        rows
    }

    /// Writes a human-readable dump of the registry, one entry per line.
    pub fn dump(&self, sink: &mut impl fmt::Write) -> fmt::Result {
        for row in self.snapshot() {
            writeln!(sink, "{row}")?;
        }
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Tag, Slot>> {
        self.inner.entries.read().expect("system map lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Tag, Slot>> {
        self.inner.entries.write().expect("system map lock poisoned")
    }
}

impl Default for SystemMap {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dangling() -> Weak<dyn Link> {
        // A Weak that never upgrades; registry behavior is link-agnostic.
        let strong: Arc<dyn Link> = Arc::new(crate::core::subsystem::tests::StubLink::default());
        let weak: Weak<dyn Link> = Arc::downgrade(&strong);
        drop(strong);
        weak
    }

    #[test]
    fn insert_get_update_remove() {
        let map = SystemMap::default();
        let tag = Tag::next();
        map.insert(tag, "net", dangling()).unwrap();

        assert_eq!(map.state_of(tag).unwrap(), State::Init);
        map.update_state(tag, State::Running);
        assert_eq!(map.state_of(tag).unwrap(), State::Running);

        map.remove(tag);
        assert!(matches!(
            map.state_of(tag),
            Err(RuntimeError::NotFound { tag: missing }) if missing == tag
        ));
        // Idempotent.
        map.remove(tag);
    }

    #[test]
    fn insert_respects_capacity() {
        let map = SystemMap::new(Config { max_subsystems: 2 });
        map.insert(Tag::next(), "a", dangling()).unwrap();
        map.insert(Tag::next(), "b", dangling()).unwrap();

        let err = map.insert(Tag::next(), "c", dangling()).unwrap_err();
        assert!(matches!(err, RuntimeError::RegistryFull { max: 2 }));
        assert_eq!(err.as_label(), "registry_full");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn update_state_on_absent_tag_is_a_noop() {
        let map = SystemMap::default();
        map.update_state(Tag::next(), State::Error);
        assert!(map.is_empty());
    }

    #[test]
    fn snapshot_is_sorted_and_dumpable() {
        let map = SystemMap::default();
        let a = Tag::next();
        let b = Tag::next();
        map.insert(b, "late", dangling()).unwrap();
        map.insert(a, "early", dangling()).unwrap();
        map.update_state(b, State::Running);

        let rows = map.snapshot();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tag, a);
        assert_eq!(rows[0].name, "early");
        assert_eq!(rows[1].state, State::Running);

        let mut out = String::new();
        map.dump(&mut out).unwrap();
        assert!(out.contains("RUNNING"));
        assert!(out.contains("early"));
        assert_eq!(out.lines().count(), 2);
    }
}
