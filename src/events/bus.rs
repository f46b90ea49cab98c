//! # Per-subsystem event bus.
//!
//! [`Bus`] is a multi-producer / single-consumer FIFO with one-shot
//! termination. Every subsystem owns exactly one; its worker is the
//! consumer, and any other subsystem (or external caller) may produce.
//!
//! ## Key characteristics:
//! - **Unbounded**: a push never blocks, so a subsystem can fan out to its
//!   relatives while holding its own state lock without risking deadlock
//! - **Terminator semantics**: [`Bus::terminate`] discards queued items and
//!   closes the bus; every subsequent [`Bus::recv`] returns `None`
//! - **Closed-drop policy**: a push after termination is silently dropped,
//!   which is what makes triggers on a destroyed subsystem no-ops
//!
//! ## Usage:
//! - [`Bus::push`] enqueues an item and wakes the consumer
//! - [`Bus::recv`] suspends until an item arrives or the bus is terminated
//! - [`Bus::try_recv`] is the non-blocking variant
//!
//! The single-consumer rule is a contract, not a type-level guarantee:
//! exactly one task should sit in [`Bus::recv`] at a time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

/// Cheap cloneable handle to one subsystem's event queue.
pub struct Bus<T> {
    inner: Arc<Shared<T>>,
}

struct Shared<T> {
    queue: Mutex<Queue<T>>,
    /// Consumer wakeup. `notify_one` stores a permit when nobody is waiting,
    /// so a push that races the consumer between its queue check and its
    /// await is never lost.
    notify: Notify,
}

struct Queue<T> {
    items: VecDeque<T>,
    terminated: bool,
}

impl<T> Bus<T> {
    /// Creates an empty, open bus.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    items: VecDeque::new(),
                    terminated: false,
                }),
                notify: Notify::new(),
            }),
        }
    }

    /// Enqueues an item.
    ///
    /// Never blocks. Once the bus has been terminated the item is silently
    /// dropped; producers cannot observe the difference, by contract.
    pub fn push(&self, item: T) {
        {
            let mut q = self.inner.queue.lock().expect("bus mutex poisoned");
            if q.terminated {
                return;
            }
            q.items.push_back(item);
        }
        self.inner.notify.notify_one();
    }

    /// Pops the next item without waiting.
    pub fn try_recv(&self) -> Option<T> {
        let mut q = self.inner.queue.lock().expect("bus mutex poisoned");
        q.items.pop_front()
    }

    /// Waits for the next item.
    ///
    /// Returns `Some(item)` for a real event and `None` once the bus has
    /// been terminated; after the first `None` every further call returns
    /// `None` immediately.
    pub async fn recv(&self) -> Option<T> {
        loop {
            {
                let mut q = self.inner.queue.lock().expect("bus mutex poisoned");
                if let Some(item) = q.items.pop_front() {
                    return Some(item);
                }
                if q.terminated {
                    return None;
                }
            }
            self.inner.notify.notified().await;
        }
    }

    /// Closes the bus: discards queued items and makes every future
    /// [`Bus::recv`] return `None`. Idempotent.
    pub fn terminate(&self) {
        {
            let mut q = self.inner.queue.lock().expect("bus mutex poisoned");
            if q.terminated {
                return;
            }
            q.terminated = true;
            q.items.clear();
        }
        self.inner.notify.notify_one();
    }

    /// Returns `true` once [`Bus::terminate`] has been called.
    pub fn is_terminated(&self) -> bool {
        self.inner.queue.lock().expect("bus mutex poisoned").terminated
    }

    /// Best-effort queue length.
    pub fn len(&self) -> usize {
        self.inner.queue.lock().expect("bus mutex poisoned").items.len()
    }

    /// Returns `true` if no items are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for Bus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Bus<T> {
    fn default() -> Self {
        Self::new()
    }
}
