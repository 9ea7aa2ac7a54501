//! Subscriber types for the reactive system.
//!
//! A Subscriber is the listener a signal notifies when its value changes.
//! Computed values, effects, observers and samplers each own one.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscriber.
///
/// Signals key their subscriber registry by this ID, so reading the same
/// signal twice within one tracked run registers the subscriber only once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A listener registered on one or more signals.
///
/// The callback is invoked synchronously inside the writer's call stack.
/// It must only *schedule* work (typically through a
/// [`Throttle`](crate::scheduler::Throttle)); running a recomputation from
/// here would break the guarantee that a write never propagates
/// synchronously.
pub struct Subscriber {
    id: SubscriberId,
    notify: Box<dyn Fn() + Send + Sync>,
}

impl Subscriber {
    /// Create a new subscriber with a fresh ID.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_id(SubscriberId::new(), notify)
    }

    /// Create a subscriber that reuses an existing ID.
    ///
    /// Computations rebuild their subscriber on every run but keep one
    /// identity for their whole lifetime.
    pub fn with_id<F>(id: SubscriberId, notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            id,
            notify: Box::new(notify),
        }
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Notify the subscriber that one of its dependencies changed.
    pub fn notify(&self) {
        (self.notify)();
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}
