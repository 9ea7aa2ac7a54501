//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! it registers the current computation's subscriber and records the
//! registration in the active context entry.
//!
//! # Implementation
//!
//! The stack lives inside a [`Runtime`](super::Runtime) rather than in a
//! thread-local, so independent runtimes (and tests) never observe each
//! other's listeners. Entering a context pushes an entry; the returned guard
//! pops it, even if the computation panics.
//!
//! Nested contexts are supported: a computed value constructed inside
//! another computation's run registers only the innermost subscriber on the
//! signals it reads.

use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::cancel::CancelHandle;
use super::subscriber::{Subscriber, SubscriberId};

/// Registrations made during one tracked run, one handle per signal read.
pub type Dependencies = SmallVec<[CancelHandle; 4]>;

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The listener reads are attributed to. `None` for untracked sections.
    subscriber: Option<Arc<Subscriber>>,
    /// Cancel handles for every registration made in this entry.
    dependencies: Dependencies,
}

/// The stack of active listeners for one runtime.
#[derive(Default)]
pub(crate) struct TrackingStack {
    entries: Mutex<Vec<ContextEntry>>,
}

impl TrackingStack {
    fn push(&self, subscriber: Option<Arc<Subscriber>>) {
        self.entries.lock().push(ContextEntry {
            subscriber,
            dependencies: Dependencies::new(),
        });
    }

    fn pop(&self) -> Option<ContextEntry> {
        self.entries.lock().pop()
    }

    /// The listener on top of the stack, if any.
    pub(crate) fn current_subscriber(&self) -> Option<Arc<Subscriber>> {
        self.entries
            .lock()
            .last()
            .and_then(|entry| entry.subscriber.clone())
    }

    /// Record a registration made by a signal read in the top entry.
    pub(crate) fn track_dependency(&self, handle: CancelHandle) {
        if let Some(entry) = self.entries.lock().last_mut() {
            entry.dependencies.push(handle);
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Guard that pops the context when dropped.
///
/// Call [`finish`](Self::finish) on the normal path to collect the
/// registrations. If the guard is dropped instead (a panic unwinding through
/// the computation) the registrations are cancelled.
pub(crate) struct ReactiveContext<'a> {
    stack: &'a TrackingStack,
    subscriber_id: Option<SubscriberId>,
    finished: bool,
}

impl<'a> ReactiveContext<'a> {
    /// Enter a new reactive context for the given subscriber.
    pub(crate) fn enter(stack: &'a TrackingStack, subscriber: Option<Arc<Subscriber>>) -> Self {
        let subscriber_id = subscriber.as_ref().map(|s| s.id());
        stack.push(subscriber);
        Self {
            stack,
            subscriber_id,
            finished: false,
        }
    }

    /// Leave the context and return the registrations it collected.
    pub(crate) fn finish(mut self) -> Dependencies {
        self.finished = true;
        self.exit().map(|entry| entry.dependencies).unwrap_or_default()
    }

    fn exit(&self) -> Option<ContextEntry> {
        let popped = self.stack.pop();

        // Catches contexts that were exited out of order.
        if let Some(entry) = &popped {
            debug_assert_eq!(
                entry.subscriber.as_ref().map(|s| s.id()),
                self.subscriber_id,
                "ReactiveContext mismatch"
            );
        }
        popped
    }
}

impl Drop for ReactiveContext<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(entry) = self.exit() {
            for handle in entry.dependencies {
                handle.cancel();
            }
        }
    }
}
