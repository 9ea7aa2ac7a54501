//! Computation Nodes
//!
//! A node is the bookkeeping shared by every tracked computation: its
//! identity, its private throttle, and the registrations from its most
//! recent run.
//!
//! Signals hold a node's subscriber, and the subscriber holds the node. The
//! node only refers back to its computation weakly, so dropping the last
//! handle to a computed value or effect releases it and its registrations.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use super::context::Dependencies;
use super::runtime::Runtime;
use super::subscriber::{Subscriber, SubscriberId};
use crate::error::Result;
use crate::scheduler::{Granularity, Throttle};

/// A computation the scheduler can re-run.
pub(crate) trait Reactive: Send + Sync {
    /// Re-run the computation under a fresh tracking scope.
    fn run(&self) -> Result<()>;
}

/// The kind of computation a node drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    /// A derived value.
    Computed,

    /// A side-effecting job with no value.
    Effect,
}

impl NodeKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Computed => "computed",
            NodeKind::Effect => "effect",
        }
    }
}

/// Generate a new unique node ID.
fn next_node_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

pub(crate) struct Node {
    id: u64,
    kind: NodeKind,
    subscriber_id: SubscriberId,
    runtime: Runtime,
    throttle: Arc<Throttle>,
    target: OnceLock<Weak<dyn Reactive>>,
    dependencies: Mutex<Dependencies>,
    disposed: AtomicBool,
}

impl Node {
    pub(crate) fn new(runtime: &Runtime, granularity: Granularity, kind: NodeKind) -> Arc<Self> {
        Arc::new(Self {
            id: next_node_id(),
            kind,
            subscriber_id: SubscriberId::new(),
            runtime: runtime.clone(),
            throttle: Throttle::new(runtime, granularity),
            target: OnceLock::new(),
            dependencies: Mutex::new(Dependencies::new()),
            disposed: AtomicBool::new(false),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn kind(&self) -> NodeKind {
        self.kind
    }

    pub(crate) fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Attach the computation this node re-runs.
    pub(crate) fn bind(&self, target: Weak<dyn Reactive>) {
        let _ = self.target.set(target);
    }

    /// Run `f` as this node's tracked computation.
    ///
    /// Registrations from the previous run are cancelled first; the new set
    /// is exactly what `f` reads.
    pub(crate) fn track<R, F>(self: &Arc<Self>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.release_dependencies();
        let (result, dependencies) = self.runtime.with_tracking(self.subscriber(), f);

        if self.is_disposed() {
            // Disposed from inside its own run.
            for handle in dependencies {
                handle.cancel();
            }
        } else {
            *self.dependencies.lock() = dependencies;
        }
        result
    }

    /// Queue a re-run on this node's throttle.
    pub(crate) fn schedule(self: &Arc<Self>) {
        if self.is_disposed() {
            return;
        }
        let node = Arc::clone(self);
        self.throttle.schedule(move || node.run());
    }

    /// Stop re-running and drop every registration.
    pub(crate) fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            tracing::trace!(node = self.id, kind = self.kind.as_str(), "disposed");
        }
        self.release_dependencies();
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.throttle.is_pending()
    }

    pub(crate) fn dependency_count(&self) -> usize {
        self.dependencies.lock().len()
    }

    fn subscriber(self: &Arc<Self>) -> Arc<Subscriber> {
        let node = Arc::clone(self);
        Arc::new(Subscriber::with_id(self.subscriber_id, move || {
            node.schedule()
        }))
    }

    fn release_dependencies(&self) {
        let dependencies = std::mem::take(&mut *self.dependencies.lock());
        for handle in dependencies {
            handle.cancel();
        }
    }

    fn run(&self) -> Result<()> {
        if self.is_disposed() {
            return Ok(());
        }
        let Some(target) = self.target.get() else {
            return Ok(());
        };
        match target.upgrade() {
            Some(target) => {
                tracing::trace!(node = self.id, kind = self.kind.as_str(), "re-running");
                target.run()
            }
            None => {
                self.dispose();
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use std::sync::atomic::AtomicUsize;

    struct Counter {
        node: Arc<Node>,
        source: Signal<i32>,
        runs: AtomicUsize,
    }

    impl Reactive for Counter {
        fn run(&self) -> Result<()> {
            self.node.track(|| self.source.get());
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counter(rt: &Runtime, source: &Signal<i32>) -> Arc<Counter> {
        let node = Node::new(rt, Granularity::Microtask, NodeKind::Effect);
        let counter = Arc::new(Counter {
            node: node.clone(),
            source: source.clone(),
            runs: AtomicUsize::new(0),
        });
        let target: Weak<dyn Reactive> = Arc::<Counter>::downgrade(&counter);
        node.bind(target);
        counter.run().unwrap();
        counter
    }

    #[test]
    fn node_reruns_bound_target_once_per_tick() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 0);
        let counter = counter(&rt, &source);

        source.set(1);
        source.set(2);
        assert!(counter.node.is_pending());

        rt.flush().unwrap();
        assert_eq!(counter.runs.load(Ordering::SeqCst), 2);
        assert_eq!(counter.node.dependency_count(), 1);
    }

    #[test]
    fn disposed_node_releases_registrations() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 0);
        let counter = counter(&rt, &source);
        assert_eq!(source.subscriber_count(), 1);

        counter.node.dispose();
        assert!(counter.node.is_disposed());
        assert_eq!(source.subscriber_count(), 0);

        source.set(5);
        rt.flush().unwrap();
        assert_eq!(counter.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_target_disposes_on_next_run() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 0);
        let counter = counter(&rt, &source);
        let node = counter.node.clone();
        drop(counter);

        source.set(1);
        rt.flush().unwrap();

        assert!(node.is_disposed());
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn kind_names() {
        assert_eq!(NodeKind::Computed.as_str(), "computed");
        assert_eq!(NodeKind::Effect.as_str(), "effect");
    }
}
