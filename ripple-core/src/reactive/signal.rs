//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a tracked run (computed/effect), the
//!    signal registers that run's subscriber and hands the runtime a cancel
//!    handle for the registration.
//!
//! 2. When a signal is written with a value that differs from the current
//!    one, every registered subscriber is notified.
//!
//! 3. Subscribers only schedule work. Dependent computations re-run on the
//!    next flush, never inside `set`.
//!
//! # Registration Policy
//!
//! Registrations persist until cancelled. Computations cancel all of their
//! registrations before each re-run and rebuild them from what that run
//! reads, so a signal that stops being read stops triggering.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A unique ID (8 bytes)
//! - The value, behind a `RwLock`
//! - An insertion-ordered map of subscribers keyed by subscriber ID

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use super::cancel::CancelHandle;
use super::runtime::Runtime;
use super::subscriber::{Subscriber, SubscriberId};
use crate::scheduler::{Granularity, Throttle};

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

struct SignalInner<T> {
    id: u64,
    runtime: Runtime,
    /// Granularity used to deliver values to observers.
    granularity: Granularity,
    value: RwLock<T>,
    subscribers: Mutex<IndexMap<SubscriberId, Arc<Subscriber>>>,
}

/// A reactive signal holding a value of type T.
///
/// # Type Parameters
///
/// - `T`: The stored value. `PartialEq` decides whether a write is a change.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{Runtime, Signal};
///
/// let rt = Runtime::new();
/// let count = Signal::new(&rt, 0);
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(runtime: &Runtime, value: T) -> Self {
        Self::with_granularity(runtime, runtime.default_granularity(), value)
    }

    /// Create a signal whose observers are paced at `granularity`.
    pub fn with_granularity(runtime: &Runtime, granularity: Granularity, value: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: next_signal_id(),
                runtime: runtime.clone(),
                granularity,
                value: RwLock::new(value),
                subscribers: Mutex::new(IndexMap::new()),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The runtime this signal belongs to.
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Get the current value.
    ///
    /// If called within a tracked run, this also registers the run's
    /// subscriber.
    pub fn get(&self) -> T {
        self.track();
        self.get_untracked()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Set a new value and notify subscribers.
    ///
    /// Writing a value equal to the current one does nothing.
    pub fn set(&self, value: T) {
        {
            let mut current = self.inner.value.write();
            if *current == value {
                return;
            }
            *current = value;
        }
        self.notify_subscribers();
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.inner.value.read();
            f(&guard)
        };
        self.set(new_value);
    }

    /// Register a raw subscriber for all future changes.
    ///
    /// The subscriber is notified synchronously from `set`, so it must only
    /// schedule work. Prefer [`observe`](Self::observe) for value callbacks.
    pub fn subscribe(&self, subscriber: Arc<Subscriber>) -> CancelHandle {
        let id = subscriber.id();
        self.inner.subscribers.lock().insert(id, subscriber);
        unsubscribe_handle(&self.inner, id)
    }

    /// Call `observer` with the current value now and with every later value.
    ///
    /// Later calls are deferred to the next flush (or frame, for frame-paced
    /// signals) and coalesced: several writes in one tick produce one call
    /// with the latest value.
    pub fn observe<F>(&self, observer: F) -> CancelHandle
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let observer = Arc::new(observer);
        let current = self.get_untracked();
        self.inner.runtime.untracked(|| observer(current));

        let throttle = Throttle::new(&self.inner.runtime, self.inner.granularity);
        let weak = Arc::downgrade(&self.inner);
        let subscriber = Subscriber::new(move || {
            let weak = weak.clone();
            let observer = observer.clone();
            throttle.schedule(move || {
                if let Some(inner) = weak.upgrade() {
                    let value = inner.value.read().clone();
                    observer(value);
                }
                Ok(())
            });
        });

        self.subscribe(Arc::new(subscriber))
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// A read-only view sharing this signal's state.
    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal {
            signal: self.clone(),
        }
    }

    /// Register the current subscriber, if any.
    fn track(&self) {
        let Some(subscriber) = self.inner.runtime.current_subscriber() else {
            return;
        };
        let id = subscriber.id();
        let newly_added = self
            .inner
            .subscribers
            .lock()
            .insert(id, subscriber)
            .is_none();

        // A second read in the same run is already covered by the first handle.
        if newly_added {
            self.inner
                .runtime
                .track_dependency(unsubscribe_handle(&self.inner, id));
        }
    }

    /// Notify all subscribers that the value has changed.
    fn notify_subscribers(&self) {
        let subscribers: SmallVec<[Arc<Subscriber>; 4]> =
            self.inner.subscribers.lock().values().cloned().collect();

        tracing::trace!(
            signal = self.inner.id,
            subscribers = subscribers.len(),
            "signal changed"
        );

        for subscriber in subscribers {
            subscriber.notify();
        }
    }
}

fn unsubscribe_handle<T>(inner: &Arc<SignalInner<T>>, id: SubscriberId) -> CancelHandle
where
    T: Send + Sync + 'static,
{
    let weak: Weak<SignalInner<T>> = Arc::downgrade(inner);
    CancelHandle::new(move || {
        if let Some(inner) = weak.upgrade() {
            // Dropped after the lock is released; it may own other nodes.
            let removed = inner.subscribers.lock().shift_remove(&id);
            drop(removed);
        }
    })
}

impl<T> Clone for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Read-only view
// ----------------------------------------------------------------------------

/// A signal that can be read and observed but not written.
///
/// Handed to external collaborators and returned by derived pipelines.
pub struct ReadSignal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    signal: Signal<T>,
}

impl<T> ReadSignal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Get the underlying signal's ID.
    pub fn id(&self) -> u64 {
        self.signal.id()
    }

    /// Tracked read.
    pub fn get(&self) -> T {
        self.signal.get()
    }

    /// Untracked read.
    pub fn get_untracked(&self) -> T {
        self.signal.get_untracked()
    }

    /// See [`Signal::observe`].
    pub fn observe<F>(&self, observer: F) -> CancelHandle
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.signal.observe(observer)
    }

    /// See [`Signal::subscribe`].
    pub fn subscribe(&self, subscriber: Arc<Subscriber>) -> CancelHandle {
        self.signal.subscribe(subscriber)
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.signal.subscriber_count()
    }
}

impl<T> Clone for ReadSignal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<T> Debug for ReadSignal<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadSignal").field(&self.signal).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, AtomicUsize};

    #[test]
    fn signal_get_and_set() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn raw_subscriber_notified_only_on_change() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 0);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let _handle = signal.subscribe(Arc::new(Subscriber::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        })));

        signal.set(1);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        // Same value: no notification
        signal.set(1);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        signal.set(2);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cancelled_subscriber_is_removed() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 0);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let handle = signal.subscribe(Arc::new(Subscriber::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        })));
        assert_eq!(signal.subscriber_count(), 1);

        handle.cancel();
        handle.cancel();
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(2);
        assert_eq!(call_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn observe_delivers_now_and_after_flush() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let _handle = signal.observe(move |v| seen_clone.lock().push(v));
        assert_eq!(*seen.lock(), vec![1]);

        signal.set(2);
        signal.set(3);
        // Nothing is delivered inside the write.
        assert_eq!(*seen.lock(), vec![1]);

        rt.flush().unwrap();
        assert_eq!(*seen.lock(), vec![1, 3]);
    }

    #[test]
    fn observe_cancel_stops_delivery() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 0);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let handle = signal.observe(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        handle.cancel();

        signal.set(9);
        rt.flush().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn frame_paced_signal_delivers_on_frame() {
        let rt = Runtime::new();
        let signal = Signal::with_granularity(&rt, Granularity::Frame, 0);
        let last = Arc::new(AtomicI32::new(-1));
        let last_clone = last.clone();

        let _handle = signal.observe(move |v| last_clone.store(v, Ordering::SeqCst));
        signal.set(7);

        rt.flush().unwrap();
        assert_eq!(last.load(Ordering::SeqCst), 0);

        rt.advance_frame().unwrap();
        assert_eq!(last.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn tracked_read_registers_once_per_run() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 0);
        let subscriber = Arc::new(Subscriber::new(|| {}));

        let (_, deps) = rt.with_tracking(subscriber, || signal.get() + signal.get());
        assert_eq!(deps.len(), 1);
        assert_eq!(signal.subscriber_count(), 1);

        CancelHandle::compose(deps).cancel();
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn untracked_read_registers_nothing() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 0);
        let subscriber = Arc::new(Subscriber::new(|| {}));

        let (_, deps) = rt.with_tracking(subscriber, || signal.get_untracked());
        assert!(deps.is_empty());
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn signal_clone_shares_state() {
        let rt = Runtime::new();
        let signal1 = Signal::new(&rt, 0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);

        signal2.set(100);
        assert_eq!(signal1.get(), 100);
    }

    #[test]
    fn read_only_view_follows_writes() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, "a".to_string());
        let view = signal.read_only();

        signal.set("b".to_string());
        assert_eq!(view.get(), "b");
        assert_eq!(view.id(), signal.id());
    }

    #[test]
    fn signal_ids_are_unique() {
        let rt = Runtime::new();
        let s1 = Signal::new(&rt, 0);
        let s2 = Signal::new(&rt, 0);
        let s3 = Signal::new(&rt, 0);

        assert_ne!(s1.id(), s2.id());
        assert_ne!(s2.id(), s3.id());
        assert_ne!(s1.id(), s3.id());
    }
}
