//! Cancellation
//!
//! Every observe or subscribe call hands back a [`CancelHandle`]. Handles are
//! idempotent: the underlying operation runs at most once, no matter how many
//! clones of the handle are invoked or how often.
//!
//! Values that come with a subscription attached are wrapped in
//! [`Cancellable`], which keeps the value and its handle together.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

type CancelFn = Box<dyn FnOnce() + Send>;

/// A shared, idempotent "stop observing" operation.
#[derive(Clone)]
pub struct CancelHandle {
    op: Arc<Mutex<Option<CancelFn>>>,
}

impl CancelHandle {
    /// Wrap a cancel operation.
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            op: Arc::new(Mutex::new(Some(Box::new(cancel)))),
        }
    }

    /// A handle that does nothing.
    pub fn noop() -> Self {
        Self {
            op: Arc::new(Mutex::new(None)),
        }
    }

    /// Combine several handles into one.
    ///
    /// The composed handle cancels each constituent exactly once; the set is
    /// drained on the first call, so later calls are no-ops.
    pub fn compose<I>(handles: I) -> Self
    where
        I: IntoIterator<Item = CancelHandle>,
    {
        let handles: Vec<CancelHandle> = handles.into_iter().collect();
        Self::new(move || {
            for handle in handles {
                handle.cancel();
            }
        })
    }

    /// Run the cancel operation if it has not run yet.
    pub fn cancel(&self) {
        // Released before running so the operation may touch this handle.
        let op = self.op.lock().take();
        if let Some(op) = op {
            op();
        }
    }

    /// Whether the operation has already run (or there never was one).
    pub fn is_cancelled(&self) -> bool {
        self.op.lock().is_none()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// A value paired with the cancel handle of the subscription that feeds it.
#[derive(Debug, Clone)]
pub struct Cancellable<T> {
    value: T,
    handle: CancelHandle,
}

impl<T> Cancellable<T> {
    /// Pair a value with an existing handle.
    pub fn new(value: T, handle: CancelHandle) -> Self {
        Self { value, handle }
    }

    /// Cancel whatever keeps this value updated. The value stays readable.
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// A clone of the attached handle.
    pub fn handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    /// Borrow the value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Split into the value and its handle.
    pub fn into_parts(self) -> (T, CancelHandle) {
        (self.value, self.handle)
    }
}

impl<T> Deref for Cancellable<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// Associate a cancel operation with `owner`.
pub fn attach_cancel<T, F>(owner: T, cancel: F) -> Cancellable<T>
where
    F: FnOnce() + Send + 'static,
{
    Cancellable::new(owner, CancelHandle::new(cancel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handle(count: &Arc<AtomicUsize>) -> CancelHandle {
        let count = count.clone();
        CancelHandle::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn cancel_is_idempotent() {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = counting_handle(&count);

        assert!(!handle.is_cancelled());
        handle.cancel();
        handle.cancel();
        handle.clone().cancel();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(handle.is_cancelled());
    }

    #[test]
    fn compose_releases_each_once() {
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let first = counting_handle(&a);
        let composed = CancelHandle::compose([first.clone(), counting_handle(&b)]);

        // Cancelling a constituent early does not double-release it later.
        first.cancel();
        composed.cancel();
        composed.cancel();

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn noop_handle_is_already_cancelled() {
        let handle = CancelHandle::noop();
        assert!(handle.is_cancelled());
        handle.cancel();
    }

    #[test]
    fn attach_cancel_keeps_value_readable() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let owned = attach_cancel(vec![1, 2, 3], move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(owned.len(), 3);
        owned.cancel();
        owned.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(owned.value(), &vec![1, 2, 3]);

        let (value, handle) = owned.into_parts();
        assert_eq!(value, vec![1, 2, 3]);
        assert!(handle.is_cancelled());
    }
}
