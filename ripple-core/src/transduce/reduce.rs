//! Reductions over observable sources.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use super::step::{last_value, Step, StepFn, Transducer};
use crate::reactive::{
    CancelHandle, Cancellable, Observable, ReadSignal, Runtime, Signal, Subscriber, Trigger,
};
use crate::scheduler::Throttle;

/// Fold every value `source` emits into a derived signal.
///
/// The current value of `source` is stepped immediately, then each later
/// delivery. When `step` returns [`Step::Reduced`], the subscription is
/// cancelled and the carried state is final; deliveries already queued at
/// that point are discarded.
///
/// The returned handle stops the reduction early.
pub fn reduce_over<S, V, O>(
    runtime: &Runtime,
    step: StepFn<S, V>,
    source: &O,
    initial: S,
) -> Cancellable<ReadSignal<S>>
where
    S: Clone + PartialEq + Send + Sync + 'static,
    V: 'static,
    O: Observable<V>,
{
    let state = Signal::new(runtime, initial);
    let done = Arc::new(AtomicBool::new(false));
    let subscription: Arc<OnceLock<CancelHandle>> = Arc::new(OnceLock::new());

    let handle = source.observe({
        let state = state.clone();
        let done = done.clone();
        let subscription = subscription.clone();
        move |value| {
            if done.load(Ordering::SeqCst) {
                return;
            }
            match step(state.get_untracked(), value) {
                Step::Continue(next) => state.set(next),
                Step::Reduced(last) => {
                    done.store(true, Ordering::SeqCst);
                    state.set(last);
                    tracing::trace!(signal = state.id(), "reduction terminated");
                    // Unset while `observe` is still delivering the first value.
                    if let Some(handle) = subscription.get() {
                        handle.cancel();
                    }
                }
            }
        }
    });

    let _ = subscription.set(handle.clone());
    if done.load(Ordering::SeqCst) {
        handle.cancel();
    }

    let stop = CancelHandle::new(move || {
        done.store(true, Ordering::SeqCst);
        handle.cancel();
    });
    Cancellable::new(state.read_only(), stop)
}

/// A signal tracking `transform` of `source`'s latest value.
///
/// `transform` runs once per delivered value, starting with the current one.
pub fn derive_map<V, B, O, F>(
    runtime: &Runtime,
    source: &O,
    transform: F,
) -> Cancellable<ReadSignal<B>>
where
    V: 'static,
    B: Clone + PartialEq + Send + Sync + 'static,
    O: Observable<V>,
    F: Fn(V) -> B + Send + Sync + 'static,
{
    let initial = transform(source.get_untracked());
    // The first delivery is the value `initial` was built from.
    let seeded = AtomicBool::new(false);
    let step = Transducer::filter_step(move |_: &V| seeded.swap(true, Ordering::SeqCst))
        .then(Transducer::map_step(transform))
        .apply(last_value());
    reduce_over(runtime, step, source, initial)
}

/// Re-run `resample` whenever any of `triggers` changes.
///
/// All triggers share one throttle, so several of them changing in the same
/// tick cause one resample. `resample` runs untracked; only the listed
/// triggers drive it.
pub fn sample_on<T, F>(
    runtime: &Runtime,
    triggers: &[&dyn Trigger],
    resample: F,
) -> Cancellable<ReadSignal<T>>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    let resample = Arc::new(resample);
    let state = Signal::new(runtime, runtime.untracked(|| resample()));
    let throttle = Throttle::new(runtime, runtime.default_granularity());

    let subscriber = Arc::new(Subscriber::new({
        let state = state.clone();
        move || {
            let state = state.clone();
            let resample = resample.clone();
            throttle.schedule(move || {
                let value = state.runtime().untracked(|| resample());
                state.set(value);
                Ok(())
            });
        }
    }));

    let handle = CancelHandle::compose(
        triggers
            .iter()
            .map(|trigger| trigger.subscribe(subscriber.clone())),
    );
    Cancellable::new(state.read_only(), handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transduce::step_fn;
    use std::sync::atomic::AtomicUsize;

    fn sum() -> StepFn<i32, i32> {
        step_fn(|acc: i32, v: i32| Step::Continue(acc + v))
    }

    #[test]
    fn reduce_over_folds_current_and_later_values() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 1);
        let total = reduce_over(&rt, sum(), &source, 0);
        assert_eq!(total.get(), 1);

        source.set(2);
        rt.flush().unwrap();
        source.set(3);
        rt.flush().unwrap();
        assert_eq!(total.get(), 6);
    }

    #[test]
    fn writes_in_one_tick_deliver_once() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 0);
        let total = reduce_over(&rt, sum(), &source, 0);

        source.set(5);
        source.set(7);
        rt.flush().unwrap();
        assert_eq!(total.get(), 7);
    }

    #[test]
    fn reduced_state_is_final() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 1);
        let step = Transducer::take_while_step(|v: &i32| *v < 3).apply(sum());
        let total = reduce_over(&rt, step, &source, 0);

        source.set(2);
        rt.flush().unwrap();
        assert_eq!(total.get(), 3);

        source.set(10);
        rt.flush().unwrap();
        assert_eq!(total.get(), 3);
        assert_eq!(source.subscriber_count(), 0);

        source.set(1);
        rt.flush().unwrap();
        assert_eq!(total.get(), 3);
    }

    #[test]
    fn reduced_on_first_value_never_subscribes() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 9);
        let step = step_fn(|_: i32, v: i32| Step::reduced(v));
        let last = reduce_over(&rt, step, &source, 0);

        assert_eq!(last.get(), 9);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn cancel_stops_the_reduction() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 1);
        let total = reduce_over(&rt, sum(), &source, 0);

        source.set(2);
        total.cancel();
        // The delivery queued before cancelling is discarded.
        rt.flush().unwrap();
        assert_eq!(total.get(), 1);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn derive_map_follows_source() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 3);
        let label = derive_map(&rt, &source, |v: i32| format!("#{v}"));
        assert_eq!(label.get(), "#3");

        source.set(4);
        rt.flush().unwrap();
        assert_eq!(label.get(), "#4");
    }

    #[test]
    fn derive_map_transforms_each_value_once() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 1);
        let calls = Arc::new(AtomicUsize::new(0));
        let doubled = derive_map(&rt, &source, {
            let calls = calls.clone();
            move |v: i32| {
                calls.fetch_add(1, Ordering::SeqCst);
                v * 2
            }
        });
        assert_eq!(doubled.get(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        source.set(5);
        rt.flush().unwrap();
        assert_eq!(doubled.get(), 10);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn sample_on_resamples_once_per_tick() {
        let rt = Runtime::new();
        let x = Signal::new(&rt, 1);
        let y = Signal::new(&rt, 2);
        let calls = Arc::new(AtomicUsize::new(0));

        let sum = sample_on(&rt, &[&x, &y], {
            let (x, y) = (x.clone(), y.clone());
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                x.get() + y.get()
            }
        });
        assert_eq!(sum.get(), 3);

        x.set(10);
        y.set(20);
        rt.flush().unwrap();

        assert_eq!(sum.get(), 30);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn sample_on_cancel_releases_every_trigger() {
        let rt = Runtime::new();
        let x = Signal::new(&rt, 1);
        let y = Signal::new(&rt, 2);
        let sampled = sample_on(&rt, &[&x, &y], || 0);
        assert_eq!(x.subscriber_count(), 1);
        assert_eq!(y.subscriber_count(), 1);

        sampled.cancel();
        assert_eq!(x.subscriber_count(), 0);
        assert_eq!(y.subscriber_count(), 0);
    }
}
