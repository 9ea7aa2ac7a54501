//! Stepping functions and their transformers.

use std::fmt;
use std::sync::Arc;

/// Result of one reduction step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<S> {
    /// Keep reducing with this state.
    Continue(S),

    /// Stop: this is the final state.
    Reduced(S),
}

impl<S> Step<S> {
    /// Wrap a final state.
    pub fn reduced(state: S) -> Self {
        Step::Reduced(state)
    }

    pub fn is_reduced(&self) -> bool {
        matches!(self, Step::Reduced(_))
    }

    /// The carried state, whether or not reduction stops here.
    pub fn into_inner(self) -> S {
        match self {
            Step::Continue(state) | Step::Reduced(state) => state,
        }
    }
}

/// A shared stepping function: `(state, value) -> Step<state>`.
pub type StepFn<S, V> = Arc<dyn Fn(S, V) -> Step<S> + Send + Sync>;

/// Build a [`StepFn`] from a closure.
pub fn step_fn<S, V, F>(f: F) -> StepFn<S, V>
where
    F: Fn(S, V) -> Step<S> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Stepping function that keeps only the latest value.
pub fn last_value<V>() -> StepFn<V, V>
where
    V: 'static,
{
    Arc::new(|_: V, value: V| Step::Continue(value))
}

type Wrap<S, A, B> = Arc<dyn Fn(StepFn<S, B>) -> StepFn<S, A> + Send + Sync>;

/// Turns a stepping function over `B` into one over `A`.
///
/// Transducers compose with [`then`](Transducer::then); the composed
/// pipeline runs every stage per value in a single pass, with no intermediate
/// collections.
pub struct Transducer<S, A, B> {
    wrap: Wrap<S, A, B>,
}

impl<S, A, B> Transducer<S, A, B>
where
    S: 'static,
    A: 'static,
    B: 'static,
{
    fn from_wrap<F>(wrap: F) -> Self
    where
        F: Fn(StepFn<S, B>) -> StepFn<S, A> + Send + Sync + 'static,
    {
        Self {
            wrap: Arc::new(wrap),
        }
    }

    /// Transform each value before it reaches the stepping function.
    pub fn map_step<F>(transform: F) -> Self
    where
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        let transform = Arc::new(transform);
        Self::from_wrap(move |rf: StepFn<S, B>| {
            let transform = transform.clone();
            Arc::new(move |acc: S, value: A| rf(acc, transform(value)))
        })
    }

    /// Chain another stage after this one.
    pub fn then<C>(self, next: Transducer<S, B, C>) -> Transducer<S, A, C>
    where
        C: 'static,
    {
        Transducer::from_wrap(move |rf: StepFn<S, C>| self.apply(next.apply(rf)))
    }

    /// Wrap `rf` with this pipeline.
    pub fn apply(&self, rf: StepFn<S, B>) -> StepFn<S, A> {
        (self.wrap)(rf)
    }
}

impl<S, A> Transducer<S, A, A>
where
    S: 'static,
    A: 'static,
{
    /// The pass-through transducer.
    pub fn identity() -> Self {
        Self::from_wrap(|rf| rf)
    }

    /// Drop values failing `predicate`; the state is left unchanged.
    pub fn filter_step<P>(predicate: P) -> Self
    where
        P: Fn(&A) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        Self::from_wrap(move |rf: StepFn<S, A>| {
            let predicate = predicate.clone();
            Arc::new(move |acc: S, value: A| {
                if predicate(&value) {
                    rf(acc, value)
                } else {
                    Step::Continue(acc)
                }
            })
        })
    }

    /// Stop the reduction at the first value failing `predicate`.
    ///
    /// The state reached before that value is final.
    pub fn take_while_step<P>(predicate: P) -> Self
    where
        P: Fn(&A) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        Self::from_wrap(move |rf: StepFn<S, A>| {
            let predicate = predicate.clone();
            Arc::new(move |acc: S, value: A| {
                if predicate(&value) {
                    rf(acc, value)
                } else {
                    Step::Reduced(acc)
                }
            })
        })
    }
}

impl<S, A, B> Clone for Transducer<S, A, B> {
    fn clone(&self) -> Self {
        Self {
            wrap: Arc::clone(&self.wrap),
        }
    }
}

impl<S, A, B> fmt::Debug for Transducer<S, A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transducer").finish_non_exhaustive()
    }
}
