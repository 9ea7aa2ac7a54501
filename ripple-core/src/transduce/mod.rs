//! Transducers and Reductions
//!
//! Pipelines over reactive values built from stepping functions rather than
//! from computed values. A stepping function folds one value into an
//! accumulated state; a [`Transducer`] rewrites a stepping function, so
//! `map`, `filter` and `take_while` stages compose into a single function
//! that handles each value in one pass.
//!
//! [`reduce_over`] drives a stepping function from any [`Observable`] and
//! exposes the state as a read-only signal. A stage may end the reduction by
//! returning [`Step::Reduced`]; the source is then unsubscribed and the state
//! is frozen.
//!
//! # Example
//!
//! ```rust
//! use ripple_core::reactive::{Runtime, Signal};
//! use ripple_core::transduce::{reduce_over, step_fn, Step, Transducer};
//!
//! let rt = Runtime::new();
//! let readings = Signal::new(&rt, 1);
//!
//! let sum = step_fn(|acc: i32, v: i32| Step::Continue(acc + v));
//! let pipeline = Transducer::map_step(|v: i32| v * 2)
//!     .then(Transducer::take_while_step(|v: &i32| *v < 100));
//! let total = reduce_over(&rt, pipeline.apply(sum), &readings, 0);
//!
//! readings.set(5);
//! rt.flush().unwrap();
//! assert_eq!(total.get(), 12);
//! ```
//!
//! [`Observable`]: crate::reactive::Observable

mod reduce;
mod step;

pub use reduce::{derive_map, reduce_over, sample_on};
pub use step::{last_value, step_fn, Step, StepFn, Transducer};
