//! Ripple Core
//!
//! This crate provides the core runtime for the Ripple fine-grained reactive
//! state engine. It implements:
//!
//! - Reactive primitives (signals, computed values, effects)
//! - A deferred, coalescing scheduler driven by an explicit event loop
//! - Cancellation handles for every subscription
//! - Transducer pipelines and reductions over observable values
//! - A reducer-driven store with asynchronous follow-up effects
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `scheduler`: Task queues and per-consumer throttles
//! - `transduce`: Stepping functions, transducers and reductions
//! - `store`: Message-driven state container
//! - `config`: Runtime and store configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use ripple_core::reactive::{Computed, Effect, Runtime, Signal};
//!
//! let rt = Runtime::new();
//!
//! // Create a signal
//! let count = Signal::new(&rt, 0);
//!
//! // Create a derived value
//! let doubled = Computed::new(&rt, {
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! // Create an effect
//! let _log = Effect::new(&rt, {
//!     let (count, doubled) = (count.clone(), doubled.clone());
//!     move || println!("Count: {}, Doubled: {}", count.get(), doubled.get())
//! });
//!
//! // Update the signal; dependants run on the next flush
//! count.set(5);
//! rt.flush().unwrap();
//! assert_eq!(doubled.get(), 10);
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod scheduler;
pub mod store;
pub mod transduce;

pub use config::{RuntimeConfig, StoreOptions};
pub use error::{BoxError, ReactiveError, Result};
