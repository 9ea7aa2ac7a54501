//! Error Types
//!
//! Every fallible operation in the crate returns [`ReactiveError`]. Failures
//! surface at the call site that triggered them: construction of a computed
//! value, a scheduler flush, or a store dispatch.

use thiserror::Error;

/// Boxed error produced by user-supplied computations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

/// Errors raised by the reactive engine.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A tracked computation (computed value or effect) returned an error.
    ///
    /// The computation keeps its previous value; its dependencies from the
    /// failed run stay registered so a later change retries it.
    #[error("{kind} #{id} failed to evaluate: {source}")]
    Compute {
        kind: &'static str,
        id: u64,
        #[source]
        source: BoxError,
    },

    /// A single flush ran more tasks than the runtime allows.
    ///
    /// This almost always means an effect writes a signal it also reads.
    #[error("flush exceeded {limit} tasks; a computation is likely re-triggering itself")]
    FlushLimitExceeded { limit: usize },

    /// A store tried to spawn an asynchronous effect outside a tokio runtime.
    #[error("store effects require a tokio runtime, but none is running")]
    NoAsyncRuntime,
}

impl ReactiveError {
    pub(crate) fn compute(kind: &'static str, id: u64, source: BoxError) -> Self {
        Self::Compute { kind, id, source }
    }

    /// Returns true if this is a failure of a user computation.
    pub fn is_compute(&self) -> bool {
        matches!(self, Self::Compute { .. })
    }
}
