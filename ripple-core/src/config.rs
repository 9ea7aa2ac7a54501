//! Runtime Configuration
//!
//! Tunables for the reactive runtime and the store. Both types deserialize
//! with defaults for missing fields, so a host application can embed them in
//! its own configuration file.

use serde::{Deserialize, Serialize};

use crate::scheduler::Granularity;

/// Default cap on tasks executed by a single flush.
pub const DEFAULT_MAX_TASKS_PER_FLUSH: usize = 10_000;

/// Configuration for a [`Runtime`](crate::reactive::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on tasks one `flush` may run before it gives up with
    /// [`ReactiveError::FlushLimitExceeded`](crate::ReactiveError::FlushLimitExceeded).
    pub max_tasks_per_flush: usize,

    /// Granularity used by primitives constructed without an explicit one.
    pub default_granularity: Granularity,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_flush: DEFAULT_MAX_TASKS_PER_FLUSH,
            default_granularity: Granularity::Microtask,
        }
    }
}

/// Options for a [`Store`](crate::store::Store).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Log every message and resulting state at `debug` level.
    pub debug: bool,
}
