// src/config.rs

//! Option structs for the composition operators.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default number of concurrent worker loops in a [`worker_pool`](crate::worker_pool).
pub const DEFAULT_WORKERS: usize = 4;

/// Configuration for [`worker_pool`](crate::worker_pool).
///
/// With the `serde` feature enabled this can be loaded from external
/// configuration; missing fields fall back to their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WorkerPoolOptions {
  /// Number of worker loops pulling from the jobs channel. `0` is treated as `1`.
  pub workers: usize,
  /// Buffer size of the results channel (raised to at least one).
  pub buffer_size: usize,
}

impl Default for WorkerPoolOptions {
  fn default() -> Self {
    Self {
      workers: DEFAULT_WORKERS,
      buffer_size: 0,
    }
  }
}

impl WorkerPoolOptions {
  pub fn with_workers(mut self, workers: usize) -> Self {
    self.workers = workers;
    self
  }

  pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
    self.buffer_size = buffer_size;
    self
  }

  /// The worker count actually used.
  pub(crate) fn effective_workers(&self) -> usize {
    self.workers.max(1)
  }
}
