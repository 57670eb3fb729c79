// src/error.rs

use core::fmt;
use thiserror::Error;

/// Result type used by the blocking operations of queues, channels and `select`.
pub type Result<T> = std::result::Result<T, QueueError>;

/// Failure outcomes of queue and channel operations.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy, Hash)]
pub enum QueueError {
  /// The operation was attempted on (or interrupted by) a closed queue.
  #[error("queue closed")]
  Closed,
  /// The deadline elapsed before the operation could complete.
  #[error("operation timed out")]
  Timeout,
  /// A take was attempted on a queue that is closed and has no buffered values left.
  #[error("queue closed and drained")]
  EmptyClosed,
}

impl QueueError {
  /// Returns `true` for the failures that mean the queue will never yield or
  /// accept another value.
  ///
  /// Background loops treat these as normal termination.
  #[inline]
  pub fn is_closed(&self) -> bool {
    matches!(self, QueueError::Closed | QueueError::EmptyClosed)
  }
}

/// Error returned by `try_put` / `try_send` when the value could not be
/// enqueued immediately. The rejected value is handed back.
#[derive(Error, PartialEq, Eq, Clone)]
pub enum TryPutError<T> {
  /// The buffer is at capacity and no taker is waiting.
  #[error("queue full")]
  Full(T),
  /// The queue has been closed.
  #[error("queue closed")]
  Closed(T),
}

impl<T> TryPutError<T> {
  /// Consumes the error, returning the value that could not be enqueued.
  #[inline]
  pub fn into_inner(self) -> T {
    match self {
      TryPutError::Full(v) | TryPutError::Closed(v) => v,
    }
  }

  /// Returns `true` if the failure was caused by a full buffer.
  #[inline]
  pub fn is_full(&self) -> bool {
    matches!(self, TryPutError::Full(_))
  }
}

impl<T> fmt::Debug for TryPutError<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TryPutError::Full(_) => write!(f, "TryPutError::Full(..)"),
      TryPutError::Closed(_) => write!(f, "TryPutError::Closed(..)"),
    }
  }
}
