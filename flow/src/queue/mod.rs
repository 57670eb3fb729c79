// src/queue/mod.rs

//! A backpressure-aware FIFO queue with async `put`/`take`.
//!
//! `BlockingQueue` is the primitive every other piece of this crate is built
//! on. It can be bounded (producers wait while the buffer is full) or
//! unbounded, and it supports per-call deadlines, non-blocking variants,
//! closing and draining.
//!
//! ### Ordering
//!
//! - Values reach consumers in the order `put` was called, whether they pass
//!   through the buffer or are handed directly to a waiting consumer.
//! - Among waiting consumers, the earliest to call `take` is served first.
//! - Among waiting producers, the earliest to call `put` is admitted first.
//!
//! ### Closing
//!
//! After `close()` every `put` fails with [`QueueError::Closed`] (including
//! producers that were already waiting). Consumers keep draining buffered
//! values and get [`QueueError::EmptyClosed`] once nothing is left.
//!
//! ### Cancellation
//!
//! A pending `put` or `take` future may be dropped at any time (for instance
//! by a losing `select` branch). Its waiter record is unlinked on drop. If a
//! dropped `take` had already been handed a value, that value is returned to
//! the head of the queue instead of being lost.

mod core;
mod waiter;

use self::core::{QueueShared, UNBOUNDED};
use self::waiter::{PutRegistration, TakeRegistration};
use crate::error::{QueueError, Result, TryPutError};

use futures_core::Stream;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A bounded or unbounded async FIFO queue.
///
/// Cloning a `BlockingQueue` produces another handle to the same queue.
pub struct BlockingQueue<T> {
  shared: Arc<QueueShared<T>>,
}

impl<T> Clone for BlockingQueue<T> {
  fn clone(&self) -> Self {
    BlockingQueue {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T> fmt::Debug for BlockingQueue<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.shared.state.lock();
    f.debug_struct("BlockingQueue")
      .field("len", &state.buffer.len())
      .field("capacity", &self.capacity())
      .field("pending_puts", &state.putters.len())
      .field("pending_takes", &state.takers.len())
      .field("closed", &state.closed)
      .finish()
  }
}

impl<T> BlockingQueue<T> {
  /// Creates a queue holding at most `capacity` buffered values.
  ///
  /// A capacity of `0` creates a rendezvous queue: a `put` only completes
  /// once a `take` receives the value.
  pub fn bounded(capacity: usize) -> Self {
    BlockingQueue {
      shared: Arc::new(QueueShared::new(capacity)),
    }
  }

  /// Creates a queue whose buffer grows without limit. `put` never waits.
  pub fn unbounded() -> Self {
    Self::bounded(UNBOUNDED)
  }

  /// Inserts `value`, waiting for space if the buffer is full.
  ///
  /// # Errors
  ///
  /// - [`QueueError::Closed`] if the queue is closed before or while waiting.
  /// - [`QueueError::Timeout`] if `timeout` elapses first. The value is dropped.
  pub async fn put(&self, value: T, timeout: Option<Duration>) -> Result<()> {
    let registration = {
      let mut state = self.shared.state.lock();
      let offered = state.offer(value, self.shared.capacity);
      match offered {
        Ok(()) => return Ok(()),
        Err(TryPutError::Closed(_)) => return Err(QueueError::Closed),
        Err(TryPutError::Full(value)) => {
          let (id, signal) = state.register_put(value);
          PutRegistration::new(Arc::clone(&self.shared), id, signal)
        }
      }
    };
    registration.wait(timeout).await
  }

  /// Removes and returns the head, waiting for a value if the queue is empty.
  ///
  /// # Errors
  ///
  /// - [`QueueError::EmptyClosed`] if the queue is closed and drained.
  /// - [`QueueError::Timeout`] if `timeout` elapses first.
  pub async fn take(&self, timeout: Option<Duration>) -> Result<T> {
    let registration = {
      let mut state = self.shared.state.lock();
      if let Some(value) = state.poll_take(self.shared.capacity) {
        return Ok(value);
      }
      if state.closed {
        return Err(QueueError::EmptyClosed);
      }
      let (id, signal) = state.register_take();
      TakeRegistration::new(Arc::clone(&self.shared), id, signal)
    };
    registration.wait(timeout).await
  }

  /// Attempts to insert `value` without waiting.
  ///
  /// Fails with [`TryPutError::Full`] if the buffer is at capacity and no
  /// consumer is waiting, or [`TryPutError::Closed`] after `close()`.
  pub fn try_put(&self, value: T) -> std::result::Result<(), TryPutError<T>> {
    self.shared.state.lock().offer(value, self.shared.capacity)
  }

  /// Attempts to remove the head without waiting. Returns `None` if nothing
  /// is buffered, whether or not the queue is closed.
  pub fn try_take(&self) -> Option<T> {
    self.shared.state.lock().poll_take(self.shared.capacity)
  }

  /// Returns a copy of the head without removing it, waiting for a value if
  /// the queue is empty.
  ///
  /// When the queue is empty this performs a `take` and then pushes the value
  /// back to the front. That round trip is not atomic: another consumer may
  /// observe the queue empty in between.
  pub async fn peek(&self, timeout: Option<Duration>) -> Result<T>
  where
    T: Clone,
  {
    {
      let state = self.shared.state.lock();
      if let Some(head) = state.buffer.front() {
        return Ok(head.clone());
      }
      if let Some(putter) = state.putters.front() {
        return Ok(putter.value.clone());
      }
    }
    let value = self.take(timeout).await?;
    self
      .shared
      .state
      .lock()
      .restore_front(value.clone(), self.shared.capacity);
    Ok(value)
  }

  /// Closes the queue. Waiting producers are rejected; waiting consumers are
  /// rejected only if the buffer is already empty.
  ///
  /// Returns `true` if this call closed the queue, `false` if it was already closed.
  pub fn close(&self) -> bool {
    let mut state = self.shared.state.lock();
    if state.closed {
      return false;
    }
    let (rejected_puts, rejected_takes) = state.close();
    debug!(
      rejected_puts,
      rejected_takes,
      buffered = state.buffer.len(),
      "queue closed"
    );
    true
  }

  /// Removes every buffered value in one step, then admits as many waiting
  /// producers as the freed space allows.
  pub fn drain(&self) -> Vec<T> {
    let mut state = self.shared.state.lock();
    let drained: Vec<T> = state.buffer.drain(..).collect();
    state.settle(self.shared.capacity);
    drained
  }

  /// Number of buffered values.
  pub fn len(&self) -> usize {
    self.shared.state.lock().buffer.len()
  }

  /// `true` if nothing is buffered.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// `true` if the buffer is at capacity. Always `false` when unbounded.
  pub fn is_full(&self) -> bool {
    self.shared.capacity != UNBOUNDED && self.len() >= self.shared.capacity
  }

  /// The maximum number of buffered values. `None` for unbounded queues.
  pub fn capacity(&self) -> Option<usize> {
    if self.shared.capacity == UNBOUNDED {
      None
    } else {
      Some(self.shared.capacity)
    }
  }

  pub fn is_closed(&self) -> bool {
    self.shared.state.lock().closed
  }

  /// `true` once the queue is closed and every buffered value has been taken.
  pub fn is_drained(&self) -> bool {
    let state = self.shared.state.lock();
    state.closed && state.buffer.is_empty() && state.putters.is_empty()
  }

  /// Number of producers currently waiting for space.
  pub fn pending_puts(&self) -> usize {
    self.shared.state.lock().putters.len()
  }

  /// Number of consumers currently waiting for a value.
  pub fn pending_takes(&self) -> usize {
    self.shared.state.lock().takers.len()
  }

  /// Returns a lazy stream that repeatedly `take`s from the queue and ends,
  /// without error, once the queue is closed and drained.
  ///
  /// The stream is not restartable: values it yields are removed from the queue.
  pub fn stream(&self) -> impl Stream<Item = T> {
    futures_util::stream::unfold(self.clone(), |queue| async move {
      match queue.take(None).await {
        Ok(value) => Some((value, queue)),
        Err(_) => None,
      }
    })
  }
}
