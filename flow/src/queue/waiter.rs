// src/queue/waiter.rs

//! Waiter records for blocked `put` and `take` calls.
//!
//! A waiter has two halves. The queue owns the record (`PendingPut` /
//! `PendingTake`) in one of its wait lists and completes it under the queue
//! lock. The suspended caller owns the matching registration
//! (`PutRegistration` / `TakeRegistration`), which awaits the completion
//! signal, applies the optional deadline, and unlinks the record if the caller
//! gives up (timeout or the future being dropped).
//!
//! A record is resolved exactly once: fulfilled, removed by its own
//! registration, or rejected by `close()` (dropping the record drops its
//! signal sender, which the registration observes as a rejection).

use super::core::QueueShared;
use crate::error::{QueueError, Result};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::trace;

pub(crate) type WaiterId = u64;

/// A blocked producer. Holds the value until space frees or a taker arrives.
#[derive(Debug)]
pub(crate) struct PendingPut<T> {
  pub(crate) id: WaiterId,
  pub(crate) value: T,
  signal: oneshot::Sender<()>,
}

impl<T> PendingPut<T> {
  pub(crate) fn new(id: WaiterId, value: T, signal: oneshot::Sender<()>) -> Self {
    Self { id, value, signal }
  }

  /// Releases the blocked producer and hands its value to the caller, which
  /// either buffers it or gives it to a taker.
  pub(crate) fn admit(self) -> T {
    // The registration may already be gone; the value is still delivered.
    let _ = self.signal.send(());
    self.value
  }
}

/// A blocked consumer waiting to be handed a value.
#[derive(Debug)]
pub(crate) struct PendingTake<T> {
  pub(crate) id: WaiterId,
  signal: oneshot::Sender<T>,
}

impl<T> PendingTake<T> {
  pub(crate) fn new(id: WaiterId, signal: oneshot::Sender<T>) -> Self {
    Self { id, signal }
  }

  /// Hands `value` to the blocked consumer. Returns the value back if the
  /// consumer is no longer listening.
  pub(crate) fn fulfill(self, value: T) -> std::result::Result<(), T> {
    self.signal.send(value)
  }

  pub(crate) fn is_abandoned(&self) -> bool {
    self.signal.is_closed()
  }
}

/// Caller side of a blocked `put`.
pub(crate) struct PutRegistration<T> {
  shared: Arc<QueueShared<T>>,
  id: WaiterId,
  signal: oneshot::Receiver<()>,
  settled: bool,
}

impl<T> PutRegistration<T> {
  pub(crate) fn new(shared: Arc<QueueShared<T>>, id: WaiterId, signal: oneshot::Receiver<()>) -> Self {
    Self {
      shared,
      id,
      signal,
      settled: false,
    }
  }

  pub(crate) async fn wait(mut self, timeout: Option<Duration>) -> Result<()> {
    let received = match timeout {
      None => (&mut self.signal).await,
      Some(limit) => match tokio::time::timeout(limit, &mut self.signal).await {
        Ok(received) => received,
        Err(_elapsed) => return self.expire(),
      },
    };
    self.settled = true;
    received.map_err(|_| QueueError::Closed)
  }

  /// Settles a registration whose deadline has passed.
  ///
  /// A record still linked is removed and the put times out. A record the
  /// queue already resolved keeps that outcome: admitted wins over the deadline.
  pub(crate) fn expire(&mut self) -> Result<()> {
    let mut state = self.shared.state.lock();
    self.settled = true;
    if state.remove_putter(self.id).is_some() {
      trace!(waiter = self.id, "put timed out");
      return Err(QueueError::Timeout);
    }
    self.signal.try_recv().map_err(|_| QueueError::Closed)
  }
}

impl<T> Drop for PutRegistration<T> {
  fn drop(&mut self) {
    if self.settled {
      return;
    }
    // Abandoned mid-wait. The value is discarded along with the record.
    self.shared.state.lock().remove_putter(self.id);
  }
}

/// Caller side of a blocked `take`.
pub(crate) struct TakeRegistration<T> {
  shared: Arc<QueueShared<T>>,
  id: WaiterId,
  signal: oneshot::Receiver<T>,
  settled: bool,
}

impl<T> TakeRegistration<T> {
  pub(crate) fn new(shared: Arc<QueueShared<T>>, id: WaiterId, signal: oneshot::Receiver<T>) -> Self {
    Self {
      shared,
      id,
      signal,
      settled: false,
    }
  }

  pub(crate) async fn wait(mut self, timeout: Option<Duration>) -> Result<T> {
    let received = match timeout {
      None => (&mut self.signal).await,
      Some(limit) => match tokio::time::timeout(limit, &mut self.signal).await {
        Ok(received) => received,
        Err(_elapsed) => return self.expire(),
      },
    };
    self.settled = true;
    received.map_err(|_| QueueError::EmptyClosed)
  }

  /// Settles a registration whose deadline has passed. A value handed off
  /// before the lock was taken wins over the deadline.
  pub(crate) fn expire(&mut self) -> Result<T> {
    let mut state = self.shared.state.lock();
    self.settled = true;
    if state.remove_taker(self.id) {
      trace!(waiter = self.id, "take timed out");
      return Err(QueueError::Timeout);
    }
    self.signal.try_recv().map_err(|_| QueueError::EmptyClosed)
  }
}

impl<T> Drop for TakeRegistration<T> {
  fn drop(&mut self) {
    if self.settled {
      return;
    }
    let mut state = self.shared.state.lock();
    if state.remove_taker(self.id) {
      return;
    }
    // Fulfilled but never observed (e.g. the losing side of a `select` race).
    // Put the value back at the head so it is not lost.
    if let Ok(value) = self.signal.try_recv() {
      trace!(waiter = self.id, "restoring value from abandoned take");
      state.restore_front(value, self.shared.capacity);
    }
  }
}
