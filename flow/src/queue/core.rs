// src/queue/core.rs

//! The shared state and transition logic of a `BlockingQueue`.
//!
//! ### Design Principles:
//!
//! 1.  **Central Mutex**: A `parking_lot::Mutex` guards the buffer, both wait
//!     lists and the closed flag. It is never held across an `.await`; waiters
//!     are completed while it is held, so "remove my record" and "fulfil that
//!     record" can never both succeed.
//! 2.  **Explicit Wait Lists**: Blocked producers and consumers are kept as
//!     ordered records (`PendingPut` / `PendingTake`). Front of each list is
//!     the earliest registration and is always served first.
//! 3.  **Hand-off Before Buffering**: A value offered while a consumer is
//!     waiting goes straight to that consumer and never touches the buffer.
//! 4.  **Settle After Every Removal**: Any operation that frees buffer space
//!     calls `settle`, which admits blocked producers into the freed slots and
//!     rejects leftover consumers once the queue is closed and drained.

use super::waiter::{PendingPut, PendingTake, WaiterId};
use crate::error::TryPutError;

use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::oneshot;
use tracing::trace;

/// Capacity value used to represent an unbounded queue.
pub(crate) const UNBOUNDED: usize = usize::MAX;

/// The mutable state of a queue, protected by `QueueShared::state`.
#[derive(Debug)]
pub(crate) struct QueueState<T> {
  /// Buffered values; front is the next to be taken.
  pub(crate) buffer: VecDeque<T>,
  /// Producers blocked on a full buffer, in registration order.
  pub(crate) putters: VecDeque<PendingPut<T>>,
  /// Consumers blocked on an empty buffer, in registration order.
  pub(crate) takers: VecDeque<PendingTake<T>>,
  /// Monotonic: once set it is never cleared.
  pub(crate) closed: bool,
  next_waiter_id: WaiterId,
}

/// The shared owner of a queue's state, wrapped in an `Arc` by every handle.
#[derive(Debug)]
pub(crate) struct QueueShared<T> {
  pub(crate) state: Mutex<QueueState<T>>,
  pub(crate) capacity: usize,
}

impl<T> QueueShared<T> {
  /// `UNBOUNDED` signifies an unbounded queue.
  pub(crate) fn new(capacity: usize) -> Self {
    QueueShared {
      state: Mutex::new(QueueState {
        buffer: VecDeque::with_capacity(if capacity == UNBOUNDED { 32 } else { capacity.min(1024) }),
        putters: VecDeque::new(),
        takers: VecDeque::new(),
        closed: false,
        next_waiter_id: 0,
      }),
      capacity,
    }
  }
}

impl<T> QueueState<T> {
  /// Tries to place `value` without blocking: direct hand-off to the
  /// earliest waiting consumer first, then the buffer if it has room.
  pub(crate) fn offer(&mut self, value: T, capacity: usize) -> Result<(), TryPutError<T>> {
    if self.closed {
      return Err(TryPutError::Closed(value));
    }

    let mut value = value;
    while let Some(taker) = self.takers.pop_front() {
      let id = taker.id;
      match taker.fulfill(value) {
        Ok(()) => {
          trace!(waiter = id, "handed value directly to waiting taker");
          return Ok(());
        }
        // That consumer walked away without deregistering; try the next one.
        Err(returned) => value = returned,
      }
    }

    if self.buffer.len() < capacity {
      self.buffer.push_back(value);
      return Ok(());
    }

    Err(TryPutError::Full(value))
  }

  /// Tries to obtain the next value without blocking.
  ///
  /// Buffered values come first. A waiting producer is only consulted
  /// directly when the buffer is empty, which can only happen for a
  /// zero-capacity (rendezvous) queue.
  pub(crate) fn poll_take(&mut self, capacity: usize) -> Option<T> {
    if let Some(value) = self.buffer.pop_front() {
      self.settle(capacity);
      return Some(value);
    }
    if let Some(putter) = self.putters.pop_front() {
      return Some(putter.admit());
    }
    None
  }

  /// Restores the internal invariants after buffer space has been freed or
  /// a value has been pushed back to the front.
  pub(crate) fn settle(&mut self, capacity: usize) {
    loop {
      while self.buffer.len() < capacity {
        match self.putters.pop_front() {
          Some(putter) => {
            let value = putter.admit();
            self.buffer.push_back(value);
          }
          None => break,
        }
      }

      let mut served = false;
      while !self.buffer.is_empty() {
        let Some(taker) = self.takers.pop_front() else { break };
        if taker.is_abandoned() {
          continue;
        }
        if let Some(value) = self.buffer.pop_front() {
          if let Err(value) = taker.fulfill(value) {
            self.buffer.push_front(value);
          } else {
            served = true;
          }
        }
      }

      if !served {
        break;
      }
    }

    if self.closed && self.buffer.is_empty() && !self.takers.is_empty() {
      // Dropping the records rejects their registrations.
      self.takers.clear();
    }
  }

  /// Puts `value` back at the head of the queue: to the earliest waiting
  /// consumer if there is one, otherwise the front of the buffer. May
  /// momentarily exceed capacity.
  pub(crate) fn restore_front(&mut self, value: T, capacity: usize) {
    let mut value = value;
    while let Some(taker) = self.takers.pop_front() {
      match taker.fulfill(value) {
        Ok(()) => return,
        Err(returned) => value = returned,
      }
    }
    self.buffer.push_front(value);
    self.settle(capacity);
  }

  pub(crate) fn register_put(&mut self, value: T) -> (WaiterId, oneshot::Receiver<()>) {
    let id = self.next_id();
    let (tx, rx) = oneshot::channel();
    self.putters.push_back(PendingPut::new(id, value, tx));
    trace!(waiter = id, pending = self.putters.len(), "put waiting for space");
    (id, rx)
  }

  pub(crate) fn register_take(&mut self) -> (WaiterId, oneshot::Receiver<T>) {
    let id = self.next_id();
    let (tx, rx) = oneshot::channel();
    self.takers.push_back(PendingTake::new(id, tx));
    trace!(waiter = id, pending = self.takers.len(), "take waiting for value");
    (id, rx)
  }

  /// Unlinks a blocked producer. `None` if it was already admitted or rejected.
  pub(crate) fn remove_putter(&mut self, id: WaiterId) -> Option<PendingPut<T>> {
    let index = self.putters.iter().position(|p| p.id == id)?;
    self.putters.remove(index)
  }

  /// Unlinks a blocked consumer. `false` if it was already fulfilled or rejected.
  pub(crate) fn remove_taker(&mut self, id: WaiterId) -> bool {
    match self.takers.iter().position(|t| t.id == id) {
      Some(index) => self.takers.remove(index).is_some(),
      None => false,
    }
  }

  /// Marks the queue closed and rejects waiters. Blocked producers are always
  /// rejected; blocked consumers only if nothing is left to give them.
  ///
  /// Returns the number of rejected producers and consumers.
  pub(crate) fn close(&mut self) -> (usize, usize) {
    self.closed = true;
    let rejected_puts = self.putters.len();
    self.putters.clear();
    let rejected_takes = if self.buffer.is_empty() {
      let n = self.takers.len();
      self.takers.clear();
      n
    } else {
      0
    };
    (rejected_puts, rejected_takes)
  }

  fn next_id(&mut self) -> WaiterId {
    let id = self.next_waiter_id;
    self.next_waiter_id = self.next_waiter_id.wrapping_add(1);
    id
  }
}
