// src/channel.rs

//! A send/receive façade over a [`BlockingQueue`].
//!
//! A `Channel` is a shared handle: clone it to hand the same channel to any
//! number of senders and receivers. It adds its own closed flag (checked by
//! `send` before touching the queue), an optional name used in log output,
//! and [`Channel::case`] for use with [`select`](crate::select()).
//!
//! ### Unbuffered channels
//!
//! A requested buffer size of `0` is raised to `1`. An "unbuffered" channel
//! therefore behaves like a one-slot buffer: `send` can complete before any
//! receiver has observed the value. It does not provide strict rendezvous.

use crate::error::{QueueError, Result, TryPutError};
use crate::queue::BlockingQueue;
use crate::select::SelectCase;

use futures_core::Stream;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

struct ChannelInner<T> {
  name: Option<String>,
  queue: BlockingQueue<T>,
  closed: AtomicBool,
}

/// A cloneable, backpressure-aware channel.
pub struct Channel<T> {
  inner: Arc<ChannelInner<T>>,
}

impl<T> Clone for Channel<T> {
  fn clone(&self) -> Self {
    Channel {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<T> fmt::Debug for Channel<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Channel")
      .field("name", &self.inner.name)
      .field("queue", &self.inner.queue)
      .field("closed", &self.is_closed())
      .finish()
  }
}

impl<T> Channel<T> {
  /// Creates a channel buffering up to `max(buffer_size, 1)` values.
  pub fn new(buffer_size: usize) -> Self {
    Self::build(None, buffer_size)
  }

  /// Creates a channel with the minimum buffer of one value.
  pub fn unbuffered() -> Self {
    Self::new(0)
  }

  /// Creates a named channel. The name is attached to the channel's log events.
  pub fn with_name(name: impl Into<String>, buffer_size: usize) -> Self {
    Self::build(Some(name.into()), buffer_size)
  }

  fn build(name: Option<String>, buffer_size: usize) -> Self {
    Channel {
      inner: Arc::new(ChannelInner {
        name,
        queue: BlockingQueue::bounded(buffer_size.max(1)),
        closed: AtomicBool::new(false),
      }),
    }
  }

  pub fn name(&self) -> Option<&str> {
    self.inner.name.as_deref()
  }

  /// Sends a value, waiting while the buffer is full.
  ///
  /// # Errors
  ///
  /// Returns [`QueueError::Closed`] if the channel is closed before or while waiting.
  pub async fn send(&self, value: T) -> Result<()> {
    if self.inner.closed.load(Ordering::Acquire) {
      return Err(QueueError::Closed);
    }
    self.inner.queue.put(value, None).await
  }

  /// Like [`send`](Self::send), but gives up with [`QueueError::Timeout`]
  /// after `timeout`.
  pub async fn send_timeout(&self, value: T, timeout: Duration) -> Result<()> {
    if self.inner.closed.load(Ordering::Acquire) {
      return Err(QueueError::Closed);
    }
    self.inner.queue.put(value, Some(timeout)).await
  }

  /// Receives the next value, waiting while the channel is empty.
  ///
  /// # Errors
  ///
  /// Returns [`QueueError::EmptyClosed`] once the channel is closed and drained.
  pub async fn receive(&self) -> Result<T> {
    self.inner.queue.take(None).await
  }

  /// Like [`receive`](Self::receive), but gives up with
  /// [`QueueError::Timeout`] after `timeout`.
  pub async fn receive_timeout(&self, timeout: Duration) -> Result<T> {
    self.inner.queue.take(Some(timeout)).await
  }

  /// Sends without waiting.
  pub fn try_send(&self, value: T) -> std::result::Result<(), TryPutError<T>> {
    if self.inner.closed.load(Ordering::Acquire) {
      return Err(TryPutError::Closed(value));
    }
    self.inner.queue.try_put(value)
  }

  /// Receives without waiting. `None` if nothing is buffered.
  pub fn try_receive(&self) -> Option<T> {
    self.inner.queue.try_take()
  }

  /// Closes the channel. Buffered values can still be received.
  ///
  /// Returns `true` if this call closed the channel.
  pub fn close(&self) -> bool {
    let first = !self.inner.closed.swap(true, Ordering::AcqRel);
    self.inner.queue.close();
    if first {
      debug!(channel = self.name().unwrap_or("<anonymous>"), "channel closed");
    }
    first
  }

  pub fn is_closed(&self) -> bool {
    self.inner.closed.load(Ordering::Acquire)
  }

  /// `true` once the channel is closed and every buffered value has been received.
  pub fn is_drained(&self) -> bool {
    self.inner.queue.is_drained()
  }

  pub fn len(&self) -> usize {
    self.inner.queue.len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.queue.is_empty()
  }

  /// Effective buffer size (never less than one).
  pub fn capacity(&self) -> usize {
    self.inner.queue.capacity().unwrap_or(usize::MAX)
  }

  /// Binds this channel and `handler` into a case for [`select`](crate::select()).
  pub fn case<'a, R, F>(&self, handler: F) -> SelectCase<'a, R>
  where
    T: Send + 'a,
    F: FnOnce(T) -> R + Send + 'a,
  {
    SelectCase::new(self.clone(), handler)
  }

  /// A lazy stream of received values, ending when the channel is closed and drained.
  pub fn stream(&self) -> impl Stream<Item = T> {
    self.inner.queue.stream()
  }
}
