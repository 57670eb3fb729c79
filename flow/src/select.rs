// src/select.rs

//! Multiplexing over several channels.
//!
//! [`select`] picks one ready case and applies its handler:
//!
//! 1. **Probe**: every case is tried without waiting, in list order. The first
//!    one holding a value wins. When several channels are ready at call time,
//!    list order decides.
//! 2. **Race**: if none is ready, all cases wait concurrently and the first to
//!    settle wins. Simultaneous wake-ups are resolved by the scheduler.
//!
//! Losing receives are dropped as soon as the race is decided, which unlinks
//! them from their channels. A loser that had already been handed a value
//! returns it to the head of its channel.
//!
//! [`timeout`] and [`ticker`] build channels meant to be used as cases.

use crate::channel::Channel;
use crate::error::{QueueError, Result};
use crate::ops::CloseOnDrop;

use futures_util::future::{select_all, BoxFuture};
use std::fmt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

// --- Case plumbing ---

/// One branch of a select: a channel plus the handler to run on its value.
trait Arm<R>: Send {
  /// Non-blocking probe. Runs the handler if a value is available now.
  fn try_fire(&mut self) -> Option<R>;
  /// Waits for a value and runs the handler on it.
  fn fire(&mut self) -> BoxFuture<'_, Result<R>>;
}

struct ChannelArm<T, F> {
  channel: Channel<T>,
  handler: Option<F>,
}

impl<T, R, F> Arm<R> for ChannelArm<T, F>
where
  T: Send,
  F: FnOnce(T) -> R + Send,
{
  fn try_fire(&mut self) -> Option<R> {
    if self.handler.is_none() {
      return None;
    }
    let value = self.channel.try_receive()?;
    self.handler.take().map(|handler| handler(value))
  }

  fn fire(&mut self) -> BoxFuture<'_, Result<R>> {
    Box::pin(async move {
      let value = self.channel.receive().await?;
      match self.handler.take() {
        Some(handler) => Ok(handler(value)),
        None => Err(QueueError::Closed),
      }
    })
  }
}

/// A channel bound to a handler, produced by [`Channel::case`].
///
/// Cases are single-use: build a fresh set for every `select` call.
pub struct SelectCase<'a, R> {
  arm: Box<dyn Arm<R> + Send + 'a>,
}

impl<'a, R> SelectCase<'a, R> {
  pub(crate) fn new<T, F>(channel: Channel<T>, handler: F) -> Self
  where
    T: Send + 'a,
    F: FnOnce(T) -> R + Send + 'a,
  {
    SelectCase {
      arm: Box::new(ChannelArm {
        channel,
        handler: Some(handler),
      }),
    }
  }
}

impl<R> fmt::Debug for SelectCase<'_, R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SelectCase").finish_non_exhaustive()
  }
}

// --- select ---

/// Waits for the first of several channels to yield a value and returns the
/// result of that case's handler.
///
/// # Errors
///
/// Returns [`QueueError::EmptyClosed`] if `cases` is empty, or if, while
/// racing, a channel closes before any case receives a value.
pub async fn select<'a, R>(cases: impl IntoIterator<Item = SelectCase<'a, R>>) -> Result<R> {
  let mut cases: Vec<SelectCase<'a, R>> = cases.into_iter().collect();
  if cases.is_empty() {
    return Err(QueueError::EmptyClosed);
  }

  // --- Phase 1: Probe in list order ---
  for case in cases.iter_mut() {
    if let Some(result) = case.arm.try_fire() {
      return Ok(result);
    }
  }

  // --- Phase 2: Race ---
  let racers: Vec<BoxFuture<'_, Result<R>>> = cases.iter_mut().map(|case| case.arm.fire()).collect();
  let (outcome, winner, losers) = select_all(racers).await;
  drop(losers);
  trace!(winner, ok = outcome.is_ok(), "select race settled");
  outcome
}

// --- Timer channels ---

/// Returns a channel that receives a single `()` after `duration` and is then
/// closed. Use it as a select case to put a deadline on a receive.
///
/// Must be called from within a Tokio runtime.
pub fn timeout(duration: Duration) -> Channel<()> {
  let channel = Channel::unbuffered();
  let sender = channel.clone();
  tokio::spawn(async move {
    time::sleep(duration).await;
    // The receiving side may have closed it already.
    let _ = sender.send(()).await;
    sender.close();
  });
  channel
}

/// Shortest period a [`Ticker`] runs at.
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

/// A channel fed with an incrementing counter at a fixed period.
///
/// Ticks the receiver is not ready for are dropped, not queued. The counter
/// still advances, so gaps in the received values show how many were missed.
/// Dropping the `Ticker` stops it.
#[derive(Debug)]
pub struct Ticker {
  channel: Channel<u64>,
  task: JoinHandle<()>,
}

/// Starts a [`Ticker`] whose first tick fires after one `period`.
/// The first value sent is `0`.
///
/// A zero `period` is raised to [`MIN_TICK_PERIOD`]. Must be called from
/// within a Tokio runtime.
pub fn ticker(period: Duration) -> Ticker {
  let period = period.max(MIN_TICK_PERIOD);
  let channel = Channel::unbuffered();
  // Closes the channel however the loop ends.
  let sender = CloseOnDrop::new(channel.clone());
  let task = tokio::spawn(async move {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut count: u64 = 0;
    loop {
      interval.tick().await;
      if sender.is_closed() {
        break;
      }
      if sender.try_send(count).is_err() {
        trace!(tick = count, "ticker tick dropped");
      }
      count = count.wrapping_add(1);
    }
  });
  Ticker { channel, task }
}

impl Ticker {
  /// The channel ticks are delivered on.
  pub fn channel(&self) -> &Channel<u64> {
    &self.channel
  }

  /// Stops the ticker and closes its channel. Idempotent.
  pub fn stop(&self) {
    self.task.abort();
    if self.channel.close() {
      debug!("ticker stopped");
    }
  }

  pub fn is_stopped(&self) -> bool {
    self.channel.is_closed()
  }
}

impl Drop for Ticker {
  fn drop(&mut self) {
    self.stop();
  }
}
