// src/ops/mod.rs

//! Composition operators: background loops that wire input channels to
//! output channels.
//!
//! Every operator spawns its loops onto the current Tokio runtime when it is
//! called and returns a [`Derived`] handle owning the output(s). The loops run
//! until their source is exhausted, then close their outputs. Dropping the
//! `Derived` handle detaches the loops; it does not stop them. Use
//! [`Derived::cancel`] to stop them early.
//!
//! Closing an output from the consumer side only stops a loop once that
//! loop next tries to send to it.

mod fan;
mod merge;
mod pipeline;
mod worker_pool;

pub use fan::{fan_in, fan_out};
pub use merge::merge;
pub use pipeline::pipeline;
pub use worker_pool::worker_pool;

use crate::channel::Channel;

use std::fmt;
use std::ops::Deref;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Output side of an operator that can be closed as a whole.
pub trait Outputs {
  /// Closes every output channel.
  fn close_outputs(&self);
}

impl<T> Outputs for Channel<T> {
  fn close_outputs(&self) {
    self.close();
  }
}

impl<T> Outputs for Vec<Channel<T>> {
  fn close_outputs(&self) {
    for channel in self {
      channel.close();
    }
  }
}

/// The output of a composition operator together with the background loops
/// feeding it.
///
/// Derefs to the output, so `derived.receive()` works for single-channel outputs.
pub struct Derived<O: Outputs> {
  output: O,
  tasks: Vec<JoinHandle<()>>,
}

impl<O: Outputs> Derived<O> {
  pub(crate) fn new(output: O, tasks: Vec<JoinHandle<()>>) -> Self {
    Self { output, tasks }
  }

  pub fn output(&self) -> &O {
    &self.output
  }

  /// Detaches the background loops and returns the output.
  pub fn into_output(self) -> O {
    self.output
  }

  /// Number of background loops backing this output.
  pub fn task_count(&self) -> usize {
    self.tasks.len()
  }

  /// `true` once every background loop has ended.
  pub fn is_finished(&self) -> bool {
    self.tasks.iter().all(|task| task.is_finished())
  }

  /// Stops the background loops and closes the outputs.
  ///
  /// Values already buffered in the outputs stay receivable. A transform or
  /// worker call in flight is abandoned at its next suspension point.
  pub fn cancel(&self) {
    for task in &self.tasks {
      task.abort();
    }
    self.output.close_outputs();
    debug!(tasks = self.tasks.len(), "derived loops cancelled");
  }

  /// Waits for every background loop to end and returns the output.
  pub async fn join(self) -> O {
    for task in self.tasks {
      if let Err(err) = task.await {
        if err.is_panic() {
          error!(error = %err, "operator loop panicked");
        }
      }
    }
    self.output
  }
}

impl<O: Outputs> Deref for Derived<O> {
  type Target = O;

  fn deref(&self) -> &O {
    &self.output
  }
}

impl<O: Outputs + fmt::Debug> fmt::Debug for Derived<O> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Derived")
      .field("output", &self.output)
      .field("tasks", &self.tasks.len())
      .field("finished", &self.is_finished())
      .finish()
  }
}

/// Closes the wrapped outputs when dropped.
///
/// Held by (or shared between, behind an `Arc`) the loops feeding an output,
/// so the output closes when the last loop ends, however it ends.
pub(crate) struct CloseOnDrop<O: Outputs>(O);

impl<O: Outputs> CloseOnDrop<O> {
  pub(crate) fn new(output: O) -> Self {
    Self(output)
  }
}

impl<O: Outputs> Deref for CloseOnDrop<O> {
  type Target = O;

  fn deref(&self) -> &O {
    &self.0
  }
}

impl<O: Outputs> Drop for CloseOnDrop<O> {
  fn drop(&mut self) {
    self.0.close_outputs();
  }
}
