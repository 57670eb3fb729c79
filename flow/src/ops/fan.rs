// src/ops/fan.rs

use super::{CloseOnDrop, Derived};
use crate::channel::Channel;

use futures_util::future::join_all;
use futures_util::StreamExt;
use std::pin::pin;
use std::sync::Arc;
use tracing::{debug, trace};

/// Broadcasts every value of `input` to `count` new output channels.
///
/// The loop is lock-step: a value is sent to all outputs, and all sends must
/// complete before the next value is read. Every output therefore sees the
/// same sequence in the same order, at the pace of the slowest consumer.
///
/// Outputs closed by their consumers are skipped. The loop ends when `input`
/// is exhausted or every output has been closed, and then closes all outputs.
pub fn fan_out<T>(input: &Channel<T>, count: usize, buffer_size: usize) -> Derived<Vec<Channel<T>>>
where
  T: Clone + Send + 'static,
{
  let outputs: Vec<Channel<T>> = (0..count).map(|_| Channel::new(buffer_size)).collect();
  let source = input.clone();
  let sinks = CloseOnDrop::new(outputs.clone());

  let task = tokio::spawn(async move {
    let mut values = pin!(source.stream());
    while let Some(value) = values.next().await {
      let sends = sinks.iter().map(|sink| sink.send(value.clone()));
      let results = join_all(sends).await;
      let delivered = results.iter().filter(|r| r.is_ok()).count();
      if !results.is_empty() && delivered == 0 {
        debug!("all fan-out outputs closed, stopping");
        return;
      }
    }
    debug!(outputs = sinks.len(), "fan-out input exhausted");
  });

  Derived::new(outputs, vec![task])
}

/// Forwards the values of every input into one new channel.
///
/// One loop runs per input. Values from the same input keep their relative
/// order; values from different inputs interleave arbitrarily. The output is
/// closed only after every input is exhausted.
pub fn fan_in<'a, T, I>(inputs: I) -> Derived<Channel<T>>
where
  T: Send + 'static,
  I: IntoIterator<Item = &'a Channel<T>>,
{
  let output = Channel::unbuffered();
  // The last forwarding loop to finish drops the final reference and closes the output.
  let sink = Arc::new(CloseOnDrop::new(output.clone()));

  let tasks = inputs
    .into_iter()
    .enumerate()
    .map(|(index, input)| {
      let source = input.clone();
      let sink = Arc::clone(&sink);
      tokio::spawn(async move {
        while let Ok(value) = source.receive().await {
          if sink.send(value).await.is_err() {
            trace!(input = index, "fan-in output closed");
            return;
          }
        }
        trace!(input = index, "fan-in input exhausted");
      })
    })
    .collect();

  drop(sink);
  Derived::new(output, tasks)
}
