// src/ops/pipeline.rs

use super::{CloseOnDrop, Derived};
use crate::channel::Channel;

use futures_util::StreamExt;
use std::future::Future;
use std::pin::pin;
use tracing::debug;

/// Applies `transform` to every value of `input`, in arrival order, and sends
/// the results to a new channel with the given buffer size.
///
/// A single loop consumes `input`, so the output order matches the input order
/// exactly. The output is closed when `input` is exhausted (or the loop stops
/// because the output was closed).
///
/// ```rust,ignore
/// let doubled = pipeline(&numbers, |n| async move { n * 2 }, 8);
/// ```
pub fn pipeline<T, U, F, Fut>(input: &Channel<T>, mut transform: F, buffer_size: usize) -> Derived<Channel<U>>
where
  T: Send + 'static,
  U: Send + 'static,
  F: FnMut(T) -> Fut + Send + 'static,
  Fut: Future<Output = U> + Send + 'static,
{
  let output = Channel::new(buffer_size);
  let source = input.clone();
  let sink = CloseOnDrop::new(output.clone());

  let task = tokio::spawn(async move {
    let mut values = pin!(source.stream());
    let mut forwarded: u64 = 0;
    while let Some(value) = values.next().await {
      let mapped = transform(value).await;
      if sink.send(mapped).await.is_err() {
        debug!(forwarded, "pipeline output closed, stopping");
        return;
      }
      forwarded += 1;
    }
    debug!(forwarded, "pipeline input exhausted");
  });

  Derived::new(output, vec![task])
}
