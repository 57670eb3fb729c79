// src/ops/merge.rs

use super::{CloseOnDrop, Derived};
use crate::channel::Channel;
use crate::select::{select, SelectCase};

use std::convert::identity;
use tracing::debug;

/// Merges `inputs` into one new channel, stopping as soon as any input is
/// exhausted.
///
/// Each round races the next value across all inputs (via [`select`]) and
/// forwards the winner. Unlike [`fan_in`](super::fan_in), which waits for
/// every input, the output is closed the moment one input is closed and
/// drained, even if others are still producing.
pub fn merge<'a, T, I>(inputs: I) -> Derived<Channel<T>>
where
  T: Send + 'static,
  I: IntoIterator<Item = &'a Channel<T>>,
{
  let sources: Vec<Channel<T>> = inputs.into_iter().cloned().collect();
  let output = Channel::unbuffered();
  let sink = CloseOnDrop::new(output.clone());

  let task = tokio::spawn(async move {
    let mut forwarded: u64 = 0;
    loop {
      // A closed input with buffered values left is not exhausted yet.
      if let Some(index) = sources.iter().position(|source| source.is_drained()) {
        debug!(input = index, forwarded, "merge input exhausted, closing output");
        return;
      }
      let cases: Vec<SelectCase<'static, T>> = sources.iter().map(|source| source.case(identity)).collect();
      let next = select(cases).await;
      match next {
        Ok(value) => {
          if sink.send(value).await.is_err() {
            debug!(forwarded, "merge output closed, stopping");
            return;
          }
          forwarded += 1;
        }
        Err(_) => {
          debug!(forwarded, "merge input exhausted, closing output");
          return;
        }
      }
    }
  });

  Derived::new(output, vec![task])
}
