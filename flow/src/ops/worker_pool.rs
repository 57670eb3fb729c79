// src/ops/worker_pool.rs

use super::{CloseOnDrop, Derived};
use crate::channel::Channel;
use crate::config::WorkerPoolOptions;

use futures_util::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Processes the jobs of `jobs` with `options.workers` concurrent loops and
/// collects successful results on a new channel.
///
/// Each loop takes the next job, awaits `worker(job)` and forwards an `Ok`
/// result. A job is attempted at most once. A job that returns `Err` is
/// logged at `warn` and a job that panics is logged at `error`; in both cases
/// the loop moves on to the next job and the other loops are unaffected.
///
/// The results channel is closed once every loop has finished, i.e. after
/// `jobs` is closed and drained. Result order across workers is unspecified.
pub fn worker_pool<J, R, E, F, Fut>(jobs: &Channel<J>, worker: F, options: WorkerPoolOptions) -> Derived<Channel<R>>
where
  J: Send + 'static,
  R: Send + 'static,
  E: fmt::Display + Send + 'static,
  F: Fn(J) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<R, E>> + Send + 'static,
{
  let results = Channel::new(options.buffer_size);
  let worker = Arc::new(worker);
  let sink = Arc::new(CloseOnDrop::new(results.clone()));

  let tasks = (0..options.effective_workers())
    .map(|id| {
      let jobs = jobs.clone();
      let worker = Arc::clone(&worker);
      let sink = Arc::clone(&sink);
      tokio::spawn(async move {
        let mut completed: u64 = 0;
        let mut failed: u64 = 0;
        while let Ok(job) = jobs.receive().await {
          let attempt = AssertUnwindSafe(async { (*worker)(job).await }).catch_unwind().await;
          match attempt {
            Ok(Ok(result)) => {
              completed += 1;
              if sink.send(result).await.is_err() {
                debug!(worker = id, "results channel closed, stopping worker");
                return;
              }
            }
            Ok(Err(err)) => {
              failed += 1;
              warn!(worker = id, error = %err, "job failed");
            }
            Err(_panic) => {
              failed += 1;
              error!(worker = id, "job panicked");
            }
          }
        }
        debug!(worker = id, completed, failed, "worker finished");
      })
    })
    .collect();

  drop(sink);
  Derived::new(results, tasks)
}
