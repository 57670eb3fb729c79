//! Backpressure-aware async queues and channels, with `select` and dataflow
//! composition operators.
//!
//! The building blocks, leaves first:
//!
//! - [`BlockingQueue`]: a bounded or unbounded FIFO with async `put`/`take`,
//!   per-call deadlines, direct hand-off to waiting consumers, and close/drain.
//! - [`Channel`]: a cloneable send/receive façade over a queue.
//! - [`select()`]: waits on several channels and runs the handler of the first
//!   ready one; [`timeout`] and [`ticker`] make timer channels for it.
//! - Composition operators ([`pipeline`], [`fan_out`], [`fan_in`], [`merge`],
//!   [`worker_pool`]): background loops wiring channels together, returned as
//!   [`Derived`] handles.
//!
//! Blocking operations are `async` and run on Tokio. Functions that spawn
//! background work (`timeout`, `ticker` and the operators) must be called from
//! within a Tokio runtime.

pub mod channel;
pub mod config;
pub mod error;
pub mod ops;
pub mod queue;
pub mod select;

pub use channel::Channel;
pub use config::WorkerPoolOptions;
pub use error::{QueueError, Result, TryPutError};
pub use ops::{fan_in, fan_out, merge, pipeline, worker_pool, Derived, Outputs};
pub use queue::BlockingQueue;
pub use select::{select, ticker, timeout, SelectCase, Ticker};
