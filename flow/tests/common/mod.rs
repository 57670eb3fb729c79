#![allow(dead_code)]

use std::time::Duration;

pub const SHORT_TIMEOUT: Duration = Duration::from_millis(500);
pub const LONG_TIMEOUT: Duration = Duration::from_secs(3);
pub const STRESS_TIMEOUT: Duration = Duration::from_secs(15);
pub const ITEMS_LOW: usize = 50;
pub const ITEMS_MEDIUM: usize = 200;
pub const ITEMS_HIGH: usize = 1000;

/// Installs a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

/// Receives until the channel is closed and drained, failing the test if that
/// takes longer than `limit`.
pub async fn collect<T>(channel: &fibre_flow::Channel<T>, limit: Duration) -> Vec<T> {
  let mut out = Vec::new();
  loop {
    match tokio::time::timeout(limit, channel.receive()).await {
      Ok(Ok(value)) => out.push(value),
      Ok(Err(_)) => return out,
      Err(_) => panic!("channel was not closed within {:?}", limit),
    }
  }
}
