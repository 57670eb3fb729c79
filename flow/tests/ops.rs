// tests/ops.rs

mod common;
use common::*;

use fibre_flow::{fan_in, fan_out, merge, pipeline, worker_pool, Channel, WorkerPoolOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn feed<T: Send + 'static>(channel: &Channel<T>, values: impl IntoIterator<Item = T>) {
  for value in values {
    channel.send(value).await.unwrap();
  }
}

// --- pipeline ---

#[tokio::test]
async fn pipeline_transforms_in_order() {
  init_tracing();
  let input = Channel::new(4);
  let doubled = pipeline(&input, |x: i32| async move { x * 2 }, 4);

  feed(&input, [1, 2, 3]).await;
  input.close();

  assert_eq!(collect(&doubled, LONG_TIMEOUT).await, vec![2, 4, 6]);
  assert!(doubled.is_closed());
}

#[tokio::test]
async fn pipeline_preserves_order_with_uneven_delays() {
  let input = Channel::new(ITEMS_LOW);
  let output = pipeline(
    &input,
    |x: u64| async move {
      tokio::time::sleep(Duration::from_millis((x % 3) * 2)).await;
      x
    },
    2,
  );

  feed(&input, 0..ITEMS_LOW as u64).await;
  input.close();
  assert_eq!(collect(&output, LONG_TIMEOUT).await, (0..ITEMS_LOW as u64).collect::<Vec<_>>());
}

#[tokio::test]
async fn pipelines_chain() {
  let input = Channel::new(1);
  let stage1 = pipeline(&input, |x: i32| async move { x + 1 }, 1);
  let stage2 = pipeline(&stage1, |x: i32| async move { x.to_string() }, 1);

  let producer = {
    let input = input.clone();
    tokio::spawn(async move {
      feed(&input, 0..5).await;
      input.close();
    })
  };
  assert_eq!(collect(&stage2, LONG_TIMEOUT).await, vec!["1", "2", "3", "4", "5"]);
  producer.await.unwrap();
  let stage1 = stage1.join().await;
  assert!(stage1.is_drained());
}

#[tokio::test]
async fn pipeline_on_closed_input_closes_output() {
  let input = Channel::<u8>::new(1);
  input.close();
  let output = pipeline(&input, |x| async move { x }, 1);
  assert!(collect(&output, SHORT_TIMEOUT).await.is_empty());
  assert!(output.join().await.is_closed());
}

// --- fan_out ---

#[tokio::test]
async fn fan_out_broadcasts_to_every_output() {
  let input = Channel::new(2);
  let outputs = fan_out(&input, 3, 4);
  assert_eq!(outputs.len(), 3);

  feed(&input, [1, 2]).await;
  input.close();

  for output in outputs.iter() {
    assert_eq!(collect(output, LONG_TIMEOUT).await, vec![1, 2]);
  }
  assert!(outputs.iter().all(|o| o.is_closed()));
}

#[tokio::test]
async fn fan_out_runs_at_pace_of_slowest_output() {
  let input = Channel::new(8);
  let outputs = fan_out(&input, 2, 1);
  feed(&input, 0..4).await;

  // Nobody reads output 1, so the loop stalls with one value buffered per output.
  tokio::time::sleep(Duration::from_millis(30)).await;
  assert_eq!(outputs[0].receive().await, Ok(0));
  tokio::time::sleep(Duration::from_millis(30)).await;
  assert_eq!(outputs[0].try_receive(), Some(1));
  tokio::time::sleep(Duration::from_millis(30)).await;
  assert!(outputs[0].is_empty(), "value 2 is held back until output 1 catches up");
  assert_eq!(input.len(), 2);

  input.close();
  let (a, b) = tokio::join!(
    collect(&outputs[0], LONG_TIMEOUT),
    collect(&outputs[1], LONG_TIMEOUT)
  );
  assert_eq!(a, vec![2, 3]);
  assert_eq!(b, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn fan_out_skips_outputs_closed_by_consumer() {
  let input = Channel::new(4);
  let outputs = fan_out(&input, 2, 4);
  outputs[1].close();

  feed(&input, [7, 8]).await;
  input.close();
  assert_eq!(collect(&outputs[0], LONG_TIMEOUT).await, vec![7, 8]);
}

#[tokio::test]
async fn fan_out_with_zero_outputs_consumes_input() {
  let input = Channel::new(4);
  let outputs = fan_out(&input, 0, 1);
  assert!(outputs.is_empty());

  feed(&input, [1, 2, 3]).await;
  input.close();
  outputs.join().await;
  assert!(input.is_drained());
}

// --- fan_in ---

#[tokio::test]
async fn fan_in_waits_for_every_input() {
  let a = Channel::new(2);
  let b = Channel::new(2);
  let merged = fan_in([&a, &b]);
  assert_eq!(merged.task_count(), 2);

  feed(&a, [1, 2]).await;
  a.close();
  feed(&b, [10]).await;

  // `a` is exhausted but `b` is still open.
  let mut got = vec![
    merged.receive().await.unwrap(),
    merged.receive().await.unwrap(),
    merged.receive().await.unwrap(),
  ];
  tokio::time::sleep(Duration::from_millis(20)).await;
  assert!(!merged.is_closed());

  feed(&b, [11]).await;
  b.close();
  got.extend(collect(&merged, LONG_TIMEOUT).await);
  got.sort_unstable();
  assert_eq!(got, vec![1, 2, 10, 11]);
}

#[tokio::test]
async fn fan_in_keeps_per_input_order() {
  let inputs: Vec<Channel<(usize, usize)>> = (0..3).map(|_| Channel::new(4)).collect();
  let merged = fan_in(&inputs);

  for (i, input) in inputs.iter().enumerate() {
    let input = input.clone();
    tokio::spawn(async move {
      feed(&input, (0..ITEMS_LOW).map(move |n| (i, n))).await;
      input.close();
    });
  }

  let got = collect(&merged, LONG_TIMEOUT).await;
  assert_eq!(got.len(), 3 * ITEMS_LOW);
  for source in 0..3 {
    let seq: Vec<usize> = got.iter().filter(|(s, _)| *s == source).map(|(_, n)| *n).collect();
    assert_eq!(seq, (0..ITEMS_LOW).collect::<Vec<_>>());
  }
}

#[tokio::test]
async fn fan_in_of_nothing_is_closed() {
  let inputs: Vec<Channel<u8>> = Vec::new();
  let merged = fan_in(&inputs);
  assert!(merged.is_closed());
  assert_eq!(merged.receive().await, Err(fibre_flow::QueueError::EmptyClosed));
}

// --- merge ---

#[tokio::test]
async fn merge_closes_when_any_input_ends() {
  let a = Channel::new(2);
  let b = Channel::new(2);
  let merged = merge([&a, &b]);

  let chatter = {
    let b = b.clone();
    tokio::spawn(async move {
      let mut n = 0u32;
      while b.send(n).await.is_ok() {
        n += 1;
        tokio::time::sleep(Duration::from_millis(2)).await;
      }
    })
  };

  a.send(100).await.unwrap();
  a.close();

  let got = collect(&merged, LONG_TIMEOUT).await;
  assert!(got.contains(&100), "buffered value of the closing input is forwarded");
  assert!(!b.is_closed(), "merge never closes its inputs");

  b.close();
  chatter.await.unwrap();
}

#[tokio::test]
async fn merge_forwards_from_all_inputs() {
  let a = Channel::new(4);
  let b = Channel::new(4);
  let merged = merge([&a, &b]);

  feed(&a, ["a1", "a2"]).await;
  feed(&b, ["b1"]).await;

  let mut got = Vec::new();
  for _ in 0..3 {
    got.push(tokio::time::timeout(SHORT_TIMEOUT, merged.receive()).await.unwrap().unwrap());
  }
  got.sort_unstable();
  assert_eq!(got, vec!["a1", "a2", "b1"]);

  b.close();
  assert!(collect(&merged, LONG_TIMEOUT).await.is_empty());
}

// --- worker_pool ---

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_pool_isolates_failures() {
  init_tracing();
  let jobs = Channel::new(8);
  let results = worker_pool(
    &jobs,
    |job: u32| async move {
      match job {
        3 => Err(format!("job {} rejected", job)),
        4 => panic!("job {} blew up", job),
        n => Ok(n * n),
      }
    },
    WorkerPoolOptions::default().with_workers(3),
  );
  assert_eq!(results.task_count(), 3);

  feed(&jobs, 1..=6).await;
  jobs.close();

  let mut got = collect(&results, LONG_TIMEOUT).await;
  got.sort_unstable();
  assert_eq!(got, vec![1, 4, 25, 36]);
  let results = results.join().await;
  assert!(results.is_drained());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_pool_runs_jobs_concurrently() {
  let in_flight = Arc::new(AtomicUsize::new(0));
  let peak = Arc::new(AtomicUsize::new(0));
  let jobs = Channel::new(16);

  let results = {
    let in_flight = Arc::clone(&in_flight);
    let peak = Arc::clone(&peak);
    worker_pool(
      &jobs,
      move |job: usize| {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        async move {
          let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
          peak.fetch_max(now, Ordering::SeqCst);
          tokio::time::sleep(Duration::from_millis(20)).await;
          in_flight.fetch_sub(1, Ordering::SeqCst);
          Ok::<_, String>(job)
        }
      },
      WorkerPoolOptions::default().with_workers(4).with_buffer_size(16),
    )
  };

  feed(&jobs, 0..16).await;
  jobs.close();
  let got = collect(&results, LONG_TIMEOUT).await;
  assert_eq!(got.len(), 16);
  assert!(peak.load(Ordering::SeqCst) > 1);
  assert!(peak.load(Ordering::SeqCst) <= 4);
}

#[tokio::test]
async fn worker_pool_zero_workers_still_progresses() {
  let jobs = Channel::new(2);
  let results = worker_pool(
    &jobs,
    |job: i32| async move { Ok::<_, std::convert::Infallible>(job) },
    WorkerPoolOptions::default().with_workers(0),
  );
  assert_eq!(results.task_count(), 1);

  feed(&jobs, [1, 2]).await;
  jobs.close();
  assert_eq!(collect(&results, LONG_TIMEOUT).await, vec![1, 2]);
}

// --- Derived handles ---

#[tokio::test]
async fn cancel_stops_loops_and_closes_output() {
  let input = Channel::<u32>::new(1);
  let output = pipeline(&input, |x| async move { x }, 1);
  assert!(!output.is_finished());

  output.cancel();
  assert!(output.is_closed());
  let output = output.join().await;
  assert_eq!(output.receive().await, Err(fibre_flow::QueueError::EmptyClosed));

  // The input is untouched and still usable.
  input.try_send(1).unwrap();
  assert_eq!(input.try_receive(), Some(1));
}

#[tokio::test]
async fn closing_output_stops_the_loop() {
  let input = Channel::new(4);
  let output = pipeline(&input, |x: u8| async move { x }, 1);
  output.close();

  feed(&input, [1, 2]).await;
  tokio::time::timeout(SHORT_TIMEOUT, async {
    while !output.is_finished() {
      tokio::task::yield_now().await;
    }
  })
  .await
  .unwrap();
  // The loop read one value before noticing the closed output.
  assert_eq!(input.len(), 1);
}
