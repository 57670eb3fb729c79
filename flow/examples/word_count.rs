// examples/word_count.rs
use fibre_flow::{fan_in, pipeline, select, ticker, worker_pool, Channel, WorkerPoolOptions};
use std::time::Duration;

const LINES: &[&str] = &[
  "the quick brown fox",
  "jumps over",
  "the lazy dog",
  "",
  "and keeps on running",
];

#[tokio::main]
async fn main() {
  println!("--- Pipeline + worker pool ---");
  {
    let lines = Channel::with_name("lines", 4);
    let trimmed = pipeline(&lines, |line: &'static str| async move { line.trim() }, 4);
    let counts = worker_pool(
      &trimmed,
      |line: &'static str| async move {
        if line.is_empty() {
          return Err("empty line");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok((line, line.split_whitespace().count()))
      },
      WorkerPoolOptions::default().with_workers(2),
    );

    for line in LINES {
      lines.send(*line).await.unwrap();
    }
    lines.close();

    let mut total = 0;
    while let Ok((line, words)) = counts.receive().await {
      println!("[Counter] {:>2} words: {}", words, line);
      total += words;
    }
    println!("[Counter] Total: {}", total);
  }

  println!("\n--- Fan-in with a heartbeat ---");
  {
    let left = Channel::new(1);
    let right = Channel::new(1);
    let merged = fan_in([&left, &right]);
    let heartbeat = ticker(Duration::from_millis(15));

    for (name, source) in [("left", left.clone()), ("right", right.clone())] {
      tokio::spawn(async move {
        for i in 0..3 {
          tokio::time::sleep(Duration::from_millis(10)).await;
          source.send(format!("{}-{}", name, i)).await.unwrap();
        }
        source.close();
      });
    }

    loop {
      let event = select([
        merged.case(Some),
        heartbeat.channel().case(|tick| Some(format!("tick {}", tick))),
      ])
      .await;
      match event {
        Ok(Some(msg)) => println!("[Main] {}", msg),
        _ => break,
      }
    }
    heartbeat.stop();
  }
}
