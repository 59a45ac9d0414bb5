//! Basic example throttling a batch of simulated requests.
//!
//! Ten requests share a throttle that allows two in flight and two starts
//! per second. A second throttle sheds callers instead of queueing them.

use std::time::Duration;
use task_throttle::{Outcome, Throttle};
use tokio::time::{sleep, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn fetch(id: u32) -> String {
    sleep(Duration::from_millis(300)).await;
    format!("response #{}", id)
}

#[tokio::main]
async fn main() {
    // RUST_LOG=task_throttle=debug shows drops and cancellations
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("=== Basic Throttle Example ===\n");
    println!("Policy: 2 concurrent, 2 starts per second, queued in call order\n");

    let throttle = Throttle::builder()
        .with_concurrency(2)
        .with_interval(Duration::from_secs(1))
        .with_on_done(|| info!("throttle drained"))
        .build()
        .expect("valid configuration");

    let start = Instant::now();
    let throttled_fetch = throttle.bind(fetch);
    let calls = (1..=10).map(|id| {
        let throttled_fetch = &throttled_fetch;
        async move {
            let outcome = throttled_fetch.call(id).await;
            info!(id, elapsed_ms = start.elapsed().as_millis() as u64, ?outcome, "call settled");
        }
    });
    futures::future::join_all(calls).await;

    println!("\nShedding: 1 concurrent, newest callers dropped\n");

    let shedding = Throttle::builder()
        .with_drop(true)
        .build()
        .expect("valid configuration");
    let calls = (1..=4).map(|id| shedding.run(move || fetch(id)));
    for (id, result) in (1..=4).zip(futures::future::join_all(calls).await) {
        match result {
            Ok(Outcome::Completed(body)) => println!("call {}: {}", id, body),
            Ok(Outcome::Dropped) => println!("call {}: dropped", id),
            Err(err) => println!("call {}: error {}", id, err),
        }
    }

    let snapshot = shedding.metrics().snapshot();
    println!("\n=== Example Complete ===");
    println!(
        "Shedding throttle: {} admitted, {} dropped ({:.0}% drop rate)",
        snapshot.calls_admitted,
        snapshot.calls_dropped,
        snapshot.drop_rate() * 100.0
    );
}
