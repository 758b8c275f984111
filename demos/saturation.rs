use slot_pool::{PoolOptions, SlotId, SlotPool};
use std::time::{Duration, Instant};
use tracing::info;

async fn work_job(slot_id: SlotId, (id, duration_ms): (usize, u64)) {
  info!("Job {} starting in slot {} (will run for {}ms)", id, slot_id, duration_ms);
  tokio::time::sleep(Duration::from_millis(duration_ms)).await;
  info!("Job {} finished in slot {}", id, slot_id);
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Saturation and Teardown Example ---");

  let pool = SlotPool::create(PoolOptions::new("saturation_pool", 3)).expect("Failed to create pool");
  let started = Instant::now();

  // Six one-second jobs on three slots: jobs 3, 4 and 5 each wait for a slot.
  for i in 0..6 {
    match pool.dispatch(work_job, (i, 1000)).await {
      Ok(slot_id) => info!(
        "Dispatched job {} to slot {} after {:?}",
        i,
        slot_id,
        started.elapsed()
      ),
      Err(e) => tracing::error!("Failed to dispatch job {}: {:?}", i, e),
    }
    if i == 2 {
      println!("{}", pool.status());
    }
  }

  let observer = pool.clone();
  let teardown_jh = tokio::spawn(async move {
    info!("Calling pool.teardown()...");
    pool.teardown().await.expect("Teardown failed");
    info!("Pool teardown completed after {:?}.", started.elapsed());
  });

  // Dispatches after teardown has begun are rejected.
  tokio::time::sleep(Duration::from_millis(50)).await;
  match observer.dispatch(work_job, (99, 100)).await {
    Ok(_) => tracing::error!("LATE DISPATCH SUCCEEDED (UNEXPECTED!)"),
    Err(e) => info!("Late dispatch correctly failed: {:?}", e),
  }

  teardown_jh.await.expect("Teardown join handle failed");
  info!("Final state: {:?}", observer.state());
  info!("--- Saturation and Teardown Example End ---");
}
