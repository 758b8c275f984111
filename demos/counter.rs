use slot_pool::{PoolOptions, SlotId, SlotPool};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const MAX_SLOTS: usize = 2;

async fn add_ten(slot_id: SlotId, counter: Arc<AtomicUsize>) {
  tokio::time::sleep(Duration::from_millis(200)).await;
  counter.fetch_add(10, Ordering::SeqCst);
  info!("Slot {} - ran its job", slot_id);
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Shared Counter Example ---");

  let counter = Arc::new(AtomicUsize::new(0));

  // The first job is handed over as part of creating the pool.
  let pool = SlotPool::create_with_job(PoolOptions::new("counter_pool", MAX_SLOTS), add_ten, counter.clone())
    .expect("Failed to create pool");

  // Two more jobs: the second fills slot 2, the third waits for a free slot.
  for i in 0..2 {
    match pool.dispatch(add_ten, counter.clone()).await {
      Ok(slot_id) => info!("Dispatched job {} to slot {}", i + 2, slot_id),
      Err(e) => tracing::error!("Failed to dispatch job {}: {:?}", i + 2, e),
    }
  }

  println!("{}", pool.status());

  pool.teardown().await.expect("Teardown failed");
  println!("Counter: {}", counter.load(Ordering::SeqCst));
  info!("--- Shared Counter Example End ---");
}
