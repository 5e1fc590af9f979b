//! Submits more work than the pool can hold and reports what happened.
//!
//! Run with `RUST_LOG=elastic_pool=debug` to see the workers start and
//! stop.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use elastic_pool::{PoolError, ThreadPool};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), PoolError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let pool = ThreadPool::with_limits(2, 4, 8)?;
    let completed = Arc::new(AtomicUsize::new(0));
    let mut rejected = 0;

    for n in 0..20 {
        let completed = completed.clone();
        let submitted = pool.execute_cancellable(move |token| {
            if token.wait_timeout(Duration::from_millis(50)) {
                info!(task = n, "task interrupted");
                return;
            }
            completed.fetch_add(1, Ordering::SeqCst);
        });
        match submitted {
            Ok(()) => {}
            Err(PoolError::CapacityExhausted) => rejected += 1,
            Err(err) => return Err(err),
        }
    }

    info!(
        workers = pool.size(),
        queued = pool.queued(),
        rejected,
        "all tasks submitted"
    );

    thread::sleep(Duration::from_millis(120));
    pool.shutdown_now();
    if pool.join().is_err() {
        warn!("a worker thread panicked");
    }

    info!(completed = completed.load(Ordering::SeqCst), "pool stopped");
    Ok(())
}
