//! # Elastic Thread Pool
//!
//! A bounded thread pool that grows under load. Tasks are fire-and-forget
//! closures; they are handed to worker threads through one shared FIFO
//! queue.
//!
//! Submission follows the classic policy: start core threads first, then
//! queue, then start burst threads once the queue is full, then reject
//! with [`PoolError::CapacityExhausted`].
//!
//! # Build a thread pool
//!
//! Use [`ThreadPool::new`] for the default limits, or the
//! [`ThreadPoolBuilder`] to build a thread pool with a custom
//! configuration.
//!
//! # Examples
//!
//! ```
//! use elastic_pool::ThreadPoolBuilder;
//! let thread_pool = ThreadPoolBuilder::default()
//!     .core_pool_size(5)
//!     .max_pool_size(10)
//!     .max_queue_size(100)
//!     .build()
//!     .unwrap();
//!
//! thread_pool.execute(|| println!("Hello World")).unwrap();
//!
//! // Stop every worker and wait for their threads to end.
//! thread_pool.shutdown_now();
//! thread_pool.join().unwrap();
//! ```

mod builder;
mod cancel;
mod error;
mod thread_pool;

pub(crate) mod queue;
pub(crate) mod task;
pub(crate) mod worker;

pub use builder::*;
pub use cancel::CancellationToken;
pub use error::{PoolError, Result};
pub use task::TaskOutcome;
pub use thread_pool::*;
