use thiserror::Error;

/// Result type alias for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

/// An error returned from building a [`ThreadPool`] or submitting a
/// task to it.
///
/// [`ThreadPool`]: crate::ThreadPool
#[derive(Debug, Error)]
pub enum PoolError {
    /// The task was rejected because the pool already runs
    /// `max_pool_size` workers and the queue holds `max_queue_size`
    /// tasks. The task was neither queued nor executed.
    #[error("thread pool capacity exhausted: all workers are busy and the task queue is full")]
    CapacityExhausted,

    /// The task was rejected because [`shutdown_now`] has been called.
    ///
    /// [`shutdown_now`]: crate::ThreadPool::shutdown_now
    #[error("the thread pool has been shut down")]
    Shutdown,

    /// The pool configuration is invalid.
    #[error("invalid thread pool configuration: {0}")]
    InvalidConfig(String),

    /// The operating system refused to create a worker thread. The task
    /// was not queued.
    #[error("failed to spawn a worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
