use crate::{
    error::{PoolError, Result},
    queue::TaskQueue,
    task::{Task, TaskListeners},
    worker::{Worker, WorkerContext},
    CancellationToken, ThreadPoolBuilder,
};

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, info, trace, warn};

/// A function that is used to create a custom worker thread. It
/// receives the id of the worker the thread will run.
pub type ThreadFactory = dyn Fn(usize) -> thread::Builder + Send + Sync + 'static;

/// The limits a [`ThreadPool`] was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Workers started eagerly, one per submission, before anything is
    /// queued.
    pub core_pool_size: usize,
    /// Hard ceiling on the number of live workers.
    pub max_pool_size: usize,
    /// Pending tasks allowed before burst workers are started.
    pub max_queue_size: usize,
}

impl PoolConfig {
    /// The queue limit used when none is given.
    pub const DEFAULT_MAX_QUEUE_SIZE: usize = 100;

    /// A configuration with `max_pool_size = 2 * core_pool_size` and
    /// `max_queue_size = 100`.
    #[must_use]
    pub fn with_core(core_pool_size: usize) -> Self {
        Self {
            core_pool_size,
            max_pool_size: core_pool_size.saturating_mul(2),
            max_queue_size: Self::DEFAULT_MAX_QUEUE_SIZE,
        }
    }

    /// Checks that every size is positive and `core_pool_size <=
    /// max_pool_size`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] describing the first
    /// violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.core_pool_size == 0 {
            return Err(PoolError::InvalidConfig(
                "core_pool_size can not be 0".into(),
            ));
        }
        if self.max_pool_size < self.core_pool_size {
            return Err(PoolError::InvalidConfig(format!(
                "max_pool_size ({}) must be >= core_pool_size ({})",
                self.max_pool_size, self.core_pool_size
            )));
        }
        if self.max_queue_size == 0 {
            return Err(PoolError::InvalidConfig(
                "max_queue_size can not be 0".into(),
            ));
        }
        Ok(())
    }
}

struct WorkerSet {
    workers: Vec<Worker>,
    next_worker_id: usize,
    shutdown: bool,
}

pub(crate) struct ThreadPoolSharedData {
    workers: Mutex<WorkerSet>,
    // Mirrors `workers.len()`, updated while the lock is held, so
    // `size` never blocks.
    worker_count: AtomicUsize,
    is_shutdown: AtomicBool,
    ctx: WorkerContext,
}

impl ThreadPoolSharedData {
    fn lock_workers(&self) -> MutexGuard<'_, WorkerSet> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ThreadPoolSharedData {
    fn drop(&mut self) {
        let set = self
            .workers
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for worker in &set.workers {
            worker.stop();
        }
    }
}

/// An elastic, bounded pool of worker threads.
///
/// All workers pull tasks from one shared FIFO queue. Every submission
/// goes through admission control, evaluated in order under a single
/// lock:
///
/// 1. If fewer than `core_pool_size` workers exist, a new worker is
///    started and the task is queued for it.
/// 2. Otherwise, if the queue holds fewer than `max_queue_size` tasks,
///    the task is queued.
/// 3. Otherwise, if fewer than `max_pool_size` workers exist, a burst
///    worker is started and the task is queued for it.
/// 4. Otherwise the task is rejected with
///    [`PoolError::CapacityExhausted`].
///
/// Workers are never retired while the pool runs. A panicking task or
/// listener is caught by its worker, which keeps serving the queue.
///
/// [`ThreadPool::shutdown_now`] cancels every worker: idle workers exit
/// at once, running tasks can observe the cancellation through their
/// [`CancellationToken`], and queued tasks are dropped without running.
///
/// `ThreadPool` is a cheap handle; clones share the same workers. When
/// the last handle is dropped the workers are cancelled. A queued or
/// running task that captured a clone also counts as a handle: while it
/// exists the workers keep running, so call [`ThreadPool::shutdown_now`]
/// explicitly when tasks hold the pool.
///
/// # Examples
///
/// ```
/// use elastic_pool::{PoolError, ThreadPool};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let pool = ThreadPool::with_limits(2, 4, 16).unwrap();
/// let sum = Arc::new(AtomicUsize::new(0));
/// for _ in 0..10 {
///     let sum = sum.clone();
///     pool.execute(move || {
///         sum.fetch_add(1, Ordering::SeqCst);
///     })
///     .unwrap();
/// }
///
/// while sum.load(Ordering::SeqCst) < 10 {
///     std::thread::sleep(Duration::from_millis(1));
/// }
/// assert!(pool.size() <= 4);
///
/// pool.shutdown_now();
/// pool.join().unwrap();
/// assert!(matches!(pool.execute(|| ()), Err(PoolError::Shutdown)));
/// ```
#[derive(Clone)]
pub struct ThreadPool {
    pub(crate) share: Arc<ThreadPoolSharedData>,
    pub(crate) config: PoolConfig,
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("config", &self.config)
            .field("size", &self.size())
            .field("queued", &self.queued())
            .field("is_shutdown", &self.is_shutdown())
            .finish()
    }
}

impl ThreadPool {
    /// Creates a pool with `core_pool_size` core workers,
    /// `max_pool_size = 2 * core_pool_size` and a queue limit of 100.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if `core_pool_size` is 0.
    pub fn new(core_pool_size: usize) -> Result<Self> {
        ThreadPoolBuilder::new()
            .core_pool_size(core_pool_size)
            .build()
    }

    /// Creates a pool with explicit limits.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if any size is 0 or
    /// `max_pool_size < core_pool_size`.
    pub fn with_limits(
        core_pool_size: usize,
        max_pool_size: usize,
        max_queue_size: usize,
    ) -> Result<Self> {
        ThreadPoolBuilder::new()
            .core_pool_size(core_pool_size)
            .max_pool_size(max_pool_size)
            .max_queue_size(max_queue_size)
            .build()
    }

    /// Builds a thread pool from a validated configuration.
    pub(crate) fn from_parts(
        config: PoolConfig,
        listeners: TaskListeners,
        thread_factory: Arc<ThreadFactory>,
    ) -> Self {
        debug!(
            core_pool_size = config.core_pool_size,
            max_pool_size = config.max_pool_size,
            max_queue_size = config.max_queue_size,
            "creating thread pool"
        );
        Self {
            share: Arc::new(ThreadPoolSharedData {
                workers: Mutex::new(WorkerSet {
                    workers: Vec::with_capacity(config.core_pool_size),
                    next_worker_id: 0,
                    shutdown: false,
                }),
                worker_count: AtomicUsize::new(0),
                is_shutdown: AtomicBool::new(false),
                ctx: WorkerContext {
                    queue: Arc::new(TaskQueue::new()),
                    listeners: Arc::new(listeners),
                    thread_factory,
                    active: Arc::new(AtomicUsize::new(0)),
                },
            }),
            config,
        }
    }

    /// Submits a task for execution on a worker thread.
    ///
    /// # Errors
    ///
    /// 1. [`CapacityExhausted`]: the pool runs `max_pool_size` workers
    ///    and the queue is full. The task is dropped without running.
    /// 2. [`Shutdown`]: [`shutdown_now`] has been called.
    /// 3. [`Spawn`]: a worker thread was needed but could not be created.
    ///
    /// [`CapacityExhausted`]: crate::PoolError::CapacityExhausted
    /// [`Shutdown`]: crate::PoolError::Shutdown
    /// [`Spawn`]: crate::PoolError::Spawn
    /// [`shutdown_now`]: ThreadPool::shutdown_now
    pub fn execute<F>(&self, task_fn: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Task::create(move |_| task_fn()))
    }

    /// Submits a task that receives the cancellation token of the worker
    /// running it, so it can stop early once [`shutdown_now`] is called.
    ///
    /// # Errors
    ///
    /// Same as [`ThreadPool::execute`].
    ///
    /// # Examples
    ///
    /// ```
    /// use elastic_pool::ThreadPool;
    /// use std::time::Duration;
    ///
    /// let pool = ThreadPool::new(1).unwrap();
    /// let (tx, rx) = std::sync::mpsc::channel();
    /// pool.execute_cancellable(move |token| {
    ///     tx.send(()).unwrap();
    ///     // Sleep until cancelled.
    ///     token.wait();
    /// })
    /// .unwrap();
    ///
    /// rx.recv().unwrap();
    /// pool.shutdown_now();
    /// assert!(pool.await_termination(Duration::from_secs(5)));
    /// ```
    ///
    /// [`shutdown_now`]: ThreadPool::shutdown_now
    pub fn execute_cancellable<F>(&self, task_fn: F) -> Result<()>
    where
        F: FnOnce(&CancellationToken) + Send + 'static,
    {
        self.submit(Task::create(task_fn))
    }

    fn submit(&self, task: Task) -> Result<()> {
        let queue = &self.share.ctx.queue;
        let mut set = self.share.lock_workers();
        if set.shutdown {
            return Err(PoolError::Shutdown);
        }

        let workers = set.workers.len();
        if workers < self.config.core_pool_size {
            self.add_worker(&mut set)?;
        } else if queue.size() < self.config.max_queue_size {
            trace!(queued = queue.size(), "queueing task");
        } else if workers < self.config.max_pool_size {
            debug!(workers, "task queue full, starting a burst worker");
            self.add_worker(&mut set)?;
        } else {
            // Release lock.
            drop(set);
            warn!(
                max_pool_size = self.config.max_pool_size,
                max_queue_size = self.config.max_queue_size,
                "rejecting task, thread pool capacity exhausted"
            );
            return Err(PoolError::CapacityExhausted);
        }

        queue.put(task);
        Ok(())
    }

    fn add_worker(&self, set: &mut WorkerSet) -> Result<()> {
        let worker = Worker::start(set.next_worker_id, &self.share.ctx)?;
        set.next_worker_id += 1;
        set.workers.push(worker);
        self.share
            .worker_count
            .store(set.workers.len(), Ordering::SeqCst);
        Ok(())
    }

    /// Returns the number of workers in the pool.
    ///
    /// Workers stay counted after [`shutdown_now`] until they are reaped
    /// by [`join`].
    ///
    /// [`shutdown_now`]: ThreadPool::shutdown_now
    /// [`join`]: ThreadPool::join
    #[must_use]
    pub fn size(&self) -> usize {
        self.share.worker_count.load(Ordering::SeqCst)
    }

    /// Returns the number of tasks waiting in the queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.share.ctx.queue.size()
    }

    /// Returns the number of workers currently executing a task.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.share.ctx.active.load(Ordering::SeqCst)
    }

    /// Returns the limits the pool was built with.
    #[must_use]
    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Stops the pool immediately.
    ///
    /// Every worker is cancelled: idle workers exit without taking
    /// another task, and running tasks keep running but can observe the
    /// cancellation through their [`CancellationToken`]. Tasks still in
    /// the queue are dropped and never run. Later submissions fail with
    /// [`PoolError::Shutdown`].
    ///
    /// This returns without waiting for the workers; use [`join`] or
    /// [`await_termination`] for that.
    ///
    /// [`join`]: ThreadPool::join
    /// [`await_termination`]: ThreadPool::await_termination
    pub fn shutdown_now(&self) {
        let mut set = self.share.lock_workers();
        set.shutdown = true;
        self.share.is_shutdown.store(true, Ordering::SeqCst);
        for worker in &set.workers {
            worker.stop();
        }
        let abandoned = self.share.ctx.queue.clear();
        info!(
            workers = set.workers.len(),
            abandoned, "thread pool shut down"
        );
    }

    /// Returns `true` if [`ThreadPool::shutdown_now`] has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.share.is_shutdown.load(Ordering::SeqCst)
    }

    /// Returns `true` if the pool has been shut down and every worker
    /// thread has exited.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.is_shutdown()
            && self
                .share
                .lock_workers()
                .workers
                .iter()
                .all(Worker::is_finished)
    }

    /// Waits for all worker threads to finish and removes them from the
    /// pool. Note that this waits for worker threads, not for queued
    /// tasks.
    ///
    /// This calls [`shutdown_now`] first, because workers of a running
    /// pool never finish. If this is called in a worker thread, that
    /// worker is not joined.
    ///
    /// # Errors
    ///
    /// An error is returned if a worker thread panicked outside of a
    /// task.
    ///
    /// [`shutdown_now`]: ThreadPool::shutdown_now
    pub fn join(&self) -> thread::Result<()> {
        if !self.is_shutdown() {
            self.shutdown_now();
        }
        let workers = {
            let mut set = self.share.lock_workers();
            self.share.worker_count.store(0, Ordering::SeqCst);
            std::mem::take(&mut set.workers)
        };
        for worker in workers {
            let id = worker.id;
            worker.join()?;
            trace!(worker = id, "worker joined");
        }
        Ok(())
    }

    /// Waits up to `timeout` for every worker thread to exit. Returns
    /// `true` if all of them did. Workers are not removed from the pool.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let exits: Vec<_> = self
            .share
            .lock_workers()
            .workers
            .iter()
            .filter_map(Worker::exit_signal)
            .collect();
        exits.iter().all(|exited| {
            !matches!(
                exited.recv_deadline(deadline),
                Err(RecvTimeoutError::Timeout)
            )
        })
    }
}
