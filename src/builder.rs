use std::{sync::Arc, thread};

use crate::{
    error::Result,
    task::{TaskListeners, TaskOutcome},
    PoolConfig, ThreadFactory, ThreadPool,
};

/// A builder of the [`ThreadPool`], which can be used to configure
/// the properties of a new thread pool.
///
/// # Examples
///
/// ```
/// use elastic_pool::{TaskOutcome, ThreadPoolBuilder};
///
/// let thread_pool = ThreadPoolBuilder::default()
///     .core_pool_size(4)
///     .max_pool_size(7)
///     .max_queue_size(32)
///     .listener_before_execute(|worker| println!("worker {} picked up a task.", worker))
///     .listener_after_execute(|worker, outcome| {
///         if let TaskOutcome::Panicked(msg) = outcome {
///             eprintln!("task on worker {} panicked: {}", worker, msg);
///         }
///     })
///     .thread_factory_fn(|id| {
///         std::thread::Builder::new()
///             .name(format!("io-{}", id))
///             .stack_size(1024 * 64)
///     })
///     .build()
///     .unwrap();
///
/// assert_eq!(7, thread_pool.config().max_pool_size);
/// ```
pub struct ThreadPoolBuilder {
    pub(crate) core_pool_size: usize,
    pub(crate) max_pool_size: Option<usize>,
    pub(crate) max_queue_size: usize,
    pub(crate) task_listeners: TaskListeners,
    pub(crate) thread_factory: Arc<ThreadFactory>,
}

impl Default for ThreadPoolBuilder {
    /// Creates a new builder with the default configuration.
    ///
    /// # Default Configuration
    /// - `core_pool_size`: the number of logical cores of the current
    /// system
    /// - `max_pool_size`: twice the `core_pool_size`
    /// - `max_queue_size`: 100
    /// - `before_execute`: an empty closure `|_| ()`
    /// - `after_execute`: an empty closure `|_, _| ()`
    /// - `thread_factory`: names each thread `pool-worker-{id}`
    fn default() -> Self {
        Self {
            core_pool_size: num_cpus::get(),
            max_pool_size: None,
            max_queue_size: PoolConfig::DEFAULT_MAX_QUEUE_SIZE,
            task_listeners: TaskListeners::default(),
            thread_factory: Arc::new(|id: usize| {
                thread::Builder::new().name(format!("pool-worker-{id}"))
            }),
        }
    }
}

impl ThreadPoolBuilder {
    /// Creates the base configuration for the new thread pool.
    ///
    /// See: [`ThreadPoolBuilder::default`]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of core threads.
    #[must_use]
    pub fn core_pool_size(mut self, size: usize) -> Self {
        self.core_pool_size = size;
        self
    }

    /// Sets the maximum allowed number of threads. Unless set, it is
    /// twice the number of core threads.
    #[must_use]
    pub fn max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = Some(size);
        self
    }

    /// Sets how many tasks may wait in the queue before burst threads
    /// are started.
    #[must_use]
    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    /// Sets the listener function that will be invoked on a worker
    /// thread before it runs a task. It receives the worker id.
    #[must_use]
    pub fn listener_before_execute<F>(mut self, listener: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.task_listeners.before_execute = Box::new(listener);
        self
    }

    /// Sets the listener function that will be invoked on a worker
    /// thread after a task returned or panicked.
    #[must_use]
    pub fn listener_after_execute<F>(mut self, listener: F) -> Self
    where
        F: Fn(usize, &TaskOutcome) + Send + Sync + 'static,
    {
        self.task_listeners.after_execute = Box::new(listener);
        self
    }

    /// Sets the factory function that is used to create a new custom
    /// thread for the worker with the given id.
    #[must_use]
    pub fn thread_factory_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) -> thread::Builder + Send + Sync + 'static,
    {
        self.thread_factory = Arc::new(f);
        self
    }

    fn config(&self) -> PoolConfig {
        let mut config = PoolConfig::with_core(self.core_pool_size);
        if let Some(max_pool_size) = self.max_pool_size {
            config.max_pool_size = max_pool_size;
        }
        config.max_queue_size = self.max_queue_size;
        config
    }

    /// Creates a thread pool with the arguments. No threads are started
    /// until the first task is submitted.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if any size is 0 or
    /// `max_pool_size < core_pool_size`.
    ///
    /// [`PoolError::InvalidConfig`]: crate::PoolError::InvalidConfig
    pub fn build(self) -> Result<ThreadPool> {
        let config = self.config();
        config.validate()?;
        Ok(ThreadPool::from_parts(
            config,
            self.task_listeners,
            self.thread_factory,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::ThreadPoolBuilder;
    use crate::PoolError;

    #[test]
    fn test_builder_args1() {
        let result = ThreadPoolBuilder::default()
            .core_pool_size(7)
            .max_pool_size(6)
            .build();
        assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_args2() {
        let result = ThreadPoolBuilder::default().core_pool_size(0).build();
        assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_args3() {
        let result = ThreadPoolBuilder::default().max_queue_size(0).build();
        assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn test_max_pool_size_follows_core() {
        let pool = ThreadPoolBuilder::new().core_pool_size(3).build().unwrap();
        assert_eq!(6, pool.config().max_pool_size);
        assert_eq!(100, pool.config().max_queue_size);

        let pool = ThreadPoolBuilder::new()
            .max_pool_size(5)
            .core_pool_size(5)
            .build()
            .unwrap();
        assert_eq!(5, pool.config().max_pool_size);
    }

    #[test]
    fn test_default_core_size() {
        let pool = ThreadPoolBuilder::default().build().unwrap();
        assert_eq!(num_cpus::get(), pool.config().core_pool_size);
        assert_eq!(0, pool.size());
    }
}
