use std::{
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, trace};

use crate::{queue::TaskQueue, task::TaskListeners, CancellationToken, ThreadFactory};

/// State shared by every worker of one pool.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub(crate) queue: Arc<TaskQueue>,
    pub(crate) listeners: Arc<TaskListeners>,
    pub(crate) thread_factory: Arc<ThreadFactory>,
    /// Number of workers currently executing a task.
    pub(crate) active: Arc<AtomicUsize>,
}

/// A worker holds a thread handle and the token that stops it.
pub(crate) struct Worker {
    pub(crate) id: usize,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
    // Disconnected when the worker thread exits, including by unwinding.
    exited: Receiver<()>,
}

/// Counts a worker as active while the guard lives, and releases the
/// count even when unwinding.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    fn enter(active: &'a AtomicUsize) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self(active)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn run_loop(id: usize, ctx: &WorkerContext, token: &CancellationToken) {
    debug!(worker = id, "worker started");
    while let Some(task) = ctx.queue.take(token) {
        trace!(worker = id, "executing task");
        let _active = ActiveGuard::enter(&ctx.active);
        task.run(id, token, &ctx.listeners);
    }
    debug!(worker = id, "worker stopped");
}

impl Worker {
    /// Spawns a new worker thread bound to the context's queue.
    pub(crate) fn start(id: usize, ctx: &WorkerContext) -> io::Result<Self> {
        let token = CancellationToken::new();
        let (exit_guard, exited) = bounded::<()>(0);
        let worker_ctx = ctx.clone();
        let worker_token = token.clone();
        let handle = (ctx.thread_factory)(id).spawn(move || {
            let _exit_guard: Sender<()> = exit_guard;
            run_loop(id, &worker_ctx, &worker_token);
        })?;

        Ok(Self {
            id,
            token,
            handle: Some(handle),
            exited,
        })
    }

    /// Asks the worker to stop. An idle worker wakes up and exits; a
    /// running task observes the cancellation through its token and the
    /// worker exits once the task returns.
    #[inline]
    pub(crate) fn stop(&self) {
        self.token.cancel();
    }

    #[inline]
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// A receiver that disconnects once the worker thread exits, or
    /// `None` when called from the worker's own thread.
    pub(crate) fn exit_signal(&self) -> Option<Receiver<()>> {
        (!self.is_current()).then(|| self.exited.clone())
    }

    fn is_current(&self) -> bool {
        self.handle
            .as_ref()
            .map_or(false, |handle| handle.thread().id() == thread::current().id())
    }

    /// Waits for the worker thread to finish. Joining the worker from its
    /// own thread returns immediately.
    pub(crate) fn join(mut self) -> thread::Result<()> {
        if self.is_current() {
            return Ok(());
        }
        match self.handle.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }
}
