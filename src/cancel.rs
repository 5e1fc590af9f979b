use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

struct Inner {
    cancelled: AtomicBool,
    // Nothing is ever sent; dropping the sender disconnects every clone of
    // the receiver, which wakes all waiters at once.
    trigger: Mutex<Option<Sender<()>>>,
}

/// A cooperative cancellation signal.
///
/// Each worker owns one token. The pool cancels it from
/// [`ThreadPool::shutdown_now`], which wakes the worker if it is idle in
/// the task queue and lets a running task notice it should stop.
///
/// Tasks submitted with [`ThreadPool::execute_cancellable`] receive the
/// token of the worker running them.
///
/// # Examples
///
/// ```
/// use elastic_pool::CancellationToken;
/// use std::time::Duration;
///
/// let token = CancellationToken::new();
/// assert!(!token.wait_timeout(Duration::from_millis(1)));
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// assert!(token.wait_timeout(Duration::from_secs(1)));
/// ```
///
/// [`ThreadPool::shutdown_now`]: crate::ThreadPool::shutdown_now
/// [`ThreadPool::execute_cancellable`]: crate::ThreadPool::execute_cancellable
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
    signal: Receiver<()>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(trigger)),
            }),
            signal,
        }
    }

    /// Cancels the token. Calling this more than once has no further
    /// effect.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner
                .trigger
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
        }
    }

    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// A receiver that becomes disconnected once the token is cancelled.
    ///
    /// It never yields a value, so it is only useful inside
    /// [`crossbeam_channel::select!`] next to other operations.
    #[inline]
    #[must_use]
    pub fn signal(&self) -> &Receiver<()> {
        &self.signal
    }

    /// Blocks the current thread until the token is cancelled.
    pub fn wait(&self) {
        // `recv` only returns once the trigger is dropped.
        let _ = self.signal.recv();
    }

    /// Blocks until the token is cancelled or `timeout` elapses. Returns
    /// `true` if the token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.signal.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }
}
