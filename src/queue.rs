use crossbeam_channel::{select, unbounded, Receiver, Sender};

use crate::{task::Task, CancellationToken};

/// An unbounded FIFO queue of pending tasks shared by all workers.
///
/// The queue has no capacity of its own; the pool's admission control
/// decides whether a task may be put.
pub(crate) struct TaskQueue {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Appends a task at the tail. Never blocks.
    pub(crate) fn put(&self, task: Task) {
        // The queue owns a receiver, so the channel cannot be
        // disconnected while `self` is alive.
        let _ = self.sender.send(task);
    }

    /// Removes the head task, blocking until one is available.
    ///
    /// Returns `None` once `token` is cancelled. A task that is received
    /// concurrently with the cancellation is abandoned.
    pub(crate) fn take(&self, token: &CancellationToken) -> Option<Task> {
        if token.is_cancelled() {
            return None;
        }
        select! {
            recv(self.receiver) -> task => task.ok().filter(|_| !token.is_cancelled()),
            recv(token.signal()) -> _ => None,
        }
    }

    /// A snapshot of the number of pending tasks.
    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.receiver.len()
    }

    /// Drops every pending task and returns how many there were.
    pub(crate) fn clear(&self) -> usize {
        self.receiver.try_iter().count()
    }
}
