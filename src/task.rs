use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
};

use tracing::error;

use crate::CancellationToken;

type TaskFn = Box<dyn FnOnce(&CancellationToken) + Send + 'static>;

/// How a task's execution ended, as seen by the after-execute listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The task returned normally.
    Completed,

    /// The task panicked. The worker caught the panic and keeps running;
    /// this holds the panic message.
    Panicked(String),
}

pub(crate) struct TaskListeners {
    pub(crate) before_execute: Box<dyn Fn(usize) + Send + Sync>,
    pub(crate) after_execute: Box<dyn Fn(usize, &TaskOutcome) + Send + Sync>,
}

impl Default for TaskListeners {
    fn default() -> Self {
        Self {
            before_execute: Box::new(|_: usize| {}),
            after_execute: Box::new(|_: usize, _: &TaskOutcome| {}),
        }
    }
}

pub(crate) struct Task {
    task_fn: TaskFn,
}

impl Task {
    pub(crate) fn create<F>(task_fn: F) -> Self
    where
        F: FnOnce(&CancellationToken) + Send + 'static,
    {
        Self {
            task_fn: Box::new(task_fn),
        }
    }

    /// Runs the task on the worker `worker_id`, containing any panic it
    /// or either listener raises.
    pub(crate) fn run(
        self,
        worker_id: usize,
        token: &CancellationToken,
        listeners: &TaskListeners,
    ) -> TaskOutcome {
        if let Err(message) = guarded(|| (listeners.before_execute)(worker_id)) {
            error!(worker = worker_id, panic = %message, "before-execute listener panicked");
        }
        let task_fn = self.task_fn;
        let outcome = match guarded(|| task_fn(token)) {
            Ok(()) => TaskOutcome::Completed,
            Err(message) => {
                error!(worker = worker_id, panic = %message, "task panicked");
                TaskOutcome::Panicked(message)
            }
        };
        if let Err(message) = guarded(|| (listeners.after_execute)(worker_id, &outcome)) {
            error!(worker = worker_id, panic = %message, "after-execute listener panicked");
        }
        outcome
    }
}

fn guarded<F: FnOnce()>(f: F) -> Result<(), String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
