use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use crate::{foundation::error::FramixResult, render::gpu::GpuContext};

/// Lifecycle state of a scheduled task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Queued with the scheduler, not yet dispatched or still waiting on
    /// dependencies.
    Queued,
    /// `process` is running on a worker or the GPU stream.
    Processing,
    /// Completed; `after_processing` has run.
    Finished,
    /// Canceled before processing started, or failed inside `process`;
    /// `after_canceled` has run and no result was published.
    Canceled,
}

impl TaskState {
    /// Whether the task reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Canceled)
    }
}

/// A unit of asynchronous work with a fixed lifecycle.
///
/// The scheduler calls `before_processing` on the queuing thread (snapshot
/// state that must not race concurrent edits), `process` on a worker thread
/// (or `process_gpu` on the GPU stream when [`Task::needs_gpu`] is true), and
/// finally exactly one of `after_processing`/`after_canceled` back on the
/// owning thread during [`Scheduler::drain_finished`](crate::Scheduler::drain_finished).
///
/// `process` runs uninterrupted to completion: a task must never block
/// mid-process waiting on another task. Declare the dependency at queue time
/// instead and let the scheduler hold the task back until it resolves.
pub trait Task: Send {
    /// Snapshot state on the owning thread before dispatch.
    fn before_processing(&mut self) {}

    /// Do the work on a worker thread. An `Err` is caught at the scheduler
    /// boundary and turns the task into "canceled with no result".
    fn process(&mut self) -> FramixResult<()>;

    /// GPU-stream variant of [`Task::process`]. Defaults to the CPU path.
    fn process_gpu(&mut self, _gpu: &mut dyn GpuContext) -> FramixResult<()> {
        self.process()
    }

    /// Publish results on the owning thread after `process` returned `Ok`.
    fn after_processing(&mut self) {}

    /// Cleanup on the owning thread when the task was canceled or failed.
    fn after_canceled(&mut self) {}

    /// Whether this task must run on the serialized GPU stream.
    fn needs_gpu(&self) -> bool {
        false
    }
}

pub(crate) struct TaskControl {
    pub(crate) id: u64,
    state: Mutex<TaskState>,
    cancel_requested: AtomicBool,
}

impl TaskControl {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            state: Mutex::new(TaskState::Queued),
            cancel_requested: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> TaskState {
        self.state.lock().map(|s| *s).unwrap_or(TaskState::Canceled)
    }

    pub(crate) fn set_state(&self, next: TaskState) {
        if let Ok(mut s) = self.state.lock() {
            *s = next;
        }
    }

    pub(crate) fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::Release);
    }

    pub(crate) fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }
}

/// Shared handle observing and canceling one queued task.
#[derive(Clone)]
pub struct TaskHandle {
    pub(crate) control: Arc<TaskControl>,
}

impl TaskHandle {
    /// Scheduler-unique task id, in queuing order.
    pub fn id(&self) -> u64 {
        self.control.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.control.state()
    }

    /// Request cooperative cancellation.
    ///
    /// Always effective before `process` starts; once processing has begun
    /// the task runs to completion and still publishes its result.
    pub fn cancel(&self) {
        self.control.request_cancel();
    }

    /// Whether the task reached `Finished` or `Canceled`.
    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.control.id)
            .field("state", &self.state())
            .finish()
    }
}
