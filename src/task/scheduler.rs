use std::sync::{Arc, mpsc};

use crate::{
    config::EngineConfig,
    foundation::error::{FramixError, FramixResult},
    render::gpu::GpuContext,
    task::task::{Task, TaskControl, TaskHandle, TaskState},
};

enum Outcome {
    Finished,
    Canceled,
}

struct Completion {
    task: Box<dyn Task>,
    control: Arc<TaskControl>,
    outcome: Outcome,
}

struct WaitingTask {
    task: Box<dyn Task>,
    control: Arc<TaskControl>,
    deps: Vec<TaskHandle>,
}

struct GpuJob {
    task: Box<dyn Task>,
    control: Arc<TaskControl>,
}

/// Dedicated thread owning the rendering context; GPU-tagged tasks execute
/// here one at a time, in queue order.
struct GpuStream {
    tx: Option<mpsc::Sender<GpuJob>>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl GpuStream {
    fn spawn(
        mut context: Box<dyn GpuContext + Send>,
        done_tx: mpsc::Sender<Completion>,
    ) -> FramixResult<Self> {
        let (tx, rx) = mpsc::channel::<GpuJob>();
        let join = std::thread::Builder::new()
            .name("framix-gpu".to_string())
            .spawn(move || {
                for mut job in rx {
                    let outcome = run_task(&mut *job.task, &job.control, Some(&mut *context));
                    let _ = done_tx.send(Completion {
                        task: job.task,
                        control: job.control,
                        outcome,
                    });
                }
            })
            .map_err(|e| FramixError::render(format!("failed to spawn gpu stream: {e}")))?;
        Ok(Self {
            tx: Some(tx),
            join: Some(join),
        })
    }
}

impl Drop for GpuStream {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn run_task(
    task: &mut dyn Task,
    control: &TaskControl,
    gpu: Option<&mut dyn GpuContext>,
) -> Outcome {
    if control.cancel_requested() {
        return Outcome::Canceled;
    }
    control.set_state(TaskState::Processing);
    let result = match gpu {
        Some(ctx) => task.process_gpu(ctx),
        None => task.process(),
    };
    match result {
        Ok(()) => Outcome::Finished,
        Err(e) => {
            // Task-local failure never crosses the scheduler boundary.
            tracing::warn!(task = control.id, error = %e, "task failed, forcing canceled");
            Outcome::Canceled
        }
    }
}

/// Executes [`Task`]s on a bounded CPU worker pool and an optional serialized
/// GPU stream.
///
/// The scheduler is owned by one thread (the "owning thread"); `queue` runs
/// `before_processing` there, workers run `process`, and
/// [`Scheduler::drain_finished`] / [`Scheduler::wait_idle`] run
/// `after_processing` / `after_canceled` back on the owning thread, exactly
/// once per task, in completion-arrival order.
pub struct Scheduler {
    pool: rayon::ThreadPool,
    gpu: Option<GpuStream>,
    done_tx: mpsc::Sender<Completion>,
    done_rx: mpsc::Receiver<Completion>,
    next_id: u64,
    in_flight: usize,
    waiting: Vec<WaitingTask>,
}

impl Scheduler {
    /// Build a scheduler with `workers` CPU threads (`None` lets rayon pick).
    pub fn new(workers: Option<usize>) -> FramixResult<Self> {
        if let Some(n) = workers
            && n == 0
        {
            return Err(FramixError::validation("workers must be >= 1 when set"));
        }

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = workers {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| FramixError::render(format!("failed to build worker pool: {e}")))?;

        let (done_tx, done_rx) = mpsc::channel();
        Ok(Self {
            pool,
            gpu: None,
            done_tx,
            done_rx,
            next_id: 1,
            in_flight: 0,
            waiting: Vec::new(),
        })
    }

    /// Build a scheduler from an [`EngineConfig`].
    pub fn from_config(cfg: &EngineConfig) -> FramixResult<Self> {
        cfg.validate()?;
        Self::new(cfg.workers)
    }

    /// Attach a rendering context; GPU-tagged tasks queued afterwards run on
    /// its serialized stream. Without a context they fall back to the CPU
    /// path (`process`), which skips GPU-only work.
    pub fn set_gpu_context(&mut self, context: Box<dyn GpuContext + Send>) -> FramixResult<()> {
        self.gpu = Some(GpuStream::spawn(context, self.done_tx.clone())?);
        Ok(())
    }

    /// Whether a GPU stream is attached.
    pub fn has_gpu(&self) -> bool {
        self.gpu.is_some()
    }

    /// Queue a task for execution.
    #[tracing::instrument(skip_all)]
    pub fn queue(&mut self, task: Box<dyn Task>) -> TaskHandle {
        self.queue_with_deps(task, Vec::new())
    }

    /// Queue a task that must not start before every handle in `deps` has
    /// reached a terminal state (finished or canceled).
    pub fn queue_with_deps(&mut self, mut task: Box<dyn Task>, deps: Vec<TaskHandle>) -> TaskHandle {
        let control = Arc::new(TaskControl::new(self.next_id));
        self.next_id += 1;

        task.before_processing();

        if deps.iter().all(TaskHandle::is_terminal) {
            self.dispatch(task, Arc::clone(&control));
        } else {
            self.waiting.push(WaitingTask {
                task,
                control: Arc::clone(&control),
                deps,
            });
        }
        TaskHandle { control }
    }

    /// Number of tasks dispatched or waiting on dependencies.
    pub fn pending_count(&self) -> usize {
        self.in_flight + self.waiting.len()
    }

    /// Run completion callbacks for every task that has finished so far,
    /// then dispatch any dependency-blocked tasks that became ready.
    #[tracing::instrument(skip_all)]
    pub fn drain_finished(&mut self) {
        while let Ok(completion) = self.done_rx.try_recv() {
            self.handle_completion(completion);
        }
        self.dispatch_ready_waiting();
    }

    /// Block until every queued task has completed and its callbacks ran.
    ///
    /// Waiting tasks whose dependencies can no longer resolve (nothing left
    /// in flight) are canceled rather than leaked.
    pub fn wait_idle(&mut self) {
        loop {
            self.dispatch_ready_waiting();
            if self.in_flight == 0 {
                if self.waiting.is_empty() {
                    return;
                }
                // Unresolvable dependencies: fail the stragglers closed.
                for mut w in self.waiting.drain(..) {
                    w.control.set_state(TaskState::Canceled);
                    w.task.after_canceled();
                }
                return;
            }
            match self.done_rx.recv() {
                Ok(completion) => self.handle_completion(completion),
                Err(_) => return,
            }
        }
    }

    fn dispatch(&mut self, task: Box<dyn Task>, control: Arc<TaskControl>) {
        self.in_flight += 1;
        if task.needs_gpu()
            && let Some(gpu) = &self.gpu
            && let Some(tx) = &gpu.tx
        {
            let _ = tx.send(GpuJob { task, control });
            return;
        }

        let done_tx = self.done_tx.clone();
        let mut task = task;
        self.pool.spawn(move || {
            let outcome = run_task(&mut *task, &control, None);
            let _ = done_tx.send(Completion {
                task,
                control,
                outcome,
            });
        });
    }

    fn dispatch_ready_waiting(&mut self) {
        // Dependencies may form chains; iterate to a fixpoint.
        loop {
            let mut dispatched = false;
            let mut idx = 0;
            while idx < self.waiting.len() {
                if self.waiting[idx].deps.iter().all(TaskHandle::is_terminal) {
                    let w = self.waiting.swap_remove(idx);
                    self.dispatch(w.task, w.control);
                    dispatched = true;
                } else {
                    idx += 1;
                }
            }
            if !dispatched {
                return;
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        let Completion {
            mut task,
            control,
            outcome,
        } = completion;
        self.in_flight = self.in_flight.saturating_sub(1);
        match outcome {
            Outcome::Finished => {
                control.set_state(TaskState::Finished);
                task.after_processing();
            }
            Outcome::Canceled => {
                control.set_state(TaskState::Canceled);
                task.after_canceled();
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/task/scheduler.rs"]
mod tests;
