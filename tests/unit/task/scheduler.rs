use std::sync::{Arc, Mutex, mpsc};

use super::*;
use crate::render::gpu::ProgramId;
use crate::render::surface::Surface;

type Log = Arc<Mutex<Vec<String>>>;

fn log_entry(log: &Log, entry: impl Into<String>) {
    if let Ok(mut l) = log.lock() {
        l.push(entry.into());
    }
}

fn log_snapshot(log: &Log) -> Vec<String> {
    log.lock().map(|l| l.clone()).unwrap_or_default()
}

/// Records every lifecycle callback; optionally fails in `process` and
/// optionally blocks until released through a gate channel.
struct ProbeTask {
    name: &'static str,
    log: Log,
    fail: bool,
    started: Option<mpsc::Sender<()>>,
    gate: Option<mpsc::Receiver<()>>,
}

impl ProbeTask {
    fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: Arc::clone(log),
            fail: false,
            started: None,
            gate: None,
        }
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    fn gated(mut self) -> (Self, mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (started_tx, started_rx) = mpsc::channel();
        let (gate_tx, gate_rx) = mpsc::channel();
        self.started = Some(started_tx);
        self.gate = Some(gate_rx);
        (self, started_rx, gate_tx)
    }
}

impl Task for ProbeTask {
    fn process(&mut self) -> FramixResult<()> {
        if let Some(started) = &self.started {
            let _ = started.send(());
        }
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        log_entry(&self.log, format!("{}:process", self.name));
        if self.fail {
            return Err(FramixError::render("simulated failure"));
        }
        Ok(())
    }

    fn after_processing(&mut self) {
        log_entry(&self.log, format!("{}:after", self.name));
    }

    fn after_canceled(&mut self) {
        log_entry(&self.log, format!("{}:canceled", self.name));
    }
}

#[test]
fn finished_task_publishes_exactly_once() {
    let log: Log = Log::default();
    let mut sched = Scheduler::new(Some(1)).unwrap();
    let handle = sched.queue(Box::new(ProbeTask::new("t", &log)));
    sched.wait_idle();

    assert_eq!(handle.state(), TaskState::Finished);
    assert_eq!(log_snapshot(&log), vec!["t:process", "t:after"]);
    assert_eq!(sched.pending_count(), 0);
}

#[test]
fn process_error_becomes_canceled_with_no_result() {
    let log: Log = Log::default();
    let mut sched = Scheduler::new(Some(1)).unwrap();
    let handle = sched.queue(Box::new(ProbeTask::new("t", &log).failing()));
    sched.wait_idle();

    assert_eq!(handle.state(), TaskState::Canceled);
    assert_eq!(log_snapshot(&log), vec!["t:process", "t:canceled"]);
}

#[test]
fn cancel_before_processing_skips_process_entirely() {
    let log: Log = Log::default();
    let mut sched = Scheduler::new(Some(1)).unwrap();

    // Occupy the only worker so the probe stays queued.
    let (blocker, started_rx, gate_tx) = ProbeTask::new("blocker", &log).gated();
    sched.queue(Box::new(blocker));
    started_rx.recv().unwrap();

    let probe = sched.queue(Box::new(ProbeTask::new("probe", &log)));
    probe.cancel();
    gate_tx.send(()).unwrap();
    sched.wait_idle();

    assert_eq!(probe.state(), TaskState::Canceled);
    let log = log_snapshot(&log);
    assert!(log.contains(&"probe:canceled".to_string()));
    assert!(!log.iter().any(|e| e == "probe:process"));
}

#[test]
fn cancel_after_processing_started_still_publishes() {
    let log: Log = Log::default();
    let mut sched = Scheduler::new(Some(1)).unwrap();

    let (task, started_rx, gate_tx) = ProbeTask::new("t", &log).gated();
    let handle = sched.queue(Box::new(task));
    started_rx.recv().unwrap();

    // Too late: processing has begun, the result must still land.
    handle.cancel();
    gate_tx.send(()).unwrap();
    sched.wait_idle();

    assert_eq!(handle.state(), TaskState::Finished);
    assert_eq!(log_snapshot(&log), vec!["t:process", "t:after"]);
}

#[test]
fn dependent_task_waits_for_its_dependency() {
    let log: Log = Log::default();
    let mut sched = Scheduler::new(Some(2)).unwrap();

    let (dep, started_rx, gate_tx) = ProbeTask::new("a", &log).gated();
    let dep_handle = sched.queue(Box::new(dep));
    started_rx.recv().unwrap();

    let b_handle = sched.queue_with_deps(Box::new(ProbeTask::new("b", &log)), vec![dep_handle]);
    assert_eq!(sched.pending_count(), 2);

    gate_tx.send(()).unwrap();
    sched.wait_idle();

    assert_eq!(b_handle.state(), TaskState::Finished);
    assert_eq!(
        log_snapshot(&log),
        vec!["a:process", "a:after", "b:process", "b:after"]
    );
}

#[test]
fn dependent_task_runs_even_when_the_dependency_cancels() {
    let log: Log = Log::default();
    let mut sched = Scheduler::new(Some(1)).unwrap();

    let dep_handle = sched.queue(Box::new(ProbeTask::new("a", &log).failing()));
    let b_handle = sched.queue_with_deps(Box::new(ProbeTask::new("b", &log)), vec![dep_handle]);
    sched.wait_idle();

    // Terminal means finished OR canceled; the dependent still runs.
    assert_eq!(b_handle.state(), TaskState::Finished);
}

#[test]
fn unresolvable_dependencies_cancel_on_wait_idle() {
    let log: Log = Log::default();
    let mut sched = Scheduler::new(Some(1)).unwrap();
    let mut other = Scheduler::new(Some(1)).unwrap();

    let (foreign, started_rx, gate_tx) = ProbeTask::new("foreign", &log).gated();
    let foreign_handle = other.queue(Box::new(foreign));
    started_rx.recv().unwrap();

    let orphan = sched.queue_with_deps(Box::new(ProbeTask::new("orphan", &log)), vec![foreign_handle]);
    sched.wait_idle();

    assert_eq!(orphan.state(), TaskState::Canceled);
    assert!(log_snapshot(&log).contains(&"orphan:canceled".to_string()));

    gate_tx.send(()).unwrap();
    other.wait_idle();
}

#[test]
fn drain_finished_is_incremental_and_nonblocking() {
    let log: Log = Log::default();
    let mut sched = Scheduler::new(Some(1)).unwrap();
    let handle = sched.queue(Box::new(ProbeTask::new("t", &log)));

    while !handle.is_terminal() {
        sched.drain_finished();
        std::thread::yield_now();
    }
    assert_eq!(handle.state(), TaskState::Finished);
    assert_eq!(log_snapshot(&log), vec!["t:process", "t:after"]);
}

struct NullGpu;

impl GpuContext for NullGpu {
    fn compile_program(&mut self, _source: &str) -> FramixResult<ProgramId> {
        Ok(ProgramId(1))
    }

    fn release_program(&mut self, _id: ProgramId) {}

    fn run_program(
        &mut self,
        _id: ProgramId,
        _surface: &mut Surface,
        _uniforms: &[(String, f64)],
    ) -> FramixResult<()> {
        Ok(())
    }
}

struct GpuProbeTask {
    name: &'static str,
    log: Log,
}

impl Task for GpuProbeTask {
    fn process(&mut self) -> FramixResult<()> {
        log_entry(&self.log, format!("{}:cpu", self.name));
        Ok(())
    }

    fn process_gpu(&mut self, _gpu: &mut dyn GpuContext) -> FramixResult<()> {
        log_entry(&self.log, format!("{}:gpu", self.name));
        Ok(())
    }

    fn needs_gpu(&self) -> bool {
        true
    }
}

#[test]
fn gpu_tasks_route_to_the_gpu_stream_in_queue_order() {
    let log: Log = Log::default();
    let mut sched = Scheduler::new(Some(2)).unwrap();
    sched.set_gpu_context(Box::new(NullGpu)).unwrap();
    assert!(sched.has_gpu());

    sched.queue(Box::new(GpuProbeTask {
        name: "g1",
        log: Arc::clone(&log),
    }));
    sched.queue(Box::new(GpuProbeTask {
        name: "g2",
        log: Arc::clone(&log),
    }));
    sched.wait_idle();

    assert_eq!(log_snapshot(&log), vec!["g1:gpu", "g2:gpu"]);
}

#[test]
fn gpu_tasks_fall_back_to_cpu_without_a_context() {
    let log: Log = Log::default();
    let mut sched = Scheduler::new(Some(1)).unwrap();
    assert!(!sched.has_gpu());

    sched.queue(Box::new(GpuProbeTask {
        name: "g",
        log: Arc::clone(&log),
    }));
    sched.wait_idle();

    assert_eq!(log_snapshot(&log), vec!["g:cpu"]);
}
