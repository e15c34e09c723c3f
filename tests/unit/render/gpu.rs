use std::sync::{Arc, Mutex};

use super::*;
use crate::foundation::error::FramixError;

#[derive(Default)]
struct MockGpu {
    calls: Arc<Mutex<Vec<&'static str>>>,
    fail_compile: bool,
    fail_run: bool,
    next_id: u64,
}

impl MockGpu {
    fn record(&self, call: &'static str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl GpuContext for MockGpu {
    fn compile_program(&mut self, _source: &str) -> FramixResult<ProgramId> {
        self.record("compile");
        if self.fail_compile {
            return Err(FramixError::render("compile failed"));
        }
        self.next_id += 1;
        Ok(ProgramId(self.next_id))
    }

    fn release_program(&mut self, _id: ProgramId) {
        self.record("release");
    }

    fn run_program(
        &mut self,
        _id: ProgramId,
        _surface: &mut Surface,
        _uniforms: &[(String, f64)],
    ) -> FramixResult<()> {
        self.record("run");
        if self.fail_run {
            return Err(FramixError::render("run failed"));
        }
        Ok(())
    }
}

fn calls(gpu: &MockGpu) -> Vec<&'static str> {
    gpu.calls.lock().map(|c| c.clone()).unwrap_or_default()
}

#[test]
fn program_compiles_once_and_runs_per_apply() {
    let mut gpu = MockGpu::default();
    let mut effect = GpuEffect::new("shader", vec![("radius".into(), 2.0)], 2.0);
    let mut surface = Surface::new(4, 4);

    effect.apply(&mut gpu, &mut surface).unwrap();
    effect.apply(&mut gpu, &mut surface).unwrap();

    assert_eq!(calls(&gpu), vec!["compile", "run", "run"]);
    assert!(!effect.disabled());
}

#[test]
fn compile_failure_disables_the_effect_without_failing() {
    let mut gpu = MockGpu {
        fail_compile: true,
        ..MockGpu::default()
    };
    let mut effect = GpuEffect::new("bad shader", Vec::new(), 0.0);
    let mut surface = Surface::new(4, 4);

    assert!(effect.apply(&mut gpu, &mut surface).is_ok());
    assert!(effect.disabled());

    // Disabled means permanently: no further compile attempts.
    assert!(effect.apply(&mut gpu, &mut surface).is_ok());
    assert_eq!(calls(&gpu), vec!["compile"]);
}

#[test]
fn run_failure_releases_the_program_and_disables() {
    let mut gpu = MockGpu {
        fail_run: true,
        ..MockGpu::default()
    };
    let mut effect = GpuEffect::new("shader", Vec::new(), 0.0);
    let mut surface = Surface::new(4, 4);

    assert!(effect.apply(&mut gpu, &mut surface).is_ok());
    assert!(effect.disabled());
    assert_eq!(calls(&gpu), vec!["compile", "run", "release"]);

    assert!(effect.apply(&mut gpu, &mut surface).is_ok());
    assert_eq!(calls(&gpu), vec!["compile", "run", "release"]);
}
