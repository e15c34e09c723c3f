use crate::{
    foundation::error::FramixResult,
    render::surface::Surface,
};

/// Identifier of a compiled GPU program inside one [`GpuContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u64);

/// Contract a rendering context must satisfy for GPU-tagged tasks.
///
/// The scheduler routes every GPU task through one serialized execution
/// stream, so implementations never see concurrent calls. Shader compilation
/// details are the implementor's concern; the engine only needs compile, run,
/// and release.
pub trait GpuContext: Send {
    /// Compile a program from source, returning a handle for later runs.
    fn compile_program(&mut self, source: &str) -> FramixResult<ProgramId>;

    /// Release a compiled (or partially created) program.
    fn release_program(&mut self, id: ProgramId);

    /// Run a compiled program over `surface` pixels in place.
    fn run_program(
        &mut self,
        id: ProgramId,
        surface: &mut Surface,
        uniforms: &[(String, f64)],
    ) -> FramixResult<()>;
}

/// One GPU effect instance attached to a render: program source, uniform
/// values, and the lazily compiled program handle.
///
/// Program setup failure permanently disables the instance — the render task
/// itself survives and the effect simply stops contributing.
#[derive(Clone, Debug)]
pub struct GpuEffect {
    /// Program source handed to the context's compiler.
    pub source: String,
    /// Uniform name/value pairs for this instance.
    pub uniforms: Vec<(String, f64)>,
    /// Extra pixels the effect needs beyond the node's geometric bounds.
    pub margin: f64,
    program: Option<ProgramId>,
    disabled: bool,
}

impl GpuEffect {
    /// Build an effect from program source and uniforms.
    pub fn new(source: impl Into<String>, uniforms: Vec<(String, f64)>, margin: f64) -> Self {
        Self {
            source: source.into(),
            uniforms,
            margin,
            program: None,
            disabled: false,
        }
    }

    /// Whether a failed program setup has disabled this instance.
    pub fn disabled(&self) -> bool {
        self.disabled
    }

    /// Apply the effect to `surface`, compiling the program on first use.
    ///
    /// Compile failure releases any partially created program, disables the
    /// instance, and returns `Ok(())`: a broken effect must not fail the
    /// render task that carries it.
    pub fn apply(&mut self, gpu: &mut dyn GpuContext, surface: &mut Surface) -> FramixResult<()> {
        if self.disabled {
            return Ok(());
        }
        let program = match self.program {
            Some(id) => id,
            None => match gpu.compile_program(&self.source) {
                Ok(id) => {
                    self.program = Some(id);
                    id
                }
                Err(e) => {
                    tracing::warn!(error = %e, "gpu program setup failed, disabling effect");
                    self.disabled = true;
                    return Ok(());
                }
            },
        };
        let run = gpu.run_program(program, surface, &self.uniforms);
        if let Err(e) = run {
            tracing::warn!(error = %e, "gpu program run failed, disabling effect");
            gpu.release_program(program);
            self.program = None;
            self.disabled = true;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/gpu.rs"]
mod tests;
