use std::sync::{Arc, Mutex};

use kurbo::Rect;

use crate::{
    cache::handler::CacheHandler,
    config::{EngineConfig, OriginRounding},
    foundation::{core::IndexRange, error::FramixResult},
    render::{customize::RenderCustomizer, data::RenderData, gpu::GpuContext, surface::Surface},
    scene::{node::NodeRef, pending::RenderStamp},
    task::task::Task,
};

/// Shared device-space rect list bridging related renders.
///
/// A motion-blur sub-sample pushes its covered region here after processing;
/// the main render drains the list into its own `other_global_rects` before
/// dispatch so the final image covers the whole trail.
pub type RectAccumulator = Arc<Mutex<Vec<Rect>>>;

/// Renders one `(node, frame)` snapshot and publishes the result.
///
/// The task owns its [`RenderData`] outright. The node is held weakly: a node
/// destroyed mid-flight just loses the notification, nothing dangles. When the
/// carried stamp has been superseded by a newer render for the same frame, the
/// task still completes but skips notify and cache publication.
pub struct RenderDataTask {
    node: NodeRef,
    data: RenderData,
    stamp: RenderStamp,
    customizers: Vec<RenderCustomizer>,
    cache: Option<CacheHandler<Arc<Surface>>>,
    motion_blur_target: Option<RectAccumulator>,
    accumulate_from: Option<RectAccumulator>,
    opacity_skip_threshold: f64,
    origin_rounding: OriginRounding,
}

impl RenderDataTask {
    /// Task rendering `data` for `node` with default policy.
    pub fn new(node: NodeRef, data: RenderData) -> Self {
        let defaults = EngineConfig::default();
        Self {
            node,
            data,
            stamp: RenderStamp::detached(),
            customizers: Vec::new(),
            cache: None,
            motion_blur_target: None,
            accumulate_from: None,
            opacity_skip_threshold: defaults.opacity_skip_threshold,
            origin_rounding: defaults.origin_rounding,
        }
    }

    /// Adopt the skip threshold and origin rounding from `cfg`.
    pub fn with_policy(mut self, cfg: &EngineConfig) -> Self {
        self.opacity_skip_threshold = cfg.opacity_skip_threshold;
        self.origin_rounding = cfg.origin_rounding;
        self
    }

    /// Carry an authoritativeness stamp from the node's pending-render set.
    pub fn with_stamp(mut self, stamp: RenderStamp) -> Self {
        self.stamp = stamp;
        self
    }

    /// Append a pre-dispatch adjustment.
    pub fn with_customizer(mut self, customizer: RenderCustomizer) -> Self {
        self.customizers.push(customizer);
        self
    }

    /// Publish the finished image into `cache` under the snapshot's frame.
    pub fn with_cache(mut self, cache: CacheHandler<Arc<Surface>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// After processing, push the covered device-space rect into `target`.
    pub fn with_motion_blur_target(mut self, target: RectAccumulator) -> Self {
        self.motion_blur_target = Some(target);
        self
    }

    /// Before dispatch, drain `source` into the snapshot's
    /// `other_global_rects`.
    pub fn with_other_rects_from(mut self, source: RectAccumulator) -> Self {
        self.accumulate_from = Some(source);
        self
    }

    /// Read-only view of the snapshot (tests, previews).
    pub fn data(&self) -> &RenderData {
        &self.data
    }

    fn render(&mut self, gpu: Option<&mut dyn GpuContext>) -> FramixResult<()> {
        let node = &self.node;
        self.data.render_to_image(
            |surface, transform| {
                if let Some(node) = node.upgrade()
                    && let Ok(guard) = node.read()
                {
                    guard.draw(surface, transform);
                }
            },
            gpu,
            self.opacity_skip_threshold,
            self.origin_rounding,
        )
    }
}

impl Task for RenderDataTask {
    fn before_processing(&mut self) {
        for customizer in std::mem::take(&mut self.customizers) {
            customizer.customize(&mut self.data);
        }
        if let Some(source) = &self.accumulate_from
            && let Ok(mut rects) = source.lock()
        {
            self.data.other_global_rects.append(&mut rects);
        }
        if let Some(node) = self.node.upgrade()
            && let Ok(mut guard) = node.write()
        {
            guard.nullify_pending_render(self.data.rel_frame);
        }
    }

    fn process(&mut self) -> FramixResult<()> {
        self.render(None)
    }

    fn process_gpu(&mut self, gpu: &mut dyn GpuContext) -> FramixResult<()> {
        self.render(Some(gpu))
    }

    fn after_processing(&mut self) {
        if let Some(target) = &self.motion_blur_target
            && let Ok(mut rects) = target.lock()
        {
            rects.push(self.data.global_rect);
        }
        if !self.stamp.is_authoritative() {
            return;
        }
        if let (Some(cache), Some(image)) = (&self.cache, &self.data.image) {
            cache.add(
                IndexRange::single(self.data.rel_frame.0),
                Arc::clone(image),
            );
        }
        if let Some(node) = self.node.upgrade()
            && let Ok(mut guard) = node.write()
        {
            guard.render_finished(&self.data);
        }
    }

    fn after_canceled(&mut self) {
        if self.stamp.is_authoritative()
            && let Some(node) = self.node.upgrade()
            && let Ok(mut guard) = node.write()
        {
            guard.nullify_pending_render(self.data.rel_frame);
        }
    }

    fn needs_gpu(&self) -> bool {
        self.data.gpu_effects.iter().any(|e| !e.disabled())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/task.rs"]
mod tests;
