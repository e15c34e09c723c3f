use std::sync::Arc;

use kurbo::{Affine, Rect, Vec2};

use crate::{
    config::OriginRounding,
    foundation::{core::RelFrame, error::FramixResult},
    render::{
        effects::{self, RasterEffect},
        gpu::{GpuContext, GpuEffect},
        surface::{BlendMode, Surface},
    },
    scene::node::NodeRef,
};

/// Self-contained snapshot of everything needed to rasterize one node at one
/// frame, plus the render result once processing finished.
///
/// A snapshot is taken on the owning thread, processed on a worker without
/// touching the live node, and published back afterwards. Fields are public:
/// customizers and scene integration mutate the snapshot freely before
/// dispatch, never after.
#[derive(Clone, Debug)]
pub struct RenderData {
    /// Frame this snapshot was taken at, relative to the node's timeline.
    pub rel_frame: RelFrame,
    /// Fractional frame override for sub-frame sampling (motion blur).
    pub custom_rel_frame: Option<f64>,
    /// Node bounds in its local space.
    pub rel_bounding_rect: Rect,
    /// Node-to-scene transform.
    pub transform: Affine,
    /// Scene resolution factor (1.0 = full size).
    pub resolution: f64,
    /// Overall opacity in [0, 1].
    pub opacity: f64,
    /// Blend mode used when the parent composites this result.
    pub blend_mode: BlendMode,
    /// Base margin in scene pixels (shadow reach, stroke overshoot).
    pub base_margin: f64,
    /// Clip region in scene space; `None` leaves the render unclipped.
    pub max_bounds: Option<Rect>,
    /// CPU pixel effects, applied after drawing and then cleared.
    pub raster_effects: Vec<RasterEffect>,
    /// GPU pixel effects; their presence routes the task to the GPU stream.
    pub gpu_effects: Vec<GpuEffect>,
    /// Extra device-space regions the result must cover (motion-blur trails).
    pub other_global_rects: Vec<Rect>,
    /// Rasterized result, present once rendered.
    pub image: Option<Arc<Surface>>,
    /// Device pixel the image's top-left corner lands on.
    pub draw_pos: (i32, i32),
    /// Device-space region the image covers, snapped to whole pixels.
    pub global_rect: Rect,
    /// Whether `render_to_image` already ran; re-renders are no-ops.
    pub rendered: bool,
}

impl RenderData {
    /// Fresh snapshot for `rel_frame` with neutral settings.
    pub fn new(rel_frame: RelFrame) -> Self {
        Self {
            rel_frame,
            custom_rel_frame: None,
            rel_bounding_rect: Rect::ZERO,
            transform: Affine::IDENTITY,
            resolution: 1.0,
            opacity: 1.0,
            blend_mode: BlendMode::default(),
            base_margin: 0.0,
            max_bounds: None,
            raster_effects: Vec::new(),
            gpu_effects: Vec::new(),
            other_global_rects: Vec::new(),
            image: None,
            draw_pos: (0, 0),
            global_rect: Rect::ZERO,
            rendered: false,
        }
    }

    /// The frame to sample animated values at: the fractional override when
    /// set, otherwise the integer frame.
    pub fn fractional_frame(&self) -> f64 {
        self.custom_rel_frame.unwrap_or(self.rel_frame.0 as f64)
    }

    /// Total margin in scene pixels: the base margin plus every effect's.
    pub fn total_margin(&self) -> f64 {
        self.base_margin
            + effects::total_margin(&self.raster_effects)
            + self.gpu_effects.iter().map(|e| e.margin).sum::<f64>()
    }

    /// Copy render settings (not results) from `src` into this snapshot.
    pub fn copy_settings_from(&mut self, src: &RenderData) {
        self.custom_rel_frame = src.custom_rel_frame;
        self.rel_bounding_rect = src.rel_bounding_rect;
        self.transform = src.transform;
        self.resolution = src.resolution;
        self.opacity = src.opacity;
        self.blend_mode = src.blend_mode;
        self.base_margin = src.base_margin;
        self.max_bounds = src.max_bounds;
        self.raster_effects = src.raster_effects.clone();
        self.gpu_effects = src.gpu_effects.clone();
        self.other_global_rects = src.other_global_rects.clone();
    }

    /// New unrendered snapshot of the node's concrete kind carrying this
    /// snapshot's settings; `None` when the node is gone.
    ///
    /// Motion-blur sub-samples start from copies so the original result stays
    /// untouched.
    pub fn make_copy(&self, node: &NodeRef) -> Option<RenderData> {
        let node = node.upgrade()?;
        let guard = node.read().ok()?;
        let mut copy = guard.create_render_data(self.rel_frame);
        copy.copy_settings_from(self);
        Some(copy)
    }

    /// Device-space transform: scene resolution applied on top of the node
    /// transform.
    pub fn device_transform(&self) -> Affine {
        Affine::scale(self.resolution) * self.transform
    }

    /// Rasterize the snapshot: size and place the target surface, draw the
    /// node content through `draw`, then run GPU and raster effects.
    ///
    /// Near-zero opacity (below `threshold`) short-circuits to an empty
    /// result. The draw origin snaps to a whole device pixel per `rounding`;
    /// the fractional remainder folds into the transform handed to `draw`, so
    /// content never shifts by a sub-pixel between frames.
    pub fn render_to_image<F>(
        &mut self,
        draw: F,
        mut gpu: Option<&mut dyn GpuContext>,
        threshold: f64,
        rounding: OriginRounding,
    ) -> FramixResult<()>
    where
        F: Fn(&mut Surface, Affine),
    {
        if self.rendered {
            return Ok(());
        }
        if self.opacity < threshold {
            self.set_empty_result();
            return Ok(());
        }

        let device = self.device_transform();
        let mut global = device.transform_rect_bbox(self.rel_bounding_rect);
        for r in &self.other_global_rects {
            global = global.union(*r);
        }
        let margin = self.total_margin().ceil();
        global = global.inflate(margin, margin);
        if let Some(bounds) = self.max_bounds {
            let scaled = Affine::scale(self.resolution).transform_rect_bbox(bounds);
            global = global.intersect(scaled);
        }
        if global.width() <= 0.0 || global.height() <= 0.0 {
            self.set_empty_result();
            return Ok(());
        }

        let width = global.width().ceil() as u32;
        let height = global.height().ceil() as u32;
        let origin_x = rounding.apply(global.x0);
        let origin_y = rounding.apply(global.y0);
        self.draw_pos = (origin_x as i32, origin_y as i32);
        self.global_rect = Rect::new(
            origin_x,
            origin_y,
            origin_x + f64::from(width),
            origin_y + f64::from(height),
        );

        // Sub-pixel remainder stays in the transform.
        let render_transform = Affine::translate(Vec2::new(-origin_x, -origin_y)) * device;

        let mut surface = Surface::new(width, height);
        draw(&mut surface, render_transform);

        if let Some(ctx) = gpu.as_deref_mut() {
            for effect in &mut self.gpu_effects {
                effect.apply(&mut *ctx, &mut surface)?;
            }
        }
        for effect in &self.raster_effects {
            effect.apply(&mut surface)?;
        }
        // Effects ran; a re-render of this snapshot must not apply them twice.
        self.raster_effects.clear();

        self.image = Some(Arc::new(surface));
        self.rendered = true;
        Ok(())
    }

    fn set_empty_result(&mut self) {
        self.image = Some(Arc::new(Surface::new(0, 0)));
        self.draw_pos = (0, 0);
        self.global_rect = Rect::ZERO;
        self.rendered = true;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/data.rs"]
mod tests;
