use kurbo::Affine;

use crate::render::data::RenderData;

/// Declarative adjustment applied to a [`RenderData`] snapshot right before
/// dispatch.
///
/// Customizers are plain values queued alongside the task, applied in order on
/// the owning thread during `before_processing`. Motion-blur sub-samples and
/// transform previews are built from these instead of bespoke task subtypes.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderCustomizer {
    /// Replace the translation component of the snapshot transform, keeping
    /// rotation/scale/shear intact.
    ReplaceTransformDisplacement {
        /// New x translation.
        dx: f64,
        /// New y translation.
        dy: f64,
    },
    /// Pre-multiply the snapshot transform and scale its opacity.
    MultiplyTransform {
        /// Transform applied on top of the snapshot's own.
        transform: Affine,
        /// Opacity factor in [0, 1].
        opacity: f64,
    },
    /// Scale the snapshot opacity only.
    MultiplyOpacity {
        /// Opacity factor in [0, 1].
        opacity: f64,
    },
}

impl RenderCustomizer {
    /// Apply this adjustment to `data`.
    pub fn customize(&self, data: &mut RenderData) {
        match *self {
            Self::ReplaceTransformDisplacement { dx, dy } => {
                let mut c = data.transform.as_coeffs();
                c[4] = dx;
                c[5] = dy;
                data.transform = Affine::new(c);
            }
            Self::MultiplyTransform { transform, opacity } => {
                data.transform = transform * data.transform;
                data.opacity *= opacity;
            }
            Self::MultiplyOpacity { opacity } => {
                data.opacity *= opacity;
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/customize.rs"]
mod tests;
