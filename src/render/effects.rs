use crate::{
    foundation::error::{FramixError, FramixResult},
    render::surface::Surface,
};

/// Raster effect descriptor applied to rendered pixels.
///
/// Effects run in list order, at most once per render: the carrying
/// [`RenderData`](crate::RenderData) clears its effect list after applying.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RasterEffect {
    /// Separable gaussian blur.
    Blur {
        /// Kernel radius in pixels.
        radius: u32,
        /// Gaussian sigma; must be finite and > 0.
        sigma: f32,
    },
    /// Add `delta` to each color channel, scaled by alpha to keep the
    /// premultiplied invariant.
    Brighten {
        /// Per-channel offset in straight-alpha units, [-255, 255].
        delta: i16,
    },
}

impl RasterEffect {
    /// Extra pixels the effect needs beyond the node's geometric bounds.
    pub fn margin(&self) -> f64 {
        match self {
            Self::Blur { radius, .. } => f64::from(*radius),
            Self::Brighten { .. } => 0.0,
        }
    }

    /// Apply the effect to `surface` in place.
    pub fn apply(&self, surface: &mut Surface) -> FramixResult<()> {
        if surface.is_empty() {
            return Ok(());
        }
        match self {
            Self::Blur { radius, sigma } => blur_premul(surface, *radius, *sigma),
            Self::Brighten { delta } => {
                brighten_premul(surface, *delta);
                Ok(())
            }
        }
    }
}

/// Sum of margins over an effect list (effects stack, so margins add).
pub(crate) fn total_margin(effects: &[RasterEffect]) -> f64 {
    effects.iter().map(RasterEffect::margin).sum()
}

fn brighten_premul(surface: &mut Surface, delta: i16) {
    let delta = i32::from(delta.clamp(-255, 255));
    for px in surface.data_mut().chunks_exact_mut(4) {
        let a = i32::from(px[3]);
        let scaled = (delta * a + 127) / 255;
        for c in px.iter_mut().take(3) {
            *c = (i32::from(*c) + scaled).clamp(0, a) as u8;
        }
    }
}

fn blur_premul(surface: &mut Surface, radius: u32, sigma: f32) -> FramixResult<()> {
    if radius == 0 {
        return Ok(());
    }
    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let width = surface.width();
    let height = surface.height();

    let mut tmp = vec![0u8; surface.data().len()];
    separable_pass(surface.data(), &mut tmp, width, height, &kernel, true);
    let mut out = vec![0u8; surface.data().len()];
    separable_pass(&tmp, &mut out, width, height, &kernel, false);
    surface.data_mut().copy_from_slice(&out);
    Ok(())
}

/// Q16 fixed-point gaussian weights summing to exactly 1<<16.
fn gaussian_kernel_q16(radius: u32, sigma: f32) -> FramixResult<Vec<u32>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(FramixError::validation("blur sigma must be > 0"));
    }

    let r = radius as i32;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    for i in -r..=r {
        let x = f64::from(i);
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }
    if sum <= 0.0 {
        return Err(FramixError::render("gaussian kernel sum is zero"));
    }

    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    // Fold the rounding residue into the center tap so the kernel is
    // exactly normalized.
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        let mid_val = i64::from(weights[mid]);
        weights[mid] = (mid_val + delta).clamp(0, 65536) as u32;
    }

    Ok(weights)
}

fn separable_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32], horizontal: bool) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let d = ki as i32 - radius;
                let (sx, sy) = if horizontal {
                    ((x + d).clamp(0, w - 1), y)
                } else {
                    (x, (y + d).clamp(0, h - 1))
                };
                let idx = ((sy * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    let v = (acc + 32768) >> 16;
    v.min(255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/render/effects.rs"]
mod tests;
