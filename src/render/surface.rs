use std::sync::Arc;

use anyhow::Context;
use image::ImageEncoder;
use kurbo::{Affine, Point, Rect};

use crate::{
    cache::container::CachePayload,
    foundation::{
        error::{FramixError, FramixResult},
        math::mul_div255_u8,
    },
};

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel, premultiplied.
    pub r: u8,
    /// Green channel, premultiplied.
    pub g: u8,
    /// Blue channel, premultiplied.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Premultiply a straight-alpha color.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: mul_div255_u8(u16::from(r), u16::from(a)),
            g: mul_div255_u8(u16::from(g), u16::from(a)),
            b: mul_div255_u8(u16::from(b), u16::from(a)),
            a,
        }
    }
}

/// Blend mode used when compositing a rendered image over its parent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// Standard source-over-destination (premultiplied alpha).
    #[default]
    SrcOver,
    /// Multiply source and destination.
    Multiply,
    /// Keep destination only where the source has alpha.
    DstIn,
}

/// Rasterization target: premultiplied RGBA8 pixels, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    /// Allocate a transparent surface. A zero-sized surface is a valid empty
    /// render result.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; (width as usize) * (height as usize) * 4],
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether the surface holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Raw premultiplied RGBA8 bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw bytes, for in-place effects.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Resident footprint estimate in bytes.
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Read one pixel; indices beyond bounds are a contract violation.
    pub fn pixel(&self, x: u32, y: u32) -> FramixResult<Rgba8Premul> {
        let idx = self.index_of(x, y)?;
        Ok(Rgba8Premul {
            r: self.data[idx],
            g: self.data[idx + 1],
            b: self.data[idx + 2],
            a: self.data[idx + 3],
        })
    }

    /// Write one pixel; indices beyond bounds are a contract violation.
    pub fn set_pixel(&mut self, x: u32, y: u32, px: Rgba8Premul) -> FramixResult<()> {
        let idx = self.index_of(x, y)?;
        self.data[idx] = px.r;
        self.data[idx + 1] = px.g;
        self.data[idx + 2] = px.b;
        self.data[idx + 3] = px.a;
        Ok(())
    }

    fn index_of(&self, x: u32, y: u32) -> FramixResult<usize> {
        if x >= self.width || y >= self.height {
            return Err(FramixError::validation(format!(
                "pixel ({x}, {y}) out of bounds for {}x{} surface",
                self.width, self.height
            )));
        }
        Ok(((y as usize) * (self.width as usize) + (x as usize)) * 4)
    }

    /// Fill `rect` (local space) transformed by `transform`, compositing
    /// `color` src-over. Pixel centers are inverse-mapped, so rotated and
    /// scaled fills stay crisp without a full scanline rasterizer.
    pub fn fill_rect(&mut self, rect: Rect, transform: Affine, color: Rgba8Premul) {
        if self.is_empty() || transform.determinant().abs() < 1e-12 {
            return;
        }
        let inv = transform.inverse();
        let bbox = transform.transform_rect_bbox(rect);
        let x0 = bbox.x0.floor().max(0.0) as u32;
        let y0 = bbox.y0.floor().max(0.0) as u32;
        let x1 = (bbox.x1.ceil().max(0.0) as u32).min(self.width);
        let y1 = (bbox.y1.ceil().max(0.0) as u32).min(self.height);

        for y in y0..y1 {
            for x in x0..x1 {
                let local = inv * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                if rect.contains(local) {
                    let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
                    blend_px(&mut self.data[idx..idx + 4], color, BlendMode::SrcOver);
                }
            }
        }
    }

    /// Composite `src` over this surface with its top-left at `(x, y)`.
    pub fn draw_image(&mut self, src: &Surface, x: i32, y: i32, opacity: f64, blend: BlendMode) {
        let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u16;
        if alpha == 0 {
            return;
        }
        for sy in 0..src.height {
            let dy = y + sy as i32;
            if dy < 0 || dy >= self.height as i32 {
                continue;
            }
            for sx in 0..src.width {
                let dx = x + sx as i32;
                if dx < 0 || dx >= self.width as i32 {
                    continue;
                }
                let sidx = ((sy as usize) * (src.width as usize) + (sx as usize)) * 4;
                let mut px = Rgba8Premul {
                    r: src.data[sidx],
                    g: src.data[sidx + 1],
                    b: src.data[sidx + 2],
                    a: src.data[sidx + 3],
                };
                if alpha < 255 {
                    px = Rgba8Premul {
                        r: mul_div255_u8(u16::from(px.r), alpha),
                        g: mul_div255_u8(u16::from(px.g), alpha),
                        b: mul_div255_u8(u16::from(px.b), alpha),
                        a: mul_div255_u8(u16::from(px.a), alpha),
                    };
                }
                let didx = ((dy as usize) * (self.width as usize) + (dx as usize)) * 4;
                blend_px(&mut self.data[didx..didx + 4], px, blend);
            }
        }
    }
}

fn blend_px(dst: &mut [u8], src: Rgba8Premul, blend: BlendMode) {
    let (dr, dg, db, da) = (
        u16::from(dst[0]),
        u16::from(dst[1]),
        u16::from(dst[2]),
        u16::from(dst[3]),
    );
    let (sr, sg, sb, sa) = (
        u16::from(src.r),
        u16::from(src.g),
        u16::from(src.b),
        u16::from(src.a),
    );
    let out = match blend {
        BlendMode::SrcOver => {
            let inv_sa = 255 - sa;
            [
                src.r.saturating_add(mul_div255_u8(dr, inv_sa)),
                src.g.saturating_add(mul_div255_u8(dg, inv_sa)),
                src.b.saturating_add(mul_div255_u8(db, inv_sa)),
                src.a.saturating_add(mul_div255_u8(da, inv_sa)),
            ]
        }
        BlendMode::Multiply => {
            let inv_sa = 255 - sa;
            let inv_da = 255 - da;
            [
                (u16::from(mul_div255_u8(sr, dr))
                    + u16::from(mul_div255_u8(sr, inv_da))
                    + u16::from(mul_div255_u8(dr, inv_sa)))
                .min(255) as u8,
                (u16::from(mul_div255_u8(sg, dg))
                    + u16::from(mul_div255_u8(sg, inv_da))
                    + u16::from(mul_div255_u8(dg, inv_sa)))
                .min(255) as u8,
                (u16::from(mul_div255_u8(sb, db))
                    + u16::from(mul_div255_u8(sb, inv_da))
                    + u16::from(mul_div255_u8(db, inv_sa)))
                .min(255) as u8,
                (u16::from(mul_div255_u8(sa, da))
                    + u16::from(mul_div255_u8(sa, inv_da))
                    + u16::from(mul_div255_u8(da, inv_sa)))
                .min(255) as u8,
            ]
        }
        BlendMode::DstIn => [
            mul_div255_u8(dr, sa),
            mul_div255_u8(dg, sa),
            mul_div255_u8(db, sa),
            mul_div255_u8(da, sa),
        ],
    };
    dst[0] = out[0];
    dst[1] = out[1];
    dst[2] = out[2];
    dst[3] = out[3];
}

/// Spill format: 8-byte LE (width, height) header, then a PNG stream for
/// non-empty surfaces. The header lets empty render results round-trip and
/// guards against decodes that disagree with the recorded dimensions.
impl CachePayload for Arc<Surface> {
    fn size_bytes(&self) -> usize {
        Surface::size_bytes(self)
    }

    fn to_spill_bytes(&self) -> FramixResult<Vec<u8>> {
        let mut out = Vec::with_capacity(16 + self.data.len() / 4);
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        if !self.is_empty() {
            let encoder = image::codecs::png::PngEncoder::new(&mut out);
            encoder
                .write_image(
                    &self.data,
                    self.width,
                    self.height,
                    image::ExtendedColorType::Rgba8,
                )
                .context("encode spilled surface as png")?;
        }
        Ok(out)
    }

    fn from_spill_bytes(bytes: &[u8]) -> FramixResult<Self> {
        if bytes.len() < 8 {
            return Err(FramixError::cache("spilled surface header truncated"));
        }
        let width = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let height = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if width == 0 || height == 0 {
            return Ok(Arc::new(Surface::new(width, height)));
        }
        let decoded = image::load_from_memory_with_format(&bytes[8..], image::ImageFormat::Png)
            .context("decode spilled surface png")?
            .into_rgba8();
        if decoded.width() != width || decoded.height() != height {
            return Err(FramixError::cache(
                "spilled surface dimensions disagree with header",
            ));
        }
        Ok(Arc::new(Surface {
            width,
            height,
            data: decoded.into_raw(),
        }))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
