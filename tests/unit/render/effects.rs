use super::*;

use crate::render::surface::Rgba8Premul;

fn uniform_surface(w: u32, h: u32, px: Rgba8Premul) -> Surface {
    let mut surface = Surface::new(w, h);
    for y in 0..h {
        for x in 0..w {
            surface.set_pixel(x, y, px).unwrap();
        }
    }
    surface
}

#[test]
fn margins_reflect_the_effect_reach() {
    let blur = RasterEffect::Blur { radius: 3, sigma: 1.5 };
    let bright = RasterEffect::Brighten { delta: 20 };
    assert_eq!(blur.margin(), 3.0);
    assert_eq!(bright.margin(), 0.0);
    assert_eq!(total_margin(&[blur, bright.clone(), bright]), 3.0);
}

#[test]
fn brighten_scales_the_delta_by_alpha() {
    let mut surface = uniform_surface(1, 1, Rgba8Premul { r: 50, g: 0, b: 0, a: 128 });
    RasterEffect::Brighten { delta: 10 }.apply(&mut surface).unwrap();

    let px = surface.pixel(0, 0).unwrap();
    // delta 10 at alpha 128 adds floor((10 * 128 + 127) / 255) = 5.
    assert_eq!(px, Rgba8Premul { r: 55, g: 5, b: 5, a: 128 });
}

#[test]
fn brighten_never_exceeds_the_alpha_channel() {
    let mut surface = uniform_surface(1, 1, Rgba8Premul { r: 250, g: 0, b: 0, a: 255 });
    RasterEffect::Brighten { delta: 100 }.apply(&mut surface).unwrap();
    assert_eq!(surface.pixel(0, 0).unwrap().r, 255);

    let mut dim = uniform_surface(1, 1, Rgba8Premul { r: 100, g: 0, b: 0, a: 100 });
    RasterEffect::Brighten { delta: 100 }.apply(&mut dim).unwrap();
    // Premultiplied channels stay <= alpha.
    assert_eq!(dim.pixel(0, 0).unwrap().r, 100);
}

#[test]
fn darken_clamps_at_zero() {
    let mut surface = uniform_surface(1, 1, Rgba8Premul { r: 10, g: 200, b: 0, a: 255 });
    RasterEffect::Brighten { delta: -50 }.apply(&mut surface).unwrap();
    let px = surface.pixel(0, 0).unwrap();
    // delta -50 at full alpha subtracts 49 after rounding toward zero.
    assert_eq!(px.r, 0);
    assert_eq!(px.g, 151);
}

#[test]
fn blur_with_zero_radius_is_identity() {
    let mut surface = uniform_surface(2, 2, Rgba8Premul { r: 10, g: 20, b: 30, a: 255 });
    let before = surface.clone();
    RasterEffect::Blur { radius: 0, sigma: 1.0 }.apply(&mut surface).unwrap();
    assert_eq!(surface, before);
}

#[test]
fn blur_leaves_a_uniform_surface_unchanged() {
    let px = Rgba8Premul { r: 200, g: 100, b: 50, a: 255 };
    let mut surface = uniform_surface(5, 5, px);
    RasterEffect::Blur { radius: 2, sigma: 1.0 }.apply(&mut surface).unwrap();

    // A normalized kernel over constant input reproduces the constant.
    for y in 0..5 {
        for x in 0..5 {
            assert_eq!(surface.pixel(x, y).unwrap(), px, "pixel ({x},{y})");
        }
    }
}

#[test]
fn blur_spreads_an_impulse_symmetrically() {
    let mut surface = Surface::new(5, 5);
    surface
        .set_pixel(2, 2, Rgba8Premul { r: 0, g: 0, b: 0, a: 255 })
        .unwrap();
    RasterEffect::Blur { radius: 1, sigma: 0.8 }.apply(&mut surface).unwrap();

    let center = surface.pixel(2, 2).unwrap().a;
    let left = surface.pixel(1, 2).unwrap().a;
    let right = surface.pixel(3, 2).unwrap().a;
    let up = surface.pixel(2, 1).unwrap().a;
    assert!(center > left);
    assert_eq!(left, right);
    assert_eq!(left, up);
    assert!(left > 0);
}

#[test]
fn blur_rejects_a_degenerate_sigma() {
    let mut surface = uniform_surface(2, 2, Rgba8Premul::transparent());
    assert!(RasterEffect::Blur { radius: 1, sigma: 0.0 }.apply(&mut surface).is_err());
    assert!(RasterEffect::Blur { radius: 1, sigma: f32::NAN }.apply(&mut surface).is_err());
}

#[test]
fn effects_on_an_empty_surface_are_no_ops() {
    let mut surface = Surface::new(0, 0);
    assert!(RasterEffect::Blur { radius: 4, sigma: 2.0 }.apply(&mut surface).is_ok());
    assert!(RasterEffect::Brighten { delta: 5 }.apply(&mut surface).is_ok());
}
