use super::*;

use crate::foundation::core::RelFrame;

fn base_data() -> RenderData {
    let mut data = RenderData::new(RelFrame(0));
    data.transform = Affine::scale(2.0).then_translate((5.0, 7.0).into());
    data.opacity = 0.8;
    data
}

#[test]
fn replace_displacement_keeps_scale_and_rotation() {
    let mut data = base_data();
    RenderCustomizer::ReplaceTransformDisplacement { dx: 1.0, dy: -2.0 }.customize(&mut data);

    let c = data.transform.as_coeffs();
    assert_eq!(c[0], 2.0);
    assert_eq!(c[3], 2.0);
    assert_eq!(c[4], 1.0);
    assert_eq!(c[5], -2.0);
    assert_eq!(data.opacity, 0.8);
}

#[test]
fn multiply_transform_composes_on_top() {
    let mut data = RenderData::new(RelFrame(0));
    data.transform = Affine::translate((1.0, 0.0));
    RenderCustomizer::MultiplyTransform {
        transform: Affine::scale(3.0),
        opacity: 0.5,
    }
    .customize(&mut data);

    // The extra transform applies after the node's own.
    let p = data.transform * kurbo::Point::new(0.0, 0.0);
    assert_eq!(p, kurbo::Point::new(3.0, 0.0));
    assert_eq!(data.opacity, 0.5);
}

#[test]
fn multiply_opacity_stacks() {
    let mut data = base_data();
    RenderCustomizer::MultiplyOpacity { opacity: 0.5 }.customize(&mut data);
    RenderCustomizer::MultiplyOpacity { opacity: 0.5 }.customize(&mut data);
    assert!((data.opacity - 0.2).abs() < 1e-12);
}
