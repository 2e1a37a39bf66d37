use super::*;

#[test]
fn over_opaque_and_transparent_sources() {
    let dst = [10, 20, 30, 255];
    assert_eq!(over(dst, [1, 2, 3, 255]), [1, 2, 3, 255]);
    assert_eq!(over(dst, [1, 2, 3, 0]), dst);
}

#[test]
fn over_half_alpha_on_opaque_black() {
    let out = over([0, 0, 0, 255], [255, 255, 255, 128]);
    assert_eq!(out, [128, 128, 128, 255]);
}

#[test]
fn over_onto_transparent_keeps_source_color() {
    let out = over([0, 0, 0, 0], [200, 100, 50, 77]);
    assert_eq!(out, [200, 100, 50, 77]);
}

#[test]
fn fixed_and_exact_paths_agree_closely() {
    let mut a = RgbaImage::from_pixel(4, 4, image::Rgba([20, 40, 60, 255]));
    let mut b = a.clone();
    let part = RgbaImage::from_pixel(4, 4, image::Rgba([220, 120, 20, 100]));
    draw_part(&mut a, &part, false);
    draw_part(&mut b, &part, true);
    for (pa, pb) in a.pixels().zip(b.pixels()) {
        for c in 0..4 {
            assert!((i16::from(pa[c]) - i16::from(pb[c])).abs() <= 1, "{pa:?} vs {pb:?}");
        }
    }
}

#[test]
fn oversized_part_is_clipped_and_small_part_stays_at_origin() {
    let mut canvas = RgbaImage::new(3, 2);
    let big = RgbaImage::from_pixel(5, 5, image::Rgba([1, 1, 1, 255]));
    draw_part(&mut canvas, &big, false);
    assert!(canvas.pixels().all(|p| p.0 == [1, 1, 1, 255]));

    let mut canvas = RgbaImage::new(3, 2);
    let small = RgbaImage::from_pixel(1, 1, image::Rgba([9, 9, 9, 255]));
    draw_part(&mut canvas, &small, false);
    assert_eq!(canvas.get_pixel(0, 0).0, [9, 9, 9, 255]);
    assert_eq!(canvas.get_pixel(1, 0).0, [0, 0, 0, 0]);
    assert_eq!(canvas.get_pixel(0, 1).0, [0, 0, 0, 0]);
}

#[test]
fn identity_affine_is_lossless() {
    let mut src = RgbaImage::new(3, 3);
    for (x, y, p) in src.enumerate_pixels_mut() {
        p.0 = [(x * 80) as u8, (y * 80) as u8, 7, 255];
    }
    let out = affine_bilinear(&src, Affine::IDENTITY).unwrap();
    assert_eq!(out, src);
}

#[test]
fn integer_translation_shifts_pixels() {
    let mut src = RgbaImage::new(3, 1);
    src.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
    let out = affine_bilinear(&src, Affine::translate((1.0, 0.0))).unwrap();
    assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 0]);
    assert_eq!(out.get_pixel(1, 0).0, [255, 0, 0, 255]);
}

#[test]
fn half_pixel_translation_blends_neighbours() {
    let mut src = RgbaImage::new(2, 1);
    src.put_pixel(0, 0, image::Rgba([200, 0, 0, 255]));
    src.put_pixel(1, 0, image::Rgba([0, 0, 200, 255]));
    let out = affine_bilinear(&src, Affine::translate((0.5, 0.0))).unwrap();
    assert_eq!(out.get_pixel(1, 0).0, [100, 0, 100, 255]);
}

#[test]
fn singular_matrix_is_rejected() {
    let src = RgbaImage::new(2, 2);
    let err = affine_bilinear(&src, Affine::new([0.0, 0.0, 0.0, 0.0, 1.0, 1.0])).unwrap_err();
    assert!(matches!(err, CompositorError::Argument(_)));
}
