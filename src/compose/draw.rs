use image::RgbaImage;

use crate::foundation::core::{Affine, Point};
use crate::foundation::error::{CompositorError, CompositorResult};
use crate::foundation::math::{clamp_u8, mul_div255_u8};

/// One straight-alpha RGBA8 pixel.
pub type Rgba8Px = [u8; 4];

/// Source-over for straight-alpha pixels using fixed-point arithmetic.
pub fn over(dst: Rgba8Px, src: Rgba8Px) -> Rgba8Px {
    let sa = u16::from(src[3]);
    if sa == 0 {
        return dst;
    }
    if sa == 255 {
        return src;
    }

    // Destination coverage left visible under the source.
    let da = u16::from(mul_div255_u8(u16::from(dst[3]), 255 - sa));
    let out_a = sa + da;
    if out_a == 0 {
        return [0, 0, 0, 0];
    }

    let mut out = [0u8; 4];
    for i in 0..3 {
        let num = u32::from(src[i]) * u32::from(sa) + u32::from(dst[i]) * u32::from(da);
        out[i] = ((num + u32::from(out_a) / 2) / u32::from(out_a)).min(255) as u8;
    }
    out[3] = out_a.min(255) as u8;
    out
}

/// Draw `part` onto `canvas` at the origin without scaling, clipped to the canvas.
///
/// `exact` selects the `image` crate's floating-point blend instead of the fixed-point [`over`].
pub fn draw_part(canvas: &mut RgbaImage, part: &RgbaImage, exact: bool) {
    if exact {
        image::imageops::overlay(canvas, part, 0, 0);
        return;
    }

    let w = canvas.width().min(part.width()) as usize;
    let h = canvas.height().min(part.height());
    let canvas_stride = canvas.width() as usize * 4;
    let part_stride = part.width() as usize * 4;
    let src = part.as_raw();
    let dst: &mut [u8] = canvas;

    for y in 0..h as usize {
        let d_row = &mut dst[y * canvas_stride..y * canvas_stride + w * 4];
        let s_row = &src[y * part_stride..y * part_stride + w * 4];
        for (d, s) in d_row.chunks_exact_mut(4).zip(s_row.chunks_exact(4)) {
            let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
            d.copy_from_slice(&out);
        }
    }
}

/// Resample `src` through `transform` into a same-sized image using bilinear filtering.
///
/// `transform` maps source coordinates to destination coordinates. Samples falling outside the
/// source are transparent. Interpolation happens on premultiplied values so transparent
/// neighbours do not darken edges.
pub fn affine_bilinear(src: &RgbaImage, transform: Affine) -> CompositorResult<RgbaImage> {
    let det = transform.determinant();
    if !det.is_finite() || det.abs() < 1e-12 {
        return Err(CompositorError::argument(
            "affine transform is not invertible",
        ));
    }
    let inv = transform.inverse();
    let (w, h) = src.dimensions();
    let mut out = RgbaImage::new(w, h);

    for (x, y, px) in out.enumerate_pixels_mut() {
        let p = inv * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
        px.0 = sample_bilinear(src, p.x - 0.5, p.y - 0.5);
    }
    Ok(out)
}

fn sample_bilinear(src: &RgbaImage, fx: f64, fy: f64) -> Rgba8Px {
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = (fx - x0) as f32;
    let ty = (fy - y0) as f32;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let mut acc = [0f32; 4];
    for (dx, dy, wgt) in [
        (0, 0, (1.0 - tx) * (1.0 - ty)),
        (1, 0, tx * (1.0 - ty)),
        (0, 1, (1.0 - tx) * ty),
        (1, 1, tx * ty),
    ] {
        if wgt <= 0.0 {
            continue;
        }
        let Some([r, g, b, a]) = pixel_at(src, x0 + dx, y0 + dy) else {
            continue;
        };
        let a = f32::from(a);
        let aw = a * wgt;
        acc[0] += f32::from(r) * aw;
        acc[1] += f32::from(g) * aw;
        acc[2] += f32::from(b) * aw;
        acc[3] += aw;
    }

    if acc[3] <= 0.0 {
        return [0, 0, 0, 0];
    }
    [
        clamp_u8(acc[0] / acc[3]),
        clamp_u8(acc[1] / acc[3]),
        clamp_u8(acc[2] / acc[3]),
        clamp_u8(acc[3]),
    ]
}

fn pixel_at(src: &RgbaImage, x: i64, y: i64) -> Option<Rgba8Px> {
    if x < 0 || y < 0 || x >= i64::from(src.width()) || y >= i64::from(src.height()) {
        return None;
    }
    Some(src.get_pixel(x as u32, y as u32).0)
}

#[cfg(test)]
#[path = "../../tests/unit/compose/draw.rs"]
mod tests;
