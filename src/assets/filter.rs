use image::RgbaImage;

use crate::assets::color::{ColorModel, ColorParams};
use crate::foundation::math::{clamp_u8, luma, unit_to_u8};

/// Apply both conversion stages to `img` in place.
///
/// Stage one runs per pixel: channel replace, color model, gray level, hue/saturation/brightness,
/// contrast and finally the per-channel gamma tables. Stage two is a per-channel linear rescale
/// `v * factor + offset`, alpha included. Pixels are straight (non-premultiplied) RGBA8.
pub fn apply_color_filter(img: &mut RgbaImage, params: &ColorParams, model: ColorModel) {
    if model != ColorModel::Default || !params.is_identity_color() {
        convert_colors(img, params, model);
    }
    if !params.is_identity_rescale() {
        rescale(img, params.factor, params.offset);
    }
}

/// 256-entry lookup tables, one per channel.
pub(crate) struct GammaTables([[u8; 256]; 4]);

impl GammaTables {
    pub(crate) fn new(gamma: [f32; 4]) -> Self {
        let mut tables = [[0u8; 256]; 4];
        for (table, g) in tables.iter_mut().zip(gamma) {
            let g = if g.is_finite() && g > 0.0 { g } else { 1.0 };
            let inv = 1.0 / g;
            for (i, slot) in table.iter_mut().enumerate() {
                *slot = if g == 1.0 {
                    i as u8
                } else {
                    unit_to_u8((i as f32 / 255.0).powf(inv))
                };
            }
        }
        Self(tables)
    }

    pub(crate) fn lookup(&self, channel: usize, v: u8) -> u8 {
        self.0[channel][v as usize]
    }
}

fn convert_colors(img: &mut RgbaImage, params: &ColorParams, model: ColorModel) {
    let tables = GammaTables::new(params.gamma);
    let hsb_shift = params.hue != 0.0 || params.saturation != 0.0 || params.brightness != 0.0;
    let gray = params.gray_level.clamp(0.0, 1.0);
    let contrast = (1.0 + params.contrast).max(0.0);

    for px in img.pixels_mut() {
        let [r, g, b, a] = px.0;
        let mut rgb = params.replace.apply([
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
        ]);

        if model == ColorModel::Grayscale {
            let y = luma(rgb[0], rgb[1], rgb[2]);
            rgb = [y, y, y];
        }

        if gray > 0.0 {
            let y = luma(rgb[0], rgb[1], rgb[2]);
            for c in &mut rgb {
                *c += (y - *c) * gray;
            }
        }

        if hsb_shift {
            let [h, s, v] = rgb_to_hsb(rgb);
            rgb = hsb_to_rgb([
                h + params.hue,
                (s + params.saturation).clamp(0.0, 1.0),
                (v + params.brightness).clamp(0.0, 1.0),
            ]);
        }

        if contrast != 1.0 {
            for c in &mut rgb {
                *c = (*c - 0.5) * contrast + 0.5;
            }
        }

        px.0 = [
            tables.lookup(0, unit_to_u8(rgb[0])),
            tables.lookup(1, unit_to_u8(rgb[1])),
            tables.lookup(2, unit_to_u8(rgb[2])),
            tables.lookup(3, a),
        ];
    }
}

fn rescale(img: &mut RgbaImage, factor: [f32; 4], offset: [f32; 4]) {
    for px in img.pixels_mut() {
        for (i, v) in px.0.iter_mut().enumerate() {
            *v = clamp_u8(f32::from(*v) * factor[i] + offset[i]);
        }
    }
}

/// RGB in `[0, 1]` to `[hue (turns), saturation, brightness]`.
pub(crate) fn rgb_to_hsb([r, g, b]: [f32; 3]) -> [f32; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let brightness = max;
    let saturation = if max > 0.0 { delta / max } else { 0.0 };
    if delta <= 0.0 {
        return [0.0, saturation, brightness];
    }

    let h = if max == r {
        (g - b) / delta
    } else if max == g {
        2.0 + (b - r) / delta
    } else {
        4.0 + (r - g) / delta
    };
    let mut hue = h / 6.0;
    if hue < 0.0 {
        hue += 1.0;
    }
    [hue, saturation, brightness]
}

/// `[hue (turns), saturation, brightness]` to RGB in `[0, 1]`. Hue wraps.
pub(crate) fn hsb_to_rgb([h, s, v]: [f32; 3]) -> [f32; 3] {
    if s <= 0.0 {
        return [v, v, v];
    }
    let h = (h - h.floor()) * 6.0;
    let sector = h.floor();
    let f = h - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match sector as u32 {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/filter.rs"]
mod tests;
