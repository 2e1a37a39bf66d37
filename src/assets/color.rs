use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Channel permutation applied before any other color adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorReplace {
    /// Keep channels as they are.
    #[default]
    None,
    /// `(r, g, b) <- (r, b, g)`.
    Rbg,
    /// `(r, g, b) <- (g, r, b)`.
    Grb,
    /// `(r, g, b) <- (g, b, r)`.
    Gbr,
    /// `(r, g, b) <- (b, r, g)`.
    Brg,
    /// `(r, g, b) <- (b, g, r)`.
    Bgr,
    /// Every channel becomes the pixel's luma.
    Gray,
}

impl ColorReplace {
    pub(crate) fn apply(self, [r, g, b]: [f32; 3]) -> [f32; 3] {
        match self {
            Self::None => [r, g, b],
            Self::Rbg => [r, b, g],
            Self::Grb => [g, r, b],
            Self::Gbr => [g, b, r],
            Self::Brg => [b, r, g],
            Self::Bgr => [b, g, r],
            Self::Gray => {
                let y = crate::foundation::math::luma(r, g, b);
                [y, y, y]
            }
        }
    }
}

/// How source pixels are interpreted before the hue/saturation/brightness stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorModel {
    /// Use the source colors as-is.
    #[default]
    Default,
    /// Reduce the source to luma first, so hue/saturation tint a gray part.
    Grayscale,
}

/// Per-part color conversion parameters.
///
/// Channel arrays are ordered `[r, g, b, a]`. Equality and hashing compare the exact bit patterns
/// of every field, so two parameter sets hit the same cache entry only when they are
/// byte-identical.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorParams {
    /// Linear gain per channel.
    pub factor: [f32; 4],
    /// Linear offset per channel, in byte units (`-255..=255`).
    pub offset: [f32; 4],
    /// Gamma per channel; `1.0` is identity.
    pub gamma: [f32; 4],
    /// Hue rotation as a fraction of a full turn.
    pub hue: f32,
    /// Added to HSB saturation, clamped to `[0, 1]`.
    pub saturation: f32,
    /// Added to HSB brightness, clamped to `[0, 1]`.
    pub brightness: f32,
    /// Contrast around mid-gray; `0.0` is identity, `-1.0` flattens to gray.
    pub contrast: f32,
    /// Blend toward luma; `0.0` keeps color, `1.0` is fully gray.
    pub gray_level: f32,
    /// Channel permutation.
    pub replace: ColorReplace,
}

impl Default for ColorParams {
    fn default() -> Self {
        Self {
            factor: [1.0; 4],
            offset: [0.0; 4],
            gamma: [1.0; 4],
            hue: 0.0,
            saturation: 0.0,
            brightness: 0.0,
            contrast: 0.0,
            gray_level: 0.0,
            replace: ColorReplace::None,
        }
    }
}

impl ColorParams {
    /// `true` when the rescale stage would leave every pixel untouched.
    pub fn is_identity_rescale(&self) -> bool {
        self.factor == [1.0; 4] && self.offset == [0.0; 4]
    }

    /// `true` when the per-pixel color stage would leave every pixel untouched.
    pub fn is_identity_color(&self) -> bool {
        self.gamma == [1.0; 4]
            && self.hue == 0.0
            && self.saturation == 0.0
            && self.brightness == 0.0
            && self.contrast == 0.0
            && self.gray_level == 0.0
            && self.replace == ColorReplace::None
    }

    fn float_bits(&self) -> [u32; 17] {
        let mut out = [0u32; 17];
        let scalars = [
            self.hue,
            self.saturation,
            self.brightness,
            self.contrast,
            self.gray_level,
        ];
        for (dst, v) in out.iter_mut().zip(
            self.factor
                .iter()
                .chain(&self.offset)
                .chain(&self.gamma)
                .chain(&scalars),
        ) {
            *dst = v.to_bits();
        }
        out
    }
}

impl PartialEq for ColorParams {
    fn eq(&self, other: &Self) -> bool {
        self.replace == other.replace && self.float_bits() == other.float_bits()
    }
}

impl Eq for ColorParams {}

impl Hash for ColorParams {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.float_bits().hash(state);
        self.replace.hash(state);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/color.rs"]
mod tests;
