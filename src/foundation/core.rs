use crate::foundation::error::{CompositorError, CompositorResult};

pub use kurbo::{Affine, Point};

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CanvasSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl CanvasSize {
    /// Create a validated, non-empty canvas size.
    pub fn new(width: u32, height: u32) -> CompositorResult<Self> {
        if width == 0 || height == 0 {
            return Err(CompositorError::argument(format!(
                "canvas size must be non-zero, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    /// Byte length of a tightly packed RGBA8 buffer of this size.
    pub fn rgba8_len(self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(4)
    }
}

/// Straight (non-premultiplied) RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    #[serde(default = "opaque")]
    pub a: u8,
}

fn opaque() -> u8 {
    255
}

impl Rgba8 {
    /// Construct from channel values.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Fully opaque white.
    pub const fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    /// Channel array in `[r, g, b, a]` order.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Affine parameters attached to a build.
///
/// Holds either 4 or 6 coefficients. Only the 6-coefficient form
/// `[m00, m10, m01, m11, m02, m12]` produces a transform; the 4-coefficient form is accepted and
/// carried for equality but never applied.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct AffineParams(Vec<f64>);

impl AffineParams {
    /// Validate coefficient count.
    pub fn new(coeffs: Vec<f64>) -> CompositorResult<Self> {
        match coeffs.len() {
            4 | 6 => {}
            n => {
                return Err(CompositorError::argument(format!(
                    "affine parameters must have length 4 or 6, got {n}"
                )));
            }
        }
        if coeffs.iter().any(|v| !v.is_finite()) {
            return Err(CompositorError::argument(
                "affine parameters must be finite",
            ));
        }
        Ok(Self(coeffs))
    }

    /// Raw coefficients.
    pub fn coeffs(&self) -> &[f64] {
        &self.0
    }

    /// The transform to apply, if any.
    pub fn transform(&self) -> Option<Affine> {
        match self.0.as_slice() {
            &[a, b, c, d, e, f] => Some(Affine::new([a, b, c, d, e, f])),
            _ => None,
        }
    }
}

impl<'de> serde::Deserialize<'de> for AffineParams {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let coeffs = Vec::<f64>::deserialize(deserializer)?;
        Self::new(coeffs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
