use std::cmp::Ordering;
use std::sync::Arc;

use image::RgbaImage;

use crate::assets::color::{ColorModel, ColorParams};
use crate::assets::resource::Resource;
use crate::foundation::core::{AffineParams, CanvasSize, Rgba8};

/// One stacking slot of a character.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Layer {
    /// Layer identifier, unique within a parts category.
    pub id: String,
    /// Stacking order; lower values are drawn first.
    pub order: i32,
    /// Directory the layer's images are taken from.
    #[serde(default)]
    pub dir: String,
    /// Color model used when converting this layer's parts.
    #[serde(default)]
    pub color_model: ColorModel,
}

impl Layer {
    /// Layer with an empty source directory.
    pub fn new(id: impl Into<String>, order: i32) -> Self {
        Self {
            id: id.into(),
            order,
            dir: String::new(),
            color_model: ColorModel::Default,
        }
    }
}

/// One resolved part of a build.
#[derive(Debug, Clone)]
pub struct PartsInfo {
    /// Layer the part is drawn on.
    pub layer: Layer,
    /// Image resource of the part.
    pub resource: Resource,
    /// Color conversion applied to the part.
    pub params: ColorParams,
    /// Position in which the part was collected.
    pub index: usize,
}

/// Equality used for build comparison. The insertion index only decides draw order and is not
/// compared.
impl PartialEq for PartsInfo {
    fn eq(&self, other: &Self) -> bool {
        self.layer == other.layer && self.resource == other.resource && self.params == other.params
    }
}

impl Eq for PartsInfo {}

impl PartsInfo {
    /// Draw-order comparison: layer order, then insertion index, then resource.
    pub fn draw_order(&self, other: &Self) -> Ordering {
        self.layer
            .order
            .cmp(&other.layer.order)
            .then(self.index.cmp(&other.index))
            .then_with(|| self.resource.cmp(&other.resource))
    }
}

/// A part together with the resource timestamp observed when it was drawn.
#[derive(Debug, Clone)]
pub struct UsedPart {
    /// The drawn part.
    pub part: PartsInfo,
    /// `part.resource.modified_time()` at draw time.
    pub modified: u64,
}

/// Fully resolved request, later decorated with what was built from it.
#[derive(Debug, Clone)]
pub struct BuildInfo {
    parts: Vec<PartsInfo>,
    size: CanvasSize,
    background: Option<Rgba8>,
    affine: Option<AffineParams>,
    canvas: Option<Arc<RgbaImage>>,
    used: Vec<UsedPart>,
}

impl BuildInfo {
    /// Build from collected parts; the parts are sorted into draw order once here.
    pub fn new(
        mut parts: Vec<PartsInfo>,
        size: CanvasSize,
        background: Option<Rgba8>,
        affine: Option<AffineParams>,
    ) -> Self {
        parts.sort_by(PartsInfo::draw_order);
        Self {
            parts,
            size,
            background,
            affine,
            canvas: None,
            used: Vec::new(),
        }
    }

    /// Parts in draw order.
    pub fn parts(&self) -> &[PartsInfo] {
        &self.parts
    }

    /// Canvas size.
    pub fn size(&self) -> CanvasSize {
        self.size
    }

    /// Background color passed through to the job.
    pub fn background(&self) -> Option<Rgba8> {
        self.background
    }

    /// Affine parameters, if any.
    pub fn affine(&self) -> Option<&AffineParams> {
        self.affine.as_ref()
    }

    /// Canvas produced from this build, once built.
    pub fn canvas(&self) -> Option<&Arc<RgbaImage>> {
        self.canvas.as_ref()
    }

    /// Parts actually drawn, with their timestamps.
    pub fn used(&self) -> &[UsedPart] {
        &self.used
    }

    pub(crate) fn set_built(&mut self, canvas: Arc<RgbaImage>, used: Vec<UsedPart>) {
        self.canvas = Some(canvas);
        self.used = used;
    }

    /// Structural comparison: same ordered parts, size, background and affine parameters.
    pub fn is_same_build(&self, other: &Self) -> bool {
        self.size == other.size
            && self.background == other.background
            && self.affine == other.affine
            && self.parts == other.parts
    }

    /// `true` when every drawn part's resource still reports the recorded timestamp.
    pub fn is_up_to_date(&self) -> bool {
        self.used
            .iter()
            .all(|u| u.part.resource.modified_time() == u.modified)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/parts.rs"]
mod tests;
