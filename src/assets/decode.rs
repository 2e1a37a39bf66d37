use anyhow::Context;
use image::RgbaImage;

use crate::assets::resource::Resource;
use crate::foundation::error::{CompositorError, CompositorResult};

/// A decoded image plus the modification time of the resource it came from.
#[derive(Debug, Clone)]
pub struct RawImage {
    /// Straight-alpha RGBA8 pixels.
    pub image: RgbaImage,
    /// Resource modification time observed before reading.
    pub modified: u64,
}

/// Decodes image resources to pixel buffers.
pub trait RawLoader: Send + Sync {
    /// Decode `resource`. Unreadable or unsupported data is an I/O class error.
    fn load(&self, resource: &Resource) -> CompositorResult<RawImage>;

    /// Release anything the loader holds on to.
    fn close(&self) {}
}

/// [`RawLoader`] backed by the `image` crate's format detection.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageRawLoader;

impl RawLoader for ImageRawLoader {
    fn load(&self, resource: &Resource) -> CompositorResult<RawImage> {
        if resource.id().is_empty() {
            return Err(CompositorError::argument("resource has an empty identity"));
        }
        let modified = resource.modified_time();
        let bytes = resource.read_all().map_err(|e| match e {
            CompositorError::Other(e) => CompositorError::io(format!("{}: {e:#}", resource.id())),
            other => other,
        })?;
        let image = decode_rgba8(&bytes)
            .map_err(|e| CompositorError::io(format!("{}: {e:#}", resource.id())))?;
        Ok(RawImage { image, modified })
    }
}

/// Decode any supported encoded image to straight RGBA8.
pub fn decode_rgba8(bytes: &[u8]) -> anyhow::Result<RgbaImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    Ok(dyn_img.to_rgba8())
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
