use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use image::RgbaImage;

use crate::assets::color::{ColorModel, ColorParams};
use crate::assets::decode::{ImageRawLoader, RawLoader};
use crate::assets::filter::apply_color_filter;
use crate::assets::resource::Resource;
use crate::cache::image_cache::{ImageCache, ImageCacheOpts};
use crate::foundation::error::{CompositorError, CompositorResult};

/// Identity of one color-converted image.
///
/// The resource modification time is captured when the key is built, so a changed file simply
/// produces a different key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Conversion parameters.
    pub params: ColorParams,
    /// Color model used by the conversion.
    pub model: ColorModel,
    /// Source resource.
    pub resource: Resource,
    /// `resource.modified_time()` at key construction.
    pub modified: u64,
}

impl CacheKey {
    /// Build the key for `resource` as it is right now.
    pub fn new(resource: &Resource, params: ColorParams, model: ColorModel) -> Self {
        Self {
            params,
            model,
            modified: resource.modified_time(),
            resource: resource.clone(),
        }
    }
}

/// Cache of color-converted part images.
pub type PartsImageCache = ImageCache<CacheKey>;

/// Process-wide parts cache, configured from the environment on first use.
pub fn shared_image_cache() -> Arc<PartsImageCache> {
    static SHARED: OnceLock<Arc<PartsImageCache>> = OnceLock::new();
    SHARED
        .get_or_init(|| Arc::new(ImageCache::new(ImageCacheOpts::from_env())))
        .clone()
}

/// Decodes parts, applies their color conversion and memoizes the result.
pub struct ColorConvertedLoader {
    raw: Arc<dyn RawLoader>,
    cache: Arc<PartsImageCache>,
    decodes: AtomicU64,
}

impl ColorConvertedLoader {
    /// Loader over an explicit raw loader and cache.
    pub fn new(raw: Arc<dyn RawLoader>, cache: Arc<PartsImageCache>) -> Self {
        Self {
            raw,
            cache,
            decodes: AtomicU64::new(0),
        }
    }

    /// Loader decoding with the `image` crate into the process-wide cache.
    pub fn with_shared_cache() -> Self {
        Self::new(Arc::new(ImageRawLoader), shared_image_cache())
    }

    /// The backing cache.
    pub fn cache(&self) -> &Arc<PartsImageCache> {
        &self.cache
    }

    /// Number of raw decodes performed so far.
    pub fn decode_count(&self) -> u64 {
        self.decodes.load(Ordering::Relaxed)
    }

    /// Load `resource` converted with `params` (default: identity) under `model` (default:
    /// [`ColorModel::Default`]).
    ///
    /// Decode failures are returned as-is and never cached.
    pub fn load(
        &self,
        resource: &Resource,
        params: Option<&ColorParams>,
        model: Option<ColorModel>,
    ) -> CompositorResult<Arc<RgbaImage>> {
        if resource.id().is_empty() {
            return Err(CompositorError::argument("resource has an empty identity"));
        }
        let params = params.copied().unwrap_or_default();
        let model = model.unwrap_or_default();

        let key = CacheKey::new(resource, params, model);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let raw = self.raw.load(resource)?;
        self.decodes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            resource = resource.id(),
            modified = key.modified,
            width = raw.image.width(),
            height = raw.image.height(),
            "decoded part"
        );

        let mut image = raw.image;
        apply_color_filter(&mut image, &params, model);
        let image = Arc::new(image);
        self.cache.set(key, image.clone());
        Ok(image)
    }

    /// Drop every cached image and release the raw loader.
    pub fn close(&self) {
        self.cache.clear();
        self.raw.close();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/loader.rs"]
mod tests;
