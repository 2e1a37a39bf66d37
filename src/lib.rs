//! charcomp composites layered character images.
//!
//! A request names its parts (an image resource plus color conversion per layer); the engine
//! decodes, color-converts and caches each part, draws them in layer order onto one canvas and
//! hands the canvas back. The API is split in two levels:
//!
//! - [`Compositor`] resolves and builds one [`BuildJob`] synchronously, reusing the previous
//!   canvas when nothing changed
//! - [`AsyncCompositor`] runs a compositor on a dedicated worker thread where the latest
//!   submission wins
//!
//! Converted parts live in an [`ImageCache`]: images used by the current build are pinned, older
//! ones are kept within a byte budget and evicted least-recently-used first.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod assets;
mod cache;
mod compose;
mod foundation;
mod service;

pub use crate::foundation::core::{Affine, AffineParams, CanvasSize, Point, Rgba8};
pub use crate::foundation::error::{CompositorError, CompositorResult};

pub use crate::assets::color::{ColorModel, ColorParams, ColorReplace};
pub use crate::assets::decode::{ImageRawLoader, RawImage, RawLoader, decode_rgba8};
pub use crate::assets::filter::apply_color_filter;
pub use crate::assets::loader::{
    CacheKey, ColorConvertedLoader, PartsImageCache, shared_image_cache,
};
pub use crate::assets::resource::{
    FileResource, ImageResource, MemoryResource, Resource, UNKNOWN_MODIFIED,
};
pub use crate::cache::image_cache::{ImageCache, ImageCacheOpts, ImageCacheStats};
pub use crate::compose::compositor::{
    Compositor, CompositorOpts, DEFAULT_RESOLVE_TIMEOUT, RunOutcome,
};
pub use crate::compose::draw::{affine_bilinear, draw_part, over};
pub use crate::compose::job::{AsyncJobObserver, BuildJob, PartsCollector, Ticket};
pub use crate::compose::parts::{BuildInfo, Layer, PartsInfo, UsedPart};
pub use crate::service::async_compositor::{
    AsyncCompositor, AsyncCompositorOpts, DEFAULT_POLL_INTERVAL,
};
