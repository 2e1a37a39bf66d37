use std::sync::Arc;
use std::sync::mpsc;

use image::RgbaImage;

use crate::assets::color::ColorParams;
use crate::assets::resource::Resource;
use crate::compose::parts::{BuildInfo, Layer, PartsInfo};
use crate::foundation::core::{AffineParams, CanvasSize, Rgba8};
use crate::foundation::error::{CompositorError, CompositorResult};

/// Sequence number of an accepted request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(pub u64);

/// One composite request.
///
/// Callbacks run on the thread executing the build. Exactly one of `on_success`/`on_failure` is
/// called per executed request.
pub trait BuildJob: Send + Sync {
    /// Describe the parts to draw. The collector may be moved to another thread; the request
    /// resolves once [`PartsCollector::complete`] is called.
    fn load_parts(&self, collector: PartsCollector) -> CompositorResult<()>;

    /// Receive the composited canvas and the requested background color.
    fn on_success(&self, canvas: Arc<RgbaImage>, background: Option<Rgba8>);

    /// Receive the reason the request produced no canvas.
    fn on_failure(&self, err: CompositorError);

    /// Queueing notifications, for jobs that want them.
    fn async_observer(&self) -> Option<&dyn AsyncJobObserver> {
        None
    }
}

/// Optional queueing notifications for jobs submitted to an
/// [`AsyncCompositor`](crate::AsyncCompositor).
pub trait AsyncJobObserver: Send + Sync {
    /// The job was accepted and assigned `ticket`.
    fn on_queued(&self, ticket: Ticket);

    /// The job was replaced by a newer submission before it started.
    fn on_abandoned(&self);
}

/// Parts gathered for one request.
#[derive(Debug, Default)]
pub(crate) struct CollectedParts {
    size: Option<(u32, u32)>,
    background: Option<Rgba8>,
    affine: Option<AffineParams>,
    entries: Vec<PartsInfo>,
}

impl CollectedParts {
    pub(crate) fn into_build_info(self) -> CompositorResult<BuildInfo> {
        let (w, h) = self
            .size
            .ok_or_else(|| CompositorError::argument("canvas size was never set"))?;
        let size = CanvasSize::new(w, h)?;
        Ok(BuildInfo::new(
            self.entries,
            size,
            self.background,
            self.affine,
        ))
    }
}

/// Accumulates the parts of one request on behalf of a [`BuildJob`].
pub struct PartsCollector {
    tx: mpsc::Sender<CollectedParts>,
    parts: CollectedParts,
}

impl PartsCollector {
    pub(crate) fn channel() -> (Self, mpsc::Receiver<CollectedParts>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                tx,
                parts: CollectedParts::default(),
            },
            rx,
        )
    }

    /// Canvas size in pixels.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.parts.size = Some((width, height));
    }

    /// Background color handed back with the canvas.
    pub fn set_background(&mut self, color: Option<Rgba8>) {
        self.parts.background = color;
    }

    /// Affine parameters of length 4 or 6, or `None`. Other lengths are rejected and leave the
    /// previous value untouched.
    pub fn set_affine(&mut self, coeffs: Option<Vec<f64>>) -> CompositorResult<()> {
        self.parts.affine = coeffs.map(AffineParams::new).transpose()?;
        Ok(())
    }

    /// Add a part. `params` defaults to the identity conversion.
    pub fn add(&mut self, layer: Layer, resource: Resource, params: Option<ColorParams>) {
        let index = self.parts.entries.len();
        self.parts.entries.push(PartsInfo {
            layer,
            resource,
            params: params.unwrap_or_default(),
            index,
        });
    }

    /// Number of parts added so far.
    pub fn len(&self) -> usize {
        self.parts.entries.len()
    }

    /// `true` when no part was added yet.
    pub fn is_empty(&self) -> bool {
        self.parts.entries.is_empty()
    }

    /// Signal that every part has been added.
    pub fn complete(self) {
        // The resolver may have timed out already; nothing is waiting then.
        let _ = self.tx.send(self.parts);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/job.rs"]
mod tests;
