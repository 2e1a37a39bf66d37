use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use image::RgbaImage;

use crate::assets::loader::ColorConvertedLoader;
use crate::compose::draw::{affine_bilinear, draw_part};
use crate::compose::job::{BuildJob, PartsCollector};
use crate::compose::parts::{BuildInfo, UsedPart};
use crate::foundation::core::Rgba8;
use crate::foundation::error::{CompositorError, CompositorResult};

/// How long [`Compositor::resolve`] waits for a job to complete its parts by default.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(20);

/// Compositor configuration.
#[derive(Debug, Clone, Copy)]
pub struct CompositorOpts {
    /// Upper bound on waiting for `PartsCollector::complete`.
    pub resolve_timeout: Duration,
    /// Use the exact floating-point blend when drawing parts.
    pub quality_hints: bool,
}

impl Default for CompositorOpts {
    fn default() -> Self {
        Self {
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            quality_hints: false,
        }
    }
}

impl CompositorOpts {
    /// Defaults, with `CHARCOMP_RENDER_QUALITY=1|true` enabling quality hints.
    pub fn from_env() -> Self {
        let quality_hints = std::env::var("CHARCOMP_RENDER_QUALITY")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        Self {
            quality_hints,
            ..Self::default()
        }
    }
}

/// What [`Compositor::run`] did with a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A new canvas was drawn and delivered.
    Built,
    /// The previous canvas was delivered again.
    Reused,
    /// `on_failure` was called.
    Failed,
}

/// Turns [`BuildJob`]s into canvases, reusing the previous canvas when nothing changed.
pub struct Compositor {
    loader: Arc<ColorConvertedLoader>,
    opts: CompositorOpts,
    previous: Option<BuildInfo>,
}

impl Compositor {
    /// Create a compositor drawing parts obtained from `loader`.
    pub fn new(loader: Arc<ColorConvertedLoader>, opts: CompositorOpts) -> Self {
        Self {
            loader,
            opts,
            previous: None,
        }
    }

    /// The part loader.
    pub fn loader(&self) -> &Arc<ColorConvertedLoader> {
        &self.loader
    }

    /// Active configuration.
    pub fn opts(&self) -> CompositorOpts {
        self.opts
    }

    /// The last successful build, if any.
    pub fn previous(&self) -> Option<&BuildInfo> {
        self.previous.as_ref()
    }

    /// Ask `job` for its parts and wait until it signals completion.
    pub fn resolve(&self, job: &dyn BuildJob) -> CompositorResult<BuildInfo> {
        let (collector, rx) = PartsCollector::channel();
        job.load_parts(collector)?;

        match rx.recv_timeout(self.opts.resolve_timeout) {
            Ok(parts) => parts.into_build_info(),
            Err(RecvTimeoutError::Timeout) => Err(CompositorError::io(format!(
                "parts were not resolved within {:?}",
                self.opts.resolve_timeout
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(CompositorError::io(
                "parts collector was dropped without completing",
            )),
        }
    }

    /// `true` when `previous` was built from the same request and none of its resources changed
    /// since.
    pub fn should_reuse(new: &BuildInfo, previous: &BuildInfo) -> bool {
        previous.canvas().is_some() && new.is_same_build(previous) && previous.is_up_to_date()
    }

    /// Draw every part of `info` in stacking order and record what was used.
    pub fn build(&self, info: &mut BuildInfo) -> CompositorResult<Arc<RgbaImage>> {
        // The previous generation's images may be reclaimed from here on.
        self.loader.cache().unlock_all();

        let size = info.size();
        let mut canvas = RgbaImage::new(size.width, size.height);
        let mut used = Vec::with_capacity(info.parts().len());

        for part in info.parts() {
            let modified = part.resource.modified_time();
            let image = self.loader.load(
                &part.resource,
                Some(&part.params),
                Some(part.layer.color_model),
            )?;
            draw_part(&mut canvas, &image, self.opts.quality_hints);
            used.push(UsedPart {
                part: part.clone(),
                modified,
            });
        }

        if let Some(transform) = info.affine().and_then(|a| a.transform()) {
            canvas = affine_bilinear(&canvas, transform)?;
        }

        let canvas = Arc::new(canvas);
        info.set_built(canvas.clone(), used);
        Ok(canvas)
    }

    /// Execute `job` and deliver exactly one of `on_success`/`on_failure`.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn run(&mut self, job: &dyn BuildJob) -> RunOutcome {
        let started = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(|| self.resolve_and_build(job)))
            .unwrap_or_else(|payload| Err(CompositorError::runtime(panic_message(&*payload))));

        match result {
            Ok((canvas, background, outcome)) => {
                tracing::debug!(
                    ?outcome,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "composite ready"
                );
                job.on_success(canvas, background);
                outcome
            }
            Err(err) => {
                tracing::warn!(error = %err, "composite failed");
                job.on_failure(err);
                RunOutcome::Failed
            }
        }
    }

    fn resolve_and_build(
        &mut self,
        job: &dyn BuildJob,
    ) -> CompositorResult<(Arc<RgbaImage>, Option<Rgba8>, RunOutcome)> {
        let mut info = self.resolve(job)?;

        if let Some(prev) = &self.previous
            && Self::should_reuse(&info, prev)
            && let Some(canvas) = prev.canvas()
        {
            return Ok((canvas.clone(), prev.background(), RunOutcome::Reused));
        }

        let canvas = self.build(&mut info)?;
        let background = info.background();
        self.previous = Some(info);
        Ok((canvas, background, RunOutcome::Built))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic during composite: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic during composite: {s}")
    } else {
        "panic during composite".to_string()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/compositor.rs"]
mod tests;
