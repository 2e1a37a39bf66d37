use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::{Arc, Condvar, Mutex},
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use image::RgbaImage;
use tracing_subscriber::EnvFilter;

use charcomp::{
    AsyncCompositor, AsyncCompositorOpts, AsyncJobObserver, BuildJob, ColorConvertedLoader,
    ColorParams, Compositor, CompositorError, CompositorOpts, CompositorResult, Layer,
    PartsCollector, Resource, Rgba8, Ticket,
};

#[derive(Parser, Debug)]
#[command(name = "charcomp", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite a layered character described by a JSON job into a PNG.
    Compose(ComposeArgs),
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Input job JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Print image-cache statistics after compositing.
    #[arg(long)]
    stats: bool,

    /// Seconds to wait for the composite before giving up.
    #[arg(long, default_value_t = 60)]
    wait_secs: u64,
}

#[derive(Debug, serde::Deserialize)]
struct JobFile {
    canvas: CanvasDims,
    #[serde(default)]
    background: Option<Rgba8>,
    #[serde(default)]
    affine: Option<Vec<f64>>,
    parts: Vec<PartEntry>,
}

#[derive(Debug, serde::Deserialize)]
struct CanvasDims {
    width: u32,
    height: u32,
}

#[derive(Debug, serde::Deserialize)]
struct PartEntry {
    layer: Layer,
    /// Relative to the job file's directory joined with `layer.dir`.
    path: PathBuf,
    #[serde(default)]
    color: Option<ColorParams>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Compose(args) => cmd_compose(args),
    }
}

fn read_job_json(path: &Path) -> anyhow::Result<JobFile> {
    let f = File::open(path).with_context(|| format!("open job '{}'", path.display()))?;
    let r = BufReader::new(f);
    let job: JobFile = serde_json::from_reader(r).with_context(|| "parse job JSON")?;
    Ok(job)
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let file = read_job_json(&args.in_path)?;
    let root = args
        .in_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    let loader = Arc::new(ColorConvertedLoader::with_shared_cache());
    let compositor = Compositor::new(loader.clone(), CompositorOpts::from_env());
    let service = AsyncCompositor::spawn(compositor, AsyncCompositorOpts::default())?;

    let job = Arc::new(FileJob::new(file, root));
    service.submit(job.clone());
    let outcome = job.wait(Duration::from_secs(args.wait_secs));
    service.stop();

    let (canvas, background) = match outcome {
        Some(Ok(done)) => done,
        Some(Err(err)) => return Err(err).context("composite failed"),
        None => anyhow::bail!("composite did not finish within {}s", args.wait_secs),
    };

    let flat = flatten(&canvas, background);
    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    flat.save_with_format(&args.out, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    if args.stats {
        let s = loader.cache().stats();
        eprintln!("image cache:");
        eprintln!("  reads:          {}", s.reads);
        eprintln!("  hits:           {}", s.hits);
        eprintln!("  decodes:        {}", loader.decode_count());
        eprintln!("  live_entries:   {}", s.live_entries);
        eprintln!("  locked_entries: {}", s.locked_entries);
        eprintln!("  live_bytes:     {}", s.live_bytes);
        eprintln!("  max_bytes:      {}", s.max_bytes);
        eprintln!("  evictions:      {}", s.evictions);
    }

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

/// Composite `canvas` over a solid `background`; without one the canvas is written as is.
fn flatten(canvas: &RgbaImage, background: Option<Rgba8>) -> RgbaImage {
    let Some(bg) = background else {
        return canvas.clone();
    };
    let mut out = RgbaImage::from_pixel(canvas.width(), canvas.height(), image::Rgba(bg.to_array()));
    charcomp::draw_part(&mut out, canvas, false);
    out
}

type Delivered = Result<(Arc<RgbaImage>, Option<Rgba8>), CompositorError>;

struct FileJob {
    file: JobFile,
    root: PathBuf,
    slot: Mutex<Option<Delivered>>,
    ready: Condvar,
}

impl FileJob {
    fn new(file: JobFile, root: PathBuf) -> Self {
        Self {
            file,
            root,
            slot: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    fn deliver(&self, result: Delivered) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(result);
        self.ready.notify_all();
    }

    fn wait(&self, timeout: Duration) -> Option<Delivered> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        let (mut slot, _) = self
            .ready
            .wait_timeout_while(slot, timeout, |s| s.is_none())
            .unwrap_or_else(|e| e.into_inner());
        slot.take()
    }
}

impl BuildJob for FileJob {
    fn load_parts(&self, mut collector: PartsCollector) -> CompositorResult<()> {
        collector.set_size(self.file.canvas.width, self.file.canvas.height);
        collector.set_background(self.file.background);
        collector.set_affine(self.file.affine.clone())?;
        for part in &self.file.parts {
            let path = self.root.join(&part.layer.dir).join(&part.path);
            collector.add(part.layer.clone(), Resource::file(path), part.color);
        }
        collector.complete();
        Ok(())
    }

    fn on_success(&self, canvas: Arc<RgbaImage>, background: Option<Rgba8>) {
        self.deliver(Ok((canvas, background)));
    }

    fn on_failure(&self, err: CompositorError) {
        self.deliver(Err(err));
    }

    fn async_observer(&self) -> Option<&dyn AsyncJobObserver> {
        Some(self)
    }
}

impl AsyncJobObserver for FileJob {
    fn on_queued(&self, ticket: Ticket) {
        tracing::debug!(ticket = ticket.0, "job queued");
    }

    fn on_abandoned(&self) {
        self.deliver(Err(CompositorError::runtime(
            "job was replaced before it started",
        )));
    }
}
