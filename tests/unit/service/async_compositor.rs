use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Instant;

use image::RgbaImage;

use super::*;
use crate::assets::decode::ImageRawLoader;
use crate::assets::resource::{MemoryResource, Resource};
use crate::cache::image_cache::{ImageCache, ImageCacheOpts};
use crate::compose::compositor::CompositorOpts;
use crate::compose::job::{AsyncJobObserver, PartsCollector};
use crate::compose::parts::Layer;
use crate::foundation::core::Rgba8;

fn png(rgba: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(2, 2, image::Rgba(rgba));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn service() -> AsyncCompositor {
    service_with(AsyncCompositorOpts {
        poll_interval: Duration::from_millis(20),
        ..AsyncCompositorOpts::default()
    })
}

fn service_with(opts: AsyncCompositorOpts) -> AsyncCompositor {
    let loader = ColorConvertedLoader::new(
        Arc::new(ImageRawLoader),
        Arc::new(ImageCache::new(ImageCacheOpts::default())),
    );
    let compositor = Compositor::new(Arc::new(loader), CompositorOpts::default());
    AsyncCompositor::new(compositor, opts)
}

fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(5));
    }
}

struct ObservedJob {
    resource: Resource,
    gate: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
    panic_on_success: bool,
    tickets: Mutex<Vec<Ticket>>,
    abandoned: AtomicUsize,
    successes: AtomicUsize,
    failures: AtomicUsize,
}

impl ObservedJob {
    fn new(color: [u8; 4]) -> Arc<Self> {
        Arc::new(Self {
            resource: Resource::new(MemoryResource::new(
                &format!("{color:?}"),
                png(color),
                1,
            )),
            gate: Mutex::new(None),
            panic_on_success: false,
            tickets: Mutex::new(Vec::new()),
            abandoned: AtomicUsize::new(0),
            successes: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        })
    }

    /// Returns a job that blocks in `load_parts` until released, plus `(started, release)`.
    fn gated(color: [u8; 4]) -> (Arc<Self>, mpsc::Receiver<()>, mpsc::Sender<()>) {
        let job = Self::new(color);
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *job.gate.lock().unwrap() = Some((started_tx, release_rx));
        (job, started_rx, release_tx)
    }

    fn done(&self) -> usize {
        self.successes.load(Ordering::SeqCst) + self.failures.load(Ordering::SeqCst)
    }
}

impl BuildJob for ObservedJob {
    fn load_parts(&self, mut collector: PartsCollector) -> CompositorResult<()> {
        if let Some((started, release)) = self.gate.lock().unwrap().take() {
            started.send(()).unwrap();
            release.recv().unwrap();
        }
        collector.set_size(2, 2);
        collector.add(Layer::new("l", 0), self.resource.clone(), None);
        collector.complete();
        Ok(())
    }

    fn on_success(&self, _canvas: Arc<RgbaImage>, _background: Option<Rgba8>) {
        self.successes.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_success {
            panic!("observer blew up");
        }
    }

    fn on_failure(&self, _err: CompositorError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn async_observer(&self) -> Option<&dyn AsyncJobObserver> {
        Some(self)
    }
}

impl AsyncJobObserver for ObservedJob {
    fn on_queued(&self, ticket: Ticket) {
        self.tickets.lock().unwrap().push(ticket);
    }

    fn on_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn latest_submission_wins_while_worker_is_busy() {
    let svc = service();
    svc.start().unwrap();

    let (running, started, release) = ObservedJob::gated([1, 1, 1, 255]);
    let t0 = svc.submit(running.clone());
    started.recv_timeout(Duration::from_secs(10)).unwrap();

    let queued: Vec<_> = (2u8..5).map(|v| ObservedJob::new([v, v, v, 255])).collect();
    let tickets: Vec<_> = queued.iter().map(|j| svc.submit(j.clone())).collect();
    release.send(()).unwrap();

    let last = queued.last().unwrap();
    wait_until(|| last.done() == 1 && running.done() == 1);

    assert_eq!(running.successes.load(Ordering::SeqCst), 1);
    assert_eq!(running.abandoned.load(Ordering::SeqCst), 0);
    for job in &queued[..queued.len() - 1] {
        assert_eq!(job.abandoned.load(Ordering::SeqCst), 1);
        assert_eq!(job.done(), 0);
    }
    assert_eq!(last.successes.load(Ordering::SeqCst), 1);
    assert_eq!(last.abandoned.load(Ordering::SeqCst), 0);

    assert_eq!(t0, Ticket(1));
    assert!(tickets.windows(2).all(|w| w[0] < w[1]));
    assert!(t0 < tickets[0]);
    for (job, ticket) in queued.iter().zip(&tickets) {
        assert_eq!(*job.tickets.lock().unwrap(), vec![*ticket]);
    }
}

#[test]
fn jobs_submitted_before_start_run_once_started() {
    let svc = service();
    let first = ObservedJob::new([5, 5, 5, 255]);
    let second = ObservedJob::new([6, 6, 6, 255]);
    svc.submit(first.clone());
    svc.submit(second.clone());
    assert!(!svc.is_alive());

    svc.start().unwrap();
    wait_until(|| second.done() == 1);
    assert_eq!(first.abandoned.load(Ordering::SeqCst), 1);
    assert_eq!(first.done(), 0);
}

#[test]
fn worker_survives_a_panicking_callback() {
    let svc = service();
    svc.start().unwrap();

    let mut boom = ObservedJob::new([7, 7, 7, 255]);
    Arc::get_mut(&mut boom).unwrap().panic_on_success = true;
    svc.submit(boom.clone());
    wait_until(|| boom.done() == 1);

    let after = ObservedJob::new([8, 8, 8, 255]);
    svc.submit(after.clone());
    wait_until(|| after.done() == 1);
    assert!(svc.is_alive());
}

#[test]
fn start_and_stop_are_idempotent_and_restartable() {
    let svc = service();
    svc.start().unwrap();
    svc.start().unwrap();
    assert!(svc.is_alive());

    svc.stop();
    svc.stop();
    assert!(!svc.is_alive());

    svc.start().unwrap();
    let job = ObservedJob::new([9, 9, 9, 255]);
    svc.submit(job.clone());
    wait_until(|| job.done() == 1);
    assert_eq!(job.successes.load(Ordering::SeqCst), 1);
}

#[test]
fn stop_is_prompt_even_with_a_long_poll() {
    let loader = ColorConvertedLoader::new(
        Arc::new(ImageRawLoader),
        Arc::new(ImageCache::new(ImageCacheOpts::default())),
    );
    let svc = AsyncCompositor::spawn(
        Compositor::new(Arc::new(loader), CompositorOpts::default()),
        AsyncCompositorOpts {
            poll_interval: Duration::from_secs(60),
            ..AsyncCompositorOpts::default()
        },
    )
    .unwrap();
    let started = Instant::now();
    svc.stop();
    assert!(!svc.is_alive());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn worker_that_outlives_stop_is_reclaimed_by_the_next_start() {
    let svc = service_with(AsyncCompositorOpts {
        poll_interval: Duration::from_millis(20),
        join_timeout: Duration::from_millis(30),
        ..AsyncCompositorOpts::default()
    });
    svc.start().unwrap();

    let (slow, started, release) = ObservedJob::gated([10, 10, 10, 255]);
    svc.submit(slow.clone());
    started.recv_timeout(Duration::from_secs(10)).unwrap();

    // The job is still blocked, so the join times out and the worker keeps running.
    svc.stop();
    assert!(svc.is_alive());
    let err = svc.start().unwrap_err();
    assert!(matches!(err, CompositorError::Runtime(_)), "{err:?}");

    release.send(()).unwrap();
    wait_until(|| slow.done() == 1);
    wait_until(|| !svc.is_alive());

    svc.start().unwrap();
    assert!(svc.is_alive());
    let next = ObservedJob::new([11, 11, 11, 255]);
    svc.submit(next.clone());
    wait_until(|| next.done() == 1);
    assert_eq!(next.successes.load(Ordering::SeqCst), 1);
}
