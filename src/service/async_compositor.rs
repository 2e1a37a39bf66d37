use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::assets::loader::ColorConvertedLoader;
use crate::compose::compositor::Compositor;
use crate::compose::job::{BuildJob, Ticket};
use crate::foundation::error::{CompositorError, CompositorResult};

/// Upper bound on how long the idle worker sleeps before re-checking for a stop request.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Worker thread configuration.
#[derive(Debug, Clone)]
pub struct AsyncCompositorOpts {
    /// Idle wait bound of the worker.
    pub poll_interval: Duration,
    /// How long `stop` waits for the worker to finish its current job.
    pub join_timeout: Duration,
    /// Name given to the worker thread.
    pub thread_name: String,
}

impl Default for AsyncCompositorOpts {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            join_timeout: Duration::from_secs(5),
            thread_name: "charcomp-compositor".to_string(),
        }
    }
}

struct Mailbox {
    pending: Option<Arc<dyn BuildJob>>,
    last_ticket: u64,
    // Bumped by every start/stop; a worker exits once it no longer matches its own.
    generation: u64,
}

struct Shared {
    mailbox: Mutex<Mailbox>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Mailbox> {
        self.mailbox.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Runs a [`Compositor`] on one dedicated thread behind a "latest request wins" mailbox.
///
/// [`submit`](Self::submit) never waits for compositing. If several jobs arrive before the worker
/// picks one up, only the newest runs; every replaced job is told via
/// [`AsyncJobObserver::on_abandoned`](crate::AsyncJobObserver::on_abandoned). A job that already
/// started always runs to completion.
///
/// Observer callbacks are invoked while the mailbox lock is held and must not call back into the
/// same `AsyncCompositor`.
pub struct AsyncCompositor {
    shared: Arc<Shared>,
    opts: AsyncCompositorOpts,
    loader: Arc<ColorConvertedLoader>,
    idle: Mutex<Option<Compositor>>,
    worker: Mutex<Option<Worker>>,
}

struct Worker {
    handle: JoinHandle<Compositor>,
    // Never sent on; disconnects when the worker thread exits.
    exited: mpsc::Receiver<()>,
    generation: u64,
}

impl AsyncCompositor {
    /// Wrap `compositor`; the worker is not started yet.
    pub fn new(compositor: Compositor, opts: AsyncCompositorOpts) -> Self {
        Self {
            shared: Arc::new(Shared {
                mailbox: Mutex::new(Mailbox {
                    pending: None,
                    last_ticket: 0,
                    generation: 0,
                }),
                wake: Condvar::new(),
            }),
            opts,
            loader: compositor.loader().clone(),
            idle: Mutex::new(Some(compositor)),
            worker: Mutex::new(None),
        }
    }

    /// [`new`](Self::new) followed by [`start`](Self::start).
    pub fn spawn(compositor: Compositor, opts: AsyncCompositorOpts) -> CompositorResult<Self> {
        let this = Self::new(compositor, opts);
        this.start()?;
        Ok(this)
    }

    /// The loader shared with the wrapped compositor.
    pub fn loader(&self) -> &Arc<ColorConvertedLoader> {
        &self.loader
    }

    /// Start the worker thread. Does nothing when it is already running.
    ///
    /// A worker that is still finishing a job after [`stop`](Self::stop) is waited for up to
    /// `join_timeout`; if it is still busy after that, an error is returned and `start` may be
    /// retried later.
    pub fn start(&self) -> CompositorResult<()> {
        let mut slot = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(worker) = slot.take() {
            let current = self.shared.lock().generation;
            if worker.generation == current && !worker.handle.is_finished() {
                *slot = Some(worker);
                return Ok(());
            }
            if let Some(busy) = self.wait_exit(worker) {
                *slot = Some(busy);
                return Err(CompositorError::runtime(
                    "previous worker is still finishing its job",
                ));
            }
        }

        let compositor = self
            .idle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| CompositorError::runtime("compositor was lost with a crashed worker"))?;

        let generation = {
            let mut mb = self.shared.lock();
            mb.generation = mb.generation.wrapping_add(1);
            mb.generation
        };

        let shared = self.shared.clone();
        let poll = self.opts.poll_interval;
        let (exit_tx, exited) = mpsc::channel::<()>();
        let handle = std::thread::Builder::new()
            .name(self.opts.thread_name.clone())
            .spawn(move || {
                // Disconnects `exited` when the thread leaves, by return or by unwinding.
                let _exit = exit_tx;
                worker_loop(&shared, compositor, generation, poll)
            })
            .map_err(|e| CompositorError::Other(anyhow::Error::new(e).context("spawn worker")))?;
        *slot = Some(Worker {
            handle,
            exited,
            generation,
        });
        tracing::debug!(thread = %self.opts.thread_name, "compositor worker started");
        Ok(())
    }

    /// Stop the worker and wait up to `join_timeout` for it. Does nothing when it is not running.
    ///
    /// A worker still busy after the timeout keeps running until its current job ends; the next
    /// [`start`](Self::start) takes its compositor back.
    pub fn stop(&self) {
        let mut slot = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        let Some(worker) = slot.take() else {
            return;
        };

        {
            let mut mb = self.shared.lock();
            mb.generation = mb.generation.wrapping_add(1);
        }
        self.shared.wake.notify_all();

        match self.wait_exit(worker) {
            None => tracing::debug!("compositor worker stopped"),
            Some(busy) => {
                tracing::warn!(
                    timeout_ms = self.opts.join_timeout.as_millis() as u64,
                    "compositor worker did not stop in time; it exits after its current job"
                );
                *slot = Some(busy);
            }
        }
    }

    /// Wait up to `join_timeout` for `worker` to exit and reclaim its compositor. Returns the worker
    /// when it is still running.
    fn wait_exit(&self, worker: Worker) -> Option<Worker> {
        match worker.exited.recv_timeout(self.opts.join_timeout) {
            Err(RecvTimeoutError::Timeout) => Some(worker),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                self.reclaim(worker.handle);
                None
            }
        }
    }

    fn reclaim(&self, handle: JoinHandle<Compositor>) {
        match handle.join() {
            Ok(compositor) => {
                *self.idle.lock().unwrap_or_else(|e| e.into_inner()) = Some(compositor);
            }
            Err(_) => tracing::error!("compositor worker terminated by a panic"),
        }
    }

    /// `true` while the worker thread is running.
    pub fn is_alive(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Hand `job` to the worker, replacing any job that has not started yet.
    pub fn submit(&self, job: Arc<dyn BuildJob>) -> Ticket {
        let ticket = {
            let mut mb = self.shared.lock();
            if let Some(replaced) = mb.pending.take()
                && let Some(observer) = replaced.async_observer()
            {
                observer.on_abandoned();
            }

            mb.last_ticket += 1;
            let ticket = Ticket(mb.last_ticket);
            if let Some(observer) = job.async_observer() {
                observer.on_queued(ticket);
            }
            mb.pending = Some(job);
            ticket
        };
        self.shared.wake.notify_one();
        ticket
    }
}

impl Drop for AsyncCompositor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(
    shared: &Shared,
    mut compositor: Compositor,
    generation: u64,
    poll: Duration,
) -> Compositor {
    loop {
        let job = {
            let mut mb = shared.lock();
            loop {
                if mb.generation != generation {
                    return compositor;
                }
                if let Some(job) = mb.pending.take() {
                    break job;
                }
                mb = match shared.wake.wait_timeout(mb, poll) {
                    Ok((guard, _)) => guard,
                    Err(poisoned) => poisoned.into_inner().0,
                };
            }
        };

        match catch_unwind(AssertUnwindSafe(|| compositor.run(job.as_ref()))) {
            Ok(outcome) => tracing::trace!(?outcome, "job finished"),
            Err(_) => tracing::error!("job callback panicked; worker keeps running"),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/service/async_compositor.rs"]
mod tests;
