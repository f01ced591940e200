//! # Striped Scheduler
//!
//! Serial per-key execution on top of a shared, bounded worker pool.
//!
//! ## Architecture
//!
//! ```text
//!                     ┌─────────┐
//! submit(key, task) ─►│ stripe  │ key ^ (key >> 32) & mask
//!                     └────┬────┘
//!                          │ idle? CAS running ──► Drain(i) ──► bounded job queue
//!                          │                                        │
//!              queue full? └─► caller runs the drain inline     workers
//! ```
//!
//! ## Guarantees
//!
//! - Tasks for one stripe run in submission order, never concurrently
//! - Different stripes run in parallel
//! - A full job queue never drops work: the submitting thread drains the
//!   stripe itself
//!
//! Handlers must not submit to the scheduler they run on.

use std::sync::atomic::{fence, AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};

/// Tasks run per drain job before the stripe is handed back to the pool.
const DRAIN_BATCH: usize = 256;

/// Executes tasks for the scheduler.
pub trait StripeHandler: Send + Sync + 'static {
    /// Unit of work.
    type Task: Send + 'static;
    /// Per-thread scratch state.
    type Context: Send + 'static;

    /// Builds the scratch state for one worker (or the caller-runs path).
    fn create_context(&self) -> Self::Context;

    /// Runs one task.
    fn handle(&self, context: &mut Self::Context, task: Self::Task);
}

/// Counters since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks accepted by `submit`.
    pub submitted: u64,
    /// Tasks run to completion.
    pub executed: u64,
    /// Drains run on a submitting thread because the job queue was full.
    pub caller_runs: u64,
}

enum Job {
    Drain(usize),
    Shutdown,
}

struct Stripe<T> {
    sender: Sender<T>,
    queue: Receiver<T>,
    running: AtomicBool,
}

impl<T> Stripe<T> {
    fn new() -> Self {
        let (sender, queue) = unbounded();
        Self {
            sender,
            queue,
            running: AtomicBool::new(false),
        }
    }

    fn try_claim(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

struct Shared<H: StripeHandler> {
    handler: H,
    stripes: Box<[Stripe<H::Task>]>,
    mask: u64,
    jobs: Sender<Job>,
    accepting: AtomicBool,
    /// Idle contexts for caller-runs drains. One is taken per drain, so
    /// concurrent callers never wait on each other.
    fallback: Mutex<Vec<H::Context>>,
    submitted: AtomicU64,
    executed: AtomicU64,
    caller_runs: AtomicU64,
}

impl<H: StripeHandler> Shared<H> {
    fn drain(&self, index: usize, context: &mut H::Context) {
        let stripe = &self.stripes[index];
        loop {
            let mut budget = DRAIN_BATCH;
            while budget > 0 {
                if !self.accepting.load(Ordering::Acquire) {
                    return;
                }
                let Ok(task) = stripe.queue.try_recv() else {
                    break;
                };
                self.handler.handle(context, task);
                self.executed.fetch_add(1, Ordering::Release);
                budget -= 1;
            }

            if budget > 0 {
                // Queue looked empty: release, then catch submits that raced
                // with the release.
                stripe.running.store(false, Ordering::SeqCst);
                fence(Ordering::SeqCst);
                if stripe.queue.is_empty() || !stripe.try_claim() {
                    return;
                }
            }

            match self.jobs.try_send(Job::Drain(index)) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => return,
                // Keep draining on this thread
                Err(TrySendError::Full(_)) => {}
            }
        }
    }
}

/// Fixed set of serial stripes over a bounded worker pool.
pub struct StripedScheduler<H: StripeHandler> {
    shared: Arc<Shared<H>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl<H: StripeHandler> StripedScheduler<H> {
    /// Starts `workers` threads over `stripes` stripes (rounded up to a
    /// power of two) with a job queue of `queue_capacity`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::WorkerSpawn`] if a thread cannot be started.
    pub fn new(
        handler: H,
        workers: usize,
        stripes: usize,
        queue_capacity: usize,
    ) -> EngineResult<Self> {
        let workers = workers.max(1);
        let stripe_count = stripes.max(1).next_power_of_two();
        let (jobs, job_queue) = bounded(queue_capacity.max(1));
        let fallback = Mutex::new(vec![handler.create_context()]);

        let shared = Arc::new(Shared {
            handler,
            stripes: (0..stripe_count).map(|_| Stripe::new()).collect(),
            mask: stripe_count as u64 - 1,
            jobs,
            accepting: AtomicBool::new(true),
            fallback,
            submitted: AtomicU64::new(0),
            executed: AtomicU64::new(0),
            caller_runs: AtomicU64::new(0),
        });

        let scheduler = Self {
            shared,
            workers: Mutex::new(Vec::with_capacity(workers)),
            worker_count: workers,
        };

        for id in 0..workers {
            let shared = Arc::clone(&scheduler.shared);
            let job_queue = job_queue.clone();
            let handle = thread::Builder::new()
                .name(format!("warden-worker-{id}"))
                .spawn(move || worker_loop(&shared, &job_queue))
                .map_err(|e| EngineError::WorkerSpawn(e.to_string()))?;
            scheduler.workers.lock().push(handle);
        }

        info!(workers, stripes = stripe_count, queue_capacity, "scheduler started");
        Ok(scheduler)
    }

    /// Stripe a key maps to.
    #[inline]
    #[must_use]
    pub fn stripe_index(&self, key: u64) -> usize {
        #[allow(clippy::cast_possible_truncation)]
        let index = ((key ^ (key >> 32)) & self.shared.mask) as usize;
        index
    }

    /// Number of stripes.
    #[inline]
    #[must_use]
    pub fn stripe_count(&self) -> usize {
        self.shared.stripes.len()
    }

    /// Number of worker threads.
    #[inline]
    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// The task handler.
    #[inline]
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.shared.handler
    }

    /// Queues `task` behind every earlier task with the same stripe.
    ///
    /// May run the stripe's queue on the calling thread when the worker
    /// pool is saturated.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SchedulerShutdown`] after [`shutdown`](Self::shutdown).
    pub fn submit(&self, key: u64, task: H::Task) -> EngineResult<()> {
        let shared = &*self.shared;
        if !shared.accepting.load(Ordering::Acquire) {
            return Err(EngineError::SchedulerShutdown);
        }

        let index = self.stripe_index(key);
        let stripe = &shared.stripes[index];
        shared.submitted.fetch_add(1, Ordering::AcqRel);
        if stripe.sender.send(task).is_err() {
            shared.submitted.fetch_sub(1, Ordering::AcqRel);
            return Err(EngineError::SchedulerShutdown);
        }
        fence(Ordering::SeqCst);

        if !stripe.try_claim() {
            // A drain owns the stripe and will see the task
            return Ok(());
        }

        match shared.jobs.try_send(Job::Drain(index)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                shared.caller_runs.fetch_add(1, Ordering::Relaxed);
                debug!(stripe = index, "job queue full, draining on caller");
                let pooled = shared.fallback.lock().pop();
                let mut context = pooled.unwrap_or_else(|| shared.handler.create_context());
                shared.drain(index, &mut context);
                shared.fallback.lock().push(context);
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => {
                stripe.running.store(false, Ordering::SeqCst);
                Err(EngineError::SchedulerShutdown)
            }
        }
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            submitted: self.shared.submitted.load(Ordering::Acquire),
            executed: self.shared.executed.load(Ordering::Acquire),
            caller_runs: self.shared.caller_runs.load(Ordering::Relaxed),
        }
    }

    /// Waits until every submitted task has run. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let stats = self.stats();
            if stats.executed >= stats.submitted {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Whether new work is still accepted.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.accepting.load(Ordering::Acquire)
    }

    /// Stops accepting work and joins the workers.
    ///
    /// Tasks already running complete; queued tasks are abandoned.
    pub fn shutdown(&self) {
        let handles = std::mem::take(&mut *self.workers.lock());
        if handles.is_empty() {
            return;
        }

        self.shared.accepting.store(false, Ordering::Release);
        for _ in 0..handles.len() {
            if self.shared.jobs.send(Job::Shutdown).is_err() {
                break;
            }
        }
        for handle in handles {
            let _ = handle.join();
        }

        let stats = self.stats();
        info!(
            executed = stats.executed,
            abandoned = stats.submitted.saturating_sub(stats.executed),
            caller_runs = stats.caller_runs,
            "scheduler shut down"
        );
    }
}

impl<H: StripeHandler> Drop for StripedScheduler<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<H: StripeHandler>(shared: &Shared<H>, jobs: &Receiver<Job>) {
    let mut context = shared.handler.create_context();
    while let Ok(job) = jobs.recv() {
        match job {
            Job::Drain(index) => {
                if shared.accepting.load(Ordering::Acquire) {
                    shared.drain(index, &mut context);
                }
            }
            Job::Shutdown => break,
        }
    }
}
