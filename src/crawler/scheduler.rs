//! Fixed-size worker pool
//!
//! This module handles:
//! - One OS thread per worker, each draining its own closure queue
//! - Pinned and round-robin batch submission
//! - Graceful close (queued work still runs) and forced terminate, where
//!   unstarted closures are exported to the caller instead of being run
//! - Per-item panic isolation

use crate::crawler::context::Job;
use crate::SchedulerError;
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// Called with the panic message of a failed closure
pub type PanicHook = Arc<dyn Fn(String) + Send + Sync>;

/// How a batch is distributed over workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitPolicy {
    /// The whole batch goes to one worker, in order
    Pin,
    /// Items are dealt round-robin across workers
    Spread,
}

/// Counts closures accepted but not yet finished or exported
#[derive(Debug, Default)]
pub struct ActivityTracker {
    pending: Mutex<usize>,
    idle: Condvar,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        *self.pending.lock()
    }

    fn add(&self, count: usize) {
        *self.pending.lock() += count;
    }

    fn done(&self, count: usize) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_sub(count);
        if *pending == 0 {
            self.idle.notify_all();
        }
    }

    /// Blocks until nothing is pending or `timeout` elapses
    ///
    /// # Returns
    ///
    /// `true` if the tracker went idle
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();
        while *pending > 0 {
            if self.idle.wait_until(&mut pending, deadline).timed_out() {
                return *pending == 0;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Open,
    Closing,
    Terminate,
}

struct QueueState {
    jobs: VecDeque<Job>,
    mode: Mode,
}

struct WorkerQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
    terminate: AtomicBool,
}

impl WorkerQueue {
    fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                mode: Mode::Open,
            }),
            ready: Condvar::new(),
            terminate: AtomicBool::new(false),
        }
    }

    fn set_mode(&self, mode: Mode) {
        let mut state = self.state.lock();
        // Terminate wins over Closing
        if state.mode != Mode::Terminate {
            state.mode = mode;
        }
        if mode == Mode::Terminate {
            self.terminate.store(true, Ordering::Release);
        }
        self.ready.notify_all();
    }
}

/// Extracts a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn run_job(job: Job, hook: Option<&PanicHook>) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        let message = panic_message(payload.as_ref());
        tracing::error!("Scheduled task panicked: {}", message);
        if let Some(hook) = hook {
            hook(message);
        }
    }
}

fn worker_loop(queue: Arc<WorkerQueue>, tracker: Arc<ActivityTracker>, hook: Option<PanicHook>) {
    loop {
        let mut batch = {
            let mut state = queue.state.lock();
            while state.jobs.is_empty() && state.mode == Mode::Open {
                queue.ready.wait(&mut state);
            }
            if state.mode == Mode::Terminate || state.jobs.is_empty() {
                return;
            }
            std::mem::take(&mut state.jobs)
        };

        while let Some(job) = batch.pop_front() {
            run_job(job, hook.as_ref());
            tracker.done(1);

            if queue.terminate.load(Ordering::Acquire) {
                // Hand unstarted work back for export
                let mut state = queue.state.lock();
                while let Some(job) = batch.pop_back() {
                    state.jobs.push_front(job);
                }
                return;
            }
        }
    }
}

/// Fixed set of worker threads, each with a private FIFO
pub struct TaskScheduler {
    queues: Vec<Arc<WorkerQueue>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    worker_ids: Vec<ThreadId>,
    closed: AtomicBool,
    joined: AtomicBool,
    next: AtomicUsize,
    tracker: Arc<ActivityTracker>,
}

impl TaskScheduler {
    /// Spawns `threads` workers
    ///
    /// # Arguments
    ///
    /// * `threads` - Number of workers, at least one
    /// * `tracker` - Shared pending-work counter
    /// * `hook` - Receives the message of every panicking closure
    pub fn new(
        threads: usize,
        tracker: Arc<ActivityTracker>,
        hook: Option<PanicHook>,
    ) -> Result<Self, SchedulerError> {
        if threads == 0 {
            return Err(SchedulerError::NoThreads);
        }

        let queues: Vec<_> = (0..threads).map(|_| Arc::new(WorkerQueue::new())).collect();
        let mut handles = Vec::with_capacity(threads);

        for (i, queue) in queues.iter().enumerate() {
            let queue = Arc::clone(queue);
            let worker_tracker = Arc::clone(&tracker);
            let worker_hook = hook.clone();
            let spawned = thread::Builder::new()
                .name(format!("webgrep-worker-{}", i))
                .spawn(move || worker_loop(queue, worker_tracker, worker_hook));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    for queue in &queues {
                        queue.set_mode(Mode::Closing);
                    }
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(SchedulerError::Spawn(e));
                }
            }
        }

        let worker_ids = handles.iter().map(|h| h.thread().id()).collect();
        tracing::debug!("Started worker pool with {} threads", threads);

        Ok(Self {
            queues,
            handles: Mutex::new(handles),
            worker_ids,
            closed: AtomicBool::new(false),
            joined: AtomicBool::new(false),
            next: AtomicUsize::new(0),
            tracker,
        })
    }

    pub fn threads_count(&self) -> usize {
        self.queues.len()
    }

    /// No longer accepting submissions
    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Every worker has been joined
    pub fn joined(&self) -> bool {
        self.joined.load(Ordering::Acquire)
    }

    /// True when called from one of this pool's workers
    pub fn is_worker_thread(&self) -> bool {
        self.worker_ids.contains(&thread::current().id())
    }

    fn push(&self, worker: usize, jobs: Vec<Job>) -> Result<(), Vec<Job>> {
        let queue = &self.queues[worker % self.queues.len()];
        let mut state = queue.state.lock();
        if state.mode != Mode::Open {
            return Err(jobs);
        }
        self.tracker.add(jobs.len());
        state.jobs.extend(jobs);
        queue.ready.notify_one();
        Ok(())
    }

    /// Queues one closure on the next worker in turn
    ///
    /// The closure is handed back if the pool is closed.
    pub fn submit(&self, job: Job) -> Result<(), Job> {
        if self.closed() {
            return Err(job);
        }
        let worker = self.next.fetch_add(1, Ordering::Relaxed);
        self.push(worker, vec![job])
            .map_err(|mut jobs| jobs.remove(0))
    }

    /// Queues a batch according to `policy`
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Every closure was accepted
    /// * `Err(Vec<Job>)` - The closures that were not accepted
    pub fn submit_batch(&self, jobs: Vec<Job>, policy: SubmitPolicy) -> Result<(), Vec<Job>> {
        if jobs.is_empty() {
            return Ok(());
        }
        if self.closed() {
            return Err(jobs);
        }

        match policy {
            SubmitPolicy::Pin => {
                let worker = self.next.fetch_add(1, Ordering::Relaxed);
                self.push(worker, jobs)
            }
            SubmitPolicy::Spread => {
                let workers = self.queues.len();
                let start = self.next.fetch_add(jobs.len(), Ordering::Relaxed);
                let mut shares: Vec<Vec<Job>> = (0..workers).map(|_| Vec::new()).collect();
                for (i, job) in jobs.into_iter().enumerate() {
                    shares[(start + i) % workers].push(job);
                }

                let mut rejected = Vec::new();
                for (worker, share) in shares.into_iter().enumerate() {
                    if share.is_empty() {
                        continue;
                    }
                    if let Err(jobs) = self.push(worker, share) {
                        rejected.extend(jobs);
                    }
                }

                if rejected.is_empty() {
                    Ok(())
                } else {
                    Err(rejected)
                }
            }
        }
    }

    /// Stops accepting work; queued closures still run
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        for queue in &self.queues {
            queue.set_mode(Mode::Closing);
        }
    }

    fn join_workers(&self) {
        let handles = std::mem::take(&mut *self.handles.lock());
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::error!("Worker thread exited with a panic");
            }
        }
        self.joined.store(true, Ordering::Release);
    }

    /// Closes the pool and waits for every worker to drain its queue
    pub fn join_all(&self) {
        self.close();
        self.join_workers();
    }

    /// Terminates workers after their current closure and exports the rest
    ///
    /// Each worker's unstarted closures are passed to `export` once all
    /// workers have stopped. Must not be called from a worker of this pool.
    pub fn join_export_all<F>(&self, mut export: F)
    where
        F: FnMut(Vec<Job>),
    {
        self.closed.store(true, Ordering::Release);
        for queue in &self.queues {
            queue.set_mode(Mode::Terminate);
        }
        self.join_workers();

        for queue in &self.queues {
            let jobs: Vec<Job> = queue.state.lock().jobs.drain(..).collect();
            if !jobs.is_empty() {
                self.tracker.done(jobs.len());
                export(jobs);
            }
        }
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        // Workers finish their queues detached
        self.close();
    }
}
