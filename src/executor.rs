//! Work-stealing thread pool for parallel disjunction.
//!
//! Jobs submitted from outside the pool go to a global injector; jobs
//! submitted by a worker (a parallel branch nested inside another) go to
//! that worker's local FIFO deque, where idle peers can steal them.

use crossbeam_deque::{Injector, Steal, Stealer, Worker as LocalQueue};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, Thread};
use std::time::Duration;

#[cfg(feature = "tracing")]
use crate::trace::debug;

type Job = Box<dyn FnOnce() + Send + 'static>;

const IDLE_PARK: Duration = Duration::from_millis(2);

/// Configuration for an [`Executor`].
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Number of worker threads. Zero runs every job inline on submit.
    pub num_workers: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus(),
        }
    }
}

/// Get number of CPUs (fallback to 1).
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Executor-wide counters.
#[derive(Debug, Default)]
pub struct ExecutorStats {
    pub jobs_submitted: AtomicUsize,
    pub jobs_completed: AtomicUsize,
    pub jobs_panicked: AtomicUsize,
    pub steals: AtomicUsize,
}

impl ExecutorStats {
    fn record_submitted(&self) {
        self.jobs_submitted.fetch_add(1, Ordering::Relaxed);
    }

    fn record_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_panicked(&self) {
        self.jobs_panicked.fetch_add(1, Ordering::Relaxed);
    }

    fn record_steal(&self) {
        self.steals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn submitted(&self) -> usize {
        self.jobs_submitted.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> usize {
        self.jobs_completed.load(Ordering::Relaxed)
    }

    pub fn panicked(&self) -> usize {
        self.jobs_panicked.load(Ordering::Relaxed)
    }
}

struct Shared {
    id: usize,
    injector: Injector<Job>,
    stealers: Vec<Stealer<Job>>,
    threads: Mutex<Vec<Thread>>,
    next_wake: AtomicUsize,
    stop: AtomicBool,
    stats: ExecutorStats,
}

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(0);

struct WorkerSlot {
    shared: Arc<Shared>,
    index: usize,
    queue: LocalQueue<Job>,
}

thread_local! {
    // Pool, index and local queue of the worker running on this thread.
    static LOCAL: RefCell<Option<WorkerSlot>> = const { RefCell::new(None) };
}

/// A fixed-size pool of worker threads.
pub struct Executor {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
}

impl Executor {
    /// Start a pool with the default configuration.
    pub fn new() -> io::Result<Self> {
        Self::with_config(ExecutorConfig::default())
    }

    /// Start a pool with `config.num_workers` threads.
    pub fn with_config(config: ExecutorConfig) -> io::Result<Self> {
        let queues: Vec<LocalQueue<Job>> =
            (0..config.num_workers).map(|_| LocalQueue::new_fifo()).collect();
        let shared = Arc::new(Shared {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            injector: Injector::new(),
            stealers: queues.iter().map(|q| q.stealer()).collect(),
            threads: Mutex::new(Vec::new()),
            next_wake: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
            stats: ExecutorStats::default(),
        });

        let mut executor = Executor {
            shared: Arc::clone(&shared),
            handles: Vec::with_capacity(config.num_workers),
        };
        for (index, queue) in queues.into_iter().enumerate() {
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("fdlog-worker-{}", index))
                .spawn(move || worker_loop(shared, index, queue))?;
            executor.shared.threads.lock().push(handle.thread().clone());
            executor.handles.push(handle);
        }
        Ok(executor)
    }

    /// An executor without threads: jobs run on the submitting thread.
    pub fn inline() -> Self {
        Executor {
            shared: Arc::new(Shared {
                id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
                injector: Injector::new(),
                stealers: Vec::new(),
                threads: Mutex::new(Vec::new()),
                next_wake: AtomicUsize::new(0),
                stop: AtomicBool::new(false),
                stats: ExecutorStats::default(),
            }),
            handles: Vec::new(),
        }
    }

    /// The process-wide default pool, started on first use.
    ///
    /// Falls back to an inline executor if no thread can be spawned.
    pub fn global() -> Arc<Executor> {
        static GLOBAL: OnceLock<Arc<Executor>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| {
            Arc::new(Executor::new().unwrap_or_else(|_| Executor::inline()))
        }))
    }

    pub fn num_workers(&self) -> usize {
        self.handles.len()
    }

    pub fn stats(&self) -> &ExecutorStats {
        &self.shared.stats
    }

    /// Schedule `job`. It always runs to completion; there is no cancel.
    pub fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        self.shared.stats.record_submitted();
        let job: Job = Box::new(job);

        if self.handles.is_empty() {
            run_job(&self.shared, job);
            return;
        }

        let pool = self.shared.id;
        let overflow = LOCAL.with(|local| match &*local.borrow() {
            Some(slot) if slot.shared.id == pool => {
                slot.queue.push(job);
                None
            }
            _ => Some(job),
        });
        if let Some(job) = overflow {
            self.shared.injector.push(job);
        }
        self.wake_one();
    }

    fn wake_one(&self) {
        let threads = self.shared.threads.lock();
        if threads.is_empty() {
            return;
        }
        let i = self.shared.next_wake.fetch_add(1, Ordering::Relaxed) % threads.len();
        threads[i].unpark();
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        for t in self.shared.threads.lock().iter() {
            t.unpark();
        }
        // The last handle may be released by a job on one of our own workers.
        let me = thread::current().id();
        for handle in self.handles.drain(..) {
            if handle.thread().id() != me {
                let _ = handle.join();
            }
        }
    }
}

fn worker_loop(shared: Arc<Shared>, index: usize, queue: LocalQueue<Job>) {
    #[cfg(feature = "tracing")]
    debug!(worker = index, "executor_worker_start");

    LOCAL.with(|local| {
        *local.borrow_mut() = Some(WorkerSlot {
            shared: Arc::clone(&shared),
            index,
            queue,
        })
    });

    while !shared.stop.load(Ordering::SeqCst) {
        match find_job(&shared, index) {
            Some(job) => run_job(&shared, job),
            None => thread::park_timeout(IDLE_PARK),
        }
    }

    LOCAL.with(|local| local.borrow_mut().take());

    #[cfg(feature = "tracing")]
    debug!(worker = index, "executor_worker_stop");
}

/// Local queue first, then the injector, then peers.
fn find_job(shared: &Shared, index: usize) -> Option<Job> {
    let job = LOCAL.with(|local| {
        let local = local.borrow();
        let queue = &local.as_ref()?.queue;
        if let Some(job) = queue.pop() {
            return Some(job);
        }
        loop {
            match shared.injector.steal_batch_and_pop(queue) {
                Steal::Success(job) => return Some(job),
                Steal::Empty => return None,
                Steal::Retry => continue,
            }
        }
    });
    if job.is_some() {
        return job;
    }

    for (i, stealer) in shared.stealers.iter().enumerate() {
        if i == index {
            continue;
        }
        loop {
            match stealer.steal() {
                Steal::Success(job) => {
                    shared.stats.record_steal();
                    return Some(job);
                }
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }
    }
    None
}

/// Whether the current thread is a worker of some pool.
pub fn on_worker() -> bool {
    LOCAL.with(|local| local.borrow().is_some())
}

/// Run one pending job of the current worker's pool, if there is one.
///
/// A worker that must wait for a result calls this in between polls, so a
/// job queued behind it still gets to run. Returns false off the pool or
/// when no job was found.
pub fn help_one() -> bool {
    let found = LOCAL.with(|local| {
        let local = local.borrow();
        let slot = local.as_ref()?;
        let shared = Arc::clone(&slot.shared);
        let job = find_job(&shared, slot.index)?;
        Some((shared, job))
    });
    match found {
        Some((shared, job)) => {
            run_job(&shared, job);
            true
        }
        None => false,
    }
}

// A panicking job drops its result sender; whoever waits on it sees the
// disconnect and panics on their own thread.
fn run_job(shared: &Shared, job: Job) {
    match catch_unwind(AssertUnwindSafe(job)) {
        Ok(()) => shared.stats.record_completed(),
        Err(_) => {
            shared.stats.record_panicked();
            #[cfg(feature = "tracing")]
            debug!("executor_job_panicked");
        }
    }
}
