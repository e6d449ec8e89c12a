//! Fixed-Size Worker Pool
//!
//! ## Dispatch
//!
//! The queue and the shutdown flag live together behind one `Mutex` and are
//! paired with one `Condvar`. A worker only goes to sleep after checking both
//! under that lock, and both `submit` and `shutdown` modify state under the
//! same lock before notifying, so no wake-up can be lost.
//!
//! A task is popped while the lock is held and run after it is released.
//! Popping is the hand-off: once a worker owns a task no other worker can see
//! it, so every task runs exactly once.
//!
//! ## Shutdown
//!
//! Shutdown is a drain, not a cancel. Workers keep popping until the queue is
//! empty and only exit once shutdown is requested *and* nothing is left.
//!
//! ## Panics
//!
//! A panic escaping a task is caught, logged, and dropped. The worker then
//! moves on to the next task, so the pool never loses capacity.

use std::any::Any;
use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, info_span, warn};

/// A unit of work: runs once, returns nothing.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<Task>,
    shutting_down: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A fixed-size thread pool with a shared FIFO queue.
///
/// # Example
///
/// ```
/// use emberkv::pool::WorkerPool;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let pool = WorkerPool::new(4).unwrap();
/// let counter = Arc::new(AtomicUsize::new(0));
///
/// for _ in 0..100 {
///     let counter = Arc::clone(&counter);
///     pool.submit(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     });
/// }
///
/// pool.shutdown();
/// assert_eq!(counter.load(Ordering::SeqCst), 100);
/// ```
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    size: usize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("pending", &self.pending())
            .finish()
    }
}

impl WorkerPool {
    /// Spawns `size` worker threads. A size of 0 is raised to 1.
    ///
    /// Fails only if the OS refuses to spawn a thread; workers already
    /// started are shut down before the error is returned.
    pub fn new(size: usize) -> io::Result<Self> {
        let size = if size == 0 {
            warn!("Worker pool size 0 requested, using 1");
            1
        } else {
            size
        };

        let mut pool = Self {
            shared: Arc::new(Shared::default()),
            workers: Vec::with_capacity(size),
            size,
        };

        for id in 0..size {
            let shared = Arc::clone(&pool.shared);
            // On error `pool` is dropped, which joins the workers spawned so far
            let handle = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || worker_loop(id, shared))?;
            pool.workers.push(handle);
        }

        info!(workers = size, "Worker pool created");
        Ok(pool)
    }

    /// Returns the number of worker threads.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the number of tasks waiting in the queue.
    pub fn pending(&self) -> usize {
        self.shared.lock().tasks.len()
    }

    /// Queues a task and wakes one idle worker. Never blocks on the task.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.lock().tasks.push_back(Box::new(task));
        self.shared.available.notify_one();
    }

    /// Runs every queued task, then stops and joins all workers.
    pub fn shutdown(mut self) {
        self.join_workers();
    }

    fn join_workers(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        self.shared.lock().shutting_down = true;
        self.shared.available.notify_all();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("Worker thread exited abnormally");
            }
        }

        info!("Worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.join_workers();
    }
}

fn worker_loop(id: usize, shared: Arc<Shared>) {
    let _span = info_span!("worker", id = id).entered();
    debug!("Worker started");

    loop {
        let task = {
            let state = shared.lock();
            let mut state = shared
                .available
                .wait_while(state, |s| s.tasks.is_empty() && !s.shutting_down)
                .unwrap_or_else(PoisonError::into_inner);

            match state.tasks.pop_front() {
                Some(task) => task,
                // Empty queue after waking means shutdown was requested
                None => break,
            }
        };

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            error!(
                panic = %panic_message(payload.as_ref()),
                "Task panicked, worker continues"
            );
        }
    }

    debug!("Worker exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
