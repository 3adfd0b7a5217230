//! Single-worker FIFO task queue.
//!
//! One dedicated thread pops items in enqueue order and hands them to a
//! handler. The pass scheduler uses it to keep every backend call on the
//! thread that owns the backend context.
//!
//! ## Usage
//! ```ignore
//! let mut queue = JobQueue::new();
//! queue.init(|item: u32| {
//!     println!("got {item}");
//!     item == 0 // returning true stops the worker
//! });
//! queue.add_task(3);
//! queue.finish(); // blocks until empty and idle
//! queue.deinit();
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::{Condvar, Mutex};

/// What the worker thread is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for work (or not started / stopped).
    Idle,
    /// Inside the handler.
    Processing,
}

struct Inner<T> {
    items: VecDeque<T>,
    state: WorkerState,
    /// Set by `deinit` once the queue has drained.
    stop: bool,
    /// Set when the worker thread has exited for any reason.
    terminated: bool,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    /// Signalled when items arrive or stop is requested.
    work: Condvar,
    /// Signalled when the worker goes idle with an empty queue, or exits.
    idle: Condvar,
}

/// FIFO queue drained by exactly one worker thread.
pub struct JobQueue<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    handle: Option<JoinHandle<()>>,
    worker_id: Option<ThreadId>,
}

impl<T: Send + 'static> JobQueue<T> {
    /// Create an uninitialized queue. Items added before [`init`](Self::init)
    /// are discarded.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    items: VecDeque::new(),
                    state: WorkerState::Idle,
                    stop: false,
                    terminated: false,
                }),
                work: Condvar::new(),
                idle: Condvar::new(),
            }),
            handle: None,
            worker_id: None,
        }
    }

    /// Spawn the worker thread.
    ///
    /// `handler` runs on the worker for every item; returning `true` asks
    /// the worker to exit after that item. Calling `init` twice is ignored.
    pub fn init<F>(&mut self, handler: F)
    where
        F: FnMut(T) -> bool + Send + 'static,
    {
        if self.handle.is_some() {
            tracing::warn!("job queue already initialized");
            return;
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("pathpass-worker".to_string())
            .spawn(move || worker_loop(shared, handler));

        match spawned {
            Ok(handle) => {
                self.worker_id = Some(handle.thread().id());
                self.handle = Some(handle);
            }
            Err(e) => {
                tracing::error!("failed to spawn worker thread: {}", e);
                self.shared.inner.lock().terminated = true;
            }
        }
    }

    /// Append an item to the tail of the queue. Never blocks on the worker.
    ///
    /// Silently dropped if the queue was never initialized or the worker
    /// has already exited.
    pub fn add_task(&self, item: T) {
        if self.handle.is_none() {
            return;
        }
        let mut inner = self.shared.inner.lock();
        if inner.stop || inner.terminated {
            return;
        }
        inner.items.push_back(item);
        self.shared.work.notify_one();
    }

    /// Block until the queue is empty and the worker is idle.
    ///
    /// Also returns if the worker has exited. Must not be called from
    /// inside the handler; that would wait on itself, so it returns
    /// immediately with a warning instead.
    pub fn finish(&self) {
        if self.worker_id == Some(thread::current().id()) {
            tracing::warn!("finish() called from the worker thread; ignoring");
            return;
        }
        let mut inner = self.shared.inner.lock();
        while !inner.terminated
            && (!inner.items.is_empty() || inner.state == WorkerState::Processing)
        {
            self.shared.idle.wait(&mut inner);
        }
    }

    /// Drain the queue, stop the worker and join it.
    ///
    /// From inside the handler the worker cannot be joined; it is told to
    /// stop once the remaining items are processed and left detached.
    pub fn deinit(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if self.worker_id == Some(thread::current().id()) {
            let mut inner = self.shared.inner.lock();
            inner.stop = true;
            self.shared.work.notify_all();
            drop(handle);
            self.worker_id = None;
            return;
        }
        self.finish();
        {
            let mut inner = self.shared.inner.lock();
            inner.stop = true;
            self.shared.work.notify_all();
        }
        if handle.join().is_err() {
            tracing::error!("worker thread panicked");
        }
        self.worker_id = None;
    }

    /// Current worker state.
    pub fn state(&self) -> WorkerState {
        self.shared.inner.lock().state
    }

    /// Number of queued items not yet picked up by the worker.
    pub fn pending(&self) -> usize {
        self.shared.inner.lock().items.len()
    }

    /// Whether the worker thread is alive and accepting items.
    pub fn is_running(&self) -> bool {
        let inner = self.shared.inner.lock();
        self.handle.is_some() && !inner.stop && !inner.terminated
    }
}

impl<T: Send + 'static> Default for JobQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Drop for JobQueue<T> {
    fn drop(&mut self) {
        self.deinit();
    }
}

/// Marks the queue terminated when the worker exits, including by panic,
/// so `finish()` never waits on a dead thread.
struct ExitGuard<'a, T> {
    shared: &'a Shared<T>,
}

impl<T> Drop for ExitGuard<'_, T> {
    fn drop(&mut self) {
        let dropped = {
            let mut inner = self.shared.inner.lock();
            inner.terminated = true;
            inner.state = WorkerState::Idle;
            std::mem::take(&mut inner.items)
        };
        self.shared.idle.notify_all();
        if !dropped.is_empty() {
            tracing::debug!("worker exited with {} queued items discarded", dropped.len());
        }
    }
}

/// Main worker loop - runs on the dedicated thread.
fn worker_loop<T, F>(shared: Arc<Shared<T>>, mut handler: F)
where
    F: FnMut(T) -> bool,
{
    let _guard = ExitGuard { shared: &shared };

    loop {
        let item = {
            let mut inner = shared.inner.lock();
            loop {
                if let Some(item) = inner.items.pop_front() {
                    inner.state = WorkerState::Processing;
                    break item;
                }
                if inner.stop {
                    return;
                }
                shared.work.wait(&mut inner);
            }
        };

        let quit = handler(item);

        let mut inner = shared.inner.lock();
        inner.state = WorkerState::Idle;
        if quit {
            return;
        }
        if inner.items.is_empty() {
            shared.idle.notify_all();
        }
    }
}
