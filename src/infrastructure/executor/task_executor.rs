//! Fixed-size worker pool draining a bounded task queue.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Boxed future produced by a submitted task.
pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

type Job = Box<dyn FnOnce(TaskContext) -> TaskFuture + Send + 'static>;

/// Reasons a task can be refused by [`TaskExecutor::submit`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorError {
    /// Kept for parity with untyped callers; a Rust closure is never null,
    /// so [`TaskExecutor::submit`] never returns it.
    #[error("task cannot be empty")]
    NilTask,
    #[error("task executor has not been started")]
    NotStarted,
    #[error("task queue is full")]
    QueueFull,
    #[error("task executor is shutting down")]
    ShuttingDown,
}

/// Lifecycle of an executor. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Created,
    Started,
    Stopped,
}

/// Information handed to a task when a worker picks it up.
#[derive(Debug, Clone, Copy)]
pub struct TaskContext {
    worker_id: usize,
}

impl TaskContext {
    /// Zero-based id of the worker running the task.
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }
}

/// Snapshot of executor counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorStats {
    pub state: ExecutorState,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub queued: usize,
    pub submitted: u64,
    pub rejected: u64,
    pub completed: u64,
    pub panicked: u64,
}

#[derive(Default)]
struct Counters {
    queued: AtomicUsize,
    submitted: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
}

struct Lifecycle {
    state: ExecutorState,
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

/// Runs fire-and-forget async tasks on a fixed number of workers.
///
/// Tasks go through a bounded FIFO queue. [`submit`](Self::submit) never
/// waits: a saturated queue is reported as [`ExecutorError::QueueFull`] so the
/// caller can drop the work and move on. Each worker runs one task at a time
/// to completion, so at most `worker_count` tasks are in flight.
///
/// [`shutdown`](Self::shutdown) closes the queue and waits until every task
/// accepted before it has run. The drain is tracked by the workers
/// themselves, so a `shutdown` future dropped halfway (e.g. by a timeout)
/// does not leave later callers waiting forever.
pub struct TaskExecutor {
    name: &'static str,
    worker_count: usize,
    queue_capacity: usize,
    lifecycle: Mutex<Lifecycle>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    counters: Arc<Counters>,
    live_workers: Arc<AtomicUsize>,
    drained: Arc<watch::Sender<bool>>,
}

impl TaskExecutor {
    /// Creates an executor in the [`ExecutorState::Created`] state.
    ///
    /// `name` labels log lines and metrics. Zero `worker_count` or
    /// `queue_capacity` is clamped to one.
    pub fn new(name: &'static str, worker_count: usize, queue_capacity: usize) -> Self {
        let worker_count = worker_count.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel(queue_capacity);
        let (drained, _) = watch::channel(false);

        Self {
            name,
            worker_count,
            queue_capacity,
            lifecycle: Mutex::new(Lifecycle {
                state: ExecutorState::Created,
                sender: Some(sender),
                workers: Vec::with_capacity(worker_count),
            }),
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            counters: Arc::new(Counters::default()),
            live_workers: Arc::new(AtomicUsize::new(0)),
            drained: Arc::new(drained),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the workers on the current Tokio runtime.
    ///
    /// Calling it again while started, or after shutdown, does nothing.
    pub fn start(&self) {
        let mut lifecycle = self.lock();
        if lifecycle.state != ExecutorState::Created {
            return;
        }

        self.live_workers.store(self.worker_count, Ordering::SeqCst);
        for worker_id in 0..self.worker_count {
            let exit = WorkerExit {
                name: self.name,
                live_workers: Arc::clone(&self.live_workers),
                drained: Arc::clone(&self.drained),
            };
            lifecycle.workers.push(tokio::spawn(run_worker(
                self.name,
                worker_id,
                Arc::clone(&self.receiver),
                Arc::clone(&self.counters),
                exit,
            )));
        }
        lifecycle.state = ExecutorState::Started;

        info!(
            executor = self.name,
            workers = self.worker_count,
            queue_capacity = self.queue_capacity,
            "Task executor started"
        );
    }

    /// Enqueues a task without waiting.
    ///
    /// # Errors
    ///
    /// - [`ExecutorError::NotStarted`] before [`start`](Self::start)
    /// - [`ExecutorError::QueueFull`] when every queue slot is taken
    /// - [`ExecutorError::ShuttingDown`] once [`shutdown`](Self::shutdown) has begun
    ///
    /// On success the task runs exactly once, on one worker, at some later point.
    pub fn submit<F, Fut>(&self, task: F) -> Result<(), ExecutorError>
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job: Job = Box::new(move |ctx| Box::pin(task(ctx)));

        let result = {
            let lifecycle = self.lock();
            match (lifecycle.state, lifecycle.sender.as_ref()) {
                (ExecutorState::Created, _) => Err(ExecutorError::NotStarted),
                (ExecutorState::Started, Some(sender)) => {
                    // Counted before the send so a worker never sees it go negative.
                    self.counters.queued.fetch_add(1, Ordering::Relaxed);
                    sender.try_send(job).map_err(|e| {
                        self.counters.queued.fetch_sub(1, Ordering::Relaxed);
                        match e {
                            TrySendError::Full(_) => ExecutorError::QueueFull,
                            TrySendError::Closed(_) => ExecutorError::ShuttingDown,
                        }
                    })
                }
                _ => Err(ExecutorError::ShuttingDown),
            }
        };

        match result {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("url_shortener_worker_tasks_submitted_total", "worker_type" => self.name)
                    .increment(1);
            }
            Err(e) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(
                    "url_shortener_worker_tasks_rejected_total",
                    "worker_type" => self.name,
                    "reason" => reject_reason(e)
                )
                .increment(1);
            }
        }
        metrics::gauge!("url_shortener_worker_queue_size", "worker_type" => self.name)
            .set(self.counters.queued.load(Ordering::Relaxed) as f64);

        result
    }

    /// Stops accepting tasks and waits for the queue to drain.
    ///
    /// Workers finish the task in hand, run everything still queued, then
    /// exit. Concurrent or repeated calls wait for the same drain.
    pub async fn shutdown(&self) {
        let workers = {
            let mut lifecycle = self.lock();
            let previous = std::mem::replace(&mut lifecycle.state, ExecutorState::Stopped);
            // Dropping the only sender closes the queue once it is empty.
            lifecycle.sender = None;

            match previous {
                ExecutorState::Started => std::mem::take(&mut lifecycle.workers),
                ExecutorState::Created => {
                    self.drained.send_replace(true);
                    return;
                }
                ExecutorState::Stopped => Vec::new(),
            }
        };

        if workers.is_empty() {
            let mut drained = self.drained.subscribe();
            let _ = drained.wait_for(|done| *done).await;
            return;
        }

        info!(
            executor = self.name,
            queued = self.counters.queued.load(Ordering::Relaxed),
            "Task executor draining"
        );

        for worker in workers {
            if let Err(e) = worker.await {
                error!(executor = self.name, error = %e, "Worker terminated abnormally");
            }
        }
    }

    pub fn state(&self) -> ExecutorState {
        self.lock().state
    }

    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            state: self.state(),
            worker_count: self.worker_count,
            queue_capacity: self.queue_capacity,
            queued: self.counters.queued.load(Ordering::Relaxed),
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
        }
    }
}

fn reject_reason(error: ExecutorError) -> &'static str {
    match error {
        ExecutorError::NilTask => "nil_task",
        ExecutorError::NotStarted => "not_started",
        ExecutorError::QueueFull => "queue_full",
        ExecutorError::ShuttingDown => "shutting_down",
    }
}

/// Held by a running worker; the last one to exit marks the executor drained.
struct WorkerExit {
    name: &'static str,
    live_workers: Arc<AtomicUsize>,
    drained: Arc<watch::Sender<bool>>,
}

impl Drop for WorkerExit {
    fn drop(&mut self) {
        if self.live_workers.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.send_replace(true);
            info!(executor = self.name, "Task executor stopped");
        }
    }
}

async fn run_worker(
    name: &'static str,
    worker_id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    counters: Arc<Counters>,
    _exit: WorkerExit,
) {
    debug!(executor = name, worker_id, "Worker started");

    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };

        // Queue closed and empty.
        let Some(job) = job else { break };
        counters.queued.fetch_sub(1, Ordering::Relaxed);

        // The job is called inside its own Tokio task so a panic, even one
        // raised before the future is built, stays contained. The worker
        // still waits for it before pulling the next one.
        let ctx = TaskContext { worker_id };
        match tokio::spawn(async move { job(ctx).await }).await {
            Ok(()) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("url_shortener_worker_tasks_processed_total", "worker_type" => name, "status" => "ok")
                    .increment(1);
            }
            Err(e) if e.is_panic() => {
                counters.panicked.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("url_shortener_worker_tasks_processed_total", "worker_type" => name, "status" => "panic")
                    .increment(1);
                error!(executor = name, worker_id, "Task panicked");
            }
            Err(e) => {
                warn!(executor = name, worker_id, error = %e, "Task cancelled");
            }
        }
    }

    debug!(executor = name, worker_id, "Worker stopped");
}
