//! Background job queue. Web handlers enqueue and return immediately; a pool
//! of tokio workers drains the queue and calls the handler registered for
//! each job kind. Jobs run once: there is no retry and no cancellation.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{:06}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ResponseNotification,
}

impl JobKind {
    pub const fn label(self) -> &'static str {
        match self {
            JobKind::ResponseNotification => "response_notification",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub payload: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("job queue is closed")]
    Closed,
    #[error("job payload could not be encoded: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct JobError(pub String);

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<(), JobError>;
}

/// Producer side of the queue. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<Job>,
    sequence: AtomicU64,
}

/// Consumer side, handed to [`WorkerPool::spawn`].
#[derive(Debug)]
pub struct JobReceiver(mpsc::UnboundedReceiver<Job>);

impl JobReceiver {
    /// Pop the next job if one is waiting.
    pub fn try_next(&mut self) -> Option<Job> {
        self.0.try_recv().ok()
    }
}

impl JobQueue {
    pub fn channel() -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Self {
            sender,
            sequence: AtomicU64::new(1),
        };
        (queue, JobReceiver(receiver))
    }

    pub fn enqueue(&self, kind: JobKind, payload: Value) -> Result<JobId, QueueError> {
        let id = JobId(self.sequence.fetch_add(1, Ordering::Relaxed));
        self.sender
            .send(Job { id, kind, payload })
            .map_err(|_| QueueError::Closed)?;
        debug!(%id, kind = kind.label(), "job enqueued");
        Ok(id)
    }
}

type StartupHook = Box<dyn FnOnce() + Send>;

/// Fixed-size pool of workers sharing one receiver.
pub struct WorkerPool {
    workers: usize,
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
    startup: Vec<StartupHook>,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            handlers: HashMap::new(),
            startup: Vec::new(),
        }
    }

    pub fn register(mut self, kind: JobKind, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Runs once, before any worker starts pulling jobs.
    pub fn on_startup(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.startup.push(Box::new(hook));
        self
    }

    /// Start the workers on the current tokio runtime. Workers exit once every
    /// [`JobQueue`] handle has been dropped and the queue is drained.
    pub fn spawn(self, receiver: JobReceiver) -> Vec<JoinHandle<()>> {
        for hook in self.startup {
            hook();
        }

        let receiver = Arc::new(Mutex::new(receiver.0));
        let handlers = Arc::new(self.handlers);
        info!(workers = self.workers, "notification workers starting");

        (0..self.workers)
            .map(|worker| {
                let receiver = Arc::clone(&receiver);
                let handlers = Arc::clone(&handlers);
                tokio::spawn(run_worker(worker, receiver, handlers))
            })
            .collect()
    }
}

async fn run_worker(
    worker: usize,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
    handlers: Arc<HashMap<JobKind, Arc<dyn JobHandler>>>,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(job) = next else {
            debug!(worker, "job queue closed, worker exiting");
            break;
        };

        match handlers.get(&job.kind) {
            Some(handler) => match handler.handle(&job).await {
                Ok(()) => debug!(worker, id = %job.id, kind = job.kind.label(), "job completed"),
                Err(err) => warn!(
                    worker,
                    id = %job.id,
                    kind = job.kind.label(),
                    error = %err,
                    "job failed; not retried"
                ),
            },
            None => warn!(worker, id = %job.id, kind = job.kind.label(), "no handler registered"),
        }
    }
}
