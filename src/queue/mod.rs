//! Background job queue
//!
//! Jobs run one at a time, in enqueue order, on a worker task that is
//! spawned on demand and exits after sitting idle for `idle_timeout`.
//! Callers see the pending job names for progress display and collect
//! finished jobs with [`JobQueue::drain_completed`].
//!
//! A job that fails ends the worker. It is not retried and its name stays
//! in the pending list; the next enqueue starts a fresh worker which picks
//! up the remaining work. The error is kept until [`JobQueue::wait_idle`]
//! reports it.

mod job;
mod worker;

pub use job::{CompletedJob, Job, JobRunner, Task};

use crate::error::{PanoError, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<String>,
    running: Option<String>,
    completed: Vec<CompletedJob>,
    worker_active: bool,
    worker: Option<JoinHandle<()>>,
    /// First failure not yet reported by `wait_idle`
    failure: Option<PanoError>,
}

/// State shared between the queue handle and its worker
struct Shared {
    state: Mutex<QueueState>,
    receiver: tokio::sync::Mutex<UnboundedReceiver<Job>>,
    runner: Arc<dyn JobRunner>,
    idle_timeout: Duration,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(&self, job: &Job) {
        self.lock_state().running = Some(job.name().to_string());
    }

    /// Move the job's name from pending to completed in one step
    fn complete(&self, job: Job) {
        let mut state = self.lock_state();
        if let Some(pos) = state.pending.iter().position(|n| n == job.name()) {
            state.pending.remove(pos);
        }
        state.running = None;
        state.completed.push(job.into());
        info!("completed processing, remaining queue: {:?}", state.pending);
    }

    /// Take the next job, or mark the worker inactive if there is none.
    ///
    /// Runs under the state lock so an enqueue either lands before the
    /// check or sees the worker gone and starts a new one.
    fn next_or_retire(&self, receiver: &mut UnboundedReceiver<Job>) -> Option<Job> {
        let mut state = self.lock_state();
        match receiver.try_recv() {
            Ok(job) => Some(job),
            Err(_) => {
                state.worker_active = false;
                None
            }
        }
    }

    /// Mark the worker gone after `error` ended it
    fn fail(&self, error: PanoError) {
        let mut state = self.lock_state();
        state.running = None;
        state.worker_active = false;
        if state.failure.is_none() {
            state.failure = Some(error);
        }
    }
}

pub struct JobQueue {
    shared: Arc<Shared>,
    sender: UnboundedSender<Job>,
    runtime: Handle,
}

impl JobQueue {
    /// Create a queue whose worker runs on `runtime`
    pub fn new(runner: Arc<dyn JobRunner>, idle_timeout: Duration, runtime: Handle) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            receiver: tokio::sync::Mutex::new(receiver),
            runner,
            idle_timeout,
        });
        Self {
            shared,
            sender,
            runtime,
        }
    }

    /// Create a queue on the runtime of the calling context
    pub fn on_current_runtime(runner: Arc<dyn JobRunner>, idle_timeout: Duration) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|_| PanoError::Config("job queue needs a tokio runtime".into()))?;
        Ok(Self::new(runner, idle_timeout, runtime))
    }

    /// Queue `job` and make sure a worker is running. Never blocks on the job.
    pub fn enqueue(&self, job: Job) -> Result<()> {
        let name = job.name().to_string();
        let mut state = self.shared.lock_state();

        self.sender.send(job).map_err(|_| PanoError::QueueClosed)?;
        state.pending.push_back(name.clone());
        info!("queued job: {}", name);

        if !state.worker_active {
            info!("starting worker");
            state.worker_active = true;
            state.worker = Some(self.runtime.spawn(worker::run(Arc::clone(&self.shared))));
        }
        Ok(())
    }

    /// Names of queued and running jobs, oldest first
    pub fn pending(&self) -> Vec<String> {
        self.shared.lock_state().pending.iter().cloned().collect()
    }

    /// Name of the job the worker is executing
    pub fn running(&self) -> Option<String> {
        self.shared.lock_state().running.clone()
    }

    /// Remove and return every completed job
    pub fn drain_completed(&self) -> Vec<CompletedJob> {
        std::mem::take(&mut self.shared.lock_state().completed)
    }

    /// Put drained jobs back in front of the completed list
    pub fn restore_completed(&self, jobs: Vec<CompletedJob>) {
        if jobs.is_empty() {
            return;
        }
        let mut state = self.shared.lock_state();
        let newer = std::mem::replace(&mut state.completed, jobs);
        state.completed.extend(newer);
    }

    pub fn is_idle(&self) -> bool {
        !self.shared.lock_state().worker_active
    }

    /// Wait until no worker is running.
    ///
    /// Returns the first job failure since the last call, including one
    /// from a worker that was replaced before anyone waited on it.
    pub async fn wait_idle(&self) -> Result<()> {
        loop {
            let handle = self.shared.lock_state().worker.take();
            let Some(handle) = handle else {
                break;
            };
            if let Err(e) = handle.await {
                self.shared.fail(PanoError::WorkerPanicked(e.to_string()));
            }
        }

        match self.shared.lock_state().failure.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
