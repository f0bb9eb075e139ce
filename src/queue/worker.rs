use super::Shared;
use crate::error::PanoError;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{error, info};

/// Drain the work channel until it stays empty for `idle_timeout`.
///
/// Jobs run on the blocking pool, one at a time. The first failure is
/// recorded in the queue state and ends the worker.
pub(super) async fn run(shared: Arc<Shared>) {
    let mut receiver = shared.receiver.lock().await;
    info!("starting queue processing");

    loop {
        let job = match timeout(shared.idle_timeout, receiver.recv()).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                shared.fail(PanoError::QueueClosed);
                return;
            }
            Err(_) => match shared.next_or_retire(&mut receiver) {
                Some(job) => job,
                None => {
                    info!("queue is empty, exiting");
                    return;
                }
            },
        };

        info!("processing {} job {}", job.kind(), job.name());
        shared.start(&job);

        let runner = Arc::clone(&shared.runner);
        let outcome = tokio::task::spawn_blocking(move || {
            let result = runner.run(&job);
            (job, result)
        })
        .await;

        match outcome {
            Ok((job, Ok(()))) => shared.complete(job),
            Ok((job, Err(e))) => {
                error!("error processing job {}: {}", job.name(), e);
                shared.fail(e);
                return;
            }
            Err(e) => {
                error!("job panicked: {}", e);
                shared.fail(PanoError::WorkerPanicked(e.to_string()));
                return;
            }
        }
    }
}
