//! Job runner: bounded worker pool with capped exponential retry.
//!
//! Jobs are submitted over an in-memory channel and dispatched to the
//! handler under a semaphore. The runner owns retry policy; the pipeline
//! never retries internally, so a retry here re-runs the whole job (remote
//! output names are deterministic, making re-runs overwrite-safe).
//!
//! Shutdown: [`JobRunner::shutdown`] signals the pool to stop claiming new
//! jobs; it does not wait for in-flight jobs to finish.

use crate::job::{JobHandler, JobKind};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

/// Maximum delay in seconds before retrying a failed job. Caps exponential
/// backoff so high attempt counts do not produce excessively long delays.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Backoff in seconds for a given attempt number (exponential with cap).
#[inline]
pub(crate) fn compute_retry_backoff_seconds(attempt: u32) -> u64 {
    (2_u64.pow(attempt)).min(MAX_RETRY_BACKOFF_SECS)
}

#[derive(Clone)]
pub struct JobRunnerConfig {
    pub max_workers: usize,
    pub max_retries: u32,
    pub queue_depth: usize,
}

impl Default for JobRunnerConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            max_retries: 3,
            queue_depth: 64,
        }
    }
}

pub struct JobRunner {
    job_tx: mpsc::Sender<JobKind>,
    shutdown_tx: mpsc::Sender<()>,
}

impl JobRunner {
    /// Create a runner with a weak reference to the handler. The weak
    /// reference keeps the runner from extending the application's lifetime
    /// during shutdown; a job claimed after the handler is dropped is logged
    /// and discarded.
    pub fn new(handler: Weak<dyn JobHandler>, config: JobRunnerConfig) -> Self {
        let (job_tx, job_rx) = mpsc::channel(config.queue_depth);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(Self::worker_pool(handler, config, job_rx, shutdown_rx));

        Self {
            job_tx,
            shutdown_tx,
        }
    }

    /// Submit a job. Callers must not submit two concurrent jobs for the
    /// same record id; the runner does not deduplicate.
    pub async fn submit(&self, job: JobKind) -> anyhow::Result<()> {
        self.job_tx
            .send(job)
            .await
            .map_err(|_| anyhow::anyhow!("job runner is shut down"))?;
        tracing::info!(job = %job, "Job submitted");
        Ok(())
    }

    async fn worker_pool(
        handler: Weak<dyn JobHandler>,
        config: JobRunnerConfig,
        mut job_rx: mpsc::Receiver<JobKind>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            max_retries = config.max_retries,
            "Job runner worker pool started"
        );
        let semaphore = Arc::new(Semaphore::new(config.max_workers));

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Job runner shutting down");
                    break;
                }
                job = job_rx.recv() => {
                    let Some(job) = job else { break };
                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    let handler = handler.clone();
                    let max_retries = config.max_retries;
                    tokio::spawn(async move {
                        let _permit = permit;
                        Self::process_with_retry(handler, job, max_retries).await;
                    });
                }
            }
        }

        tracing::info!("Job runner worker pool stopped");
    }

    async fn process_with_retry(handler: Weak<dyn JobHandler>, job: JobKind, max_retries: u32) {
        let mut attempt: u32 = 0;
        loop {
            let Some(handler) = handler.upgrade() else {
                tracing::warn!(job = %job, "Handler dropped, discarding job");
                return;
            };

            match handler.run(job).await {
                Ok(()) => {
                    tracing::info!(job = %job, attempt = attempt, "Job completed");
                    return;
                }
                Err(e) if attempt < max_retries => {
                    let backoff = compute_retry_backoff_seconds(attempt);
                    attempt += 1;
                    tracing::warn!(
                        job = %job,
                        error = %e,
                        attempt = attempt,
                        backoff_seconds = backoff,
                        "Job failed, scheduling retry"
                    );
                    tokio::time::sleep(Duration::from_secs(backoff)).await;
                }
                Err(e) => {
                    tracing::error!(
                        job = %job,
                        error = %e,
                        attempts = attempt + 1,
                        "Job failed after maximum retries"
                    );
                    return;
                }
            }
        }
    }

    /// Signal the pool to stop claiming new jobs. Returns immediately;
    /// in-flight jobs run to completion or failure on their own.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}
