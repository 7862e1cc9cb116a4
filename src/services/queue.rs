// src/services/queue.rs
//! Background mail queue
//!
//! Handlers enqueue a job and return; a single spawned worker owns actual
//! delivery. The handler contract is "enqueued", never "delivered": a dead
//! SMTP server costs retries in the background, not request latency.
//!
//! Delivery is attempted up to 3 times with exponential backoff starting at
//! 2 seconds. The worker keeps the last 10 finished jobs (completed or
//! failed) for inspection.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::mail::{MailError, Mailer};
use crate::common::safe_email_log;

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 2000;
const HISTORY_LIMIT: usize = 10;
const QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Mail queue worker is not running")]
    WorkerGone,
}

/// A mail job to be delivered by the worker
#[derive(Debug, Clone)]
pub enum MailJob {
    VerifyEmail {
        to: String,
        name: String,
        url: String,
    },
    ResetPassword {
        to: String,
        name: String,
        url: String,
    },
}

impl MailJob {
    pub fn kind(&self) -> &'static str {
        match self {
            MailJob::VerifyEmail { .. } => "verify_email",
            MailJob::ResetPassword { .. } => "reset_password",
        }
    }

    fn recipient(&self) -> &str {
        match self {
            MailJob::VerifyEmail { to, .. } => to,
            MailJob::ResetPassword { to, .. } => to,
        }
    }
}

#[derive(Debug)]
struct QueuedJob {
    id: Uuid,
    job: MailJob,
}

/// Record of a job the worker has finished with, successfully or not
#[derive(Debug, Clone)]
pub struct FinishedJob {
    pub id: Uuid,
    pub kind: &'static str,
    pub recipient: String,
    pub attempts: u32,
    pub succeeded: bool,
    pub finished_at: DateTime<Utc>,
}

/// Handle for enqueueing mail jobs; owns the worker's channel
pub struct MailQueue {
    sender: mpsc::Sender<QueuedJob>,
    history: Arc<RwLock<VecDeque<FinishedJob>>>,
}

impl MailQueue {
    /// Spawn the delivery worker and return the queue handle
    pub fn start(mailer: Mailer) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let history = Arc::new(RwLock::new(VecDeque::new()));

        tokio::spawn(run_worker(mailer, receiver, history.clone()));

        Self { sender, history }
    }

    /// Hand a job to the worker. Returns the job id once the job is queued.
    pub async fn enqueue(&self, job: MailJob) -> Result<Uuid, QueueError> {
        let id = Uuid::new_v4();
        info!(
            job_id = %id,
            kind = job.kind(),
            to = %safe_email_log(job.recipient()),
            "Enqueueing mail job"
        );

        self.sender
            .send(QueuedJob { id, job })
            .await
            .map_err(|_| QueueError::WorkerGone)?;

        Ok(id)
    }

    /// The last finished jobs, most recent last
    pub async fn recent_jobs(&self) -> Vec<FinishedJob> {
        self.history.read().await.iter().cloned().collect()
    }
}

async fn run_worker(
    mailer: Mailer,
    mut receiver: mpsc::Receiver<QueuedJob>,
    history: Arc<RwLock<VecDeque<FinishedJob>>>,
) {
    info!("Mail queue worker started");

    while let Some(queued) = receiver.recv().await {
        let mut attempts = 0;
        let succeeded = loop {
            attempts += 1;
            match deliver(&mailer, &queued.job).await {
                Ok(()) => break true,
                Err(e) if attempts < MAX_ATTEMPTS => {
                    let delay = backoff_delay(attempts);
                    warn!(
                        job_id = %queued.id,
                        kind = queued.job.kind(),
                        attempt = attempts,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "Mail delivery failed, will retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        job_id = %queued.id,
                        kind = queued.job.kind(),
                        attempts = attempts,
                        error = %e,
                        "Mail delivery failed permanently"
                    );
                    break false;
                }
            }
        };

        if succeeded {
            info!(
                job_id = %queued.id,
                kind = queued.job.kind(),
                attempts = attempts,
                "Mail job completed"
            );
        }

        let finished = FinishedJob {
            id: queued.id,
            kind: queued.job.kind(),
            recipient: queued.job.recipient().to_string(),
            attempts,
            succeeded,
            finished_at: Utc::now(),
        };
        record_finished(&mut *history.write().await, finished);
    }
}

async fn deliver(mailer: &Mailer, job: &MailJob) -> Result<(), MailError> {
    match job {
        MailJob::VerifyEmail { to, name, url } => {
            mailer.send_verification_email(to, name, url).await
        }
        MailJob::ResetPassword { to, name, url } => mailer.send_reset_email(to, name, url).await,
    }
}

/// Delay before the next attempt: 2s after the first failure, doubling after
fn backoff_delay(failed_attempts: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS * 2u64.pow(failed_attempts.saturating_sub(1)))
}

/// Append to the history, keeping only the newest entries
fn record_finished(history: &mut VecDeque<FinishedJob>, job: FinishedJob) {
    history.push_back(job);
    while history.len() > HISTORY_LIMIT {
        history.pop_front();
    }
}
