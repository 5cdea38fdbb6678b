//! Polling loop that drives a job to a terminal state.
//!
//! One polling loop runs per job as a single cooperative task: it sleeps
//! for a fixed interval, fetches the job once, and repeats until the job
//! reaches a terminal status, the deadline passes, or the caller cancels.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use imgx_models::{Job, JobStatus};

use crate::client::ProviderClient;
use crate::error::{PollError, ProviderError};

/// Configuration for the polling loop.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Fixed delay between polls
    pub interval: Duration,
    /// Upper bound on total polling time for one job
    pub timeout: Duration,
    /// Consecutive transport failures tolerated before giving up
    pub max_transport_failures: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(300),
            max_transport_failures: 3,
        }
    }
}

impl PollerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            interval: Duration::from_millis(
                std::env::var("POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            timeout: Duration::from_secs(
                std::env::var("POLL_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            max_transport_failures: std::env::var("POLL_MAX_TRANSPORT_FAILURES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
        }
    }
}

/// Drives submitted jobs to completion by polling the provider.
pub struct JobPoller {
    client: ProviderClient,
    config: PollerConfig,
}

impl JobPoller {
    /// Create a new poller over a provider client.
    pub fn new(client: ProviderClient, config: PollerConfig) -> Self {
        Self { client, config }
    }

    /// Poll until the job reaches a terminal state.
    ///
    /// `on_progress` fires once per observed status change, starting with
    /// the status of `job` as passed in, and exactly once for the terminal
    /// status. Flipping `cancel_rx` to `true` stops future polls at the
    /// next suspend point; the provider-side job is left to finish or
    /// expire on its own.
    pub async fn run_to_completion<F>(
        &self,
        job: Job,
        mut cancel_rx: watch::Receiver<bool>,
        mut on_progress: F,
    ) -> Result<Job, PollError>
    where
        F: FnMut(&Job),
    {
        let deadline = Instant::now() + self.config.timeout;
        let mut current = job;
        let mut last_status: Option<JobStatus> = None;
        let mut transport_failures = 0u32;

        loop {
            if last_status != Some(current.status) {
                debug!(job_id = %current.id, status = %current.status, "Job status changed");
                on_progress(&current);
                last_status = Some(current.status);
            }

            match current.status {
                JobStatus::Succeeded => return Ok(current),
                JobStatus::Failed => {
                    return Err(PollError::JobFailed {
                        reason: current.failure_reason(),
                    })
                }
                JobStatus::Canceled => return Err(PollError::Canceled),
                JobStatus::Starting | JobStatus::Processing => {}
            }

            if *cancel_rx.borrow() {
                debug!(job_id = %current.id, "Polling canceled by caller");
                return Err(PollError::Canceled);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PollError::Timeout {
                    waited: self.config.timeout,
                });
            }
            let sleep_for = self.config.interval.min(deadline - now);

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                changed = cancel_rx.changed() => {
                    match changed {
                        Ok(()) => {
                            if *cancel_rx.borrow() {
                                debug!(job_id = %current.id, "Polling canceled by caller");
                                return Err(PollError::Canceled);
                            }
                        }
                        Err(_) => {
                            // Cancel handle dropped; nobody can cancel
                            // anymore, fall back to a plain sleep.
                            tokio::time::sleep(sleep_for).await;
                        }
                    }
                }
            }

            if Instant::now() >= deadline {
                return Err(PollError::Timeout {
                    waited: self.config.timeout,
                });
            }

            match self.client.fetch(&current.id).await {
                Ok(fresh) => {
                    transport_failures = 0;
                    current = fresh;
                }
                Err(e) if e.is_transport() => {
                    transport_failures += 1;
                    warn!(
                        job_id = %current.id,
                        failures = transport_failures,
                        error = %e,
                        "Poll request failed"
                    );
                    if transport_failures > self.config.max_transport_failures {
                        return Err(PollError::Provider(e));
                    }
                }
                Err(e) => return Err(PollError::Provider(e)),
            }
        }
    }
}
