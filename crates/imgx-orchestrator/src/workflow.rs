//! The end-to-end transformation workflow.
//!
//! One invocation runs as one async task: reserve credits, submit the
//! job, archive the input, poll to a terminal state while streaming
//! progress, then archive the output and settle the usage record.
//!
//! Credits are reserved before submission and are not refunded when a job
//! later fails; the usage row written by the reservation stands as the
//! record of the attempt. Zero-cost services skip the ledger and log a
//! plain usage row.

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use imgx_ledger::{CreditLedger, UsageRecorder};
use imgx_models::{
    Job, NewUsageRecord, ProgressEvent, TransformRequest, UsageAmendment, UsageRecord,
};
use imgx_provider::{JobPoller, ProviderClient, SubmitRequest};
use imgx_storage::ArtifactStore;

use crate::error::{WorkflowError, WorkflowWarning};

/// Result of a completed workflow.
#[derive(Debug)]
pub struct WorkflowOutcome {
    /// Final job snapshot in its terminal state
    pub job: Job,

    /// Output image URL: the archived copy, or the transient provider URL
    /// if archiving degraded
    pub output_url: Option<String>,

    /// Usage ledger row for this invocation, when one was written
    pub usage_id: Option<String>,

    /// Bookkeeping steps that failed without failing the workflow
    pub warnings: Vec<WorkflowWarning>,
}

/// Sequences one transformation from request to settled outcome.
///
/// All collaborators are injected; the orchestrator holds no global
/// state, and independent workflows share nothing in memory.
pub struct Orchestrator {
    provider: ProviderClient,
    poller: JobPoller,
    artifacts: ArtifactStore,
    ledger: CreditLedger,
    usage: UsageRecorder,
}

impl Orchestrator {
    /// Create a new orchestrator over its collaborators.
    pub fn new(
        provider: ProviderClient,
        poller: JobPoller,
        artifacts: ArtifactStore,
        ledger: CreditLedger,
        usage: UsageRecorder,
    ) -> Self {
        Self {
            provider,
            poller,
            artifacts,
            ledger,
            usage,
        }
    }

    /// Run one transformation to completion.
    ///
    /// `on_progress` receives one event per observed status change,
    /// ending with exactly one terminal event. Flipping `cancel_rx` to
    /// `true` abandons polling at the next suspend point; the provider-
    /// side job keeps running and expires on its own.
    pub async fn run<F>(
        &self,
        request: TransformRequest,
        cancel_rx: watch::Receiver<bool>,
        mut on_progress: F,
    ) -> Result<WorkflowOutcome, WorkflowError>
    where
        F: FnMut(ProgressEvent),
    {
        request.validate()?;

        let cost = request.required_credits;
        let user_id = request.user_id.clone();
        let mut warnings = Vec::new();

        // Nothing is submitted and nothing is written until the balance
        // covers the cost.
        let check = self
            .ledger
            .check_and_reserve(&user_id, cost)
            .await
            .map_err(|e| WorkflowError::from_reservation(e, cost))?;
        if !check.ok {
            info!(
                user_id = %user_id,
                required = cost,
                available = check.available,
                "Rejecting request for insufficient credits"
            );
            return Err(WorkflowError::InsufficientCredits {
                required: cost,
                available: check.available,
            });
        }

        let usage = self.reserve(&request, cost, &mut warnings).await?;

        let submit = SubmitRequest::for_request(&request)?;
        let job = self.provider.submit(&submit).await?;
        info!(job_id = %job.id, service = %request.service, user_id = %user_id, "Job submitted");

        if let Some(record) = &usage {
            self.try_amend(
                &record.id,
                UsageAmendment::new().with_job_id(job.id.as_str()),
                &mut warnings,
            )
            .await;
        }

        // The input copy is archived while the job runs; losing it never
        // blocks the transformation itself.
        if let Some(source) = &request.source_image_url {
            let name = format!("{}_in_{}.png", job.id, Utc::now().timestamp_millis());
            match self.artifacts.persist(source, &name).await {
                Ok(stored) => {
                    if let Some(record) = &usage {
                        self.try_amend(
                            &record.id,
                            UsageAmendment::new().with_input_image_url(stored),
                            &mut warnings,
                        )
                        .await;
                    }
                }
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Failed to archive input image");
                    warnings.push(WorkflowWarning::InputPersist(e.to_string()));
                }
            }
        }

        let job = self
            .poller
            .run_to_completion(job, cancel_rx, |snapshot| {
                on_progress(ProgressEvent::from(snapshot))
            })
            .await?;

        let mut output_url = job.output.clone();
        if let Some(provider_url) = &job.output {
            let name = format!("{}_out_{}.png", job.id, Utc::now().timestamp_millis());
            match self.artifacts.persist(provider_url, &name).await {
                Ok(stored) => {
                    if let Some(record) = &usage {
                        self.try_amend(
                            &record.id,
                            UsageAmendment::new().with_output_image_url(stored.clone()),
                            &mut warnings,
                        )
                        .await;
                    }
                    output_url = Some(stored);
                }
                Err(e) => {
                    // The user still gets their result via the provider
                    // URL; only the archived copy is missing.
                    warn!(job_id = %job.id, error = %e, "Failed to archive output image");
                    warnings.push(WorkflowWarning::OutputPersist(e.to_string()));
                }
            }
        }

        info!(
            job_id = %job.id,
            user_id = %user_id,
            warnings = warnings.len(),
            "Workflow complete"
        );
        Ok(WorkflowOutcome {
            job,
            output_url,
            usage_id: usage.map(|record| record.id),
            warnings,
        })
    }

    /// Write the usage row, deducting credits first for paid services.
    ///
    /// Paid reservations are fatal on failure (no deduction, no
    /// submission); the zero-cost usage row is best-effort.
    async fn reserve(
        &self,
        request: &TransformRequest,
        cost: u32,
        warnings: &mut Vec<WorkflowWarning>,
    ) -> Result<Option<UsageRecord>, WorkflowError> {
        let usage = NewUsageRecord::new(&request.user_id, request.service.as_str(), cost)
            .with_optional_prompt(request.prompt.clone());

        if cost > 0 {
            let record = self
                .ledger
                .deduct_and_record(&request.user_id, cost, &usage)
                .await
                .map_err(|e| WorkflowError::from_reservation(e, cost))?;
            return Ok(Some(record));
        }

        match self.usage.create(&usage).await {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(user_id = %request.user_id, error = %e, "Failed to record zero-cost usage");
                warnings.push(WorkflowWarning::UsageCreate(e.to_string()));
                Ok(None)
            }
        }
    }

    /// Amend the usage record, degrading failures to a warning.
    async fn try_amend(
        &self,
        usage_id: &str,
        amendment: UsageAmendment,
        warnings: &mut Vec<WorkflowWarning>,
    ) {
        if let Err(e) = self.usage.amend(usage_id, &amendment).await {
            warn!(usage_id = %usage_id, error = %e, "Failed to amend usage record");
            warnings.push(WorkflowWarning::UsageAmend(e.to_string()));
        }
    }
}
