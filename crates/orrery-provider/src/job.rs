//! Handles to submitted jobs.
//!
//! A [`JobHandle`] mirrors the remote job state. Its status only changes
//! through its own polls, and each report is applied monotonically:
//!
//! ```text
//!   Initializing ──→ Queued ──→ Running ──→ Done | Cancelled | Error
//! ```
//!
//! A report that would move the handle backwards or out of a terminal
//! state is ignored.
//!
//! | Method | Remote calls |
//! |--------|--------------|
//! | `status()` | one `poll_job` |
//! | `cancel()` | one `cancel_job`, none when already terminal |
//! | `result()` | `poll_job` until terminal, then `fetch_result` once |

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use orrery_hal::{
    BackendDescriptor, Credential, CredentialId, JobId, JobPayload, JobPoll, JobResult, JobStatus,
    ProviderError, ProviderResult, Transport,
};

use crate::poller::PollPolicy;

/// Client-side view of one submitted job.
pub struct JobHandle {
    job_id: JobId,
    backend_name: String,
    credential: Credential,
    submitted_at: DateTime<Utc>,
    status: JobStatus,
    queue_position: Option<u32>,
    result: Option<JobResult>,
    transport: Arc<dyn Transport>,
    policy: PollPolicy,
}

impl JobHandle {
    /// Submit `payload` to `backend` under `credential`.
    ///
    /// The backend must have been operational when it was last listed and
    /// the payload must be valid; otherwise nothing is sent and
    /// [`ProviderError::Submission`] is returned.
    #[instrument(skip_all, fields(backend = %backend.name, credential = %credential.id))]
    pub async fn submit(
        transport: Arc<dyn Transport>,
        credential: Credential,
        backend: &BackendDescriptor,
        payload: &JobPayload,
        policy: PollPolicy,
    ) -> ProviderResult<Self> {
        if !backend.is_operational() {
            let reason = backend
                .status
                .status_msg
                .clone()
                .unwrap_or_else(|| "backend is not operational".to_string());
            return Err(ProviderError::Submission {
                backend: backend.name.clone(),
                reason,
            });
        }
        payload
            .validate()
            .map_err(|reason| ProviderError::Submission {
                backend: backend.name.clone(),
                reason,
            })?;

        let job_id = transport
            .submit_job(&credential, &backend.name, payload)
            .await?;
        info!(job = %job_id, "Submitted job");

        Ok(Self::attach(
            transport,
            credential,
            job_id,
            backend.name.clone(),
            policy,
        ))
    }

    /// Track a job that was submitted earlier.
    ///
    /// The handle starts in `Initializing` and catches up on its first poll.
    pub fn attach(
        transport: Arc<dyn Transport>,
        credential: Credential,
        job_id: JobId,
        backend_name: impl Into<String>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            job_id,
            backend_name: backend_name.into(),
            credential,
            submitted_at: Utc::now(),
            status: JobStatus::Initializing,
            queue_position: None,
            result: None,
            transport,
            policy,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    pub fn credential_id(&self) -> &CredentialId {
        &self.credential.id
    }

    /// When the handle was created.
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Last status applied to the handle, without a remote call.
    pub fn current_status(&self) -> &JobStatus {
        &self.status
    }

    /// Last reported queue position.
    ///
    /// `None` when the service did not report one or the job has left the
    /// queue.
    pub fn queue_position(&self) -> Option<u32> {
        self.queue_position
    }

    /// The result, if it has already been fetched.
    pub fn cached_result(&self) -> Option<&JobResult> {
        self.result.as_ref()
    }

    /// Poll the service once and return the updated status.
    pub async fn status(&mut self) -> ProviderResult<JobStatus> {
        let poll = self
            .transport
            .poll_job(&self.credential, &self.job_id)
            .await?;
        self.apply(poll);
        Ok(self.status.clone())
    }

    /// Ask the service to cancel the job.
    ///
    /// Returns whether the request was accepted; the status itself only
    /// changes once a later poll reports `Cancelled`. A handle that is
    /// already terminal returns `false` without contacting the service.
    pub async fn cancel(&mut self) -> ProviderResult<bool> {
        if self.status.is_terminal() {
            debug!(job = %self.job_id, status = %self.status, "Cancel on finished job");
            return Ok(false);
        }
        let accepted = self
            .transport
            .cancel_job(&self.credential, &self.job_id)
            .await?;
        info!(job = %self.job_id, accepted, "Cancel requested");
        Ok(accepted)
    }

    /// Wait up to `timeout` for the job to finish and return its result.
    ///
    /// On timeout the handle keeps the last observed status and the job is
    /// left running.
    pub async fn result(&mut self, timeout: Duration) -> ProviderResult<JobResult> {
        self.wait(timeout, std::future::pending()).await
    }

    /// Like [`result`](Self::result), but gives up with
    /// [`ProviderError::WaitCancelled`] as soon as `cancel` completes.
    ///
    /// Only the wait stops; the remote job is not cancelled.
    pub async fn result_with_cancel<F>(
        &mut self,
        timeout: Duration,
        cancel: F,
    ) -> ProviderResult<JobResult>
    where
        F: Future<Output = ()>,
    {
        self.wait(timeout, cancel).await
    }

    #[instrument(skip_all, fields(job = %self.job_id))]
    async fn wait<F>(&mut self, timeout: Duration, cancel: F) -> ProviderResult<JobResult>
    where
        F: Future<Output = ()>,
    {
        if let Some(result) = &self.result {
            return Ok(result.clone());
        }

        tokio::pin!(cancel);
        let started = Instant::now();
        // A timeout too large to represent waits without a deadline.
        let deadline = started.checked_add(timeout);
        let mut backoff = self.policy.backoff();

        loop {
            if !self.status.is_terminal() {
                match self.status().await {
                    Ok(_) => {}
                    Err(ProviderError::Transport(e)) if e.is_transient() => {
                        warn!("Transient poll failure, will retry: {}", e);
                    }
                    Err(e) => return Err(e),
                }
            }

            match &self.status {
                JobStatus::Done => return self.fetch_result_once().await,
                JobStatus::Cancelled => return Err(ProviderError::JobCancelled(self.job_id.clone())),
                JobStatus::Error(message) => {
                    return Err(ProviderError::JobFailed {
                        job_id: self.job_id.clone(),
                        message: message.clone(),
                    });
                }
                _ => {}
            }

            let now = Instant::now();
            let mut delay = backoff.next_delay();
            if let Some(deadline) = deadline {
                if now >= deadline {
                    return Err(ProviderError::Timeout {
                        job_id: self.job_id.clone(),
                        waited: now - started,
                    });
                }
                delay = delay.min(deadline - now);
            }
            tokio::select! {
                biased;
                () = &mut cancel => {
                    debug!(status = %self.status, "Wait cancelled by caller");
                    return Err(ProviderError::WaitCancelled(self.job_id.clone()));
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn fetch_result_once(&mut self) -> ProviderResult<JobResult> {
        if let Some(result) = &self.result {
            return Ok(result.clone());
        }
        let result = self
            .transport
            .fetch_result(&self.credential, &self.job_id, &self.backend_name)
            .await?;
        debug!(experiments = result.experiments.len(), "Fetched result");
        self.result = Some(result.clone());
        Ok(result)
    }

    /// Apply one poll report; returns whether it was accepted.
    fn apply(&mut self, poll: JobPoll) -> bool {
        if !self.status.can_transition_to(&poll.status) {
            warn!(
                job = %self.job_id,
                current = %self.status,
                reported = %poll.status,
                "Ignoring out-of-order status report"
            );
            return false;
        }
        if self.status != poll.status {
            debug!(job = %self.job_id, from = %self.status, to = %poll.status, "Status changed");
        }
        self.status = poll.status;
        self.queue_position = if self.status.is_waiting() {
            poll.queue_position
        } else {
            None
        };
        true
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("job_id", &self.job_id)
            .field("backend_name", &self.backend_name)
            .field("credential_id", &self.credential.id)
            .field("submitted_at", &self.submitted_at)
            .field("status", &self.status)
            .field("queue_position", &self.queue_position)
            .field("has_result", &self.result.is_some())
            .finish_non_exhaustive()
    }
}
