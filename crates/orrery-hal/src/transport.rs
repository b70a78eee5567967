//! Transport trait.
//!
//! The [`Transport`] is the only path to the remote service. Everything the
//! provider knows about backends and jobs arrives through it:
//!
//! ```text
//!   fetch_backends() ──→ submit_job() ──→ poll_job() ──→ fetch_result()
//!                                              │
//!                                              └──→ cancel_job()
//! ```
//!
//! | Method | Returns |
//! |--------|---------|
//! | `fetch_backends()` | `TransportResult<Vec<BackendDescriptor>>` |
//! | `fetch_properties()` | `TransportResult<Option<BackendProperties>>` (provided) |
//! | `submit_job()` | `TransportResult<JobId>` |
//! | `poll_job()` | `TransportResult<JobPoll>` |
//! | `cancel_job()` | `TransportResult<bool>` |
//! | `fetch_result()` | `TransportResult<JobResult>` |
//!
//! Every call carries the credential it is made under; transports hold no
//! notion of a "current" account.

use async_trait::async_trait;

use crate::account::Credential;
use crate::backend::{BackendDescriptor, BackendProperties};
use crate::error::TransportResult;
use crate::job::{JobId, JobPayload, JobPoll};
use crate::result::JobResult;

/// Access to the remote cloud service.
///
/// # Contract
///
/// - `fetch_backends()` returns descriptors in the service's listing order.
/// - `submit_job()` returns the service-assigned id; the job starts in
///   `Initializing` from the caller's point of view.
/// - `poll_job()` is a single round trip and never blocks on job progress.
/// - `cancel_job()` reports whether the cancel request was accepted, not
///   whether the job has stopped.
/// - `fetch_result()` is only meaningful once `poll_job()` reported `Done`;
///   `backend` is the name the job was submitted to.
#[async_trait]
pub trait Transport: Send + Sync {
    /// List the backends visible under `credential`.
    async fn fetch_backends(&self, credential: &Credential)
    -> TransportResult<Vec<BackendDescriptor>>;

    /// Fetch calibration data for one backend.
    ///
    /// Transports without calibration data keep the default, which reports
    /// none.
    async fn fetch_properties(
        &self,
        credential: &Credential,
        backend: &str,
    ) -> TransportResult<Option<BackendProperties>> {
        let _ = (credential, backend);
        Ok(None)
    }

    /// Send a payload to a backend.
    async fn submit_job(
        &self,
        credential: &Credential,
        backend: &str,
        payload: &JobPayload,
    ) -> TransportResult<JobId>;

    /// Query the current status of a job.
    async fn poll_job(&self, credential: &Credential, job_id: &JobId) -> TransportResult<JobPoll>;

    /// Request cancellation of a job.
    async fn cancel_job(&self, credential: &Credential, job_id: &JobId) -> TransportResult<bool>;

    /// Retrieve the decoded result of a finished job run on `backend`.
    async fn fetch_result(
        &self,
        credential: &Credential,
        job_id: &JobId,
        backend: &str,
    ) -> TransportResult<JobResult>;
}
