//! Scripted transport implementation.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tracing::{debug, instrument};
use uuid::Uuid;

use orrery_hal::{
    BackendDescriptor, BackendProperties, BackendStatus, Counts, Credential, CredentialId,
    ExperimentResult, JobId, JobPayload, JobPoll, JobResult, JobStatus, Transport, TransportError,
    TransportResult,
};

/// Number of calls made to each transport method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub fetch_backends: usize,
    pub fetch_properties: usize,
    pub submit_job: usize,
    pub poll_job: usize,
    pub cancel_job: usize,
    pub fetch_result: usize,
}

/// A job known to the simulated service.
struct SimJob {
    credential_id: CredentialId,
    backend: String,
    payload: JobPayload,
    script: VecDeque<JobPoll>,
    current: JobPoll,
}

#[derive(Default)]
struct SimState {
    accounts: FxHashMap<CredentialId, Vec<BackendDescriptor>>,
    properties: FxHashMap<(CredentialId, String), BackendProperties>,
    fetch_failures: FxHashMap<CredentialId, TransportError>,
    jobs: FxHashMap<JobId, SimJob>,
    next_scripts: VecDeque<Vec<JobPoll>>,
    reject_cancels: bool,
    calls: CallCounts,
    in_flight: FxHashMap<CredentialId, usize>,
    in_flight_total: usize,
    peak_same_credential: usize,
    peak_total: usize,
}

/// In-memory stand-in for the cloud service.
///
/// Accounts and their backend listings are configured up front; each
/// submitted job then walks through a status script, one entry per poll,
/// and stays on the last entry once the script runs out.
pub struct SimTransport {
    state: Mutex<SimState>,
    default_script: Vec<JobPoll>,
    fetch_delay: Option<Duration>,
}

impl SimTransport {
    /// Create a service with no accounts.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState::default()),
            default_script: vec![
                JobPoll::queued_at(2),
                JobPoll::queued_at(1),
                JobPoll::new(JobStatus::Running),
                JobPoll::new(JobStatus::Done),
            ],
            fetch_delay: None,
        }
    }

    /// Register an account and the backends it can see, in listing order.
    pub fn with_account(
        self,
        credential_id: impl Into<CredentialId>,
        backends: impl IntoIterator<Item = BackendDescriptor>,
    ) -> Self {
        self.set_backends(credential_id, backends);
        self
    }

    /// Attach calibration data to one backend of one account.
    pub fn with_properties(
        self,
        credential_id: impl Into<CredentialId>,
        backend: impl Into<String>,
        properties: BackendProperties,
    ) -> Self {
        self.lock()
            .properties
            .insert((credential_id.into(), backend.into()), properties);
        self
    }

    /// Status sequence used for jobs without a queued script.
    pub fn with_job_script(mut self, script: Vec<JobPoll>) -> Self {
        self.default_script = script;
        self
    }

    /// Make every backend listing take this long to arrive.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Replace the listing an account sees.
    pub fn set_backends(
        &self,
        credential_id: impl Into<CredentialId>,
        backends: impl IntoIterator<Item = BackendDescriptor>,
    ) {
        self.lock()
            .accounts
            .insert(credential_id.into(), backends.into_iter().collect());
    }

    /// Update the status of one listed backend.
    ///
    /// Returns false when the account or backend is unknown.
    pub fn set_status(&self, credential_id: &CredentialId, backend: &str, status: BackendStatus) -> bool {
        let mut state = self.lock();
        let Some(listing) = state.accounts.get_mut(credential_id) else {
            return false;
        };
        match listing.iter_mut().find(|d| d.name == backend) {
            Some(descriptor) => {
                descriptor.status = status;
                true
            }
            None => false,
        }
    }

    /// Make backend listings for an account fail with `error`.
    pub fn fail_fetches(&self, credential_id: impl Into<CredentialId>, error: TransportError) {
        self.lock().fetch_failures.insert(credential_id.into(), error);
    }

    /// Stop failing backend listings for an account.
    pub fn restore_fetches(&self, credential_id: &CredentialId) {
        self.lock().fetch_failures.remove(credential_id);
    }

    /// Use `script` for the next submitted job only.
    pub fn script_next_job(&self, script: Vec<JobPoll>) {
        self.lock().next_scripts.push_back(script);
    }

    /// Refuse every cancel request.
    pub fn reject_cancels(&self, reject: bool) {
        self.lock().reject_cancels = reject;
    }

    /// Snapshot of the call counters.
    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// Highest number of simultaneous listings seen for a single account.
    pub fn peak_fetches_per_credential(&self) -> usize {
        self.lock().peak_same_credential
    }

    /// Highest number of simultaneous listings seen overall.
    pub fn peak_fetches_total(&self) -> usize {
        self.lock().peak_total
    }

    /// Backend and payload a job was submitted with.
    pub fn submitted(&self, job_id: &JobId) -> Option<(String, JobPayload)> {
        self.lock()
            .jobs
            .get(job_id)
            .map(|job| (job.backend.clone(), job.payload.clone()))
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn job_for<'a>(
        state: &'a mut SimState,
        credential: &Credential,
        job_id: &JobId,
    ) -> TransportResult<&'a mut SimJob> {
        match state.jobs.get_mut(job_id) {
            Some(job) if job.credential_id == credential.id => Ok(job),
            _ => Err(TransportError::NotFound(format!("job {job_id}"))),
        }
    }
}

impl Default for SimTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks one in-flight listing; released on drop so abandoned fetches
/// do not skew the concurrency counters.
struct FetchGuard<'a> {
    transport: &'a SimTransport,
    credential_id: CredentialId,
}

impl<'a> FetchGuard<'a> {
    fn enter(transport: &'a SimTransport, credential_id: &CredentialId) -> Self {
        let mut state = transport.lock();
        state.calls.fetch_backends += 1;
        let same = {
            let n = state.in_flight.entry(credential_id.clone()).or_insert(0);
            *n += 1;
            *n
        };
        state.in_flight_total += 1;
        state.peak_same_credential = state.peak_same_credential.max(same);
        state.peak_total = state.peak_total.max(state.in_flight_total);
        Self {
            transport,
            credential_id: credential_id.clone(),
        }
    }
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.transport.lock();
        if let Some(n) = state.in_flight.get_mut(&self.credential_id) {
            *n = n.saturating_sub(1);
        }
        state.in_flight_total = state.in_flight_total.saturating_sub(1);
    }
}

/// Deterministic histogram for a finished experiment.
fn simulated_counts(shots: u32) -> Counts {
    let half = u64::from(shots / 2);
    let mut counts = Counts::new();
    counts.insert("00", half + u64::from(shots % 2));
    if half > 0 {
        counts.insert("11", half);
    }
    counts
}

#[async_trait]
impl Transport for SimTransport {
    #[instrument(skip(self, credential), fields(credential = %credential.id))]
    async fn fetch_backends(
        &self,
        credential: &Credential,
    ) -> TransportResult<Vec<BackendDescriptor>> {
        let _guard = FetchGuard::enter(self, &credential.id);

        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.lock();
        if let Some(err) = state.fetch_failures.get(&credential.id) {
            debug!("Injected listing failure: {}", err);
            return Err(err.clone());
        }
        let listing = state.accounts.get(&credential.id).ok_or_else(|| {
            TransportError::Unauthorized(format!("unknown account '{}'", credential.id))
        })?;
        debug!("Listing {} backends", listing.len());
        Ok(listing
            .iter()
            .cloned()
            .map(|d| d.owned_by(credential))
            .collect())
    }

    async fn fetch_properties(
        &self,
        credential: &Credential,
        backend: &str,
    ) -> TransportResult<Option<BackendProperties>> {
        let mut state = self.lock();
        state.calls.fetch_properties += 1;
        let listed = state
            .accounts
            .get(&credential.id)
            .is_some_and(|l| l.iter().any(|d| d.name == backend));
        if !listed {
            return Err(TransportError::NotFound(format!("backend {backend}")));
        }
        Ok(state
            .properties
            .get(&(credential.id.clone(), backend.to_string()))
            .cloned())
    }

    #[instrument(skip(self, credential, payload), fields(credential = %credential.id))]
    async fn submit_job(
        &self,
        credential: &Credential,
        backend: &str,
        payload: &JobPayload,
    ) -> TransportResult<JobId> {
        let mut state = self.lock();
        state.calls.submit_job += 1;

        let listing = state.accounts.get(&credential.id).ok_or_else(|| {
            TransportError::Unauthorized(format!("unknown account '{}'", credential.id))
        })?;
        let descriptor = listing
            .iter()
            .find(|d| d.name == backend)
            .ok_or_else(|| TransportError::NotFound(format!("backend {backend}")))?;
        if !descriptor.is_operational() {
            return Err(TransportError::Api {
                status: 409,
                message: format!("backend {backend} is not accepting jobs"),
            });
        }

        let script = state
            .next_scripts
            .pop_front()
            .unwrap_or_else(|| self.default_script.clone());
        let job_id = JobId::new(format!("sim-{}", Uuid::new_v4()));
        state.jobs.insert(
            job_id.clone(),
            SimJob {
                credential_id: credential.id.clone(),
                backend: backend.to_string(),
                payload: payload.clone(),
                script: script.into(),
                current: JobPoll::new(JobStatus::Initializing),
            },
        );

        debug!("Accepted job {} for {}", job_id, backend);
        Ok(job_id)
    }

    async fn poll_job(&self, credential: &Credential, job_id: &JobId) -> TransportResult<JobPoll> {
        let mut state = self.lock();
        state.calls.poll_job += 1;
        let job = Self::job_for(&mut state, credential, job_id)?;
        if let Some(next) = job.script.pop_front() {
            job.current = next;
        }
        Ok(job.current.clone())
    }

    async fn cancel_job(&self, credential: &Credential, job_id: &JobId) -> TransportResult<bool> {
        let mut state = self.lock();
        state.calls.cancel_job += 1;
        let reject = state.reject_cancels;
        let job = Self::job_for(&mut state, credential, job_id)?;
        if reject || job.current.status.is_terminal() {
            return Ok(false);
        }
        job.script.clear();
        job.script.push_back(JobPoll::new(JobStatus::Cancelled));
        Ok(true)
    }

    async fn fetch_result(
        &self,
        credential: &Credential,
        job_id: &JobId,
        backend: &str,
    ) -> TransportResult<JobResult> {
        let mut state = self.lock();
        state.calls.fetch_result += 1;
        let job = Self::job_for(&mut state, credential, job_id)?;
        if job.backend != backend {
            return Err(TransportError::NotFound(format!("job {job_id} on {backend}")));
        }
        if job.current.status != JobStatus::Done {
            return Err(TransportError::Api {
                status: 409,
                message: format!("job {job_id} is {}", job.current.status.name()),
            });
        }
        let experiments = (0..job.payload.circuits.len())
            .map(|i| ExperimentResult {
                name: Some(format!("circuit-{i}")),
                shots: job.payload.shots,
                counts: simulated_counts(job.payload.shots),
            })
            .collect();
        Ok(JobResult {
            job_id: job_id.clone(),
            backend_name: job.backend.clone(),
            experiments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_hal::{BackendConfiguration, BackendStatus};

    fn cred(id: &str) -> Credential {
        Credential::new(id, "token", "https://sim.invalid").with_hub("hub-a")
    }

    fn device(name: &str, pending: u32) -> BackendDescriptor {
        BackendDescriptor::new(
            name,
            BackendConfiguration::device(5, ["cx", "rz", "sx"]),
            BackendStatus::active(pending),
        )
    }

    #[tokio::test]
    async fn test_listing_is_stamped_with_owner() {
        let sim = SimTransport::new().with_account("acct-A", [device("dev1", 3)]);
        let listing = sim.fetch_backends(&cred("acct-A")).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].credential_id().as_str(), "acct-A");
        assert_eq!(listing[0].owner.scope.hub.as_deref(), Some("hub-a"));
    }

    #[tokio::test]
    async fn test_unknown_account_is_unauthorized() {
        let sim = SimTransport::new();
        let err = sim.fetch_backends(&cred("ghost")).await.unwrap_err();
        assert!(matches!(err, TransportError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_injected_failure_and_restore() {
        let sim = SimTransport::new().with_account("acct-A", [device("dev1", 0)]);
        let id = CredentialId::new("acct-A");
        sim.fail_fetches(id.clone(), TransportError::Unavailable("maintenance".into()));
        assert!(sim.fetch_backends(&cred("acct-A")).await.is_err());
        sim.restore_fetches(&id);
        assert!(sim.fetch_backends(&cred("acct-A")).await.is_ok());
        assert_eq!(sim.calls().fetch_backends, 2);
    }

    #[tokio::test]
    async fn test_default_script_walks_to_done() {
        let sim = SimTransport::new().with_account("acct-A", [device("dev1", 0)]);
        let c = cred("acct-A");
        let job = sim
            .submit_job(&c, "dev1", &JobPayload::new("OPENQASM 3;", 100))
            .await
            .unwrap();

        let first = sim.poll_job(&c, &job).await.unwrap();
        assert_eq!(first.queue_position, Some(2));
        sim.poll_job(&c, &job).await.unwrap();
        assert_eq!(sim.poll_job(&c, &job).await.unwrap().status, JobStatus::Running);
        assert_eq!(sim.poll_job(&c, &job).await.unwrap().status, JobStatus::Done);
        // Script exhausted: stays on the last entry.
        assert_eq!(sim.poll_job(&c, &job).await.unwrap().status, JobStatus::Done);

        let result = sim.fetch_result(&c, &job, "dev1").await.unwrap();
        assert_eq!(result.counts().unwrap().total_shots(), 100);
    }

    #[tokio::test]
    async fn test_result_before_done_is_rejected() {
        let sim = SimTransport::new().with_account("acct-A", [device("dev1", 0)]);
        let c = cred("acct-A");
        let job = sim
            .submit_job(&c, "dev1", &JobPayload::new("OPENQASM 3;", 10))
            .await
            .unwrap();
        assert!(matches!(
            sim.fetch_result(&c, &job, "dev1").await,
            Err(TransportError::Api { status: 409, .. })
        ));
    }

    #[tokio::test]
    async fn test_result_for_other_backend_is_not_found() {
        let sim = SimTransport::new()
            .with_account("acct-A", [device("dev1", 0)])
            .with_job_script(vec![JobPoll::new(JobStatus::Done)]);
        let c = cred("acct-A");
        let job = sim
            .submit_job(&c, "dev1", &JobPayload::new("OPENQASM 3;", 10))
            .await
            .unwrap();
        sim.poll_job(&c, &job).await.unwrap();
        assert!(matches!(
            sim.fetch_result(&c, &job, "dev2").await,
            Err(TransportError::NotFound(_))
        ));
        let result = sim.fetch_result(&c, &job, "dev1").await.unwrap();
        assert_eq!(result.backend_name, "dev1");
    }

    #[tokio::test]
    async fn test_cancel_moves_to_cancelled() {
        let sim = SimTransport::new().with_account("acct-A", [device("dev1", 0)]);
        let c = cred("acct-A");
        let job = sim
            .submit_job(&c, "dev1", &JobPayload::new("OPENQASM 3;", 10))
            .await
            .unwrap();
        assert!(sim.cancel_job(&c, &job).await.unwrap());
        assert_eq!(sim.poll_job(&c, &job).await.unwrap().status, JobStatus::Cancelled);
        assert!(!sim.cancel_job(&c, &job).await.unwrap());
    }

    #[tokio::test]
    async fn test_jobs_are_private_to_their_account() {
        let sim = SimTransport::new()
            .with_account("acct-A", [device("dev1", 0)])
            .with_account("acct-B", [device("dev1", 0)]);
        let job = sim
            .submit_job(&cred("acct-A"), "dev1", &JobPayload::new("OPENQASM 3;", 10))
            .await
            .unwrap();
        assert!(matches!(
            sim.poll_job(&cred("acct-B"), &job).await,
            Err(TransportError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_offline_backend_refuses_jobs() {
        let sim = SimTransport::new().with_account("acct-A", [device("dev1", 0)]);
        assert!(sim.set_status(&"acct-A".into(), "dev1", BackendStatus::offline("maintenance")));
        let err = sim
            .submit_job(&cred("acct-A"), "dev1", &JobPayload::new("OPENQASM 3;", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Api { status: 409, .. }));
    }

    #[test]
    fn test_simulated_counts_cover_all_shots() {
        assert_eq!(simulated_counts(7).total_shots(), 7);
        assert_eq!(simulated_counts(1).len(), 1);
    }
}
