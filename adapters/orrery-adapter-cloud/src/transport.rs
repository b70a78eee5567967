//! [`Transport`] implementation over the cloud REST API.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tracing::{debug, instrument};

use orrery_hal::{
    BackendDescriptor, BackendProperties, Credential, CredentialId, JobId, JobPayload, JobPoll,
    JobResult, Transport, TransportResult,
};

use crate::api::{CloudClient, DEFAULT_REQUEST_TIMEOUT};
use crate::error::CloudResult;

/// HTTPS transport.
///
/// Keeps one HTTP client per credential. A client is rebuilt when the
/// credential's token, endpoint or scope changes.
#[derive(Debug)]
pub struct CloudTransport {
    clients: Mutex<FxHashMap<CredentialId, Arc<CloudClient>>>,
    request_timeout: Duration,
}

impl Default for CloudTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudTransport {
    /// Create a transport with the default request timeout.
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(FxHashMap::default()),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn client(&self, credential: &Credential) -> CloudResult<Arc<CloudClient>> {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(&credential.id) {
            if client.serves(credential) {
                return Ok(client.clone());
            }
        }
        debug!(credential = %credential.id, endpoint = %credential.endpoint_url, "Building API client");
        let client = Arc::new(CloudClient::new(credential, self.request_timeout)?);
        clients.insert(credential.id.clone(), client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Transport for CloudTransport {
    #[instrument(skip_all, fields(credential = %credential.id))]
    async fn fetch_backends(
        &self,
        credential: &Credential,
    ) -> TransportResult<Vec<BackendDescriptor>> {
        let client = self.client(credential)?;
        let backends = client.list_backends().await?;
        debug!(count = backends.len(), "Fetched backend listing");
        Ok(backends
            .into_iter()
            .map(|b| b.owned_by(credential))
            .collect())
    }

    #[instrument(skip_all, fields(credential = %credential.id, backend = %backend))]
    async fn fetch_properties(
        &self,
        credential: &Credential,
        backend: &str,
    ) -> TransportResult<Option<BackendProperties>> {
        let client = self.client(credential)?;
        Ok(client.get_properties(backend).await?)
    }

    #[instrument(skip_all, fields(credential = %credential.id, backend = %backend))]
    async fn submit_job(
        &self,
        credential: &Credential,
        backend: &str,
        payload: &JobPayload,
    ) -> TransportResult<JobId> {
        let client = self.client(credential)?;
        Ok(client.submit_job(backend, payload).await?)
    }

    #[instrument(skip_all, fields(credential = %credential.id, job_id = %job_id))]
    async fn poll_job(&self, credential: &Credential, job_id: &JobId) -> TransportResult<JobPoll> {
        let client = self.client(credential)?;
        let status = client.get_job_status(job_id).await?;
        Ok(status.to_poll()?)
    }

    #[instrument(skip_all, fields(credential = %credential.id, job_id = %job_id))]
    async fn cancel_job(&self, credential: &Credential, job_id: &JobId) -> TransportResult<bool> {
        let client = self.client(credential)?;
        Ok(client.cancel_job(job_id).await?)
    }

    #[instrument(skip_all, fields(credential = %credential.id, job_id = %job_id, backend = %backend))]
    async fn fetch_result(
        &self,
        credential: &Credential,
        job_id: &JobId,
        backend: &str,
    ) -> TransportResult<JobResult> {
        let client = self.client(credential)?;
        Ok(client.get_job_results(job_id, backend).await?)
    }
}
