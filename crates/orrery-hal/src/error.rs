//! Error types shared across the workspace.

use std::time::Duration;

use thiserror::Error;

use crate::account::CredentialId;
use crate::job::JobId;

/// Failures reported by a [`Transport`](crate::Transport).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The request never produced a response.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The service answered with an error status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message from the response body.
        message: String,
    },

    /// The addressed resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The token was rejected.
    #[error("Authentication rejected: {0}")]
    Unauthorized(String),

    /// The response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The service is temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Http(_) | TransportError::Unavailable(_) => true,
            TransportError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Decode(e.to_string())
    }
}

/// Result type for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors surfaced by the provider facade and its components.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    /// A credential with the same id is already active.
    #[error("Credential '{0}' is already enabled")]
    DuplicateCredential(CredentialId),

    /// No active credential has this id.
    #[error("Credential '{0}' is not enabled")]
    UnknownCredential(CredentialId),

    /// Fetching the backend list for one credential failed.
    ///
    /// Any previously cached list for that credential is left in place.
    #[error("Failed to fetch backends for '{credential_id}': {source}")]
    CatalogFetch {
        /// Credential whose refresh failed.
        credential_id: CredentialId,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// Selection found no operational backend.
    #[error("No operational backend available")]
    NoOperationalBackend,

    /// No backend with this name is cached.
    #[error("Backend not found: {0}")]
    BackendNotFound(String),

    /// The name is exposed by several credentials.
    #[error("Backend '{name}' is exposed by {} credentials; specify one", .candidates.len())]
    AmbiguousBackend {
        /// Backend name.
        name: String,
        /// Credentials exposing it.
        candidates: Vec<CredentialId>,
    },

    /// The submission pre-check rejected the job.
    #[error("Cannot submit to '{backend}': {reason}")]
    Submission {
        /// Target backend.
        backend: String,
        /// Why the pre-check failed.
        reason: String,
    },

    /// The bounded wait expired before a terminal state.
    #[error("Timeout after {waited:?} waiting for job {job_id}")]
    Timeout {
        /// Job being waited on.
        job_id: JobId,
        /// How long the wait lasted.
        waited: Duration,
    },

    /// The service reported the job as failed.
    #[error("Job {job_id} failed: {message}")]
    JobFailed {
        /// Failed job.
        job_id: JobId,
        /// Service-reported reason.
        message: String,
    },

    /// The job ended cancelled, so there is no result.
    #[error("Job {0} was cancelled")]
    JobCancelled(JobId),

    /// The caller stopped a wait before it finished.
    #[error("Wait for job {0} was cancelled by the caller")]
    WaitCancelled(JobId),

    /// A transport call failed outside the catalog.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The credential store failed.
    #[error("Credential store error: {0}")]
    Store(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
