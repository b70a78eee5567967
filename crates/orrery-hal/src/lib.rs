//! Orrery core abstractions
//!
//! This crate holds the data model and the two seams through which Orrery
//! talks to the outside world: the remote service ([`Transport`]) and
//! durable credential storage ([`CredentialStore`]).
//!
//! # Overview
//!
//! - [`Credential`] and [`CredentialMatcher`] for account handling
//! - [`BackendDescriptor`] with fixed-schema configuration, status and
//!   calibration records
//! - [`JobStatus`] state machine, [`JobPayload`] and [`JobResult`]
//! - [`TransportError`] and [`ProviderError`] for failure reporting
//!
//! # Supported Transports
//!
//! | Transport | Crate | Authentication |
//! |-----------|-------|----------------|
//! | Scripted in-memory service | `orrery-adapter-sim` | None |
//! | Cloud REST API | `orrery-adapter-cloud` | Bearer token per credential |
//!
//! # Implementing a Custom Transport
//!
//! ```ignore
//! use orrery_hal::{
//!     BackendDescriptor, Credential, JobId, JobPayload, JobPoll, JobResult,
//!     Transport, TransportResult,
//! };
//! use async_trait::async_trait;
//!
//! struct MyTransport;
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn fetch_backends(&self, credential: &Credential)
//!         -> TransportResult<Vec<BackendDescriptor>> {
//!         # todo!()
//!     }
//!
//!     async fn submit_job(&self, credential: &Credential, backend: &str,
//!         payload: &JobPayload) -> TransportResult<JobId> {
//!         # todo!()
//!     }
//!
//!     async fn poll_job(&self, credential: &Credential, job_id: &JobId)
//!         -> TransportResult<JobPoll> {
//!         # todo!()
//!     }
//!
//!     async fn cancel_job(&self, credential: &Credential, job_id: &JobId)
//!         -> TransportResult<bool> {
//!         # todo!()
//!     }
//!
//!     async fn fetch_result(&self, credential: &Credential, job_id: &JobId,
//!         backend: &str) -> TransportResult<JobResult> {
//!         # todo!()
//!     }
//! }
//! ```

pub mod account;
pub mod backend;
pub mod error;
pub mod job;
pub mod result;
pub mod store;
pub mod transport;

pub use account::{Credential, CredentialId, CredentialMatcher, CredentialScope, CredentialSummary};
pub use backend::{
    BackendConfiguration, BackendDescriptor, BackendOwner, BackendProperties, BackendStatus,
    GateProperties, QubitProperties,
};
pub use error::{ProviderError, ProviderResult, TransportError, TransportResult};
pub use job::{JobId, JobPayload, JobPoll, JobStatus};
pub use result::{Counts, ExperimentResult, JobResult};
pub use store::CredentialStore;
pub use transport::Transport;
