//! Cloud REST transport for Orrery.
//!
//! Talks to the backend service over HTTPS with a bearer token per
//! credential.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use orrery_adapter_cloud::CloudTransport;
//! use orrery_hal::Credential;
//! use orrery_provider::{BackendFilter, Provider};
//!
//! let mut provider = Provider::new(Arc::new(CloudTransport::new()));
//! provider.enable_account(Credential::new("main", token, "https://api.example.com"))?;
//! let listing = provider.backends(&BackendFilter::new().operational(true)).await;
//! ```
//!
//! # Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | List backends | `GET /v1/backends`, then `/configuration` and `/status` per device |
//! | Calibration | `GET /v1/backends/{name}/properties` |
//! | Submit | `POST /v1/jobs` |
//! | Poll | `GET /v1/jobs/{id}` |
//! | Cancel | `POST /v1/jobs/{id}/cancel` |
//! | Results | `GET /v1/jobs/{id}/results` |

mod api;
mod decode;
mod error;
mod transport;

pub use api::{CloudClient, DEFAULT_REQUEST_TIMEOUT, JobErrorInfo, JobState, JobStatusResponse};
pub use error::{CloudError, CloudResult};
pub use transport::CloudTransport;
