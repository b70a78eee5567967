//! Orrery Provider
//!
//! Multi-account backend discovery on top of [`orrery_hal`]. The
//! [`Provider`] aggregates the backends visible to every enabled account,
//! filters them, and tracks submitted jobs to completion.
//!
//! # Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`AccountRegistry`] | Active credentials, insertion ordered |
//! | [`BackendCatalog`] | Per-credential listing cache with serialised refreshes |
//! | [`BackendFilter`] | Structured criteria plus a typed predicate |
//! | [`JobHandle`] | Monotonic status tracking and bounded waits |
//! | [`JsonCredentialStore`] | Credentials on disk |
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use orrery_provider::{BackendFilter, JsonCredentialStore, Provider};
//! use orrery_hal::JobPayload;
//!
//! let mut provider = Provider::new(transport);
//! provider.load_accounts(&JsonCredentialStore::open_default()?).await?;
//!
//! let target = provider
//!     .least_busy(&BackendFilter::new().simulator(false).min_qubits(5))
//!     .await?;
//! let mut job = provider
//!     .submit(&target, &JobPayload::new("OPENQASM 3; qubit q; h q;", 1024))
//!     .await?;
//! let result = job.result(Duration::from_secs(600)).await?;
//! ```

pub mod catalog;
pub mod config;
pub mod filter;
pub mod job;
pub mod poller;
pub mod provider;
pub mod registry;
pub mod store;

pub use catalog::BackendCatalog;
pub use config::{ConfigError, PollConfig, ProviderConfig};
pub use filter::{BackendFilter, FilterPredicate};
pub use job::JobHandle;
pub use poller::{Backoff, MIN_POLL_INTERVAL, PollPolicy};
pub use provider::{BackendListing, CatalogFailure, CatalogReport, Provider};
pub use registry::AccountRegistry;
pub use store::{JsonCredentialStore, MemoryCredentialStore, default_credentials_path};
