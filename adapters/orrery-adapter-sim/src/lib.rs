//! Orrery Simulated Cloud Service
//!
//! An in-memory [`Transport`](orrery_hal::Transport) that behaves like the
//! cloud service without any network traffic. Tests use it to drive the
//! provider through every job state; the CLI uses it for offline demos.
//!
//! # Features
//!
//! - **Accounts**: each credential id sees its own backend listing
//! - **Status scripts**: every job replays a list of poll results
//! - **Failure injection**: listings can be made to fail per account
//! - **Call counters**: assert exactly how often each method was used
//!
//! # Example
//!
//! ```ignore
//! use orrery_adapter_sim::SimTransport;
//! use orrery_hal::{BackendConfiguration, BackendDescriptor, BackendStatus, JobPoll, JobStatus};
//!
//! let sim = SimTransport::new()
//!     .with_account("acct-A", [BackendDescriptor::new(
//!         "dev1",
//!         BackendConfiguration::device(5, ["cx", "rz", "sx"]),
//!         BackendStatus::active(6),
//!     )])
//!     .with_job_script(vec![
//!         JobPoll::queued_at(1),
//!         JobPoll::new(JobStatus::Running),
//!         JobPoll::new(JobStatus::Done),
//!     ]);
//! ```

mod fixtures;
mod transport;

pub use fixtures::{demo_credentials, demo_service};
pub use transport::{CallCounts, SimTransport};
