//! Job lifecycle types.
//!
//! The job state machine:
//!
//! ```text
//!   submit() ──→ Initializing ──→ Queued ──→ Running ──→ Done
//!                     │              │          │
//!                     │              │          ├──→ Error(reason)
//!                     │              │          │
//!                     └──────────────┴──────────┴──→ Cancelled
//! ```
//!
//! **Invariants:**
//! - `submit()` yields a handle in `Initializing`.
//! - Transitions are monotonic; a job never moves backward.
//! - Terminal states (`Done`, `Cancelled`, `Error`) are permanent.
//! - Polling may skip stages, so `Initializing → Running` is legal.

use serde::{Deserialize, Serialize};

/// Unique identifier for a job, assigned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new job ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Status of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Accepted by the service, not yet validated or queued.
    Initializing,
    /// Waiting in the backend queue.
    Queued,
    /// Executing on the backend.
    Running,
    /// Finished successfully.
    Done,
    /// Cancelled before completion.
    Cancelled,
    /// Failed with a service-reported message.
    Error(String),
}

impl JobStatus {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Done | JobStatus::Cancelled | JobStatus::Error(_)
        )
    }

    /// Check if the job has not started executing yet.
    pub fn is_waiting(&self) -> bool {
        matches!(self, JobStatus::Initializing | JobStatus::Queued)
    }

    /// Check if the job completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Done)
    }

    fn stage(&self) -> u8 {
        match self {
            JobStatus::Initializing => 0,
            JobStatus::Queued => 1,
            JobStatus::Running => 2,
            JobStatus::Done | JobStatus::Cancelled | JobStatus::Error(_) => 3,
        }
    }

    /// Whether moving from `self` to `next` respects the state machine.
    ///
    /// Staying in the same state is allowed; leaving a terminal state or
    /// moving to an earlier stage is not.
    pub fn can_transition_to(&self, next: &JobStatus) -> bool {
        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        next.stage() > self.stage()
    }

    /// Upper-case name as reported by the service.
    pub fn name(&self) -> &'static str {
        match self {
            JobStatus::Initializing => "INITIALIZING",
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Done => "DONE",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Error(_) => "ERROR",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Error(msg) => write!(f, "ERROR: {msg}"),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// What the service reported on one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPoll {
    /// Reported status.
    pub status: JobStatus,
    /// Position in the backend queue, when the service reports one.
    pub queue_position: Option<u32>,
}

impl JobPoll {
    /// A poll result without queue information.
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            queue_position: None,
        }
    }

    /// A queued poll result with a position.
    pub fn queued_at(position: u32) -> Self {
        Self {
            status: JobStatus::Queued,
            queue_position: Some(position),
        }
    }
}

/// Work submitted to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    /// OpenQASM 3 programs, one per experiment.
    pub circuits: Vec<String>,
    /// Shots per experiment.
    pub shots: u32,
    /// Free-form tags attached to the job.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl JobPayload {
    /// A payload with a single circuit.
    pub fn new(circuit: impl Into<String>, shots: u32) -> Self {
        Self {
            circuits: vec![circuit.into()],
            shots,
            tags: Vec::new(),
        }
    }

    /// Add another circuit.
    pub fn with_circuit(mut self, circuit: impl Into<String>) -> Self {
        self.circuits.push(circuit.into());
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Check the payload is submittable; returns the reason if not.
    pub fn validate(&self) -> Result<(), String> {
        if self.circuits.is_empty() {
            return Err("payload contains no circuits".to_string());
        }
        if self.shots == 0 {
            return Err("shots must be positive".to_string());
        }
        if self.circuits.iter().any(|c| c.trim().is_empty()) {
            return Err("payload contains an empty circuit".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_terminal() {
        assert!(!JobStatus::Initializing.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Error("error".into()).is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_forward_transitions() {
        assert!(JobStatus::Initializing.can_transition_to(&JobStatus::Queued));
        assert!(JobStatus::Initializing.can_transition_to(&JobStatus::Running));
        assert!(JobStatus::Initializing.can_transition_to(&JobStatus::Cancelled));
        assert!(JobStatus::Queued.can_transition_to(&JobStatus::Cancelled));
        assert!(JobStatus::Running.can_transition_to(&JobStatus::Done));
        assert!(JobStatus::Running.can_transition_to(&JobStatus::Error("x".into())));
        assert!(JobStatus::Queued.can_transition_to(&JobStatus::Queued));
    }

    #[test]
    fn test_no_backward_or_resurrecting_transitions() {
        assert!(!JobStatus::Running.can_transition_to(&JobStatus::Queued));
        assert!(!JobStatus::Queued.can_transition_to(&JobStatus::Initializing));
        for terminal in [
            JobStatus::Done,
            JobStatus::Cancelled,
            JobStatus::Error("boom".into()),
        ] {
            assert!(!terminal.can_transition_to(&JobStatus::Initializing));
            assert!(!terminal.can_transition_to(&JobStatus::Queued));
            assert!(!terminal.can_transition_to(&JobStatus::Running));
        }
        assert!(!JobStatus::Done.can_transition_to(&JobStatus::Cancelled));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(JobStatus::Queued.to_string(), "QUEUED");
        assert_eq!(
            JobStatus::Error("too deep".into()).to_string(),
            "ERROR: too deep"
        );
    }

    #[test]
    fn test_payload_validation() {
        assert!(JobPayload::new("OPENQASM 3.0; qubit q;", 1024).validate().is_ok());
        assert!(JobPayload::new("OPENQASM 3.0;", 0).validate().is_err());
        assert!(JobPayload::new("   ", 10).validate().is_err());

        let mut empty = JobPayload::new("x", 1);
        empty.circuits.clear();
        assert!(empty.validate().is_err());
    }
}
