//! Backend descriptors.
//!
//! A [`BackendDescriptor`] is the fixed-schema view of one backend as seen
//! through one credential:
//!
//! ```text
//!   BackendDescriptor
//!   ├── name             (unique only within one credential)
//!   ├── owner            credential id + hub/group/project
//!   ├── configuration    static: qubits, simulator flag, gates, coupling
//!   ├── status           live: operational flag, pending jobs
//!   └── properties       calibration data, may be absent or stale
//! ```
//!
//! Descriptors are replaced wholesale on every catalog refresh; nothing in
//! the workspace mutates a cached descriptor in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::{Credential, CredentialId, CredentialScope};

/// The credential a descriptor was fetched through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendOwner {
    /// Owning credential.
    pub credential_id: CredentialId,
    /// Scope of the owning credential at fetch time.
    #[serde(default)]
    pub scope: CredentialScope,
}

impl From<&Credential> for BackendOwner {
    fn from(credential: &Credential) -> Self {
        Self {
            credential_id: credential.id.clone(),
            scope: credential.scope.clone(),
        }
    }
}

/// Static configuration of a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfiguration {
    /// Number of qubits.
    pub n_qubits: u32,
    /// Whether the backend is a simulator.
    #[serde(default)]
    pub simulator: bool,
    /// Native gate names.
    #[serde(default)]
    pub basis_gates: Vec<String>,
    /// Directed qubit couplings.
    #[serde(default)]
    pub coupling_map: Vec<[u32; 2]>,
    /// Maximum shots per experiment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_shots: Option<u32>,
    /// Maximum experiments per job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_experiments: Option<u32>,
    /// Processor family (e.g. "Eagle", "Heron").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor_family: Option<String>,
}

impl BackendConfiguration {
    /// Configuration for a fully connected simulator.
    pub fn simulator(n_qubits: u32) -> Self {
        Self {
            n_qubits,
            simulator: true,
            basis_gates: Vec::new(),
            coupling_map: Vec::new(),
            max_shots: None,
            max_experiments: None,
            processor_family: None,
        }
    }

    /// Configuration for a hardware device.
    pub fn device(n_qubits: u32, basis_gates: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            n_qubits,
            simulator: false,
            basis_gates: basis_gates.into_iter().map(Into::into).collect(),
            coupling_map: Vec::new(),
            max_shots: None,
            max_experiments: None,
            processor_family: None,
        }
    }

    /// Set the coupling map.
    pub fn with_coupling_map(mut self, coupling_map: Vec<[u32; 2]>) -> Self {
        self.coupling_map = coupling_map;
        self
    }

    /// Set the shot limit.
    pub fn with_max_shots(mut self, max_shots: u32) -> Self {
        self.max_shots = Some(max_shots);
        self
    }

    /// Set the processor family.
    pub fn with_processor_family(mut self, family: impl Into<String>) -> Self {
        self.processor_family = Some(family.into());
        self
    }

    /// Check whether a gate is native. Simulators with an empty basis accept anything.
    pub fn supports_gate(&self, gate: &str) -> bool {
        (self.simulator && self.basis_gates.is_empty())
            || self.basis_gates.iter().any(|g| g.eq_ignore_ascii_case(gate))
    }

    /// Check whether two qubits are coupled, in either direction.
    ///
    /// An empty coupling map means all-to-all connectivity.
    pub fn is_coupled(&self, a: u32, b: u32) -> bool {
        self.coupling_map.is_empty()
            || self
                .coupling_map
                .iter()
                .any(|&[x, y]| (x == a && y == b) || (x == b && y == a))
    }
}

/// Live status of a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendStatus {
    /// Whether the backend currently accepts jobs.
    pub operational: bool,
    /// Jobs waiting in the backend queue.
    #[serde(default)]
    pub pending_jobs: u32,
    /// Free-form status message ("active", "maintenance", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_msg: Option<String>,
}

impl BackendStatus {
    /// An operational backend with the given queue length.
    pub fn active(pending_jobs: u32) -> Self {
        Self {
            operational: true,
            pending_jobs,
            status_msg: Some("active".to_string()),
        }
    }

    /// A backend that is not accepting jobs.
    pub fn offline(reason: impl Into<String>) -> Self {
        Self {
            operational: false,
            pending_jobs: 0,
            status_msg: Some(reason.into()),
        }
    }
}

/// Calibration data for one qubit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QubitProperties {
    /// Relaxation time in microseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t1_us: Option<f64>,
    /// Dephasing time in microseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t2_us: Option<f64>,
    /// Qubit frequency in GHz.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_ghz: Option<f64>,
    /// Measurement assignment error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readout_error: Option<f64>,
}

/// Calibration data for one gate on specific qubits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateProperties {
    /// Gate name.
    pub gate: String,
    /// Qubits the gate acts on.
    pub qubits: Vec<u32>,
    /// Gate error rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<f64>,
    /// Gate duration in nanoseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_ns: Option<f64>,
}

/// Calibration snapshot for a backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendProperties {
    /// When the calibration was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    /// Per-qubit data, indexed by qubit number.
    #[serde(default)]
    pub qubits: Vec<QubitProperties>,
    /// Per-gate data.
    #[serde(default)]
    pub gates: Vec<GateProperties>,
}

impl BackendProperties {
    /// Calibration data for one qubit.
    pub fn qubit(&self, index: u32) -> Option<&QubitProperties> {
        self.qubits.get(index as usize)
    }

    /// Error rate of `gate` on exactly `qubits`, if reported.
    pub fn gate_error(&self, gate: &str, qubits: &[u32]) -> Option<f64> {
        self.gates
            .iter()
            .find(|g| g.gate == gate && g.qubits == qubits)
            .and_then(|g| g.error)
    }

    /// Mean readout error over the qubits that report one.
    pub fn mean_readout_error(&self) -> Option<f64> {
        let errors: Vec<f64> = self.qubits.iter().filter_map(|q| q.readout_error).collect();
        if errors.is_empty() {
            None
        } else {
            Some(errors.iter().sum::<f64>() / errors.len() as f64)
        }
    }

    /// True when the snapshot is older than `max_age`, or carries no timestamp.
    pub fn is_stale(&self, max_age: chrono::Duration, now: DateTime<Utc>) -> bool {
        match self.last_update {
            Some(at) => now.signed_duration_since(at) > max_age,
            None => true,
        }
    }
}

/// A backend as visible through one credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// Backend name, unique only within the owning credential.
    pub name: String,
    /// Credential the backend was listed under.
    #[serde(default)]
    pub owner: BackendOwner,
    /// Static configuration.
    pub configuration: BackendConfiguration,
    /// Live status at fetch time.
    pub status: BackendStatus,
    /// Calibration data, absent until explicitly fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BackendProperties>,
}

impl BackendDescriptor {
    /// Create a descriptor with no owner assigned yet.
    pub fn new(
        name: impl Into<String>,
        configuration: BackendConfiguration,
        status: BackendStatus,
    ) -> Self {
        Self {
            name: name.into(),
            owner: BackendOwner::default(),
            configuration,
            status,
            properties: None,
        }
    }

    /// Stamp the descriptor with the credential it was fetched through.
    pub fn owned_by(mut self, credential: &Credential) -> Self {
        self.owner = BackendOwner::from(credential);
        self
    }

    /// Attach calibration data.
    pub fn with_properties(mut self, properties: BackendProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Owning credential id.
    pub fn credential_id(&self) -> &CredentialId {
        &self.owner.credential_id
    }

    /// Whether the backend accepted jobs at fetch time.
    pub fn is_operational(&self) -> bool {
        self.status.operational
    }

    /// Whether the backend is a simulator.
    pub fn is_simulator(&self) -> bool {
        self.configuration.simulator
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> u32 {
        self.configuration.n_qubits
    }

    /// Queue length at fetch time.
    pub fn pending_jobs(&self) -> u32 {
        self.status.pending_jobs
    }

    /// `name@credential` form that stays unique across credentials.
    pub fn qualified_name(&self) -> String {
        format!("{}@{}", self.name, self.owner.credential_id)
    }
}
