//! Backend filtering and selection.
//!
//! A [`BackendFilter`] combines structured criteria with an optional typed
//! predicate. Every supplied criterion must hold; the predicate runs last,
//! only on descriptors that already passed the structured checks.
//!
//! ```ignore
//! let filter = BackendFilter::new()
//!     .operational(true)
//!     .simulator(false)
//!     .min_qubits(5)
//!     .predicate(|b| b.configuration.supports_gate("ecr"));
//! let candidates = filter::filter(&descriptors, &filter);
//! let target = filter::least_busy(&candidates)?;
//! ```

use std::fmt;
use std::sync::Arc;

use orrery_hal::{BackendDescriptor, CredentialScope, ProviderError, ProviderResult};

/// Caller-supplied test applied after the structured criteria.
pub type FilterPredicate = Arc<dyn Fn(&BackendDescriptor) -> bool + Send + Sync>;

/// Criteria for selecting backends. Unset criteria match everything.
#[derive(Clone, Default)]
pub struct BackendFilter {
    /// Required operational flag.
    pub operational: Option<bool>,
    /// Required simulator flag.
    pub simulator: Option<bool>,
    /// Minimum qubit count.
    pub min_qubits: Option<u32>,
    /// Hub/group/project the owning credential must belong to.
    pub credential_scope: Option<CredentialScope>,
    /// Exact backend name.
    pub name: Option<String>,
    predicate: Option<FilterPredicate>,
}

impl BackendFilter {
    /// A filter that admits every backend.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operational(mut self, operational: bool) -> Self {
        self.operational = Some(operational);
        self
    }

    pub fn simulator(mut self, simulator: bool) -> Self {
        self.simulator = Some(simulator);
        self
    }

    pub fn min_qubits(mut self, min_qubits: u32) -> Self {
        self.min_qubits = Some(min_qubits);
        self
    }

    pub fn credential_scope(mut self, scope: CredentialScope) -> Self {
        self.credential_scope = Some(scope);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a typed predicate, replacing any previous one.
    pub fn predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&BackendDescriptor) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// True when the filter constrains nothing.
    pub fn is_empty(&self) -> bool {
        self.operational.is_none()
            && self.simulator.is_none()
            && self.min_qubits.is_none()
            && self.credential_scope.is_none()
            && self.name.is_none()
            && self.predicate.is_none()
    }

    /// Test one descriptor.
    pub fn matches(&self, backend: &BackendDescriptor) -> bool {
        if self.operational.is_some_and(|op| backend.is_operational() != op) {
            return false;
        }
        if self.simulator.is_some_and(|sim| backend.is_simulator() != sim) {
            return false;
        }
        if self.min_qubits.is_some_and(|n| backend.num_qubits() < n) {
            return false;
        }
        if let Some(scope) = &self.credential_scope {
            if !scope.admits(&backend.owner.scope) {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if backend.name != *name {
                return false;
            }
        }
        self.predicate.as_ref().is_none_or(|p| p(backend))
    }
}

impl fmt::Debug for BackendFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendFilter")
            .field("operational", &self.operational)
            .field("simulator", &self.simulator)
            .field("min_qubits", &self.min_qubits)
            .field("credential_scope", &self.credential_scope)
            .field("name", &self.name)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Keep the descriptors that satisfy `criteria`, in input order.
pub fn filter(descriptors: &[BackendDescriptor], criteria: &BackendFilter) -> Vec<BackendDescriptor> {
    descriptors
        .iter()
        .filter(|d| criteria.matches(d))
        .cloned()
        .collect()
}

/// The operational backend with the fewest pending jobs.
///
/// Ties go to the first one in input order. Fails with
/// [`ProviderError::NoOperationalBackend`] when nothing is operational.
pub fn least_busy(descriptors: &[BackendDescriptor]) -> ProviderResult<&BackendDescriptor> {
    descriptors
        .iter()
        .filter(|d| d.is_operational())
        .min_by_key(|d| d.pending_jobs())
        .ok_or(ProviderError::NoOperationalBackend)
}
