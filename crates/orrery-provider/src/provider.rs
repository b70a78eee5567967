//! The provider facade.
//!
//! A [`Provider`] owns one account registry and one backend catalog, both
//! talking to the service through a single [`Transport`]:
//!
//! ```text
//!   AccountRegistry ──active()──→ BackendCatalog ──all()──→ filter() ──→ least_busy()
//!                                                                │
//!                                                   submit() ←───┘
//!                                                      │
//!                                                  JobHandle ──→ result()
//! ```
//!
//! Providers are explicit values; several may coexist, each with its own
//! accounts and cache.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use orrery_hal::{
    BackendDescriptor, Credential, CredentialId, CredentialMatcher, CredentialStore, JobId,
    JobPayload, ProviderError, ProviderResult, Transport, TransportError,
};

use crate::catalog::BackendCatalog;
use crate::config::ProviderConfig;
use crate::filter::{self, BackendFilter};
use crate::job::JobHandle;
use crate::poller::PollPolicy;
use crate::registry::AccountRegistry;

/// A credential whose backend listing could not be refreshed.
#[derive(Debug, Clone)]
pub struct CatalogFailure {
    pub credential_id: CredentialId,
    pub error: TransportError,
}

impl fmt::Display for CatalogFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.credential_id, self.error)
    }
}

impl From<CatalogFailure> for ProviderError {
    fn from(failure: CatalogFailure) -> Self {
        ProviderError::CatalogFetch {
            credential_id: failure.credential_id,
            source: failure.error,
        }
    }
}

/// Outcome of refreshing every active credential.
#[derive(Debug, Clone, Default)]
pub struct CatalogReport {
    /// Credentials refreshed, with their backend counts, in registry order.
    pub refreshed: Vec<(CredentialId, usize)>,
    /// Credentials whose refresh failed; their previous listing is kept.
    pub failures: Vec<CatalogFailure>,
}

impl CatalogReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Backends matching a filter, plus the credentials that could not be
/// refreshed while building the list.
#[derive(Debug, Clone, Default)]
pub struct BackendListing {
    pub backends: Vec<BackendDescriptor>,
    pub failures: Vec<CatalogFailure>,
}

impl BackendListing {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Multi-account entry point.
pub struct Provider {
    registry: AccountRegistry,
    catalog: BackendCatalog,
    transport: Arc<dyn Transport>,
    policy: PollPolicy,
}

impl Provider {
    /// Create a provider with no accounts.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            registry: AccountRegistry::new(),
            catalog: BackendCatalog::new(Arc::clone(&transport)),
            transport,
            policy: PollPolicy::default(),
        }
    }

    /// Create a provider using the polling settings in `config`.
    pub fn from_config(transport: Arc<dyn Transport>, config: &ProviderConfig) -> Self {
        Self::new(transport).with_poll_policy(config.poll_policy())
    }

    /// Polling policy given to every job handle.
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.policy
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &BackendCatalog {
        &self.catalog
    }

    // ---- accounts ----

    /// Activate a credential; duplicate ids are rejected.
    pub fn enable_account(&mut self, credential: Credential) -> ProviderResult<()> {
        self.registry.enable(credential)
    }

    /// Activate a credential, overwriting any active one with the same id.
    ///
    /// The replaced credential's cached listing is dropped.
    pub async fn enable_or_replace_account(&mut self, credential: Credential) -> Option<Credential> {
        let replaced = self.registry.enable_or_replace(credential);
        if let Some(old) = &replaced {
            self.catalog.invalidate(&old.id).await;
        }
        replaced
    }

    /// Deactivate matching credentials and drop their cached listings.
    pub async fn disable_accounts(&mut self, matcher: &CredentialMatcher) -> Vec<Credential> {
        let removed = self.registry.disable(matcher);
        for credential in &removed {
            self.catalog.invalidate(&credential.id).await;
        }
        removed
    }

    /// Snapshot of the active credentials.
    pub fn accounts(&self) -> Vec<Credential> {
        self.registry.active()
    }

    /// Activate every stored credential that is not already active.
    ///
    /// Returns how many were activated.
    pub async fn load_accounts(&mut self, store: &dyn CredentialStore) -> ProviderResult<usize> {
        let mut loaded = 0;
        for credential in store.load().await? {
            if self.registry.get(&credential.id).is_some() {
                debug!(credential = %credential.id, "Stored account already active");
                continue;
            }
            self.registry.enable(credential)?;
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Persist a credential. The active set is not touched.
    pub async fn save_account(
        &self,
        store: &dyn CredentialStore,
        credential: &Credential,
    ) -> ProviderResult<()> {
        store.save(credential).await
    }

    /// Delete stored credentials. The active set is not touched.
    pub async fn delete_accounts(
        &self,
        store: &dyn CredentialStore,
        matcher: &CredentialMatcher,
    ) -> ProviderResult<usize> {
        store.delete(matcher).await
    }

    // ---- backends ----

    /// Refresh every active credential concurrently.
    #[instrument(skip(self))]
    pub async fn refresh_backends(&self) -> CatalogReport {
        let credentials = self.registry.active();
        self.refresh_all(&credentials).await
    }

    async fn refresh_all(&self, credentials: &[Credential]) -> CatalogReport {
        let results = join_all(credentials.iter().map(|c| self.catalog.try_refresh(c))).await;

        let mut report = CatalogReport::default();
        for (credential, result) in credentials.iter().zip(results) {
            match result {
                Ok(count) => report.refreshed.push((credential.id.clone(), count)),
                Err(error) => report.failures.push(CatalogFailure {
                    credential_id: credential.id.clone(),
                    error,
                }),
            }
        }
        if !report.failures.is_empty() {
            warn!(
                failed = report.failures.len(),
                total = credentials.len(),
                "Some backend listings could not be refreshed"
            );
        }
        report
    }

    /// Refresh, union and filter.
    ///
    /// Credentials that fail to refresh contribute their previous listing,
    /// if any, and are reported in `failures`.
    pub async fn backends(&self, criteria: &BackendFilter) -> BackendListing {
        let credentials = self.registry.active();
        let report = self.refresh_all(&credentials).await;
        let all = self.catalog.all(&credentials).await;
        BackendListing {
            backends: filter::filter(&all, criteria),
            failures: report.failures,
        }
    }

    /// Filter the cached listings without contacting the service.
    pub async fn cached_backends(&self, criteria: &BackendFilter) -> Vec<BackendDescriptor> {
        let all = self.catalog.all(&self.registry.active()).await;
        filter::filter(&all, criteria)
    }

    /// Find a backend by name.
    ///
    /// Credentials with nothing cached are refreshed first. Without a
    /// credential id, a name exposed by several credentials is ambiguous.
    pub async fn backend(
        &self,
        name: &str,
        credential_id: Option<&CredentialId>,
    ) -> ProviderResult<BackendDescriptor> {
        let credentials = match credential_id {
            Some(id) => vec![self.credential(id)?.clone()],
            None => self.registry.active(),
        };

        let mut missing = Vec::new();
        for credential in &credentials {
            if self.catalog.fetched_at(&credential.id).await.is_none() {
                missing.push(credential.clone());
            }
        }
        if !missing.is_empty() {
            self.refresh_all(&missing).await;
        }

        let mut matches: Vec<_> = self
            .catalog
            .all(&credentials)
            .await
            .into_iter()
            .filter(|d| d.name == name)
            .collect();
        match matches.len() {
            0 => Err(ProviderError::BackendNotFound(name.to_string())),
            1 => Ok(matches.remove(0)),
            _ => Err(ProviderError::AmbiguousBackend {
                name: name.to_string(),
                candidates: matches.into_iter().map(|d| d.owner.credential_id).collect(),
            }),
        }
    }

    /// The least busy operational backend among those matching `criteria`.
    pub async fn least_busy(&self, criteria: &BackendFilter) -> ProviderResult<BackendDescriptor> {
        let listing = self.backends(criteria).await;
        filter::least_busy(&listing.backends).cloned()
    }

    /// Fetch calibration data and return a copy of `backend` carrying it.
    ///
    /// The cached descriptor is left as it was.
    pub async fn backend_properties(
        &self,
        backend: &BackendDescriptor,
    ) -> ProviderResult<BackendDescriptor> {
        let credential = self.credential(backend.credential_id())?;
        let properties = self
            .transport
            .fetch_properties(credential, &backend.name)
            .await?;
        let mut copy = backend.clone();
        copy.properties = properties;
        Ok(copy)
    }

    // ---- jobs ----

    /// Submit a payload to a backend from this provider's catalog.
    pub async fn submit(
        &self,
        backend: &BackendDescriptor,
        payload: &JobPayload,
    ) -> ProviderResult<JobHandle> {
        let credential = self.credential(backend.credential_id())?.clone();
        JobHandle::submit(
            Arc::clone(&self.transport),
            credential,
            backend,
            payload,
            self.policy,
        )
        .await
    }

    /// Re-attach to a job submitted earlier under an active credential.
    pub fn job(
        &self,
        credential_id: &CredentialId,
        job_id: JobId,
        backend_name: impl Into<String>,
    ) -> ProviderResult<JobHandle> {
        let credential = self.credential(credential_id)?.clone();
        info!(job = %job_id, credential = %credential_id, "Attached to job");
        Ok(JobHandle::attach(
            Arc::clone(&self.transport),
            credential,
            job_id,
            backend_name,
            self.policy,
        ))
    }

    fn credential(&self, id: &CredentialId) -> ProviderResult<&Credential> {
        self.registry
            .get(id)
            .ok_or_else(|| ProviderError::UnknownCredential(id.clone()))
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("accounts", &self.registry.summaries())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
