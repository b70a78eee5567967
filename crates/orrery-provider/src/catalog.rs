//! Per-credential backend cache.
//!
//! Each credential owns one slot. A slot holds the last successful listing
//! and a refresh lock:
//!
//! ```text
//!   refresh(A) ──lock(A)──→ fetch_backends(A) ──ok──→ replace entry(A)
//!                                     │
//!                                     └──err──→ keep entry(A), report CatalogFetch
//! ```
//!
//! Refreshes of the same credential run one at a time; different
//! credentials never wait on each other. Readers see either the old or the
//! new listing, never a mix.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use orrery_hal::{
    BackendDescriptor, Credential, CredentialId, ProviderError, ProviderResult, Transport,
    TransportError,
};

/// One credential's cached listing.
#[derive(Debug)]
struct CatalogEntry {
    descriptors: Vec<BackendDescriptor>,
    fetched_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Slot {
    refresh_lock: Mutex<()>,
    entry: RwLock<Option<Arc<CatalogEntry>>>,
}

/// Backend descriptors cached per credential.
pub struct BackendCatalog {
    transport: Arc<dyn Transport>,
    slots: RwLock<FxHashMap<CredentialId, Arc<Slot>>>,
}

impl BackendCatalog {
    /// Create an empty catalog that fetches through `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            slots: RwLock::new(FxHashMap::default()),
        }
    }

    /// Re-fetch the listing for one credential.
    ///
    /// On success the cached entry is replaced and the number of backends is
    /// returned. On failure the previous entry, if any, stays in place.
    pub async fn refresh(&self, credential: &Credential) -> ProviderResult<usize> {
        self.try_refresh(credential)
            .await
            .map_err(|source| ProviderError::CatalogFetch {
                credential_id: credential.id.clone(),
                source,
            })
    }

    pub(crate) async fn try_refresh(&self, credential: &Credential) -> Result<usize, TransportError> {
        let slot = self.slot(&credential.id).await;
        let _guard = slot.refresh_lock.lock().await;

        debug!(credential = %credential.id, "Refreshing backend listing");
        let listing = match self.transport.fetch_backends(credential).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!(credential = %credential.id, "Backend refresh failed: {}", e);
                return Err(e);
            }
        };

        let descriptors: Vec<_> = listing
            .into_iter()
            .map(|d| d.owned_by(credential))
            .collect();
        let count = descriptors.len();
        *slot.entry.write().await = Some(Arc::new(CatalogEntry {
            descriptors,
            fetched_at: Utc::now(),
        }));
        debug!(credential = %credential.id, count, "Cached backend listing");
        Ok(count)
    }

    /// Union of the cached listings of `credentials`.
    ///
    /// Credentials are visited in the given order and each listing keeps the
    /// service's order. Names are not deduplicated across credentials;
    /// credentials with nothing cached contribute nothing.
    pub async fn all(&self, credentials: &[Credential]) -> Vec<BackendDescriptor> {
        let mut out = Vec::new();
        for credential in credentials {
            if let Some(entry) = self.entry(&credential.id).await {
                out.extend(entry.descriptors.iter().cloned());
            }
        }
        out
    }

    /// Cached descriptor by credential and name.
    pub async fn get(&self, credential_id: &CredentialId, name: &str) -> Option<BackendDescriptor> {
        let entry = self.entry(credential_id).await?;
        entry.descriptors.iter().find(|d| d.name == name).cloned()
    }

    /// When the cached listing for a credential was fetched.
    pub async fn fetched_at(&self, credential_id: &CredentialId) -> Option<DateTime<Utc>> {
        self.entry(credential_id).await.map(|e| e.fetched_at)
    }

    /// Drop the cached listing for a credential.
    pub async fn invalidate(&self, credential_id: &CredentialId) {
        if self.slots.write().await.remove(credential_id).is_some() {
            debug!(credential = %credential_id, "Invalidated backend listing");
        }
    }

    async fn entry(&self, credential_id: &CredentialId) -> Option<Arc<CatalogEntry>> {
        let slot = self.slots.read().await.get(credential_id).cloned()?;
        slot.entry.read().await.clone()
    }

    async fn slot(&self, credential_id: &CredentialId) -> Arc<Slot> {
        if let Some(slot) = self.slots.read().await.get(credential_id) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(credential_id.clone()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use orrery_adapter_sim::SimTransport;
    use orrery_hal::{BackendConfiguration, BackendStatus};

    fn cred(id: &str) -> Credential {
        Credential::new(id, "token", "https://sim.invalid")
    }

    fn device(name: &str, pending: u32) -> BackendDescriptor {
        BackendDescriptor::new(
            name,
            BackendConfiguration::device(5, ["cx"]),
            BackendStatus::active(pending),
        )
    }

    #[tokio::test]
    async fn test_refresh_populates_entry() {
        let sim = Arc::new(SimTransport::new().with_account("a", [device("d1", 1), device("d2", 2)]));
        let catalog = BackendCatalog::new(sim);
        assert!(catalog.fetched_at(&"a".into()).await.is_none());

        assert_eq!(catalog.refresh(&cred("a")).await.unwrap(), 2);
        assert!(catalog.fetched_at(&"a".into()).await.is_some());
        let d2 = catalog.get(&"a".into(), "d2").await.unwrap();
        assert_eq!(d2.credential_id().as_str(), "a");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_entry() {
        let sim = Arc::new(SimTransport::new().with_account("a", [device("d1", 1)]));
        let catalog = BackendCatalog::new(sim.clone());
        catalog.refresh(&cred("a")).await.unwrap();
        let before = catalog.fetched_at(&"a".into()).await;

        sim.set_backends("a", [device("d9", 0)]);
        sim.fail_fetches("a", TransportError::Unavailable("down".into()));
        let err = catalog.refresh(&cred("a")).await.unwrap_err();
        assert!(matches!(err, ProviderError::CatalogFetch { ref credential_id, .. } if credential_id.as_str() == "a"));

        let listed = catalog.all(&[cred("a")]).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "d1");
        assert_eq!(catalog.fetched_at(&"a".into()).await, before);
    }

    #[tokio::test]
    async fn test_all_follows_credential_order_without_dedup() {
        let sim = Arc::new(
            SimTransport::new()
                .with_account("a", [device("dev1", 1), device("sim1", 0)])
                .with_account("b", [device("dev1", 2)]),
        );
        let catalog = BackendCatalog::new(sim);
        catalog.refresh(&cred("a")).await.unwrap();
        catalog.refresh(&cred("b")).await.unwrap();

        let listed = catalog.all(&[cred("b"), cred("a")]).await;
        let pairs: Vec<_> = listed
            .iter()
            .map(|d| (d.credential_id().as_str(), d.name.as_str()))
            .collect();
        assert_eq!(pairs, [("b", "dev1"), ("a", "dev1"), ("a", "sim1")]);
    }

    #[tokio::test]
    async fn test_invalidate_removes_entry() {
        let sim = Arc::new(SimTransport::new().with_account("a", [device("d1", 1)]));
        let catalog = BackendCatalog::new(sim);
        catalog.refresh(&cred("a")).await.unwrap();
        catalog.invalidate(&"a".into()).await;
        assert!(catalog.all(&[cred("a")]).await.is_empty());
        assert!(catalog.get(&"a".into(), "d1").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_credential_refreshes_are_serialised() {
        let sim = Arc::new(
            SimTransport::new()
                .with_account("a", [device("d1", 1)])
                .with_account("b", [device("d1", 1)])
                .with_fetch_delay(Duration::from_millis(50)),
        );
        let catalog = BackendCatalog::new(sim.clone());
        let (a, b) = (cred("a"), cred("b"));

        let (r1, r2, r3) = tokio::join!(catalog.refresh(&a), catalog.refresh(&a), catalog.refresh(&b));
        assert!(r1.is_ok() && r2.is_ok() && r3.is_ok());
        assert_eq!(sim.peak_fetches_per_credential(), 1);
        assert_eq!(sim.peak_fetches_total(), 2);
        assert_eq!(sim.calls().fetch_backends, 3);
    }
}
