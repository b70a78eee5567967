//! Active account set.

use tracing::{debug, info};

use orrery_hal::{
    Credential, CredentialId, CredentialMatcher, CredentialSummary, ProviderError, ProviderResult,
};

/// The credentials currently enabled in a session, in the order they were
/// enabled.
///
/// The registry is purely in-memory; loading from and saving to disk go
/// through a [`CredentialStore`](orrery_hal::CredentialStore).
#[derive(Debug, Default)]
pub struct AccountRegistry {
    credentials: Vec<Credential>,
}

impl AccountRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a credential to the active set.
    ///
    /// Fails with [`ProviderError::DuplicateCredential`] when a credential
    /// with the same id is already active.
    pub fn enable(&mut self, credential: Credential) -> ProviderResult<()> {
        if self.position(&credential.id).is_some() {
            return Err(ProviderError::DuplicateCredential(credential.id));
        }
        info!(credential = %credential.id, "Enabled account");
        self.credentials.push(credential);
        Ok(())
    }

    /// Add a credential, overwriting an active one with the same id.
    ///
    /// A replaced credential keeps its position and is returned.
    pub fn enable_or_replace(&mut self, credential: Credential) -> Option<Credential> {
        match self.position(&credential.id) {
            Some(i) => {
                info!(credential = %credential.id, "Replaced account");
                Some(std::mem::replace(&mut self.credentials[i], credential))
            }
            None => {
                info!(credential = %credential.id, "Enabled account");
                self.credentials.push(credential);
                None
            }
        }
    }

    /// Remove every active credential the matcher selects.
    ///
    /// Returns the removed credentials; matching nothing is not an error.
    pub fn disable(&mut self, matcher: &CredentialMatcher) -> Vec<Credential> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.credentials)
            .into_iter()
            .partition(|c| matcher.matches(c));
        self.credentials = kept;
        if removed.is_empty() {
            debug!(?matcher, "No account matched");
        }
        for credential in &removed {
            info!(credential = %credential.id, "Disabled account");
        }
        removed
    }

    /// Snapshot of the active credentials in insertion order.
    pub fn active(&self) -> Vec<Credential> {
        self.credentials.clone()
    }

    /// Look up an active credential.
    pub fn get(&self, id: &CredentialId) -> Option<&Credential> {
        self.credentials.iter().find(|c| c.id == *id)
    }

    /// Number of active credentials.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// True when no credential is active.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Token-free view of the active set.
    pub fn summaries(&self) -> Vec<CredentialSummary> {
        self.credentials.iter().map(Credential::summary).collect()
    }

    fn position(&self, id: &CredentialId) -> Option<usize> {
        self.credentials.iter().position(|c| c.id == *id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred(id: &str, hub: &str) -> Credential {
        Credential::new(id, format!("token-{id}"), "https://api.example.com").with_hub(hub)
    }

    #[test]
    fn test_enable_preserves_order() {
        let mut reg = AccountRegistry::new();
        reg.enable(cred("b", "h1")).unwrap();
        reg.enable(cred("a", "h1")).unwrap();
        let ids: Vec<_> = reg.active().into_iter().map(|c| c.id.0).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn test_enable_duplicate_rejected() {
        let mut reg = AccountRegistry::new();
        reg.enable(cred("a", "h1")).unwrap();
        let err = reg.enable(cred("a", "h2")).unwrap_err();
        assert!(matches!(err, ProviderError::DuplicateCredential(id) if id.as_str() == "a"));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(&"a".into()).unwrap().scope.hub.as_deref(), Some("h1"));
    }

    #[test]
    fn test_enable_or_replace_keeps_position() {
        let mut reg = AccountRegistry::new();
        reg.enable(cred("a", "h1")).unwrap();
        reg.enable(cred("b", "h1")).unwrap();
        let old = reg.enable_or_replace(cred("a", "h2")).unwrap();
        assert_eq!(old.scope.hub.as_deref(), Some("h1"));
        let active = reg.active();
        assert_eq!(active[0].id.as_str(), "a");
        assert_eq!(active[0].scope.hub.as_deref(), Some("h2"));
        assert!(reg.enable_or_replace(cred("c", "h1")).is_none());
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_disable_by_hub_returns_removed() {
        let mut reg = AccountRegistry::new();
        reg.enable(cred("a", "h1")).unwrap();
        reg.enable(cred("b", "h2")).unwrap();
        reg.enable(cred("c", "h1")).unwrap();

        let removed = reg.disable(&CredentialMatcher::any().hub("h1"));
        assert_eq!(removed.len(), 2);
        let ids: Vec<_> = reg.active().into_iter().map(|c| c.id.0).collect();
        assert_eq!(ids, ["b"]);
    }

    #[test]
    fn test_disable_no_match_is_noop() {
        let mut reg = AccountRegistry::new();
        reg.enable(cred("a", "h1")).unwrap();
        assert!(reg.disable(&CredentialMatcher::any().hub("zzz")).is_empty());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_empty_matcher_disables_everything() {
        let mut reg = AccountRegistry::new();
        reg.enable(cred("a", "h1")).unwrap();
        reg.enable(cred("b", "h2")).unwrap();
        assert_eq!(reg.disable(&CredentialMatcher::any()).len(), 2);
        assert!(reg.is_empty());
    }

    #[test]
    fn test_active_is_a_snapshot() {
        let mut reg = AccountRegistry::new();
        reg.enable(cred("a", "h1")).unwrap();
        let snapshot = reg.active();
        reg.disable(&CredentialMatcher::any());
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_summaries_hide_tokens() {
        let mut reg = AccountRegistry::new();
        reg.enable(cred("a", "h1")).unwrap();
        let json = serde_json::to_string(&reg.summaries()).unwrap();
        assert!(!json.contains("token-a"));
    }
}
