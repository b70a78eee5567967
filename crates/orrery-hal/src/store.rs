//! Durable credential storage.

use async_trait::async_trait;

use crate::account::{Credential, CredentialMatcher};
use crate::error::ProviderResult;

/// Persistence for credentials between sessions.
///
/// The in-memory account registry is populated from a store but never
/// writes through to it; saving and deleting are explicit calls.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load every stored credential, in storage order.
    async fn load(&self) -> ProviderResult<Vec<Credential>>;

    /// Save a credential, replacing any stored credential with the same id.
    async fn save(&self, credential: &Credential) -> ProviderResult<()>;

    /// Delete every stored credential the matcher selects.
    ///
    /// Returns how many were removed.
    async fn delete(&self, matcher: &CredentialMatcher) -> ProviderResult<usize>;
}
