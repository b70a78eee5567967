//! Account credentials and scope matching.
//!
//! A [`Credential`] is one authenticated account on the cloud service,
//! optionally narrowed to a hub/group/project [`CredentialScope`]. The
//! token is never printed: `Debug` redacts it, and presentation layers
//! should use [`CredentialSummary`] instead of the credential itself.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a credential set, unique within one registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(pub String);

impl CredentialId {
    /// Create a new credential ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CredentialId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CredentialId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Hub/group/project triple an account can be narrowed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialScope {
    /// Hub name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub: Option<String>,
    /// Group name within the hub.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Project name within the group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl CredentialScope {
    /// An empty scope, which admits every other scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hub.
    pub fn with_hub(mut self, hub: impl Into<String>) -> Self {
        self.hub = Some(hub.into());
        self
    }

    /// Set the group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set the project.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// True when no field is set.
    pub fn is_unscoped(&self) -> bool {
        self.hub.is_none() && self.group.is_none() && self.project.is_none()
    }

    /// Check whether `other` satisfies every field set on `self`.
    ///
    /// Fields left unset on `self` impose no constraint.
    pub fn admits(&self, other: &CredentialScope) -> bool {
        field_admits(self.hub.as_deref(), other.hub.as_deref())
            && field_admits(self.group.as_deref(), other.group.as_deref())
            && field_admits(self.project.as_deref(), other.project.as_deref())
    }

    /// The `hub/group/project` instance string, if all three are set.
    pub fn instance(&self) -> Option<String> {
        match (&self.hub, &self.group, &self.project) {
            (Some(h), Some(g), Some(p)) => Some(format!("{h}/{g}/{p}")),
            _ => None,
        }
    }
}

fn field_admits(want: Option<&str>, have: Option<&str>) -> bool {
    match want {
        None => true,
        Some(w) => have == Some(w),
    }
}

impl fmt::Display for CredentialScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.hub.as_deref().unwrap_or("-"),
            self.group.as_deref().unwrap_or("-"),
            self.project.as_deref().unwrap_or("-")
        )
    }
}

/// One authenticated account on the cloud service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Unique identifier.
    pub id: CredentialId,
    /// Optional human-readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// API token.
    pub token: String,
    /// Base URL of the service API.
    pub endpoint_url: String,
    /// Hub/group/project narrowing.
    #[serde(flatten)]
    pub scope: CredentialScope,
}

impl Credential {
    /// Create an unscoped credential.
    pub fn new(
        id: impl Into<CredentialId>,
        token: impl Into<String>,
        endpoint_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: None,
            token: token.into(),
            endpoint_url: endpoint_url.into(),
            scope: CredentialScope::default(),
        }
    }

    /// Set the display label.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replace the whole scope.
    pub fn with_scope(mut self, scope: CredentialScope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the hub.
    pub fn with_hub(mut self, hub: impl Into<String>) -> Self {
        self.scope.hub = Some(hub.into());
        self
    }

    /// Set the group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.scope.group = Some(group.into());
        self
    }

    /// Set the project.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.scope.project = Some(project.into());
        self
    }

    /// Token-free view for display.
    pub fn summary(&self) -> CredentialSummary {
        CredentialSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            endpoint_url: self.endpoint_url.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("token", &"[REDACTED]")
            .field("endpoint_url", &self.endpoint_url)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Token-free snapshot of a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialSummary {
    /// Credential identifier.
    pub id: CredentialId,
    /// Display label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Base URL of the service API.
    pub endpoint_url: String,
    /// Hub/group/project narrowing.
    #[serde(flatten)]
    pub scope: CredentialScope,
}

/// Predicate over credentials used by disable and delete operations.
///
/// Every field left as `None` matches anything, so the default matcher
/// selects all credentials.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialMatcher {
    /// Match a specific credential id.
    pub id: Option<CredentialId>,
    /// Match the hub.
    pub hub: Option<String>,
    /// Match the group.
    pub group: Option<String>,
    /// Match the project.
    pub project: Option<String>,
    /// Match the token.
    pub token: Option<String>,
}

impl CredentialMatcher {
    /// A matcher that selects every credential.
    pub fn any() -> Self {
        Self::default()
    }

    /// Match a single credential by id.
    pub fn id(id: impl Into<CredentialId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Require the hub.
    pub fn hub(mut self, hub: impl Into<String>) -> Self {
        self.hub = Some(hub.into());
        self
    }

    /// Require the group.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Require the project.
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Require the token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Check a credential against every set field.
    pub fn matches(&self, credential: &Credential) -> bool {
        if let Some(id) = &self.id {
            if *id != credential.id {
                return false;
            }
        }
        if let Some(token) = &self.token {
            if *token != credential.token {
                return false;
            }
        }
        let scope = CredentialScope {
            hub: self.hub.clone(),
            group: self.group.clone(),
            project: self.project.clone(),
        };
        scope.admits(&credential.scope)
    }
}

impl fmt::Debug for CredentialMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialMatcher")
            .field("id", &self.id)
            .field("hub", &self.hub)
            .field("group", &self.group)
            .field("project", &self.project)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
