//! Credential persistence.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use orrery_hal::{Credential, CredentialMatcher, CredentialStore, ProviderError, ProviderResult};

/// Environment variable naming the credential file.
pub const CREDENTIALS_ENV: &str = "ORRERY_CREDENTIALS";

const FILE_VERSION: u32 = 1;

/// On-disk layout of the credential file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default = "file_version")]
    version: u32,
    #[serde(default)]
    credentials: Vec<Credential>,
}

fn file_version() -> u32 {
    FILE_VERSION
}

/// Default credential file location.
///
/// `$ORRERY_CREDENTIALS` when set, otherwise
/// `<config dir>/orrery/credentials.json`.
pub fn default_credentials_path() -> ProviderResult<PathBuf> {
    if let Ok(path) = std::env::var(CREDENTIALS_ENV) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    dirs::config_dir()
        .map(|dir| dir.join("orrery").join("credentials.json"))
        .ok_or_else(|| ProviderError::Store("cannot determine the config directory".to_string()))
}

fn io_error(path: &Path, e: std::io::Error) -> ProviderError {
    ProviderError::Store(format!("{}: {e}", path.display()))
}

/// Credentials stored as one JSON document.
///
/// Writes go to a sibling temporary file which is then renamed over the
/// original, so a crash never leaves a half-written file behind.
pub struct JsonCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonCredentialStore {
    /// Store backed by the file at `path`. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store at [`default_credentials_path`].
    pub fn open_default() -> ProviderResult<Self> {
        Ok(Self::new(default_credentials_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> ProviderResult<CredentialFile> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                ProviderError::Store(format!("{}: invalid credential file: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CredentialFile::default()),
            Err(e) => Err(io_error(&self.path, e)),
        }
    }

    async fn write_file(&self, file: &CredentialFile) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| io_error(parent, e))?;
            }
        }

        let json = serde_json::to_string_pretty(file)
            .map_err(|e| ProviderError::Store(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await.map_err(|e| io_error(&tmp, e))?;
        restrict_permissions(&tmp).await?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;
        debug!(path = %self.path.display(), count = file.credentials.len(), "Wrote credential file");
        Ok(())
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> ProviderResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| io_error(path, e))
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> ProviderResult<()> {
    Ok(())
}

#[async_trait]
impl CredentialStore for JsonCredentialStore {
    async fn load(&self) -> ProviderResult<Vec<Credential>> {
        Ok(self.read_file().await?.credentials)
    }

    async fn save(&self, credential: &Credential) -> ProviderResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.read_file().await?;
        file.version = FILE_VERSION;
        upsert(&mut file.credentials, credential);
        self.write_file(&file).await?;
        info!(credential = %credential.id, "Saved account");
        Ok(())
    }

    async fn delete(&self, matcher: &CredentialMatcher) -> ProviderResult<usize> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.read_file().await?;
        let before = file.credentials.len();
        file.credentials.retain(|c| !matcher.matches(c));
        let removed = before - file.credentials.len();
        if removed > 0 {
            self.write_file(&file).await?;
            info!(removed, "Deleted stored accounts");
        }
        Ok(removed)
    }
}

/// Credentials kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credentials: RwLock<Vec<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `credentials`.
    pub fn with_credentials(credentials: impl IntoIterator<Item = Credential>) -> Self {
        let mut list = Vec::new();
        for credential in credentials {
            upsert(&mut list, &credential);
        }
        Self {
            credentials: RwLock::new(list),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> ProviderResult<Vec<Credential>> {
        Ok(self.credentials.read().await.clone())
    }

    async fn save(&self, credential: &Credential) -> ProviderResult<()> {
        upsert(&mut *self.credentials.write().await, credential);
        Ok(())
    }

    async fn delete(&self, matcher: &CredentialMatcher) -> ProviderResult<usize> {
        let mut credentials = self.credentials.write().await;
        let before = credentials.len();
        credentials.retain(|c| !matcher.matches(c));
        Ok(before - credentials.len())
    }
}

/// Replace the credential with the same id in place, or append it.
fn upsert(list: &mut Vec<Credential>, credential: &Credential) {
    match list.iter_mut().find(|c| c.id == credential.id) {
        Some(existing) => *existing = credential.clone(),
        None => list.push(credential.clone()),
    }
}
