//! Bearer-token storage.

use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors writing or clearing a stored token.
#[derive(Debug, Error)]
pub enum TokenStoreError {
    /// Filesystem failure.
    #[error("token store I/O error: {0}")]
    Io(#[from] io::Error),
    /// Token file could not be serialized.
    #[error("token store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Source of the bearer token attached to API requests.
pub trait TokenStore: Send + Sync {
    /// Current token, if any.
    fn token(&self) -> Option<String>;
    /// Replace the stored token.
    fn set_token(&self, token: &str) -> Result<(), TokenStoreError>;
    /// Remove the stored token.
    fn clear(&self) -> Result<(), TokenStoreError>;
}

/// Process-local token.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    /// Store seeded with `token`.
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token.filter(|t| !t.is_empty())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn set_token(&self, token: &str) -> Result<(), TokenStoreError> {
        *self.token.write() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        *self.token.write() = None;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredToken {
    token: String,
}

/// Token persisted as `{"token": "..."}` in a JSON file
/// (default `~/.revo/auth.json`). The file is read on every lookup so
/// logins from another process are picked up.
#[derive(Clone, Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.revo/auth.json`.
    pub fn default_location() -> Self {
        Self::new(revo_settings::settings_dir().join("auth.json"))
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn token(&self) -> Option<String> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read token file");
                return None;
            }
        };
        match serde_json::from_str::<StoredToken>(&content) {
            Ok(stored) if !stored.token.is_empty() => Some(stored.token),
            Ok(_) => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring malformed token file");
                None
            }
        }
    }

    fn set_token(&self, token: &str) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&StoredToken {
            token: token.to_string(),
        })?;
        std::fs::write(&self.path, json)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        debug!(path = %self.path.display(), "token saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
