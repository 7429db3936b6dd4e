//! File-backed token storage with expiry, the desktop stand-in for a cookie.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use crate::{StorageError, TokenStorage};

#[derive(Serialize, Deserialize)]
struct StoredToken {
    token: String,
    /// Unix epoch seconds.
    expires_at: u64,
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Token persisted as JSON in a single file.
///
/// Expired tokens load as absent and are removed.
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
    ttl: Duration,
}

impl FileTokenStorage {
    /// Create storage at `path`; stored tokens live for `ttl`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn remove_file(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredToken =
            serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt(e.to_string()))?;

        if stored.expires_at <= now() {
            tracing::info!(path = %self.path.display(), "Persisted token expired");
            self.remove_file()?;
            return Ok(None);
        }

        Ok(Some(stored.token))
    }

    fn store(&self, token: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let stored = StoredToken {
            token: token.to_string(),
            expires_at: now().saturating_add(self.ttl.as_secs()),
        };
        let json =
            serde_json::to_string(&stored).map_err(|e| StorageError::Internal(e.to_string()))?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.remove_file()
    }
}
