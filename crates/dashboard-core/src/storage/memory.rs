//! In-memory token storage.

use std::sync::RwLock;

use crate::{StorageError, TokenStorage};

/// In-memory storage implementation.
///
/// Useful for tests and embedded shells. The token is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage already holding a token.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .token
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .clone())
    }

    fn store(&self, token: &str) -> Result<(), StorageError> {
        *self
            .token
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))? = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.token
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .take();
        Ok(())
    }
}
