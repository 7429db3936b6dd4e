//! Core traits for token persistence and user notification.

use thiserror::Error;

use crate::Notification;

/// Token storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Stored token is unreadable: {0}")]
    Corrupt(String),
    #[error("Storage error: {0}")]
    Internal(String),
    #[error("Refusing to store an empty token")]
    EmptyToken,
}

/// Trait for the persisted auth token.
///
/// Exactly one token is persisted at a time. Its presence is the only
/// signal that drives the session lifecycle.
pub trait TokenStorage: Send + Sync {
    /// Load the persisted token, if any.
    ///
    /// # Errors
    /// Returns error if the backend cannot be read.
    fn load(&self) -> Result<Option<String>, StorageError>;

    /// Persist a token, replacing any previous one.
    ///
    /// # Errors
    /// Returns error if the backend cannot be written.
    fn store(&self, token: &str) -> Result<(), StorageError>;

    /// Remove the persisted token.
    ///
    /// # Errors
    /// Returns error if the backend cannot be written.
    fn clear(&self) -> Result<(), StorageError>;
}

/// Trait for surfacing notices to the user (toasts in a UI shell).
pub trait Notifier: Send + Sync {
    /// Publish a notification.
    fn notify(&self, notification: Notification);
}
