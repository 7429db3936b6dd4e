//! Core building blocks for the dashboard client.
//!
//! This crate provides:
//! - `SessionStore` - Owned auth session with a subscribe interface
//! - `Role` / `PermissionFlags` - Capability flags derived from the role string
//! - `NotificationCenter` - Broadcast + history of user-facing notices
//! - `DashboardConfig` - Client configuration
//! - Token storage and notifier traits

pub mod config;
pub mod models;
pub mod navigation;
pub mod notify;
pub mod roles;
pub mod session;
pub mod storage;
pub mod traits;

pub use config::{ConfigError, DashboardConfig};
pub use notify::{Level, Notification, NotificationCenter};
pub use roles::{PermissionFlags, Role};
pub use session::{Session, SessionStore, UserProfile};
pub use traits::{Notifier, StorageError, TokenStorage};
