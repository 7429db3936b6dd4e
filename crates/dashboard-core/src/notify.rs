//! Broadcast + history store for user-facing notifications.

use std::{collections::VecDeque, sync::RwLock};

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::Notifier;

/// Default number of notifications kept for replay.
pub const DEFAULT_HISTORY: usize = 50;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient notice for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique id, usable as a dismiss key.
    pub id: Uuid,
    pub level: Level,
    pub message: String,
}

impl Notification {
    /// Create a notification with a fresh id.
    #[must_use]
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Level::Success, message)
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Level::Warning, message)
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }
}

/// Notification store with broadcast and bounded history.
///
/// A toast area mounted late receives the recent history first,
/// then live notices.
pub struct NotificationCenter {
    history: RwLock<VecDeque<Notification>>,
    capacity: usize,
    sender: broadcast::Sender<Notification>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}

impl NotificationCenter {
    /// Create a center keeping at most `capacity` notifications for replay.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            history: RwLock::new(VecDeque::with_capacity(capacity.min(64))),
            capacity,
            sender,
        }
    }

    /// Push a notification to live listeners and history.
    pub fn push(&self, notification: Notification) {
        let _ = self.sender.send(notification.clone());

        let mut history = match self.history.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if self.capacity == 0 {
            return;
        }
        while history.len() >= self.capacity {
            history.pop_front();
        }
        history.push_back(notification);
    }

    /// Get a receiver for live notifications.
    #[must_use]
    pub fn get_receiver(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Get a snapshot of the history, oldest first.
    #[must_use]
    pub fn get_history(&self) -> Vec<Notification> {
        let history = match self.history.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        history.iter().cloned().collect()
    }

    /// Drop a notification from the history (user dismissed it).
    pub fn dismiss(&self, id: Uuid) {
        let mut history = match self.history.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        history.retain(|n| n.id != id);
    }

    /// Stream that yields history first, then live notifications.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, Notification> {
        let (history, rx) = (self.get_history(), self.get_receiver());

        let hist = futures::stream::iter(history);
        let live = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });

        Box::pin(hist.chain(live))
    }
}

impl Notifier for NotificationCenter {
    fn notify(&self, notification: Notification) {
        tracing::debug!(level = ?notification.level, "notify: {}", notification.message);
        self.push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let center = NotificationCenter::new(2);
        center.push(Notification::success("one"));
        center.push(Notification::warning("two"));
        center.push(Notification::error("three"));

        let messages: Vec<_> = center.get_history().into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["two", "three"]);
    }

    #[test]
    fn test_dismiss_removes_from_history() {
        let center = NotificationCenter::default();
        let n = Notification::error("API request failed.");
        let id = n.id;
        center.push(n);
        center.push(Notification::success("saved"));

        center.dismiss(id);
        let history = center.get_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, "saved");
    }

    #[tokio::test]
    async fn test_history_then_live() {
        let center = NotificationCenter::default();
        center.notify(Notification::warning("earlier"));

        let mut stream = center.history_plus_stream();
        center.notify(Notification::success("later"));

        assert_eq!(stream.next().await.unwrap().message, "earlier");
        assert_eq!(stream.next().await.unwrap().message, "later");
    }
}
