//! Owner of the single push channel.
//!
//! The provider follows the session token. A non-empty token with no
//! channel opens exactly one connection; a different token (or none)
//! closes the current connection, awaiting the close, before anything
//! new is opened. A token the server refuses is evicted from the session,
//! which closes the channel through the same path.

use std::sync::Arc;

use dashboard_core::{Session, SessionStore};
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
};

use crate::{ChannelConnector, ChannelState, PushChannel};

type Current = watch::Sender<Option<Arc<PushChannel>>>;

/// Root-level owner of the push channel.
pub struct ChannelProvider {
    current: Arc<Current>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ChannelProvider {
    /// Start following `session`. Must be called inside a tokio runtime.
    #[must_use]
    pub fn spawn(session: &SessionStore, connector: Arc<dyn ChannelConnector>) -> Self {
        let (current, _) = watch::channel(None);
        let current = Arc::new(current);
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(follow_token(
            session.clone(),
            connector,
            current.clone(),
            stop_rx,
        ));

        Self {
            current,
            stop: Some(stop_tx),
            task: Some(task),
        }
    }

    /// The open channel, if any.
    #[must_use]
    pub fn channel(&self) -> Option<Arc<PushChannel>> {
        self.current.borrow().clone()
    }

    /// Observe channel replacement.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<PushChannel>>> {
        self.current.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.current
            .borrow()
            .as_ref()
            .map_or(ChannelState::Uninitialized, |channel| channel.state())
    }

    /// Stop following the session and close the channel.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("Channel provider task failed: {e}");
            }
        }
    }
}

impl Drop for ChannelProvider {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.current.send_replace(None);
    }
}

fn token_of(session: &Session) -> Option<String> {
    session.token.clone().filter(|token| !token.is_empty())
}

async fn close_current(current: &Current) {
    if let Some(channel) = current.send_replace(None) {
        channel.close().await;
    }
}

async fn follow_token(
    session: SessionStore,
    connector: Arc<dyn ChannelConnector>,
    current: Arc<Current>,
    mut stop: oneshot::Receiver<()>,
) {
    let mut sessions = session.subscribe();
    let mut active: Option<String> = None;

    loop {
        let token = token_of(&sessions.borrow_and_update());

        if token != active {
            if active.is_some() {
                tracing::info!("Session token changed, closing push channel");
                close_current(&current).await;
                active = None;
            }
            if let Some(token) = token {
                match connector.open(&token).await {
                    Ok(link) => {
                        tracing::info!("Opening push channel");
                        let refused = {
                            let session = session.clone();
                            let token = token.clone();
                            Box::new(move || {
                                session.evict_token_if(&token);
                            })
                        };
                        current.send_replace(Some(PushChannel::open(&token, link, refused)));
                        active = Some(token);
                    }
                    Err(e) => {
                        tracing::warn!("Push channel unavailable, live updates disabled: {e}");
                    }
                }
            }
        }

        tokio::select! {
            changed = sessions.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = &mut stop => break,
        }
    }

    close_current(&current).await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dashboard_core::storage::MemoryTokenStorage;

    use super::*;
    use crate::memory::MemoryConnector;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn next_channel(provider: &ChannelProvider) -> Arc<PushChannel> {
        let mut rx = provider.subscribe();
        let channel = tokio::time::timeout(
            Duration::from_secs(1),
            rx.wait_for(Option::is_some),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        channel.unwrap()
    }

    #[tokio::test]
    async fn test_no_connection_without_token() {
        let session = SessionStore::in_memory();
        let connector = MemoryConnector::new();
        let provider = ChannelProvider::spawn(&session, Arc::new(connector.clone()));

        settle().await;
        assert!(provider.channel().is_none());
        assert_eq!(provider.state(), ChannelState::Uninitialized);
        assert!(connector.log().is_empty());

        tokio_test::assert_err!(session.login("", None));
        settle().await;
        assert!(connector.log().is_empty());
    }

    #[tokio::test]
    async fn test_one_connection_per_token() {
        let session = SessionStore::new(Arc::new(MemoryTokenStorage::with_token("tok-a")));
        let connector = MemoryConnector::new();
        let provider = ChannelProvider::spawn(&session, Arc::new(connector.clone()));

        let channel = next_channel(&provider).await;
        assert_eq!(channel.token(), "tok-a");
        assert_eq!(provider.state(), ChannelState::Connecting);

        // same token again
        session.login("tok-a", None).unwrap();
        session.login("tok-a", None).unwrap();
        settle().await;

        assert_eq!(connector.log(), vec!["open:tok-a"]);
        assert_eq!(connector.active_count(), 1);
        provider.shutdown().await;
        assert_eq!(connector.active_count(), 0);
    }

    #[tokio::test]
    async fn test_close_before_open_on_token_switch() {
        let session = SessionStore::in_memory();
        session.login("tok-a", None).unwrap();
        let connector = MemoryConnector::new().auto_connect();
        let provider = ChannelProvider::spawn(&session, Arc::new(connector.clone()));
        let first = next_channel(&provider).await;

        session.login("tok-b", None).unwrap();
        let mut rx = provider.subscribe();
        rx.wait_for(|c| c.as_ref().is_some_and(|c| c.token() == "tok-b"))
            .await
            .unwrap();

        assert_eq!(first.state(), ChannelState::Uninitialized);
        assert_eq!(connector.log(), vec!["open:tok-a", "close:tok-a", "open:tok-b"]);
        assert_eq!(connector.active_count(), 1);
    }

    #[tokio::test]
    async fn test_logout_closes_channel() {
        let session = SessionStore::in_memory();
        session.login("tok-a", None).unwrap();
        let connector = MemoryConnector::new();
        let provider = ChannelProvider::spawn(&session, Arc::new(connector.clone()));
        next_channel(&provider).await;

        session.logout();
        let mut rx = provider.subscribe();
        rx.wait_for(Option::is_none).await.unwrap();
        settle().await;

        assert_eq!(connector.log(), vec!["open:tok-a", "close:tok-a"]);
        assert_eq!(connector.active_count(), 0);
    }

    #[tokio::test]
    async fn test_refused_connection_degrades() {
        let session = SessionStore::in_memory();
        let connector = MemoryConnector::new();
        connector.set_refuse(true);
        let provider = ChannelProvider::spawn(&session, Arc::new(connector.clone()));

        session.login("tok-a", None).unwrap();
        settle().await;
        assert!(provider.channel().is_none());

        // the next session update retries
        connector.set_refuse(false);
        session.login("tok-a", None).unwrap();
        let channel = next_channel(&provider).await;
        assert_eq!(channel.token(), "tok-a");
        assert_eq!(connector.log(), vec!["refused:tok-a", "open:tok-a"]);
    }

    #[tokio::test]
    async fn test_rejected_token_is_evicted() {
        let session = SessionStore::in_memory();
        session.login("tok-a", None).unwrap();
        let connector = MemoryConnector::new();
        let provider = ChannelProvider::spawn(&session, Arc::new(connector.clone()));
        next_channel(&provider).await;

        connector.last_peer().unwrap().reject();
        let mut rx = provider.subscribe();
        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(Option::is_none))
            .await
            .unwrap()
            .unwrap();
        settle().await;

        assert!(session.token().is_none());
        assert_eq!(connector.log(), vec!["open:tok-a", "close:tok-a"]);
        assert_eq!(connector.active_count(), 0);
    }

    #[tokio::test]
    async fn test_late_rejection_spares_new_token() {
        let session = SessionStore::in_memory();
        session.login("tok-a", None).unwrap();
        let connector = MemoryConnector::new();
        let provider = ChannelProvider::spawn(&session, Arc::new(connector.clone()));
        let first = next_channel(&provider).await;
        let first_peer = connector.last_peer().unwrap();

        session.login("tok-b", None).unwrap();
        let mut rx = provider.subscribe();
        rx.wait_for(|c| c.as_ref().is_some_and(|c| c.token() == "tok-b"))
            .await
            .unwrap();

        first_peer.reject();
        settle().await;
        assert_eq!(first.state(), ChannelState::Uninitialized);
        assert_eq!(session.token().as_deref(), Some("tok-b"));
        assert!(provider.channel().is_some());
    }
}
