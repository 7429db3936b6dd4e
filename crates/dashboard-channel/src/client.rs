//! Client side of one push connection.
//!
//! A `PushChannel` moves through `Connecting -> Connected -> Disconnected`
//! as its transport reports, possibly back to `Connected` after a transport
//! level reconnect, and ends in `Uninitialized` once the provider closes it.
//! Listeners are keyed by event name; handlers run on the channel's pump
//! task, outside the registry lock.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::{
    ChannelError, Frame,
    transport::{ChannelLink, LinkCloser, LinkEvent},
};

/// Lifecycle state of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Uninitialized,
    Connecting,
    Connected,
    Disconnected,
}

/// Handle for removing a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;
type ConnectHandler = Box<dyn FnOnce(&Emitter) + Send>;
/// Called when the server refuses the channel's token.
pub(crate) type OnUnauthorized = Box<dyn Fn() + Send>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(ListenerId, String, Handler)>,
    on_connect: Vec<(ListenerId, ConnectHandler)>,
}

impl Registry {
    fn allocate(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }
}

struct Shared {
    registry: Mutex<Registry>,
    state: watch::Sender<ChannelState>,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn current(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Flip to `Connected` and hand back the pending connect handlers.
    fn mark_connected(&self) -> Vec<ConnectHandler> {
        let mut registry = self.registry();
        self.state.send_replace(ChannelState::Connected);
        registry.on_connect.drain(..).map(|(_, f)| f).collect()
    }

    fn mark_disconnected(&self) {
        let _registry = self.registry();
        self.state.send_if_modified(|state| {
            if matches!(state, ChannelState::Uninitialized | ChannelState::Disconnected) {
                false
            } else {
                *state = ChannelState::Disconnected;
                true
            }
        });
    }

    fn handlers_for(&self, event: &str) -> Vec<Handler> {
        self.registry()
            .listeners
            .iter()
            .filter(|(_, name, _)| name == event)
            .map(|(_, _, handler)| handler.clone())
            .collect()
    }
}

/// Sending half of a channel. Cheap to clone; does not keep the channel open.
#[derive(Clone)]
pub struct Emitter {
    outbound: mpsc::UnboundedSender<Frame>,
    shared: Arc<Shared>,
}

impl Emitter {
    /// # Errors
    /// Returns `NotConnected` unless the channel is connected.
    pub fn emit(&self, event: &str, payload: Value) -> Result<(), ChannelError> {
        if self.shared.current() != ChannelState::Connected {
            return Err(ChannelError::NotConnected);
        }
        tracing::debug!(event, "emit");
        self.outbound
            .send(Frame::new(event, payload))
            .map_err(|_| ChannelError::Closed)
    }
}

/// One shared push connection, authenticated with a single token.
///
/// Consumers get it as `Arc<PushChannel>` from the provider and cannot close it.
pub struct PushChannel {
    token: String,
    emitter: Emitter,
    closer: Mutex<Option<LinkCloser>>,
    pump: JoinHandle<()>,
}

impl PushChannel {
    pub(crate) fn open(token: &str, link: ChannelLink, on_unauthorized: OnUnauthorized) -> Arc<Self> {
        let ChannelLink {
            outbound,
            inbound,
            closer,
        } = link;
        let (state, _) = watch::channel(ChannelState::Connecting);
        let emitter = Emitter {
            outbound,
            shared: Arc::new(Shared {
                registry: Mutex::default(),
                state,
            }),
        };
        let pump = tokio::spawn(pump(inbound, emitter.clone(), on_unauthorized));

        Arc::new(Self {
            token: token.to_string(),
            emitter,
            closer: Mutex::new(Some(closer)),
            pump,
        })
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.emitter.shared.current()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.emitter.shared.state.subscribe()
    }

    #[must_use]
    pub fn emitter(&self) -> Emitter {
        self.emitter.clone()
    }

    /// # Errors
    /// Returns `NotConnected` unless the channel is connected.
    pub fn emit(&self, event: &str, payload: Value) -> Result<(), ChannelError> {
        self.emitter.emit(event, payload)
    }

    /// Call `handler` with the payload of every `event` frame.
    pub fn on(&self, event: &str, handler: impl Fn(&Value) + Send + Sync + 'static) -> ListenerId {
        let mut registry = self.emitter.shared.registry();
        let id = registry.allocate();
        registry.listeners.push((id, event.to_string(), Arc::new(handler)));
        id
    }

    /// Run `f` once the channel is connected: right away if it already is,
    /// otherwise on the next connect. Returns the pending listener in the
    /// second case.
    pub fn once_connected(&self, f: impl FnOnce(&Emitter) + Send + 'static) -> Option<ListenerId> {
        let mut registry = self.emitter.shared.registry();
        if self.emitter.shared.current() == ChannelState::Connected {
            drop(registry);
            f(&self.emitter);
            return None;
        }
        let id = registry.allocate();
        registry.on_connect.push((id, Box::new(f)));
        Some(id)
    }

    /// Remove a listener or a pending connect handler.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut registry = self.emitter.shared.registry();
        let before = registry.listeners.len() + registry.on_connect.len();
        registry.listeners.retain(|(lid, _, _)| *lid != id);
        registry.on_connect.retain(|(lid, _)| *lid != id);
        before != registry.listeners.len() + registry.on_connect.len()
    }

    /// Registered listeners plus pending connect handlers.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        let registry = self.emitter.shared.registry();
        registry.listeners.len() + registry.on_connect.len()
    }

    /// Close the connection and wait for the transport to finish.
    pub(crate) async fn close(&self) {
        self.pump.abort();
        {
            let mut registry = self.emitter.shared.registry();
            registry.listeners.clear();
            registry.on_connect.clear();
            self.emitter.shared.state.send_replace(ChannelState::Uninitialized);
        }
        let closer = self
            .closer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(closer) = closer {
            closer.close().await;
            tracing::info!("Push channel closed");
        }
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump(
    mut inbound: mpsc::UnboundedReceiver<LinkEvent>,
    emitter: Emitter,
    on_unauthorized: OnUnauthorized,
) {
    while let Some(event) = inbound.recv().await {
        match event {
            LinkEvent::Connected => {
                tracing::info!("Push channel connected");
                for handler in emitter.shared.mark_connected() {
                    handler(&emitter);
                }
            }
            LinkEvent::Frame(frame) => {
                let handlers = emitter.shared.handlers_for(&frame.event);
                if handlers.is_empty() {
                    tracing::trace!(event = %frame.event, "No listener");
                }
                for handler in handlers {
                    handler(&frame.payload);
                }
            }
            LinkEvent::Disconnected => {
                tracing::info!("Push channel disconnected");
                emitter.shared.mark_disconnected();
            }
            LinkEvent::Unauthorized => {
                tracing::warn!("Push channel token rejected");
                emitter.shared.mark_disconnected();
                on_unauthorized();
            }
        }
    }
    emitter.shared.mark_disconnected();
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::{ChannelConnector, memory::MemoryConnector};

    async fn open(connector: &MemoryConnector) -> Arc<PushChannel> {
        let link = connector.open("tok").await.unwrap();
        PushChannel::open("tok", link, Box::new(|| {}))
    }

    async fn wait_for(channel: &PushChannel, state: ChannelState) {
        channel
            .subscribe_state()
            .wait_for(|s| *s == state)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_state_follows_transport() {
        let connector = MemoryConnector::new();
        let channel = open(&connector).await;
        let peer = connector.last_peer().unwrap();
        assert_eq!(channel.state(), ChannelState::Connecting);

        peer.connect();
        wait_for(&channel, ChannelState::Connected).await;
        peer.disconnect();
        wait_for(&channel, ChannelState::Disconnected).await;
        peer.connect();
        wait_for(&channel, ChannelState::Connected).await;

        channel.close().await;
        assert_eq!(channel.state(), ChannelState::Uninitialized);
        assert!(peer.is_closed());
    }

    #[tokio::test]
    async fn test_rejected_token_is_reported() {
        let connector = MemoryConnector::new();
        let link = connector.open("tok").await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let channel = PushChannel::open(
            "tok",
            link,
            Box::new(move || {
                let _ = tx.send(());
            }),
        );

        connector.last_peer().unwrap().reject();
        rx.recv().await.unwrap();
        assert_eq!(channel.state(), ChannelState::Disconnected);
    }

    #[tokio::test]
    async fn test_emit_requires_connection() {
        let connector = MemoryConnector::new();
        let channel = open(&connector).await;
        let peer = connector.last_peer().unwrap();

        assert_eq!(
            channel.emit("getDepartmentNames", Value::Null),
            Err(ChannelError::NotConnected)
        );

        peer.connect();
        wait_for(&channel, ChannelState::Connected).await;
        channel.emit("getDepartmentNames", Value::Null).unwrap();
        assert_eq!(
            peer.drain_sent(),
            vec![Frame::new("getDepartmentNames", Value::Null)]
        );
    }

    #[tokio::test]
    async fn test_connect_handler_runs_once() {
        let connector = MemoryConnector::new();
        let channel = open(&connector).await;
        let peer = connector.last_peer().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let pending = channel.once_connected(move |emitter| {
            counter.fetch_add(1, Ordering::SeqCst);
            emitter.emit("getProfilename", Value::Null).unwrap();
        });
        assert!(pending.is_some());

        peer.connect();
        wait_for(&channel, ChannelState::Connected).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        channel.on("sync", move |_| {
            let _ = tx.send(());
        });
        peer.disconnect();
        peer.connect();
        peer.push("sync", Value::Null);
        rx.recv().await.unwrap();

        assert_eq!(channel.state(), ChannelState::Connected);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(peer.drain_sent().len(), 1);

        let counter = calls.clone();
        let immediate = channel.once_connected(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(immediate.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_listeners_by_event() {
        let connector = MemoryConnector::new().auto_connect();
        let channel = open(&connector).await;
        let peer = connector.last_peer().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let departments = {
            let tx = tx.clone();
            channel.on("getDepartmentName", move |payload| {
                let _ = tx.send(("departments", payload.clone()));
            })
        };
        channel.on("getTeamMember", move |payload| {
            let _ = tx.send(("members", payload.clone()));
        });

        peer.push("getDepartmentName", json!([{"id": 1, "department_name": "Ops"}]));
        peer.push("getTeamMember", json!([]));
        assert_eq!(rx.recv().await.unwrap().0, "departments");
        assert_eq!(rx.recv().await.unwrap().0, "members");

        assert!(channel.off(departments));
        assert!(!channel.off(departments));
        peer.push("getDepartmentName", json!([]));
        peer.push("getTeamMember", json!([1]));
        assert_eq!(rx.recv().await.unwrap(), ("members", json!([1])));
    }

    #[tokio::test]
    async fn test_off_cancels_pending_connect() {
        let connector = MemoryConnector::new();
        let channel = open(&connector).await;
        let peer = connector.last_peer().unwrap();

        let pending = channel
            .once_connected(|emitter| {
                emitter.emit("getDepartmentNames", Value::Null).unwrap();
            })
            .unwrap();
        assert_eq!(channel.listener_count(), 1);
        assert!(channel.off(pending));

        peer.connect();
        wait_for(&channel, ChannelState::Connected).await;
        assert!(peer.drain_sent().is_empty());
    }
}
