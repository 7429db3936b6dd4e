//! In-process connector. The test side drives each connection through a
//! `MemoryPeer`.

use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::{ChannelConnector, ChannelError, ChannelLink, Frame, LinkEvent};

/// Server side of one in-memory connection.
pub struct MemoryPeer {
    token: String,
    events: mpsc::UnboundedSender<LinkEvent>,
    sent: Mutex<mpsc::UnboundedReceiver<Frame>>,
    closed: AtomicBool,
}

impl MemoryPeer {
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Acknowledge the handshake.
    pub fn connect(&self) {
        let _ = self.events.send(LinkEvent::Connected);
    }

    pub fn disconnect(&self) {
        let _ = self.events.send(LinkEvent::Disconnected);
    }

    /// Refuse the token, as a server answering the handshake with 401.
    pub fn reject(&self) {
        let _ = self.events.send(LinkEvent::Unauthorized);
    }

    /// Push a frame to the client.
    pub fn push(&self, event: &str, payload: Value) {
        let _ = self.events.send(LinkEvent::Frame(Frame::new(event, payload)));
    }

    /// Frames the client emitted since the last call.
    #[must_use]
    pub fn drain_sent(&self) -> Vec<Frame> {
        let mut rx = self.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct State {
    peers: Vec<Arc<MemoryPeer>>,
    log: Vec<String>,
    refuse: bool,
    auto_connect: bool,
}

/// Connector that keeps every connection in memory.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<State>>,
}

impl MemoryConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acknowledge every handshake as soon as the connection opens.
    #[must_use]
    pub fn auto_connect(self) -> Self {
        self.lock().auto_connect = true;
        self
    }

    /// Fail every following `open` until reset.
    pub fn set_refuse(&self, refuse: bool) {
        self.lock().refuse = refuse;
    }

    /// `open:<token>` / `close:<token>` / `refused:<token>` in the order they happened.
    #[must_use]
    pub fn log(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    #[must_use]
    pub fn peers(&self) -> Vec<Arc<MemoryPeer>> {
        self.lock().peers.clone()
    }

    #[must_use]
    pub fn last_peer(&self) -> Option<Arc<MemoryPeer>> {
        self.lock().peers.last().cloned()
    }

    /// Connections opened and not yet closed.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.lock().peers.iter().filter(|p| !p.is_closed()).count()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl ChannelConnector for MemoryConnector {
    async fn open(&self, token: &str) -> Result<ChannelLink, ChannelError> {
        let mut state = self.lock();
        if state.refuse {
            state.log.push(format!("refused:{token}"));
            return Err(ChannelError::Connect("connection refused".to_string()));
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let peer = Arc::new(MemoryPeer {
            token: token.to_string(),
            events: in_tx,
            sent: Mutex::new(out_rx),
            closed: AtomicBool::new(false),
        });
        if state.auto_connect {
            peer.connect();
        }
        state.peers.push(peer.clone());
        state.log.push(format!("open:{token}"));
        drop(state);

        let shared = self.state.clone();
        let task = tokio::spawn(async move {
            let _ = stop_rx.await;
            peer.closed.store(true, Ordering::SeqCst);
            shared
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .log
                .push(format!("close:{}", peer.token));
        });

        Ok(ChannelLink::new(out_tx, in_rx, stop_tx, task))
    }
}
