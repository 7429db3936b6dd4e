//! Connector seam between the channel state machine and a concrete transport.

use async_trait::async_trait;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{ChannelError, Frame};

/// Notice from the transport to the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Handshake acknowledged. Sent again after each transport-level reconnect.
    Connected,
    Frame(Frame),
    Disconnected,
    /// The server refused the token. The transport stops after this.
    Unauthorized,
}

/// Opens authenticated connections.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Start one connection authenticated with `token`.
    ///
    /// Returning `Ok` does not mean the handshake finished; the link reports
    /// `LinkEvent::Connected` once it has.
    async fn open(&self, token: &str) -> Result<ChannelLink, ChannelError>;
}

/// Both ends of one open connection, as seen by the channel.
pub struct ChannelLink {
    pub(crate) outbound: mpsc::UnboundedSender<Frame>,
    pub(crate) inbound: mpsc::UnboundedReceiver<LinkEvent>,
    pub(crate) closer: LinkCloser,
}

impl ChannelLink {
    /// `task` is the transport's own driver, awaited on close.
    #[must_use]
    pub const fn new(
        outbound: mpsc::UnboundedSender<Frame>,
        inbound: mpsc::UnboundedReceiver<LinkEvent>,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            outbound,
            inbound,
            closer: LinkCloser {
                shutdown: Some(shutdown),
                task: Some(task),
            },
        }
    }

    /// Queue a frame for the server.
    ///
    /// # Errors
    /// Returns `Closed` once the transport has stopped.
    pub fn send(&self, frame: Frame) -> Result<(), ChannelError> {
        self.outbound.send(frame).map_err(|_| ChannelError::Closed)
    }

    /// Next notice from the transport; `None` once it has stopped.
    pub async fn recv(&mut self) -> Option<LinkEvent> {
        self.inbound.recv().await
    }
}

pub(crate) struct LinkCloser {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl LinkCloser {
    /// Ask the transport to close and wait until it has.
    pub(crate) async fn close(mut self) {
        self.signal();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::error!("Channel transport panicked: {e}");
                }
            }
        }
    }

    fn signal(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

impl Drop for LinkCloser {
    fn drop(&mut self) {
        self.signal();
    }
}
