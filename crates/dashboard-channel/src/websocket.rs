//! WebSocket connector.
//!
//! The token travels in the handshake `Authorization` header and as the
//! `token` query parameter. A dropped connection is re-established after a
//! fixed delay until the channel closes the link. A handshake refused with
//! 401 is reported once and never retried with the same token.

use std::time::Duration;

use async_trait::async_trait;
use dashboard_core::DashboardConfig;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        Error as WsError, Message,
        client::IntoClientRequest,
        handshake::client::Request,
        http::{HeaderValue, StatusCode, header::AUTHORIZATION},
    },
};
use url::Url;

use crate::{ChannelConnector, ChannelError, ChannelLink, Frame, LinkEvent};

/// Connector for `ws://` and `wss://` push servers.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    reconnect_delay: Duration,
}

impl WsConnector {
    #[must_use]
    pub fn new(url: impl Into<String>, reconnect_delay: Duration) -> Self {
        Self {
            url: url.into(),
            reconnect_delay,
        }
    }

    #[must_use]
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(config.push_url.clone(), config.reconnect_delay())
    }
}

fn handshake(url: &str, token: &str) -> Result<Request, ChannelError> {
    let mut url = Url::parse(url).map_err(|e| ChannelError::Connect(e.to_string()))?;
    url.query_pairs_mut().append_pair("token", token);
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| ChannelError::Connect(e.to_string()))?;
    let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| ChannelError::Connect(e.to_string()))?;
    request.headers_mut().insert(AUTHORIZATION, bearer);
    Ok(request)
}

#[async_trait]
impl ChannelConnector for WsConnector {
    async fn open(&self, token: &str) -> Result<ChannelLink, ChannelError> {
        // reject a bad URL or token up front instead of retrying forever
        handshake(&self.url, token)?;

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run(
            self.url.clone(),
            token.to_string(),
            self.reconnect_delay,
            out_rx,
            in_tx,
            stop_rx,
        ));

        Ok(ChannelLink::new(out_tx, in_rx, stop_tx, task))
    }
}

enum Ended {
    Closed,
    Dropped,
}

async fn run(
    url: String,
    token: String,
    reconnect_delay: Duration,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
    inbound: mpsc::UnboundedSender<LinkEvent>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        let request = match handshake(&url, &token) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!("Invalid push handshake: {e}");
                return;
            }
        };

        let connected = tokio::select! {
            result = connect_async(request) => result,
            _ = &mut stop => return,
        };

        match connected {
            Ok((stream, _)) => {
                tracing::debug!(%url, "WebSocket connected");
                if inbound.send(LinkEvent::Connected).is_err() {
                    return;
                }
                let (mut sink, mut source) = stream.split();

                let ended = loop {
                    tokio::select! {
                        _ = &mut stop => {
                            let _ = sink.send(Message::Close(None)).await;
                            let _ = sink.close().await;
                            break Ended::Closed;
                        }
                        Some(frame) = outbound.recv() => {
                            let text = match frame.encode() {
                                Ok(text) => text,
                                Err(e) => {
                                    tracing::error!("Failed to serialize frame: {e}");
                                    continue;
                                }
                            };
                            if sink.send(Message::Text(text.into())).await.is_err() {
                                break Ended::Dropped;
                            }
                        }
                        message = source.next() => match message {
                            Some(Ok(Message::Text(text))) => match Frame::decode(text.as_str()) {
                                Ok(frame) => {
                                    let _ = inbound.send(LinkEvent::Frame(frame));
                                }
                                Err(e) => tracing::warn!("Invalid server frame: {e}"),
                            },
                            Some(Ok(Message::Close(_))) | None => break Ended::Dropped,
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::warn!("WebSocket error: {e}");
                                break Ended::Dropped;
                            }
                        },
                    }
                };

                if matches!(ended, Ended::Closed) {
                    return;
                }
                if inbound.send(LinkEvent::Disconnected).is_err() {
                    return;
                }
            }
            Err(WsError::Http(response)) if response.status() == StatusCode::UNAUTHORIZED => {
                tracing::warn!("Push server rejected the session token");
                let _ = inbound.send(LinkEvent::Unauthorized);
                return;
            }
            Err(e) => tracing::warn!("WebSocket connect failed: {e}"),
        }

        tokio::select! {
            () = tokio::time::sleep(reconnect_delay) => {}
            _ = &mut stop => return,
        }
    }
}
