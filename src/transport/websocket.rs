//! WebSocket transport for the car's control channel.
//!
//! A successful handshake spawns two tasks per link: a writer that drains the
//! outbound queue into the socket and a reader that turns incoming frames into
//! [`TransportEvent`]s. Both stop when the socket closes or the manager drops
//! its end of the link, so a silent peer cannot keep the socket open.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use super::{Connector, Link, LinkSender, TransportEvent};
use crate::error::{AppResult, ControlError};

/// Connector for `ws://` endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a connector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

enum Outbound {
    Text(String),
    Close,
}

struct WebSocketSender {
    outbound: mpsc::UnboundedSender<Outbound>,
    closed: bool,
}

impl LinkSender for WebSocketSender {
    fn send_text(&mut self, text: &str) -> AppResult<()> {
        if self.closed {
            return Err(ControlError::NotConnected);
        }
        self.outbound
            .send(Outbound::Text(text.to_string()))
            .map_err(|_| ControlError::Transport("socket writer has stopped".into()))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.outbound.send(Outbound::Close);
        }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &Url) -> AppResult<Link> {
        let (socket, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| ControlError::Transport(e.to_string()))?;
        tracing::debug!(url = %url, "WebSocket handshake complete");

        let (mut sink, mut source) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let writer_events = event_tx.clone();
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let (message, closing) = match frame {
                    Outbound::Text(text) => (Message::Text(text), false),
                    Outbound::Close => (Message::Close(None), true),
                };
                if let Err(e) = sink.send(message).await {
                    let _ = writer_events.send(TransportEvent::Error(e.to_string()));
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            loop {
                // A dropped link releases the socket even if the peer never answers.
                let frame = tokio::select! {
                    frame = source.next() => frame,
                    () = event_tx.closed() => return,
                };
                let Some(frame) = frame else { break };
                match frame {
                    Ok(Message::Text(text)) => {
                        if event_tx.send(TransportEvent::Message(text)).is_err() {
                            return;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    // Control frames are answered by tungstenite; the car never sends binary.
                    Ok(_) => {}
                    Err(e) => {
                        let _ = event_tx.send(TransportEvent::Error(e.to_string()));
                        return;
                    }
                }
            }
            let _ = event_tx.send(TransportEvent::Closed);
        });

        Ok(Link::new(
            Box::new(WebSocketSender {
                outbound: outbound_tx,
                closed: false,
            }),
            event_rx,
        ))
    }
}
