//! Control-channel transport abstraction.
//!
//! The connection manager never touches sockets directly. It asks a
//! [`Connector`] for a [`Link`], writes through the link's [`LinkSender`] and
//! consumes everything the peer does as one ordered stream of
//! [`TransportEvent`]s. This keeps the state machine deterministic under test:
//! [`mock::MockConnector`] implements the same capability set without a
//! network.
//!
//! # Available Transports
//!
//! - [`websocket::WebSocketConnector`] - the car's `ws://<host>:82/ws` channel
//! - [`mock::MockConnector`] - scriptable in-memory transport

pub mod mock;
pub mod websocket;

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::error::AppResult;

/// Something the peer did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived.
    Message(String),
    /// The transport reported an error. The link should be treated as dead.
    Error(String),
    /// The peer closed the link.
    Closed,
}

/// Write half of an open link.
///
/// Sending is synchronous: it either queues the frame or fails immediately.
pub trait LinkSender: Send {
    /// Queue one text frame.
    fn send_text(&mut self, text: &str) -> AppResult<()>;

    /// Close the link. Idempotent.
    fn close(&mut self);
}

/// An open control-channel link.
pub struct Link {
    sender: Box<dyn LinkSender>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Link {
    /// Assemble a link from its halves.
    pub fn new(
        sender: Box<dyn LinkSender>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self { sender, events }
    }

    /// Queue one text frame.
    pub fn send_text(&mut self, text: &str) -> AppResult<()> {
        self.sender.send_text(text)
    }

    /// Close the link.
    pub fn close(&mut self) {
        self.sender.close();
    }

    /// Next event from the peer. `None` once the transport is gone.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

/// Opens links to a control endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open one link. Completes when the link is usable.
    async fn connect(&self, url: &Url) -> AppResult<Link>;
}
