//! Mock transport.
//!
//! Provides an in-memory control channel for testing the connection manager
//! without a car. Every `connect` call consumes the next scripted
//! [`MockOutcome`] (default: accept) and, on success, registers a
//! [`MockPeer`] the test uses to play the device side.
//!
//! # Example
//!
//! ```rust,ignore
//! let connector = MockConnector::new();
//! connector.script([MockOutcome::Refuse, MockOutcome::Accept]);
//! // ... hand a clone to the manager ...
//! let peer = connector.latest_peer().unwrap();
//! peer.push("pong-48");
//! assert_eq!(peer.sent(), vec!["ping"]);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use url::Url;

use super::{Connector, Link, LinkSender, TransportEvent};
use crate::error::{AppResult, ControlError};

/// What the next connection attempt does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOutcome {
    /// Handshake succeeds.
    Accept,
    /// Handshake fails with a transport error.
    Refuse,
    /// Handshake never completes.
    Hang,
}

#[derive(Debug, Default)]
struct PeerState {
    sent: Vec<String>,
    closed: bool,
    fail_sends: bool,
}

/// Device side of one mock link.
#[derive(Debug, Clone)]
pub struct MockPeer {
    state: Arc<Mutex<PeerState>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl MockPeer {
    /// Deliver a text frame to the client.
    pub fn push(&self, text: &str) {
        let _ = self.events.send(TransportEvent::Message(text.to_string()));
    }

    /// Raise a transport error on the client side.
    pub fn error(&self, reason: &str) {
        let _ = self.events.send(TransportEvent::Error(reason.to_string()));
    }

    /// Close the link from the device side.
    pub fn disconnect(&self) {
        self.state.lock().closed = true;
        let _ = self.events.send(TransportEvent::Closed);
    }

    /// Make every following client write fail.
    pub fn fail_sends(&self) {
        self.state.lock().fail_sends = true;
    }

    /// Frames the client has written so far.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.state.lock().sent.clone()
    }

    /// Whether either side has closed the link.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

struct MockSender {
    state: Arc<Mutex<PeerState>>,
}

impl LinkSender for MockSender {
    fn send_text(&mut self, text: &str) -> AppResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ControlError::NotConnected);
        }
        if state.fail_sends {
            return Err(ControlError::Transport("mock send failure".into()));
        }
        state.sent.push(text.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().closed = true;
    }
}

#[derive(Debug, Default)]
struct ConnectorState {
    script: VecDeque<MockOutcome>,
    attempts: Vec<Url>,
    peers: Vec<MockPeer>,
}

/// Scriptable connector. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    /// Connector that accepts every attempt.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes for the next attempts. Once exhausted, attempts succeed.
    pub fn script(&self, outcomes: impl IntoIterator<Item = MockOutcome>) {
        self.state.lock().script.extend(outcomes);
    }

    /// Number of connection attempts so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.state.lock().attempts.len()
    }

    /// URLs of all attempts, oldest first.
    #[must_use]
    pub fn attempted_urls(&self) -> Vec<Url> {
        self.state.lock().attempts.clone()
    }

    /// Number of links handed out.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.state.lock().peers.len()
    }

    /// Device side of the `index`-th successful link.
    #[must_use]
    pub fn peer(&self, index: usize) -> Option<MockPeer> {
        self.state.lock().peers.get(index).cloned()
    }

    /// Device side of the most recent link.
    #[must_use]
    pub fn latest_peer(&self) -> Option<MockPeer> {
        self.state.lock().peers.last().cloned()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &Url) -> AppResult<Link> {
        let outcome = {
            let mut state = self.state.lock();
            state.attempts.push(url.clone());
            state.script.pop_front().unwrap_or(MockOutcome::Accept)
        };

        match outcome {
            MockOutcome::Accept => {
                let (events_tx, events_rx) = mpsc::unbounded_channel();
                let peer_state = Arc::new(Mutex::new(PeerState::default()));
                let peer = MockPeer {
                    state: peer_state.clone(),
                    events: events_tx,
                };
                self.state.lock().peers.push(peer);
                Ok(Link::new(
                    Box::new(MockSender { state: peer_state }),
                    events_rx,
                ))
            }
            MockOutcome::Refuse => Err(ControlError::Transport("connection refused".into())),
            MockOutcome::Hang => std::future::pending().await,
        }
    }
}
