//! Video stream collaborator.
//!
//! The stream itself is served by the car on its own port and consumed by
//! whatever renders it. The connection manager only *re-arms* it after every
//! reconnect: it detaches the current source immediately, then attaches the
//! stream URL again after a short delay so the device starts a fresh stream
//! instead of the client resuming a stale one.

use tokio::sync::watch;
use url::Url;

/// Something that displays the car's video stream.
pub trait VideoStream: Send + 'static {
    /// Drop the current source.
    fn detach(&mut self);

    /// Point the display at `url`.
    fn attach(&mut self, url: &Url);
}

/// Observable stream source.
///
/// Holds the URL the display should currently show; renderers (or tests)
/// subscribe to changes.
#[derive(Debug)]
pub struct StreamSlot {
    source: watch::Sender<Option<Url>>,
    reloads: u64,
}

impl StreamSlot {
    /// Empty slot.
    #[must_use]
    pub fn new() -> Self {
        let (source, _) = watch::channel(None);
        Self { source, reloads: 0 }
    }

    /// Subscribe to source changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Url>> {
        self.source.subscribe()
    }

    /// Current source.
    #[must_use]
    pub fn current(&self) -> Option<Url> {
        self.source.borrow().clone()
    }

    /// Number of times a source has been attached.
    #[must_use]
    pub fn reloads(&self) -> u64 {
        self.reloads
    }
}

impl Default for StreamSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoStream for StreamSlot {
    fn detach(&mut self) {
        self.source.send_replace(None);
    }

    fn attach(&mut self, url: &Url) {
        self.reloads += 1;
        tracing::debug!(url = %url, reloads = self.reloads, "Video stream attached");
        self.source.send_replace(Some(url.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detach_then_attach_reloads() {
        let url = Url::parse("http://car.local:81/stream").unwrap();
        let mut slot = StreamSlot::new();
        let rx = slot.subscribe();

        slot.attach(&url);
        assert_eq!(slot.current(), Some(url.clone()));

        slot.detach();
        assert_eq!(*rx.borrow(), None);

        slot.attach(&url);
        assert_eq!(slot.reloads(), 2);
        assert_eq!(*rx.borrow(), Some(url));
    }
}
