//! Per-generation event handles.
//!
//! Every session the connection manager opens gets a fresh [`Generation`].
//! Its channel closes when that session terminates, so a caller draining a
//! generation sees `None` and then asks the client for the next one.

use nkn_protocol::{Block, InboundMessage};
use tokio::sync::mpsc;

/// Something the serving node told us.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The node confirmed the `setClient` handshake.
    Connected,
    /// A message addressed to this client.
    Message(InboundMessage),
    /// A block the node pushed to us.
    Block(Block),
}

/// Events of one session lifetime, in frame order.
#[derive(Debug)]
pub struct Generation {
    id: u64,
    events: mpsc::Receiver<Event>,
}

impl Generation {
    pub(crate) fn channel(id: u64, capacity: usize) -> (mpsc::Sender<Event>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { id, events: rx })
    }

    /// Monotonic counter; the first session of a client is generation 1.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event, or `None` once this generation's session has ended and
    /// every buffered event was taken.
    pub async fn recv(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Event> {
        self.events.try_recv().ok()
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}
