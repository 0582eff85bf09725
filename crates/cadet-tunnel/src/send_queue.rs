//! `SendQueue` — buffers outbound frames until a connection is ready.
//!
//! Backed by a `VecDeque` behind a single `tokio::sync::Mutex` rather than
//! a concurrent map: this is the one collection that must preserve strict
//! FIFO delivery order, and a concurrent map's iteration order is not
//! insertion order.
//!
//! A `QueuedMessage` here already holds the wire-ready frame: encryption
//! happens in `Tunnel::send` before the message is handed to this queue.
//! Dispatch calls the chosen connection's own `send`, which already scopes
//! the frame to one connection, so there is no raw placeholder to splice a
//! connection identifier into.

use std::collections::VecDeque;

use tokio::sync::Mutex;

use crate::connection_set::ConnectionSet;
use crate::error::{Result, TunnelError};

/// A continuation invoked once a queued message has been handed to a
/// connection.
pub type Continuation = Box<dyn FnOnce() + Send>;

/// Opaque handle to a queued send, returned by [`SendQueue::send`] and
/// accepted by [`SendQueue::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueHandle(u64);

struct QueuedMessage {
    handle: QueueHandle,
    frame: Vec<u8>,
    cont: Continuation,
}

/// FIFO of outbound frames awaiting a ready connection.
pub struct SendQueue {
    entries: Mutex<VecDeque<QueuedMessage>>,
    next_handle: std::sync::atomic::AtomicU64,
}

impl Default for SendQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SendQueue {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            next_handle: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Number of entries currently queued (not yet dispatched).
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// True if no entries are queued.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Enqueue an already-encrypted `frame`, then attempt immediate
    /// dispatch via `connections`. `cont` fires exactly once, when the
    /// frame is actually handed to a connection (which may happen
    /// synchronously, within this call, if one is ready now).
    pub async fn send(&self, frame: Vec<u8>, cont: Continuation, connections: &ConnectionSet) -> QueueHandle {
        let handle = QueueHandle(self.next_handle.fetch_add(1, std::sync::atomic::Ordering::Relaxed));
        {
            let mut entries = self.entries.lock().await;
            entries.push_back(QueuedMessage { handle, frame, cont });
        }
        self.trigger(connections).await;
        handle
    }

    /// Remove a queued entry before its continuation has fired.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError::QueueEntryAlreadyDispatched`] if `handle`
    /// doesn't name an entry still in the queue (either it was already
    /// dispatched, or it never existed).
    pub async fn cancel(&self, handle: QueueHandle) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let position = entries
            .iter()
            .position(|entry| entry.handle == handle)
            .ok_or(TunnelError::QueueEntryAlreadyDispatched)?;
        entries.remove(position);
        Ok(())
    }

    /// If the queue is non-empty and a connection is ready, pop the head
    /// entry, hand its frame to that connection, and invoke its
    /// continuation. Repeats until either the queue drains or no
    /// connection is ready, so a single `trigger` call dispatches every
    /// entry a newly-ready connection can carry.
    pub async fn trigger(&self, connections: &ConnectionSet) {
        loop {
            let Some(id) = connections.pick_ready().await else {
                return;
            };

            let next = {
                let mut entries = self.entries.lock().await;
                entries.pop_front()
            };

            let Some(entry) = next else {
                return;
            };

            match connections.send_via(id, &entry.frame).await {
                Ok(()) => (entry.cont)(),
                Err(error) => {
                    tracing::warn!(?error, "failed to hand queued frame to connection");
                    // Put it back at the head so a later trigger (e.g. once
                    // a different connection becomes ready) can retry it,
                    // preserving FIFO order.
                    let mut entries = self.entries.lock().await;
                    entries.push_front(entry);
                    return;
                }
            }
        }
    }

    /// Invoked by the connection layer when a previously-unready
    /// connection becomes ready. Triggers dispatch exactly once.
    pub async fn on_connection_ready(&self, connections: &ConnectionSet) {
        self.trigger(connections).await;
    }
}
