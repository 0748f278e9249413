//! Registry of authorized sessions.
//!
//! A session is in the registry exactly as long as its connection may
//! still be written to. Removing a session drops its outbound sender
//! (the writer flushes what is queued, then closes the socket) and its
//! close signal (the reader stops). Writes addressed to a session that
//! is gone are silently dropped.
//!
//! Queueing never waits. A session whose outbound queue is full is
//! treated like one whose socket failed: it is removed and its writer
//! is aborted.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{oneshot, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::types::{ClientId, ClientInfo, Outbound, OutboundTx};

/// Registry entry for one connected client.
#[derive(Debug)]
pub struct SessionHandle {
    pub id: ClientId,
    pub peer_identity: String,
    pub addr: SocketAddr,

    outbound: OutboundTx,

    /// Cancelled to stop the writer without flushing.
    abort: CancellationToken,

    /// Dropped with the handle; wakes the session's read loop.
    _closed: oneshot::Sender<()>,
}

impl SessionHandle {
    pub fn new(
        id: ClientId,
        peer_identity: String,
        addr: SocketAddr,
        outbound: OutboundTx,
        abort: CancellationToken,
        closed: oneshot::Sender<()>,
    ) -> Self {
        SessionHandle {
            id,
            peer_identity,
            addr,
            outbound,
            abort,
            _closed: closed,
        }
    }

    pub fn info(&self) -> ClientInfo {
        ClientInfo {
            id: self.id,
            peer_identity: self.peer_identity.clone(),
            addr: self.addr,
        }
    }

    /// Queue lines for this session's writer without waiting.
    pub fn queue(&self, lines: Outbound) -> Result<(), TrySendError<Outbound>> {
        self.outbound.try_send(lines)
    }

    /// Stop the writer now, dropping anything still queued.
    pub fn abort(&self) {
        self.abort.cancel();
    }
}

/// Result of queueing lines for one or more sessions.
#[derive(Debug, Default)]
pub struct Delivery {
    /// Sessions the lines were queued for.
    pub delivered: usize,

    /// Sessions removed because their queue was full. Their writers
    /// are already aborted.
    pub evicted: Vec<SessionHandle>,
}

/// Concurrency-safe map of `ClientId` → session.
///
/// Cheap to clone; clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<ClientId, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry::default()
    }

    pub async fn insert(&self, handle: SessionHandle) {
        let mut guard = self.sessions.write().await;
        guard.insert(handle.id, handle);
    }

    /// Remove a session. Removing an absent session is a no-op.
    pub async fn remove(&self, id: &ClientId) -> Option<SessionHandle> {
        let mut guard = self.sessions.write().await;
        guard.remove(id)
    }

    pub async fn clients(&self) -> Vec<ClientInfo> {
        self.sessions
            .read()
            .await
            .values()
            .map(SessionHandle::info)
            .collect()
    }

    /// Queue lines for one session, written back to back.
    pub async fn send_to(&self, id: &ClientId, lines: Outbound) -> Delivery {
        let target = {
            let guard = self.sessions.read().await;
            guard.get(id).map(|h| (h.id, h.outbound.clone()))
        };

        match target {
            Some(target) => self.deliver(vec![target], lines).await,
            None => {
                debug!(client = %id, "dropping unicast to unknown session");
                Delivery::default()
            }
        }
    }

    /// Queue one line for every registered session.
    pub async fn broadcast(&self, line: String) -> Delivery {
        self.broadcast_lines(vec![line]).await
    }

    /// Queue a batch of lines for every registered session.
    ///
    /// Sessions removed concurrently are skipped.
    pub async fn broadcast_lines(&self, lines: Outbound) -> Delivery {
        // Snapshot of current senders to minimize lock hold time.
        let targets: Vec<(ClientId, OutboundTx)> = {
            let guard = self.sessions.read().await;
            guard.values().map(|h| (h.id, h.outbound.clone())).collect()
        };

        self.deliver(targets, lines).await
    }

    /// Queue `lines` for every session and remove them all, in one step.
    ///
    /// Sessions that cannot take the lines are aborted instead.
    pub async fn close_all(&self, lines: Outbound) -> Vec<SessionHandle> {
        let mut guard = self.sessions.write().await;
        guard
            .drain()
            .map(|(_, handle)| {
                if handle.queue(lines.clone()).is_err() {
                    handle.abort();
                }
                handle
            })
            .collect()
    }

    async fn deliver(&self, targets: Vec<(ClientId, OutboundTx)>, lines: Outbound) -> Delivery {
        let mut delivered = 0;
        let mut stalled = Vec::new();

        for (id, tx) in targets {
            match tx.try_send(lines.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => stalled.push(id),
                Err(TrySendError::Closed(_)) => {
                    debug!(client = %id, "writer already gone, skipping");
                }
            }
        }

        let evicted = if stalled.is_empty() {
            Vec::new()
        } else {
            self.evict(&stalled).await
        };

        Delivery { delivered, evicted }
    }

    async fn evict(&self, ids: &[ClientId]) -> Vec<SessionHandle> {
        let mut guard = self.sessions.write().await;
        ids.iter()
            .filter_map(|id| guard.remove(id))
            .map(|handle| {
                warn!(client = %handle.id, "outbound queue full, dropping session");
                handle.abort();
                handle
            })
            .collect()
    }
}
