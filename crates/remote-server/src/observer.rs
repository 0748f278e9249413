//! Operator-facing view of connected sessions.
//!
//! A UI that lists remote clients implements [`SessionObserver`] to be
//! told when the list changes. Force-disconnect goes the other way,
//! through [`ControlService::disconnect`](crate::server::ControlService::disconnect).

use tracing::info;

use crate::types::ClientId;

pub trait SessionObserver: Send + Sync + 'static {
    /// A session finished its handshake and is now registered.
    fn session_added(&self, id: ClientId, peer_identity: &str);

    /// A session was removed. Called once per session.
    fn session_removed(&self, id: ClientId);
}

/// Observer that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl SessionObserver for LogObserver {
    fn session_added(&self, id: ClientId, peer_identity: &str) {
        info!(client = %id, peer = peer_identity, "remote client connected");
    }

    fn session_removed(&self, id: ClientId) {
        info!(client = %id, "remote client disconnected");
    }
}
