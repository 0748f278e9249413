//! State shared by the listener, every session and the control task.

use std::sync::Arc;

use remote_protocol::Event;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::auth::{Approver, AuthRegistry};
use crate::config::Config;
use crate::observer::SessionObserver;
use crate::registry::{Delivery, SessionHandle, SessionRegistry};
use crate::types::{ClientId, ControlRequest, ControlTx, Outbound};

pub struct ServerContext {
    pub config: Config,
    pub sessions: SessionRegistry,
    pub auth: AuthRegistry,
    pub approver: Arc<dyn Approver>,
    pub observer: Arc<dyn SessionObserver>,
    control_tx: ControlTx,

    /// Cancelled when the service starts shutting down.
    pub shutdown: CancellationToken,

    /// Cancelled when shutdown gives up waiting for writers to flush.
    /// Every session's writer watches a child of this token.
    pub force_close: CancellationToken,
}

impl ServerContext {
    pub fn new(
        config: Config,
        control_tx: ControlTx,
        approver: Arc<dyn Approver>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        ServerContext {
            config,
            sessions: SessionRegistry::new(),
            auth: AuthRegistry::new(),
            approver,
            observer,
            control_tx,
            shutdown: CancellationToken::new(),
            force_close: CancellationToken::new(),
        }
    }

    /// Post work onto the control task without waiting for it.
    pub fn post(&self, req: ControlRequest) {
        if self.control_tx.send(req).is_err() {
            warn!("control task is gone, dropping request");
        }
    }

    /// Queue lines for one session. Returns `false` if they were not
    /// queued.
    pub async fn send_to(&self, id: &ClientId, lines: Outbound) -> bool {
        let delivery = self.sessions.send_to(id, lines).await;
        self.settle(delivery)
    }

    pub async fn broadcast(&self, line: String) {
        let delivery = self.sessions.broadcast(line).await;
        self.settle(delivery);
    }

    pub async fn broadcast_lines(&self, lines: Outbound) {
        let delivery = self.sessions.broadcast_lines(lines).await;
        self.settle(delivery);
    }

    fn settle(&self, delivery: Delivery) -> bool {
        self.removed(delivery.evicted);
        delivery.delivered > 0
    }

    /// Report sessions that left the registry to the observer.
    pub fn removed(&self, handles: Vec<SessionHandle>) {
        for handle in handles {
            let id = handle.id;
            drop(handle);
            self.observer.session_removed(id);
        }
    }

    /// Tear a session down.
    ///
    /// If `farewell` is given it is the last line the peer is sent.
    /// Returns `false` if the session was already gone; calling this
    /// twice for the same client has no further effect.
    pub async fn teardown(&self, id: ClientId, farewell: Option<Event>) -> bool {
        let Some(handle) = self.sessions.remove(&id).await else {
            debug!(client = %id, "teardown of a session that is already gone");
            return false;
        };

        if let Some(event) = farewell {
            if handle.queue(vec![event.to_line()]).is_err() {
                handle.abort();
            }
        }
        self.removed(vec![handle]);
        true
    }
}
