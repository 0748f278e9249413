//! TCP listener and top-level service wiring.
//!
//! This module:
//! - Listens on the configured address/port.
//! - Accepts new TCP connections and assigns each a `ClientId`.
//! - Spawns:
//!   - a per-connection session task,
//!   - the control task that owns the `Player`,
//!   - the event bridge and its position clock.
//!
//! Per-session logic, the control loop and the bridge live in the
//! `session`, `control` and `bridge` modules respectively.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use remote_core::Player;
use remote_protocol::wire::EXIT_DISCONNECTED_BY_USER;
use remote_protocol::Event;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::auth::Approver;
use crate::bridge::EventBridge;
use crate::clock::PositionClock;
use crate::config::Config;
use crate::context::ServerContext;
use crate::control;
use crate::error::{Result, ServerError};
use crate::observer::SessionObserver;
use crate::session;
use crate::types::{ClientId, ClientInfo, ControlRequest, ControlRx, ControlTx};

/// How long shutdown waits for sessions to flush and close before it
/// closes their sockets without flushing.
const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A running remote control service.
pub struct ControlService {
    ctx: Arc<ServerContext>,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
    control_task: JoinHandle<()>,
    bridge: EventBridge,
    session_tasks: TaskTracker,
}

impl ControlService {
    /// Bind the listener and start every background task.
    pub async fn start(
        config: Config,
        player: Box<dyn Player>,
        approver: Arc<dyn Approver>,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self> {
        let addr = config.socket_addr_string();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!("Listening on {}", local_addr);

        // Channel from sessions / bridge / clock → control task.
        let (control_tx, control_rx): (ControlTx, ControlRx) = mpsc::unbounded_channel();

        let clock = PositionClock::new(config.position_interval(), control_tx.clone());
        let subscription = player.subscribe();
        let ctx = Arc::new(ServerContext::new(config, control_tx.clone(), approver, observer));

        // Spawn the control task; it owns the player from here on.
        let control_task = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                control::run_control_loop(player, control_rx, ctx).await;
            })
        };

        let bridge = EventBridge::spawn(subscription, control_tx, clock);

        let session_tasks = TaskTracker::new();
        let accept_task = tokio::spawn(accept_loop(listener, ctx.clone(), session_tasks.clone()));

        Ok(ControlService {
            ctx,
            local_addr,
            accept_task,
            control_task,
            bridge,
            session_tasks,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Every authorized, connected client.
    pub async fn clients(&self) -> Vec<ClientInfo> {
        self.ctx.sessions.clients().await
    }

    /// Operator-initiated disconnect.
    ///
    /// Sends `Exit|Disconnected by User` and tears the session down.
    /// Returns `false` if no such session is connected.
    pub async fn disconnect(&self, id: ClientId) -> bool {
        let farewell = Event::Exit(EXIT_DISCONNECTED_BY_USER.to_string());
        self.ctx.teardown(id, Some(farewell)).await
    }

    /// Stop accepting, stop the clock, say goodbye to every client and
    /// close its connection.
    pub async fn shutdown(self) {
        info!("shutting down remote control service");
        self.ctx.shutdown.cancel();

        if let Err(e) = self.accept_task.await {
            warn!(error = %e, "accept task failed");
        }

        self.bridge.shutdown().await;

        // Sessions still in their handshake see the cancellation and
        // close on their own.
        let closed = self
            .ctx
            .sessions
            .close_all(vec![Event::Closing.to_line()])
            .await;
        self.ctx.removed(closed);

        self.session_tasks.close();
        if tokio::time::timeout(SESSION_DRAIN_TIMEOUT, self.session_tasks.wait())
            .await
            .is_err()
        {
            warn!("sessions did not finish in time, closing their sockets");
            self.ctx.force_close.cancel();
            self.session_tasks.wait().await;
        }

        self.ctx.post(ControlRequest::Shutdown);
        if let Err(e) = self.control_task.await {
            warn!(error = %e, "control task failed");
        }
    }
}

/// Accept connections until shutdown or a listener failure.
///
/// Sessions are tracked, not owned: they outlive this loop if it ends
/// because of an accept error.
async fn accept_loop(listener: TcpListener, ctx: Arc<ServerContext>, sessions: TaskTracker) {
    loop {
        tokio::select! {
            biased;

            _ = ctx.shutdown.cancelled() => {
                info!("listener stopped");
                break;
            }

            res = listener.accept() => match res {
                Ok((stream, peer_addr)) => {
                    let client_id = ClientId::new();
                    info!(client = %client_id, %peer_addr, "accepted connection");
                    sessions.spawn(session::run_session(client_id, stream, peer_addr, ctx.clone()));
                }
                Err(e) => {
                    error!(error = %e, "accept failed, listener exiting");
                    break;
                }
            },
        }
    }
}
