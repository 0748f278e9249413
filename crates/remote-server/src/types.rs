//! Shared types for the control server.
//!
//! This module defines:
//! - `ClientId`: the server-generated identity of a connection
//! - `ClientInfo`: what the operator sees of a connected client
//! - channel aliases between sessions, writers and the control task
//! - `ControlRequest`: work posted onto the player's control task

use std::fmt;
use std::net::SocketAddr;

use remote_core::PlayerEvent;
use remote_protocol::Command;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identifier for a connected client.
///
/// A random 128-bit value generated at accept time. It is sent to the
/// peer as `ClientGUID|<id>` and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub Uuid);

impl ClientId {
    pub fn new() -> Self {
        ClientId(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        ClientId::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for ClientId {
    fn from(id: Uuid) -> Self {
        ClientId(id)
    }
}

/// A connected, authorized client as listed to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub id: ClientId,

    /// Identity string the peer sent during the handshake.
    pub peer_identity: String,
    pub addr: SocketAddr,
}

/// A group of lines written to one client back to back.
///
/// Lines inside a batch are never interleaved with other writes.
pub type Outbound = Vec<String>;

/// Outbound lines from anywhere in the server to a given client's writer.
///
/// Bounded: a client whose queue fills up is dropped rather than
/// buffered without limit.
pub type OutboundTx = mpsc::Sender<Outbound>;
pub type OutboundRx = mpsc::Receiver<Outbound>;

/// Work executed on the player's control task.
#[derive(Debug)]
pub enum ControlRequest {
    /// A client command that touches the player.
    Command { origin: ClientId, command: Command },

    /// A player event to render and broadcast.
    Event(PlayerEvent),

    /// Position clock tick.
    SamplePosition,

    /// Show text on the player's on-screen display.
    ShowText(String),

    /// Stop the control loop.
    Shutdown,
}

/// Channel from sessions / bridge / clock → control task.
pub type ControlTx = mpsc::UnboundedSender<ControlRequest>;
pub type ControlRx = mpsc::UnboundedReceiver<ControlRequest>;
