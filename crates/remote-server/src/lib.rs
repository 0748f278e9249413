//! remote-server
//!
//! Multi-client async TCP control service for a media player.

pub mod auth;
pub mod config;
pub mod error;
pub mod observer;
pub mod registry;
pub mod server;
pub mod types;

// these are internal modules, not re-exported
mod bridge;
mod clock;
mod codec;
mod context;
mod control;
mod dispatcher;
mod session;

pub use auth::{Approver, AuthRegistry};
pub use config::{ApprovalMode, Config};
pub use error::ServerError;
pub use observer::{LogObserver, SessionObserver};
pub use server::ControlService;
pub use types::{ClientId, ClientInfo};
