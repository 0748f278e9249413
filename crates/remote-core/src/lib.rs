//! remote-core
//!
//! Playback-engine surface used by the remote control service:
//! - player / window state types
//! - media track and chapter descriptions
//! - the `Player` control trait
//! - player event fan-out (`EventHub` / `Subscription`)
//! - an in-memory `SimulatedPlayer`

pub mod state;
pub mod media;
pub mod events;
pub mod player;
pub mod simulated;
pub mod error;

pub use state::{PlayerState, WindowGeometry, WindowState};
pub use media::{Chapter, MediaInfo, MediaTrack};
pub use events::{EventHub, PlayerEvent, Subscription};
pub use player::Player;
pub use simulated::SimulatedPlayer;
pub use error::PlayerError;
