//! Error types for the playback engine surface.

use thiserror::Error;

/// Failure reported by a [`Player`](crate::Player) operation.
///
/// The control service never propagates these to remote clients; they
/// are logged at the point where the engine call was made.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlayerError {
    /// The operation needs loaded media and nothing is open.
    #[error("no media is loaded")]
    NoMedia,

    /// A track selection referred to a track the player does not have.
    #[error("unknown track: {0}")]
    UnknownTrack(String),
}
