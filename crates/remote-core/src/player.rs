//! The control surface of a playback engine.
//!
//! Implementations are not expected to be thread-safe: the server owns
//! exactly one `Player` inside a dedicated control task and every call
//! is made from there.

use crate::error::PlayerError;
use crate::events::Subscription;
use crate::media::{Chapter, MediaTrack};
use crate::state::{PlayerState, WindowGeometry, WindowState};

/// Playback engine operations driven by remote clients.
///
/// Positions and durations are integers in the engine's native unit
/// (microseconds for the simulated player).
pub trait Player: Send {
    // -------------------------------------------------------------------------
    // Transport
    // -------------------------------------------------------------------------

    fn open_media(&mut self, path: &str) -> Result<(), PlayerError>;
    fn play(&mut self, show_osd: bool) -> Result<(), PlayerError>;
    fn pause(&mut self, show_osd: bool) -> Result<(), PlayerError>;
    fn stop(&mut self) -> Result<(), PlayerError>;
    fn seek(&mut self, position: i64) -> Result<(), PlayerError>;

    fn state(&self) -> PlayerState;

    /// Path of the current media, empty when nothing is loaded.
    fn media_file_path(&self) -> String;
    fn duration(&self) -> i64;

    /// Sample the playback position. May fail transiently.
    fn position(&self) -> Result<i64, PlayerError>;

    // -------------------------------------------------------------------------
    // Audio
    // -------------------------------------------------------------------------

    fn volume(&self) -> i32;
    fn set_volume(&mut self, level: i32);
    fn is_muted(&self) -> bool;
    fn set_muted(&mut self, muted: bool);

    // -------------------------------------------------------------------------
    // Tracks and chapters
    // -------------------------------------------------------------------------

    fn chapters(&self) -> Vec<Chapter>;
    fn subtitle_tracks(&self) -> Vec<MediaTrack>;
    fn active_subtitle_track(&self) -> Option<MediaTrack>;
    fn select_subtitle_track(&mut self, track: &MediaTrack) -> Result<(), PlayerError>;
    fn audio_tracks(&self) -> Vec<MediaTrack>;
    fn active_audio_track(&self) -> Option<MediaTrack>;
    fn select_audio_track(&mut self, track: &MediaTrack) -> Result<(), PlayerError>;

    // -------------------------------------------------------------------------
    // Window and on-screen display
    // -------------------------------------------------------------------------

    fn in_fullscreen(&self) -> bool;
    fn go_fullscreen(&mut self);
    fn go_windowed(&mut self);

    /// Apply geometry, then the window state if one is given.
    fn move_window(&mut self, geometry: WindowGeometry, state: Option<WindowState>);
    fn toggle_borderless(&mut self);
    fn show_osd_text(&mut self, text: &str);

    /// Register for engine events. Dropping the handle unsubscribes.
    fn subscribe(&self) -> Subscription;
}
