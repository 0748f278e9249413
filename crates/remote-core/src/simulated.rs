//! In-memory playback engine.
//!
//! `SimulatedPlayer` behaves like a real player from the control
//! service's point of view: it tracks transport state, advances the
//! position in real time while playing, and publishes the same events
//! a real engine would. It is what the server binary drives when no
//! real engine is attached, and what the integration tests inspect.
//!
//! Clones share state, so a test can keep a clone while the original
//! is moved into the server.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::error::PlayerError;
use crate::events::{EventHub, PlayerEvent, Subscription};
use crate::media::{Chapter, MediaInfo, MediaTrack};
use crate::player::Player;
use crate::state::{PlayerState, WindowGeometry, WindowState};

pub const DEFAULT_VOLUME: i32 = 100;

#[derive(Debug)]
struct SimState {
    state: PlayerState,
    path: String,
    media: MediaInfo,

    /// Position at the last transport change.
    position: i64,
    /// Set while playing; position advances from here.
    resumed_at: Option<Instant>,

    volume: i32,
    muted: bool,
    fullscreen: bool,
    borderless: bool,
    geometry: WindowGeometry,
    window_state: WindowState,
    active_subtitle: Option<usize>,
    active_audio: Option<usize>,
    osd: Vec<String>,

    /// Media the simulated "filesystem" knows about.
    library: HashMap<String, MediaInfo>,
}

impl Default for SimState {
    fn default() -> Self {
        SimState {
            state: PlayerState::Closed,
            path: String::new(),
            media: MediaInfo::default(),
            position: 0,
            resumed_at: None,
            volume: DEFAULT_VOLUME,
            muted: false,
            fullscreen: false,
            borderless: false,
            geometry: WindowGeometry::default(),
            window_state: WindowState::Normal,
            active_subtitle: None,
            active_audio: None,
            osd: Vec::new(),
            library: HashMap::new(),
        }
    }
}

impl SimState {
    fn current_position(&self) -> i64 {
        let elapsed = self
            .resumed_at
            .map(|t| t.elapsed().as_micros() as i64)
            .unwrap_or(0);
        let pos = self.position.saturating_add(elapsed);
        if self.media.duration > 0 {
            pos.min(self.media.duration)
        } else {
            pos
        }
    }

    /// Freeze the running position into `position`.
    fn settle(&mut self) {
        self.position = self.current_position();
        self.resumed_at = None;
    }
}

/// A playback engine that lives entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPlayer {
    inner: Arc<Mutex<SimState>>,
    events: EventHub,
}

impl SimulatedPlayer {
    pub fn new() -> Self {
        SimulatedPlayer::default()
    }

    /// Make `path` openable with the given contents.
    ///
    /// Opening a path that was never registered still succeeds, with
    /// no duration, chapters or tracks.
    pub fn with_media(self, path: impl Into<String>, info: MediaInfo) -> Self {
        self.inner.lock().library.insert(path.into(), info);
        self
    }

    /// Simulate the end of the current file.
    pub fn finish_playback(&self) {
        {
            let mut s = self.inner.lock();
            if !s.state.has_position() {
                return;
            }
            s.position = s.media.duration;
            s.resumed_at = None;
            s.state = PlayerState::Stopped;
        }
        self.events.publish(PlayerEvent::PlaybackCompleted);
        self.events
            .publish(PlayerEvent::StateChanged(PlayerState::Stopped));
    }

    pub fn geometry(&self) -> WindowGeometry {
        self.inner.lock().geometry
    }

    pub fn window_state(&self) -> WindowState {
        self.inner.lock().window_state
    }

    pub fn is_borderless(&self) -> bool {
        self.inner.lock().borderless
    }

    /// Every on-screen message shown so far, oldest first.
    pub fn osd_messages(&self) -> Vec<String> {
        self.inner.lock().osd.clone()
    }

    fn transition(&self, state: PlayerState) {
        self.events.publish(PlayerEvent::StateChanged(state));
    }
}

impl Player for SimulatedPlayer {
    fn open_media(&mut self, path: &str) -> Result<(), PlayerError> {
        {
            let mut s = self.inner.lock();
            let info = s.library.get(path).cloned().unwrap_or_default();
            s.active_subtitle = if info.subtitle_tracks.is_empty() { None } else { Some(0) };
            s.active_audio = if info.audio_tracks.is_empty() { None } else { Some(0) };
            s.media = info;
            s.path = path.to_string();
            s.position = 0;
            s.resumed_at = Some(Instant::now());
            s.state = PlayerState::Playing;
        }
        self.transition(PlayerState::Playing);
        Ok(())
    }

    fn play(&mut self, show_osd: bool) -> Result<(), PlayerError> {
        {
            let mut s = self.inner.lock();
            match s.state {
                PlayerState::Closed => return Err(PlayerError::NoMedia),
                PlayerState::Playing => return Ok(()),
                PlayerState::Stopped | PlayerState::Paused => {}
            }
            s.resumed_at = Some(Instant::now());
            s.state = PlayerState::Playing;
            if show_osd {
                s.osd.push("Play".to_string());
            }
        }
        self.transition(PlayerState::Playing);
        Ok(())
    }

    fn pause(&mut self, show_osd: bool) -> Result<(), PlayerError> {
        {
            let mut s = self.inner.lock();
            match s.state {
                PlayerState::Closed => return Err(PlayerError::NoMedia),
                PlayerState::Paused => return Ok(()),
                PlayerState::Stopped | PlayerState::Playing => {}
            }
            s.settle();
            s.state = PlayerState::Paused;
            if show_osd {
                s.osd.push("Pause".to_string());
            }
        }
        self.transition(PlayerState::Paused);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PlayerError> {
        {
            let mut s = self.inner.lock();
            if s.state == PlayerState::Closed {
                return Err(PlayerError::NoMedia);
            }
            s.resumed_at = None;
            s.position = 0;
            s.state = PlayerState::Stopped;
        }
        self.transition(PlayerState::Stopped);
        Ok(())
    }

    fn seek(&mut self, position: i64) -> Result<(), PlayerError> {
        let mut s = self.inner.lock();
        if s.state == PlayerState::Closed {
            return Err(PlayerError::NoMedia);
        }
        let target = if s.media.duration > 0 {
            position.clamp(0, s.media.duration)
        } else {
            position.max(0)
        };
        s.position = target;
        if s.resumed_at.is_some() {
            s.resumed_at = Some(Instant::now());
        }
        Ok(())
    }

    fn state(&self) -> PlayerState {
        self.inner.lock().state
    }

    fn media_file_path(&self) -> String {
        self.inner.lock().path.clone()
    }

    fn duration(&self) -> i64 {
        self.inner.lock().media.duration
    }

    fn position(&self) -> Result<i64, PlayerError> {
        let s = self.inner.lock();
        if s.state == PlayerState::Closed {
            return Err(PlayerError::NoMedia);
        }
        Ok(s.current_position())
    }

    fn volume(&self) -> i32 {
        self.inner.lock().volume
    }

    fn set_volume(&mut self, level: i32) {
        self.inner.lock().volume = level.clamp(0, 100);
        self.events.publish(PlayerEvent::VolumeChanged);
    }

    fn is_muted(&self) -> bool {
        self.inner.lock().muted
    }

    fn set_muted(&mut self, muted: bool) {
        self.inner.lock().muted = muted;
        self.events.publish(PlayerEvent::VolumeChanged);
    }

    fn chapters(&self) -> Vec<Chapter> {
        self.inner.lock().media.chapters.clone()
    }

    fn subtitle_tracks(&self) -> Vec<MediaTrack> {
        self.inner.lock().media.subtitle_tracks.clone()
    }

    fn active_subtitle_track(&self) -> Option<MediaTrack> {
        let s = self.inner.lock();
        s.active_subtitle
            .and_then(|i| s.media.subtitle_tracks.get(i).cloned())
    }

    fn select_subtitle_track(&mut self, track: &MediaTrack) -> Result<(), PlayerError> {
        {
            let mut s = self.inner.lock();
            let index = s
                .media
                .subtitle_tracks
                .iter()
                .position(|t| t == track)
                .ok_or_else(|| PlayerError::UnknownTrack(track.description.clone()))?;
            s.active_subtitle = Some(index);
        }
        self.events.publish(PlayerEvent::SubtitleTrackChanged);
        Ok(())
    }

    fn audio_tracks(&self) -> Vec<MediaTrack> {
        self.inner.lock().media.audio_tracks.clone()
    }

    fn active_audio_track(&self) -> Option<MediaTrack> {
        let s = self.inner.lock();
        s.active_audio.and_then(|i| s.media.audio_tracks.get(i).cloned())
    }

    fn select_audio_track(&mut self, track: &MediaTrack) -> Result<(), PlayerError> {
        {
            let mut s = self.inner.lock();
            let index = s
                .media
                .audio_tracks
                .iter()
                .position(|t| t == track)
                .ok_or_else(|| PlayerError::UnknownTrack(track.description.clone()))?;
            s.active_audio = Some(index);
        }
        self.events.publish(PlayerEvent::AudioTrackChanged);
        Ok(())
    }

    fn in_fullscreen(&self) -> bool {
        self.inner.lock().fullscreen
    }

    fn go_fullscreen(&mut self) {
        {
            let mut s = self.inner.lock();
            if s.fullscreen {
                return;
            }
            s.fullscreen = true;
        }
        self.events.publish(PlayerEvent::EnteringFullScreen);
    }

    fn go_windowed(&mut self) {
        {
            let mut s = self.inner.lock();
            if !s.fullscreen {
                return;
            }
            s.fullscreen = false;
        }
        self.events.publish(PlayerEvent::ExitingFullScreen);
    }

    fn move_window(&mut self, geometry: WindowGeometry, state: Option<WindowState>) {
        let mut s = self.inner.lock();
        s.geometry = geometry;
        if let Some(state) = state {
            s.window_state = state;
        }
    }

    fn toggle_borderless(&mut self) {
        let mut s = self.inner.lock();
        s.borderless = !s.borderless;
    }

    fn show_osd_text(&mut self, text: &str) {
        self.inner.lock().osd.push(text.to_string());
    }

    fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }
}
