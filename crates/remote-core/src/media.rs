//! Descriptions of what a piece of media contains.

/// An audio or subtitle stream.
///
/// Tracks are identified by `description`: selecting a track by name
/// matches it exactly, and the active flag in track lists compares
/// descriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub description: String,

    /// Codec / stream type as reported by the engine (e.g. "AC3").
    pub kind: String,
}

impl MediaTrack {
    pub fn new(description: impl Into<String>, kind: impl Into<String>) -> Self {
        MediaTrack {
            description: description.into(),
            kind: kind.into(),
        }
    }
}

/// A named chapter mark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub name: String,

    /// Chapter start, in the same unit as player positions.
    pub position: i64,
}

impl Chapter {
    pub fn new(name: impl Into<String>, position: i64) -> Self {
        Chapter {
            name: name.into(),
            position,
        }
    }
}

/// Everything the player learns about a file when it is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaInfo {
    pub duration: i64,
    pub chapters: Vec<Chapter>,
    pub subtitle_tracks: Vec<MediaTrack>,
    pub audio_tracks: Vec<MediaTrack>,
}
