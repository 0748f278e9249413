// crates/remote-protocol/src/line_codec.rs

//! Line codec.
//!
//! Input format (lines → [`Request`]), `<arg>` fields separated by `|`:
//!
//! - `Exit[|clientGuid]` (handled by the session itself)
//! - `Open|path`
//! - `Pause|showOsd(bool)` / `Play|showOsd(bool)` / `Stop`
//! - `Seek|position(real)`
//! - `GetDuration[|clientGuid]` / `GetCurrentState[|clientGuid]`
//! - `FullScreen|bool`
//! - `WriteToScreen|text`
//! - `Mute|bool`
//! - `Volume|int`
//! - `ActiveSubTrack|description` / `ActiveAudioTrack|description`
//! - `MoveWindow|left|top|width|height|windowState`
//! - `Borderless`
//!
//! Output format ([`Event`] → line):
//!
//! - `Connected|Authorized`, `ClientGUID|guid`, `AuthCode|identity`
//! - `Exit|reason`, `Closing|Close`
//! - `<State>|path`, `Finished|path`
//! - `Fullscreen|True|False`, `Mute|True|False`, `Volume|n`
//! - `FullLength|duration`, `Position|position`
//! - `SubChanged|description`, `AudioChanged|description`
//! - `Chapters|1>>name>>position]]2>>...`
//! - `Subtitles|1>>description>>type>>True]]2>>...`
//! - `AudioTracks|1>>description>>type>>False]]2>>...`
//!
//! Booleans are read case-insensitively and written as `True`/`False`.

use std::fmt;
use std::fmt::Write as _;

use remote_core::{Chapter, MediaTrack, PlayerState, WindowGeometry, WindowState};
use uuid::Uuid;

use crate::wire::{EXIT_MARKER, FIELD_SEPARATOR, LIST_ENTRY_SEPARATOR, LIST_FIELD_SEPARATOR};

/// A decoded client line.
///
/// `client` fields carry the identity the peer named in the line;
/// `None` means the peer omitted it or it was not a valid GUID, and the
/// server falls back to the sending session.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// End a session.
    Exit { client: Option<Uuid> },

    /// Anything executed against the player.
    Command(Command),
}

/// A request for the player's control task.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Open { path: String },
    Pause { show_osd: bool },
    Play { show_osd: bool },
    Stop,
    Seek { position: f64 },
    GetDuration { client: Option<Uuid> },
    GetCurrentState { client: Option<Uuid> },
    FullScreen { enabled: bool },
    WriteToScreen { text: String },
    Mute { muted: bool },
    Volume { level: i32 },
    ActiveSubTrack { description: String },
    ActiveAudioTrack { description: String },
    MoveWindow { geometry: WindowGeometry, state: Option<WindowState> },
    Borderless,
}

impl Command {
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Open { .. } => "Open",
            Command::Pause { .. } => "Pause",
            Command::Play { .. } => "Play",
            Command::Stop => "Stop",
            Command::Seek { .. } => "Seek",
            Command::GetDuration { .. } => "GetDuration",
            Command::GetCurrentState { .. } => "GetCurrentState",
            Command::FullScreen { .. } => "FullScreen",
            Command::WriteToScreen { .. } => "WriteToScreen",
            Command::Mute { .. } => "Mute",
            Command::Volume { .. } => "Volume",
            Command::ActiveSubTrack { .. } => "ActiveSubTrack",
            Command::ActiveAudioTrack { .. } => "ActiveAudioTrack",
            Command::MoveWindow { .. } => "MoveWindow",
            Command::Borderless => "Borderless",
        }
    }
}

/// Split a line into its verb and argument list.
pub fn split_line(line: &str) -> (&str, Vec<&str>) {
    let mut fields = line.split(FIELD_SEPARATOR);
    let verb = fields.next().unwrap_or("");
    (verb, fields.collect())
}

/// Parse a single protocol line into a [`Request`].
///
/// Returns `None` for unknown verbs, missing arguments, or arguments
/// that do not parse. Such lines are dropped by the server without a
/// reply.
pub fn parse_request(line: &str) -> Option<Request> {
    let (verb, args) = split_line(line);

    if verb == EXIT_MARKER {
        return Some(Request::Exit {
            client: parse_client(&args),
        });
    }
    parse_command(verb, &args).map(Request::Command)
}

fn parse_command(verb: &str, args: &[&str]) -> Option<Command> {
    match verb {
        "Open" => Some(Command::Open {
            path: first(args)?.to_string(),
        }),
        "Pause" => Some(Command::Pause {
            show_osd: osd_flag(args),
        }),
        "Play" => Some(Command::Play {
            show_osd: osd_flag(args),
        }),
        "Stop" => Some(Command::Stop),
        "Seek" => parse_seek(args),
        "GetDuration" => Some(Command::GetDuration {
            client: parse_client(args),
        }),
        "GetCurrentState" => Some(Command::GetCurrentState {
            client: parse_client(args),
        }),
        "FullScreen" => Some(Command::FullScreen {
            enabled: parse_bool(first(args)?)?,
        }),
        "WriteToScreen" => Some(Command::WriteToScreen {
            text: first(args)?.to_string(),
        }),
        "Mute" => Some(Command::Mute {
            muted: parse_bool(first(args)?)?,
        }),
        "Volume" => Some(Command::Volume {
            level: first(args)?.trim().parse::<i32>().ok()?,
        }),
        "ActiveSubTrack" => Some(Command::ActiveSubTrack {
            description: first(args)?.to_string(),
        }),
        "ActiveAudioTrack" => Some(Command::ActiveAudioTrack {
            description: first(args)?.to_string(),
        }),
        "MoveWindow" => parse_move_window(args),
        "Borderless" => Some(Command::Borderless),
        _ => None,
    }
}

fn parse_seek(args: &[&str]) -> Option<Command> {
    // Seek|position
    let position = first(args)?.trim().parse::<f64>().ok()?;
    if !position.is_finite() || position < 0.0 {
        return None;
    }
    Some(Command::Seek { position })
}

fn parse_move_window(args: &[&str]) -> Option<Command> {
    // MoveWindow|left|top|width|height|state
    if args.len() < 4 {
        return None;
    }

    let left = parse_i32(args[0])?;
    let top = parse_i32(args[1])?;
    let width = parse_i32(args[2])?;
    let height = parse_i32(args[3])?;

    // An unknown state name still moves the window.
    let state = args.get(4).and_then(|name| WindowState::from_name(name));

    Some(Command::MoveWindow {
        geometry: WindowGeometry {
            left,
            top,
            width,
            height,
        },
        state,
    })
}

/// A track or subtitle list together with which entry is active.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackList {
    pub tracks: Vec<MediaTrack>,
    pub active: Option<MediaTrack>,
}

/// A line the server sends to clients.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connected,
    ClientGuid(Uuid),
    AuthCode(String),
    Exit(String),
    Closing,
    State { state: PlayerState, path: String },
    Finished(String),
    Fullscreen(bool),
    Mute(bool),
    Volume(i32),
    FullLength(i64),
    Position(i64),
    SubChanged(String),
    AudioChanged(String),
    Chapters(Vec<Chapter>),
    Subtitles(TrackList),
    AudioTracks(TrackList),
}

impl Event {
    pub fn to_line(&self) -> String {
        format_event(self)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_event(self))
    }
}

/// Format an [`Event`] as a protocol line (without the trailing newline).
pub fn format_event(event: &Event) -> String {
    match event {
        Event::Connected => "Connected|Authorized".to_string(),
        Event::ClientGuid(id) => format!("ClientGUID|{}", id),
        Event::AuthCode(identity) => format!("AuthCode|{}", identity),
        Event::Exit(reason) => format!("Exit|{}", reason),
        Event::Closing => "Closing|Close".to_string(),
        Event::State { state, path } => format!("{}|{}", state, path),
        Event::Finished(path) => format!("Finished|{}", path),
        Event::Fullscreen(on) => format!("Fullscreen|{}", format_bool(*on)),
        Event::Mute(on) => format!("Mute|{}", format_bool(*on)),
        Event::Volume(level) => format!("Volume|{}", level),
        Event::FullLength(duration) => format!("FullLength|{}", duration),
        Event::Position(position) => format!("Position|{}", position),
        Event::SubChanged(description) => format!("SubChanged|{}", description),
        Event::AudioChanged(description) => format!("AudioChanged|{}", description),
        Event::Chapters(chapters) => format!("Chapters|{}", encode_chapters(chapters)),
        Event::Subtitles(list) => format!("Subtitles|{}", encode_tracks(list)),
        Event::AudioTracks(list) => format!("AudioTracks|{}", encode_tracks(list)),
    }
}

fn encode_chapters(chapters: &[Chapter]) -> String {
    let mut out = String::new();
    for (i, chapter) in chapters.iter().enumerate() {
        if i > 0 {
            out.push_str(LIST_ENTRY_SEPARATOR);
        }
        let _ = write!(
            out,
            "{}{sep}{}{sep}{}",
            i + 1,
            chapter.name,
            chapter.position,
            sep = LIST_FIELD_SEPARATOR
        );
    }
    out
}

fn encode_tracks(list: &TrackList) -> String {
    let active = list.active.as_ref().map(|t| t.description.as_str());
    let mut out = String::new();
    for (i, track) in list.tracks.iter().enumerate() {
        if i > 0 {
            out.push_str(LIST_ENTRY_SEPARATOR);
        }
        let is_active = active == Some(track.description.as_str());
        let _ = write!(
            out,
            "{}{sep}{}{sep}{}{sep}{}",
            i + 1,
            track.description,
            track.kind,
            format_bool(is_active),
            sep = LIST_FIELD_SEPARATOR
        );
    }
    out
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

/// Parse `true`/`false`, ignoring case and surrounding whitespace.
pub fn parse_bool(s: &str) -> Option<bool> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

pub fn format_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

fn first<'a>(args: &[&'a str]) -> Option<&'a str> {
    args.first().copied()
}

/// The on-screen flag of `Play`/`Pause` defaults to off.
fn osd_flag(args: &[&str]) -> bool {
    first(args).and_then(parse_bool).unwrap_or(false)
}

fn parse_client(args: &[&str]) -> Option<Uuid> {
    first(args).and_then(|s| Uuid::parse_str(s.trim()).ok())
}

fn parse_i32(s: &str) -> Option<i32> {
    s.trim().parse::<i32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(line: &str) -> Option<Command> {
        match parse_request(line)? {
            Request::Command(command) => Some(command),
            Request::Exit { .. } => None,
        }
    }

    #[test]
    fn splits_verb_and_arguments() {
        assert_eq!(split_line("Volume|50"), ("Volume", vec!["50"]));
        assert_eq!(split_line("Stop"), ("Stop", vec![]));
        assert_eq!(split_line(""), ("", vec![]));
        assert_eq!(split_line("A||b"), ("A", vec!["", "b"]));
    }

    #[test]
    fn parses_transport_commands() {
        assert_eq!(
            command("Open|C:\\media\\movie.mkv"),
            Some(Command::Open {
                path: "C:\\media\\movie.mkv".to_string()
            })
        );
        assert_eq!(
            command("Pause|True"),
            Some(Command::Pause { show_osd: true })
        );
        assert_eq!(
            command("Play|nonsense"),
            Some(Command::Play { show_osd: false })
        );
        assert_eq!(command("Play"), Some(Command::Play { show_osd: false }));
        assert_eq!(command("Stop"), Some(Command::Stop));
        assert_eq!(
            command("Seek|1500000.7"),
            Some(Command::Seek { position: 1500000.7 })
        );
    }

    #[test]
    fn rejects_bad_seek() {
        assert_eq!(command("Seek|abc"), None);
        assert_eq!(command("Seek|"), None);
        assert_eq!(command("Seek"), None);
        assert_eq!(command("Seek|NaN"), None);
        assert_eq!(command("Seek|-1"), None);
    }

    #[test]
    fn parses_flags_and_levels() {
        assert_eq!(command("Mute|true"), Some(Command::Mute { muted: true }));
        assert_eq!(command("Mute|FALSE"), Some(Command::Mute { muted: false }));
        assert_eq!(command("Mute|maybe"), None);
        assert_eq!(
            command("FullScreen|True"),
            Some(Command::FullScreen { enabled: true })
        );
        assert_eq!(command("Volume|50"), Some(Command::Volume { level: 50 }));
        assert_eq!(command("Volume|loud"), None);
    }

    #[test]
    fn client_identity_is_optional() {
        let id = Uuid::new_v4();
        assert_eq!(
            command(&format!("GetCurrentState|{}", id)),
            Some(Command::GetCurrentState { client: Some(id) })
        );
        assert_eq!(
            command("GetDuration|not-a-guid"),
            Some(Command::GetDuration { client: None })
        );
        assert_eq!(parse_request("Exit"), Some(Request::Exit { client: None }));
        assert_eq!(
            parse_request(&format!("Exit|{}", id)),
            Some(Request::Exit { client: Some(id) })
        );
    }

    #[test]
    fn move_window_is_all_or_nothing() {
        assert_eq!(command("MoveWindow|10|20|bad|300|Normal"), None);
        assert_eq!(command("MoveWindow|10|20|30"), None);
        assert_eq!(
            command("MoveWindow|10|20|640|480|Maximized"),
            Some(Command::MoveWindow {
                geometry: WindowGeometry {
                    left: 10,
                    top: 20,
                    width: 640,
                    height: 480
                },
                state: Some(WindowState::Maximized),
            })
        );
        assert_eq!(
            command("MoveWindow|10|20|640|480|Sideways"),
            Some(Command::MoveWindow {
                geometry: WindowGeometry {
                    left: 10,
                    top: 20,
                    width: 640,
                    height: 480
                },
                state: None,
            })
        );
    }

    #[test]
    fn unknown_and_empty_lines_are_ignored() {
        assert_eq!(command("Rewind|10"), None);
        assert_eq!(command(""), None);
        assert_eq!(command("open|movie.mkv"), None);
        assert_eq!(command("Open"), None);
    }

    #[test]
    fn formats_fixed_lines() {
        let id = Uuid::nil();
        assert_eq!(Event::Connected.to_line(), "Connected|Authorized");
        assert_eq!(
            Event::ClientGuid(id).to_line(),
            "ClientGUID|00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(Event::Exit("Unauthorized".into()).to_line(), "Exit|Unauthorized");
        assert_eq!(Event::Closing.to_line(), "Closing|Close");
        assert_eq!(Event::Mute(true).to_line(), "Mute|True");
        assert_eq!(Event::Fullscreen(false).to_line(), "Fullscreen|False");
        assert_eq!(
            Event::State {
                state: PlayerState::Paused,
                path: "movie.mkv".into()
            }
            .to_line(),
            "Paused|movie.mkv"
        );
    }

    #[test]
    fn encodes_lists() {
        let chapters = vec![Chapter::new("Intro", 0), Chapter::new("Credits", 90)];
        assert_eq!(
            Event::Chapters(chapters).to_line(),
            "Chapters|1>>Intro>>0]]2>>Credits>>90"
        );

        let list = TrackList {
            tracks: vec![MediaTrack::new("English", "SRT"), MediaTrack::new("French", "ASS")],
            active: Some(MediaTrack::new("French", "ASS")),
        };
        assert_eq!(
            Event::Subtitles(list).to_line(),
            "Subtitles|1>>English>>SRT>>False]]2>>French>>ASS>>True"
        );

        let no_active = TrackList {
            tracks: vec![MediaTrack::new("Stereo", "AAC")],
            active: None,
        };
        assert_eq!(
            Event::AudioTracks(no_active).to_line(),
            "AudioTracks|1>>Stereo>>AAC>>False"
        );
    }

    #[test]
    fn empty_lists_keep_their_verb() {
        assert_eq!(Event::Chapters(vec![]).to_line(), "Chapters|");
        assert_eq!(Event::Subtitles(TrackList::default()).to_line(), "Subtitles|");
        assert_eq!(Event::AudioTracks(TrackList::default()).to_line(), "AudioTracks|");
    }
}
