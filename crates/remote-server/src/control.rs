//! Player control loop.
//!
//! This task owns the `Player` and processes every `ControlRequest`
//! coming from sessions, the event bridge and the position clock. The
//! player is only ever touched from here.
//!
//! Routing policy:
//! - `GetDuration`, `GetCurrentState`: reply **only** to the requester.
//! - `Mute`, player events, position ticks: broadcast to **all** clients.
//! - everything else: no reply.

use std::sync::Arc;

use remote_core::{Player, PlayerError, PlayerEvent, PlayerState};
use remote_protocol::{Command, Event, TrackList};
use tracing::{debug, info, warn};

use crate::context::ServerContext;
use crate::types::{ClientId, ControlRequest, ControlRx, Outbound};

/// Run the control loop until `Shutdown` arrives.
pub(crate) async fn run_control_loop(
    mut player: Box<dyn Player>,
    mut control_rx: ControlRx,
    ctx: Arc<ServerContext>,
) {
    while let Some(req) = control_rx.recv().await {
        match req {
            ControlRequest::Command { origin, command } => {
                let verb = command.verb();
                if let Err(e) = execute(player.as_mut(), &ctx, origin, command).await {
                    warn!(client = %origin, verb, error = %e, "player rejected command");
                }
            }
            ControlRequest::Event(event) => {
                let lines = render_event(player.as_ref(), event);
                if !lines.is_empty() {
                    ctx.broadcast_lines(lines).await;
                }
            }
            ControlRequest::SamplePosition => match player.position() {
                Ok(position) => ctx.broadcast(Event::Position(position).to_line()).await,
                Err(e) => debug!(error = %e, "position sample failed"),
            },
            ControlRequest::ShowText(text) => player.show_osd_text(&text),
            ControlRequest::Shutdown => break,
        }
    }

    info!("control loop shutting down");
}

/// Apply one client command to the player.
async fn execute(
    player: &mut dyn Player,
    ctx: &ServerContext,
    origin: ClientId,
    command: Command,
) -> Result<(), PlayerError> {
    match command {
        Command::Open { path } => player.open_media(&path)?,
        Command::Pause { show_osd } => player.pause(show_osd)?,
        Command::Play { show_osd } => player.play(show_osd)?,
        Command::Stop => player.stop()?,
        Command::Seek { position } => player.seek(position as i64)?,
        Command::GetDuration { client } => {
            let target = client.map(ClientId).unwrap_or(origin);
            let line = Event::FullLength(player.duration()).to_line();
            ctx.send_to(&target, vec![line]).await;
        }
        Command::GetCurrentState { client } => {
            let target = client.map(ClientId).unwrap_or(origin);
            ctx.send_to(&target, current_state(player)).await;
        }
        Command::FullScreen { enabled } => {
            if enabled {
                player.go_fullscreen();
            } else {
                player.go_windowed();
            }
        }
        Command::WriteToScreen { text } => player.show_osd_text(&text),
        Command::Mute { muted } => {
            player.set_muted(muted);
            ctx.broadcast(Event::Mute(muted).to_line()).await;
        }
        Command::Volume { level } => player.set_volume(level),
        Command::ActiveSubTrack { description } => {
            let track = player
                .subtitle_tracks()
                .into_iter()
                .find(|t| t.description == description);
            match track {
                Some(track) => player.select_subtitle_track(&track)?,
                None => debug!(description, "no subtitle track with that description"),
            }
        }
        Command::ActiveAudioTrack { description } => {
            let track = player
                .audio_tracks()
                .into_iter()
                .find(|t| t.description == description);
            match track {
                Some(track) => player.select_audio_track(&track)?,
                None => debug!(description, "no audio track with that description"),
            }
        }
        Command::MoveWindow { geometry, state } => player.move_window(geometry, state),
        Command::Borderless => player.toggle_borderless(),
    }
    Ok(())
}

/// Lines broadcast for a player event, in order.
pub(crate) fn render_event(player: &dyn Player, event: PlayerEvent) -> Outbound {
    let events = match event {
        PlayerEvent::PlaybackCompleted => vec![Event::Finished(player.media_file_path())],
        PlayerEvent::StateChanged(state) => {
            let mut events = Vec::with_capacity(4);
            if state == PlayerState::Playing {
                events.push(chapters(player));
                events.push(subtitles(player));
                events.push(audio_tracks(player));
            }
            events.push(Event::State {
                state,
                path: player.media_file_path(),
            });
            events
        }
        PlayerEvent::EnteringFullScreen => vec![Event::Fullscreen(true)],
        PlayerEvent::ExitingFullScreen => vec![Event::Fullscreen(false)],
        PlayerEvent::VolumeChanged => vec![
            Event::Volume(player.volume()),
            Event::Mute(player.is_muted()),
        ],
        PlayerEvent::SubtitleTrackChanged => vec![Event::SubChanged(
            player
                .active_subtitle_track()
                .map(|t| t.description)
                .unwrap_or_default(),
        )],
        PlayerEvent::AudioTrackChanged => vec![Event::AudioChanged(
            player
                .active_audio_track()
                .map(|t| t.description)
                .unwrap_or_default(),
        )],
    };

    events.iter().map(Event::to_line).collect()
}

/// The `GetCurrentState` reply, in its fixed order.
pub(crate) fn current_state(player: &dyn Player) -> Outbound {
    let state = player.state();
    let mut events = vec![
        chapters(player),
        Event::State {
            state,
            path: player.media_file_path(),
        },
        Event::Fullscreen(player.in_fullscreen()),
        Event::Mute(player.is_muted()),
        Event::Volume(player.volume()),
    ];

    if state.has_position() {
        events.push(Event::FullLength(player.duration()));
        match player.position() {
            Ok(position) => events.push(Event::Position(position)),
            Err(e) => debug!(error = %e, "position unavailable for state snapshot"),
        }
    }

    events.push(subtitles(player));
    events.push(audio_tracks(player));

    events.iter().map(Event::to_line).collect()
}

fn chapters(player: &dyn Player) -> Event {
    Event::Chapters(player.chapters())
}

fn subtitles(player: &dyn Player) -> Event {
    Event::Subtitles(TrackList {
        tracks: player.subtitle_tracks(),
        active: player.active_subtitle_track(),
    })
}

fn audio_tracks(player: &dyn Player) -> Event {
    Event::AudioTracks(TrackList {
        tracks: player.audio_tracks(),
        active: player.active_audio_track(),
    })
}
