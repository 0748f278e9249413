//! Player event notifications.
//!
//! The player publishes [`PlayerEvent`]s through an [`EventHub`].
//! Listeners hold a [`Subscription`]; dropping it unsubscribes.
//!
//! Events carry no payload beyond the new state: listeners read the
//! details (volume, active track, file path) back from the player.

use tokio::sync::broadcast;
use tracing::warn;

use crate::state::PlayerState;

/// Default number of undelivered events a slow subscriber may lag by.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A change reported by the playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    PlaybackCompleted,
    StateChanged(PlayerState),
    EnteringFullScreen,
    ExitingFullScreen,
    VolumeChanged,
    SubtitleTrackChanged,
    AudioTrackChanged,
}

/// Fan-out point for player events.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<PlayerEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        EventHub { tx }
    }

    /// Publish an event to every live subscription.
    ///
    /// Having no subscribers is not an error.
    pub fn publish(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        EventHub::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// A live registration for player events.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<PlayerEvent>,
}

impl Subscription {
    /// Wait for the next event.
    ///
    /// Returns `None` once the hub is gone. If this subscriber fell
    /// behind, the missed events are skipped.
    pub async fn next(&mut self) -> Option<PlayerEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "player event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
