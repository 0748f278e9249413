//! Player event bridge.
//!
//! Holds the player event subscription for the lifetime of the service.
//! Transport state changes drive the position clock; every event is
//! forwarded to the control task, which renders and broadcasts it.

use remote_core::{PlayerEvent, PlayerState, Subscription};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::PositionClock;
use crate::types::{ControlRequest, ControlTx};

pub struct EventBridge {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
    clock: PositionClock,
}

impl EventBridge {
    pub fn spawn(subscription: Subscription, control_tx: ControlTx, clock: PositionClock) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run_bridge(subscription, control_tx, clock.clone(), stop_rx));
        EventBridge {
            stop_tx,
            task,
            clock,
        }
    }

    /// Release the subscription and stop the clock.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "event bridge task failed");
        }
        self.clock.shutdown().await;
    }
}

async fn run_bridge(
    mut subscription: Subscription,
    control_tx: ControlTx,
    clock: PositionClock,
    mut stop_rx: oneshot::Receiver<()>,
) {
    loop {
        let event = tokio::select! {
            _ = &mut stop_rx => break,
            event = subscription.next() => match event {
                Some(event) => event,
                None => {
                    debug!("player event hub closed");
                    break;
                }
            },
        };

        match event {
            PlayerEvent::StateChanged(PlayerState::Playing) => clock.start(),
            PlayerEvent::StateChanged(PlayerState::Paused | PlayerState::Stopped) => clock.stop(),
            _ => {}
        }

        if control_tx.send(ControlRequest::Event(event)).is_err() {
            break;
        }
    }

    drop(subscription);
    info!("player event subscription released");
}
