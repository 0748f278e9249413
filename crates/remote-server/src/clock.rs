//! Position clock.
//!
//! While running, asks the control task for a position sample every
//! interval. The sample itself (and any failure taking it) happens on
//! the control task, so a bad tick never stops the clock.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use crate::types::{ControlRequest, ControlTx};

#[derive(Debug, Clone)]
pub struct PositionClock {
    inner: Arc<ClockInner>,
}

#[derive(Debug)]
struct ClockInner {
    period: Duration,
    control_tx: ControlTx,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PositionClock {
    pub fn new(period: Duration, control_tx: ControlTx) -> Self {
        PositionClock {
            inner: Arc::new(ClockInner {
                period,
                control_tx,
                task: Mutex::new(None),
            }),
        }
    }

    /// Start ticking. No-op if already running.
    pub fn start(&self) {
        let mut task = self.inner.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let period = self.inner.period;
        let control_tx = self.inner.control_tx.clone();
        *task = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if control_tx.send(ControlRequest::SamplePosition).is_err() {
                    break;
                }
            }
        }));
        debug!("position clock started");
    }

    /// Stop ticking. No-op if not running.
    pub fn stop(&self) {
        if let Some(task) = self.inner.task.lock().take() {
            task.abort();
            debug!("position clock stopped");
        }
    }

    /// Stop and wait until the tick task has fully exited.
    pub async fn shutdown(&self) {
        let task = self.inner.task.lock().take();
        if let Some(task) = task {
            task.abort();
            let _ = task.await;
        }
    }
}
