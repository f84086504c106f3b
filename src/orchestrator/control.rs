//! `RunControl` — cooperative cancel/pause signaling for a running orchestration.

use tokio::sync::watch;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlSignal {
    Run,
    Paused,
    Cancelled,
}

/// Handle given to the orchestrator's cycle loop; checked between cycles
/// via `tokio::select!` so a pause or cancel takes effect at a cycle
/// boundary rather than mid-inference.
#[derive(Clone)]
pub struct RunControl {
    tx: watch::Sender<ControlSignal>,
}

impl RunControl {
    pub fn new() -> (Self, RunControlWatcher) {
        let (tx, rx) = watch::channel(ControlSignal::Run);
        (Self { tx: tx.clone() }, RunControlWatcher { rx })
    }

    pub fn pause(&self) {
        let _ = self.tx.send(ControlSignal::Paused);
    }

    pub fn resume(&self) {
        let _ = self.tx.send(ControlSignal::Run);
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(ControlSignal::Cancelled);
    }
}

#[derive(Clone)]
pub struct RunControlWatcher {
    rx: watch::Receiver<ControlSignal>,
}

impl RunControlWatcher {
    pub fn signal(&self) -> ControlSignal {
        *self.rx.borrow()
    }

    /// Block until the signal changes away from `Paused`, or until
    /// cancelled. Returns the signal the loop should act on.
    pub async fn wait_while_paused(&mut self) -> ControlSignal {
        while *self.rx.borrow() == ControlSignal::Paused {
            if self.rx.changed().await.is_err() {
                return ControlSignal::Cancelled;
            }
        }
        *self.rx.borrow()
    }
}
