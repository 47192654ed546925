//! PowerHandle - public API for a PowerActor

use super::commands::{PowerCommand, PowerSnapshot};
use super::PowerState;
use crate::devices::TelemetryReading;
use crate::signal::PanelId;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Handle for one panel's power lifecycle
///
/// Transition methods are fire-and-forget. Sends to a stopped actor are
/// dropped silently.
#[derive(Clone)]
pub struct PowerHandle {
    panel: PanelId,
    cmd_tx: mpsc::UnboundedSender<PowerCommand>,
}

impl PowerHandle {
    pub(super) fn new(panel: PanelId, cmd_tx: mpsc::UnboundedSender<PowerCommand>) -> Self {
        Self { panel, cmd_tx }
    }

    pub fn panel(&self) -> PanelId {
        self.panel
    }

    pub fn connect(&self) {
        self.send(PowerCommand::Connect);
    }

    pub fn disconnect(&self) {
        self.send(PowerCommand::Disconnect);
    }

    pub fn activity(&self) {
        self.send(PowerCommand::Activity);
    }

    pub fn refresh(&self) {
        self.send(PowerCommand::Refresh);
    }

    pub fn sleep(&self) {
        self.send(PowerCommand::Sleep);
    }

    pub fn toggle(&self) {
        self.send(PowerCommand::Toggle);
    }

    pub fn telemetry(&self, reading: TelemetryReading) {
        self.send(PowerCommand::Telemetry(reading));
    }

    /// Current lifecycle view, `None` once the actor has stopped
    pub async fn snapshot(&self) -> Option<PowerSnapshot> {
        let (response_tx, response_rx) = oneshot::channel();
        self.cmd_tx
            .send(PowerCommand::Snapshot {
                response: response_tx,
            })
            .ok()?;
        response_rx.await.ok()
    }

    pub async fn state(&self) -> Option<PowerState> {
        self.snapshot().await.map(|s| s.state)
    }

    /// Stop the actor and wait until its timers are cancelled
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.cmd_tx.send(PowerCommand::Shutdown { ack: ack_tx }).is_err() {
            debug!("PowerActor {} already stopped", self.panel);
            return;
        }
        let _ = ack_rx.await;
    }

    fn send(&self, cmd: PowerCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            debug!("PowerActor {} is gone, command dropped", self.panel);
        }
    }
}
