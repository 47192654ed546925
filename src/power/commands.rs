//! Commands and snapshots for the power lifecycle actor

use super::telemetry::ChargeIndicator;
use super::PowerState;
use crate::devices::TelemetryReading;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Which demotion a pending timer performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimerKind {
    /// Awake → Standby
    Standby,
    /// Standby → DeepSleep
    DeepSleep,
}

/// Commands accepted by a `PowerActor`
///
/// Everything except `Snapshot` and `Shutdown` is fire-and-forget.
#[derive(Debug)]
pub enum PowerCommand {
    /// Panel came online: force Awake, start the standby timer and the clock
    Connect,
    /// Panel dropped off: cancel timers and the clock, no side effects
    Disconnect,
    /// Any user interaction on the panel
    Activity,
    /// Interaction that keeps an awake panel awake but never wakes one
    Refresh,
    /// Operator asked for standby now
    Sleep,
    /// Power-toggle button: `Sleep` when awake, `Activity` otherwise
    Toggle,
    Telemetry(TelemetryReading),
    Snapshot {
        response: oneshot::Sender<PowerSnapshot>,
    },
    /// Stop the actor; `ack` fires once timers are gone
    Shutdown { ack: oneshot::Sender<()> },
}

/// Point-in-time view of one panel's lifecycle
#[derive(Debug, Clone, Serialize)]
pub struct PowerSnapshot {
    pub state: PowerState,
    pub online: bool,
    pub pending: Option<TimerKind>,
    pub generation: u64,
    /// When the current state was entered
    #[serde(skip)]
    pub since: Instant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge: Option<ChargeIndicator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rf_weak: Option<bool>,
}
