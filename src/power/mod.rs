//! Panel power lifecycle (Awake → Standby → DeepSleep)
//!
//! - `actor`: the per-panel state machine and its timer chain
//! - `handle`: cloneable command interface
//! - `effects`: what each transition does to the panel
//! - `telemetry`: charge and RF indicators

mod actor;
mod commands;
mod effects;
mod handle;
mod telemetry;

pub use actor::{PowerActor, WallClock};
pub use commands::{PowerCommand, PowerSnapshot, TimerKind};
pub use effects::{PanelEffects, PanelFeedback};
pub use handle::PowerHandle;
pub use telemetry::{ChargeIndicator, TelemetryState, TelemetryUpdate};

use crate::config::PowerConfig;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Power state of one panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PowerState {
    Awake,
    Standby,
    DeepSleep,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Awake => write!(f, "awake"),
            PowerState::Standby => write!(f, "standby"),
            PowerState::DeepSleep => write!(f, "deep sleep"),
        }
    }
}

/// Timing of the lifecycle
#[derive(Debug, Clone, Copy)]
pub struct PowerSettings {
    /// Inactivity before Awake → Standby
    pub standby_window: Duration,
    /// Time in Standby before → DeepSleep
    pub deep_sleep_window: Duration,
    pub clock_period: Duration,
}

impl From<&PowerConfig> for PowerSettings {
    fn from(config: &PowerConfig) -> Self {
        Self {
            standby_window: config.standby_window(),
            deep_sleep_window: config.deep_sleep_window(),
            clock_period: Duration::from_secs(1),
        }
    }
}
