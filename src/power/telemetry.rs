//! Battery, AC-line and RF telemetry indicators

use crate::devices::TelemetryReading;
use serde::Serialize;

/// Battery level below which an unplugged panel shows `Low`
pub const LOW_BATTERY_THRESHOLD: u16 = 50;

/// RF link quality below which the weak-signal indicator is raised
pub const WEAK_RF_THRESHOLD: u16 = 50;

/// Numeric charge feedback shown on battery panels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u16)]
pub enum ChargeIndicator {
    Low = 0,
    Normal = 1,
    Charging = 2,
}

impl ChargeIndicator {
    pub fn value(self) -> u16 {
        self as u16
    }
}

pub fn rf_weak(level: u16) -> bool {
    level < WEAK_RF_THRESHOLD
}

/// What a telemetry reading changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryUpdate {
    Charge(ChargeIndicator),
    RfWeak(bool),
}

/// Latest telemetry reported by one panel
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryState {
    ac_line: Option<bool>,
    battery: Option<u16>,
    rf: Option<u16>,
}

impl TelemetryState {
    /// Fold in a reading and return the indicator it affects
    pub fn apply(&mut self, reading: TelemetryReading) -> TelemetryUpdate {
        match reading {
            TelemetryReading::AcLine(on) => {
                self.ac_line = Some(on);
                TelemetryUpdate::Charge(self.charge())
            }
            TelemetryReading::BatteryLevel(level) => {
                self.battery = Some(level);
                TelemetryUpdate::Charge(self.charge())
            }
            TelemetryReading::RfSignal(level) => {
                self.rf = Some(level);
                TelemetryUpdate::RfWeak(rf_weak(level))
            }
        }
    }

    /// AC wins over battery level; an unknown level counts as normal
    pub fn charge(&self) -> ChargeIndicator {
        if self.ac_line == Some(true) {
            return ChargeIndicator::Charging;
        }
        match self.battery {
            Some(level) if level < LOW_BATTERY_THRESHOLD => ChargeIndicator::Low,
            _ => ChargeIndicator::Normal,
        }
    }

    /// Weak-link flag, `None` until the panel reported RF quality
    pub fn rf_weak(&self) -> Option<bool> {
        self.rf.map(rf_weak)
    }

    pub fn has_charge_data(&self) -> bool {
        self.ac_line.is_some() || self.battery.is_some()
    }
}
