//! Side effects of power transitions and telemetry on one panel

use super::telemetry::ChargeIndicator;
use crate::config::{JoinsConfig, PowerConfig};
use crate::devices::Capabilities;
use crate::signal::{PanelId, SignalBus, SignalValue};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything the lifecycle actor does to its panel
///
/// Implementations must not block; they run inside the actor loop.
pub trait PanelEffects: Send + Sync {
    /// Screensaver off, full brightness, backlight on, awake feedback
    fn awake(&self);

    /// Dimmed brightness, asleep feedback
    fn standby(&self);

    /// Backlight off
    fn deep_sleep(&self);

    fn clock(&self, time: &str, date: &str);

    fn charge(&self, indicator: ChargeIndicator);

    fn rf_signal(&self, weak: bool);
}

/// `PanelEffects` through the signal bus and the device layer
pub struct PanelFeedback {
    panel: PanelId,
    capabilities: Capabilities,
    bus: Arc<SignalBus>,
    joins: JoinsConfig,
    max_brightness: u16,
    min_brightness: u16,
}

impl PanelFeedback {
    pub fn new(
        panel: PanelId,
        capabilities: Capabilities,
        bus: Arc<SignalBus>,
        joins: &JoinsConfig,
        power: &PowerConfig,
    ) -> Self {
        Self {
            panel,
            capabilities,
            bus,
            joins: joins.clone(),
            max_brightness: power.max_brightness,
            min_brightness: power.min_brightness,
        }
    }

    fn sleep_feedback(&self, asleep: bool) {
        self.bus
            .send_to(self.panel, self.joins.awake(), SignalValue::Bool(!asleep));
        self.bus
            .send_to(self.panel, self.joins.asleep(), SignalValue::Bool(asleep));
    }

    fn brightness(&self, level: u16) {
        if !self.capabilities.brightness {
            return;
        }
        if let Err(e) = self.bus.devices().set_brightness(self.panel, level) {
            warn!("⚠️  {}: brightness {} failed: {}", self.panel, level, e);
        }
    }

    fn backlight(&self, on: bool) {
        if !self.capabilities.brightness {
            return;
        }
        if let Err(e) = self.bus.devices().set_backlight(self.panel, on) {
            warn!("⚠️  {}: backlight {} failed: {}", self.panel, on, e);
        }
    }
}

impl PanelEffects for PanelFeedback {
    fn awake(&self) {
        if let Err(e) = self.bus.devices().restore_ui(self.panel) {
            warn!("⚠️  {}: restore UI failed: {}", self.panel, e);
        }
        self.brightness(self.max_brightness);
        self.backlight(true);
        self.sleep_feedback(false);
    }

    fn standby(&self) {
        self.brightness(self.min_brightness);
        self.sleep_feedback(true);
    }

    fn deep_sleep(&self) {
        self.backlight(false);
    }

    fn clock(&self, time: &str, date: &str) {
        self.bus
            .send_to(self.panel, self.joins.clock_time(), SignalValue::Text(time.to_string()));
        self.bus
            .send_to(self.panel, self.joins.clock_date(), SignalValue::Text(date.to_string()));
    }

    fn charge(&self, indicator: ChargeIndicator) {
        if !self.capabilities.battery {
            debug!("{} has no battery, ignoring charge {:?}", self.panel, indicator);
            return;
        }
        self.bus.send_to(
            self.panel,
            self.joins.charge_state(),
            SignalValue::Numeric(indicator.value()),
        );
    }

    fn rf_signal(&self, weak: bool) {
        self.bus
            .send_to(self.panel, self.joins.rf_weak(), SignalValue::Numeric(weak as u16));
    }
}
