//! Configuration management for the room controller
//!
//! Loaded once at startup from a YAML file. Every key has a default, so an
//! empty file describes the stock room (one wireless touch panel, one
//! XPanel, three sources).

use crate::devices::{Capabilities, PanelEndpoint, PanelLink};
use crate::signal::{Address, PanelId};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoomConfig {
    #[serde(default)]
    pub room: RoomSection,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub switcher: SwitcherConfig,
    #[serde(default = "default_panels")]
    pub panels: Vec<PanelConfig>,
    #[serde(default)]
    pub joins: JoinsConfig,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub power: PowerConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_detect: Option<SignalDetectConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback: Vec<FallbackRule>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoomSection {
    #[serde(default = "default_room_name")]
    pub name: String,
}

/// Wireless gateway configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Transport id for an external gateway
    #[serde(default = "default_gateway_ip_id")]
    pub ip_id: u32,
    /// Use an external gateway even when the controller has one built in
    #[serde(default)]
    pub force_external: bool,
}

/// Matrix switch configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SwitcherConfig {
    #[serde(default = "default_switcher_ip_id")]
    pub ip_id: u32,
    #[serde(default = "default_switcher_ip")]
    pub ip: String,
}

/// One touch panel
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PanelConfig {
    pub name: String,
    /// IP-ID for wired panels, RF-ID for wireless ones
    pub id: u32,
    #[serde(default = "default_panel_link")]
    pub link: PanelLink,
    #[serde(default)]
    pub brightness: bool,
    #[serde(default)]
    pub battery: bool,
}

impl PanelConfig {
    pub fn endpoint(&self) -> PanelEndpoint {
        PanelEndpoint {
            id: PanelId(self.id),
            name: self.name.clone(),
            link: self.link,
            capabilities: Capabilities {
                brightness: self.brightness,
                battery: self.battery,
            },
        }
    }
}

/// Join numbers of the fixed panel functions
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JoinsConfig {
    /// Boolean input that toggles awake/standby
    #[serde(default = "default_power_toggle_join")]
    pub power_toggle: u32,
    /// Boolean feedback, true while awake
    #[serde(default = "default_awake_join")]
    pub awake: u32,
    /// Boolean feedback, true while asleep
    #[serde(default = "default_asleep_join")]
    pub asleep: u32,
    /// Numeric feedback, 1 while the RF link is weak
    #[serde(default = "default_rf_weak_join")]
    pub rf_weak: u32,
    /// Numeric feedback carrying the charge indicator
    #[serde(default = "default_charge_state_join")]
    pub charge_state: u32,
    /// String feedback with the short time
    #[serde(default = "default_clock_time_join")]
    pub clock_time: u32,
    /// String feedback with the long date
    #[serde(default = "default_clock_date_join")]
    pub clock_date: u32,
}

impl JoinsConfig {
    pub fn power_toggle(&self) -> Address {
        Address::boolean(self.power_toggle)
    }

    pub fn awake(&self) -> Address {
        Address::boolean(self.awake)
    }

    pub fn asleep(&self) -> Address {
        Address::boolean(self.asleep)
    }

    pub fn rf_weak(&self) -> Address {
        Address::numeric(self.rf_weak)
    }

    pub fn charge_state(&self) -> Address {
        Address::numeric(self.charge_state)
    }

    pub fn clock_time(&self) -> Address {
        Address::string(self.clock_time)
    }

    pub fn clock_date(&self) -> Address {
        Address::string(self.clock_date)
    }
}

/// A logical source: its selection join and the pairs it routes
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub name: String,
    /// Boolean join used both as the press input and the interlock feedback
    pub join: u32,
    pub routes: Vec<RoutePair>,
}

impl SourceConfig {
    pub fn address(&self) -> Address {
        Address::boolean(self.join)
    }
}

/// Matrix assignment: `input` shown on `output`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RoutePair {
    pub output: u32,
    pub input: u32,
}

/// Power lifecycle timing and brightness levels
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PowerConfig {
    #[serde(default = "default_standby_secs")]
    pub standby_secs: u64,
    #[serde(default = "default_deep_sleep_secs")]
    pub deep_sleep_secs: u64,
    #[serde(default = "default_max_brightness")]
    pub max_brightness: u16,
    #[serde(default = "default_min_brightness")]
    pub min_brightness: u16,
}

impl PowerConfig {
    pub fn standby_window(&self) -> Duration {
        Duration::from_secs(self.standby_secs)
    }

    pub fn deep_sleep_window(&self) -> Duration {
        Duration::from_secs(self.deep_sleep_secs)
    }
}

/// "Signal detected" feedback over a set of switch inputs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignalDetectConfig {
    pub inputs: Vec<u32>,
    #[serde(default = "default_signal_detect_join")]
    pub join: u32,
}

/// Auto-fallback rule: show `input` on `output` while it has sync,
/// `alternate` otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct FallbackRule {
    pub output: u32,
    pub input: u32,
    pub alternate: u32,
}

impl RoomConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml_str(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        // An empty document is the stock room
        let config: RoomConfig = if contents.trim().is_empty() {
            RoomConfig::default()
        } else {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            anyhow::bail!("At least one source must be defined");
        }

        let mut names = HashSet::new();
        let mut joins = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                anyhow::bail!("Source name cannot be empty (join {})", source.join);
            }
            if !names.insert(source.name.to_lowercase()) {
                anyhow::bail!("Duplicate source name '{}'", source.name);
            }
            if !joins.insert(source.join) {
                anyhow::bail!("Source '{}' reuses join {}", source.name, source.join);
            }
            if source.join == self.joins.power_toggle {
                anyhow::bail!(
                    "Source '{}' join {} collides with the power toggle join",
                    source.name,
                    source.join
                );
            }
            if source.routes.is_empty() {
                anyhow::bail!("Source '{}' has no routes", source.name);
            }
        }

        let mut ids = HashSet::new();
        for panel in &self.panels {
            if !ids.insert(panel.id) {
                anyhow::bail!("Duplicate panel id 0x{:02X} ('{}')", panel.id, panel.name);
            }
        }

        if self.power.standby_secs == 0 {
            anyhow::bail!("power.standby_secs must be positive");
        }
        if self.power.deep_sleep_secs == 0 {
            anyhow::bail!("power.deep_sleep_secs must be positive");
        }
        if self.power.min_brightness > self.power.max_brightness {
            anyhow::bail!(
                "power.min_brightness ({}) is above power.max_brightness ({})",
                self.power.min_brightness,
                self.power.max_brightness
            );
        }

        if let Some(detect) = &self.signal_detect {
            if detect.inputs.is_empty() {
                anyhow::bail!("signal_detect.inputs cannot be empty");
            }
        }

        let mut outputs = HashSet::new();
        for rule in &self.fallback {
            if !outputs.insert(rule.output) {
                anyhow::bail!("More than one fallback rule for output {}", rule.output);
            }
        }

        Ok(())
    }

    /// Case-insensitive source lookup
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            room: RoomSection::default(),
            gateway: GatewayConfig::default(),
            switcher: SwitcherConfig::default(),
            panels: default_panels(),
            joins: JoinsConfig::default(),
            sources: default_sources(),
            power: PowerConfig::default(),
            signal_detect: None,
            fallback: Vec::new(),
        }
    }
}

impl Default for RoomSection {
    fn default() -> Self {
        Self {
            name: default_room_name(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ip_id: default_gateway_ip_id(),
            force_external: false,
        }
    }
}

impl Default for SwitcherConfig {
    fn default() -> Self {
        Self {
            ip_id: default_switcher_ip_id(),
            ip: default_switcher_ip(),
        }
    }
}

impl Default for JoinsConfig {
    fn default() -> Self {
        Self {
            power_toggle: default_power_toggle_join(),
            awake: default_awake_join(),
            asleep: default_asleep_join(),
            rf_weak: default_rf_weak_join(),
            charge_state: default_charge_state_join(),
            clock_time: default_clock_time_join(),
            clock_date: default_clock_date_join(),
        }
    }
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            standby_secs: default_standby_secs(),
            deep_sleep_secs: default_deep_sleep_secs(),
            max_brightness: default_max_brightness(),
            min_brightness: default_min_brightness(),
        }
    }
}

fn default_panels() -> Vec<PanelConfig> {
    vec![
        PanelConfig {
            name: "TST-902".to_string(),
            id: 0x03,
            link: PanelLink::Wireless,
            brightness: true,
            battery: true,
        },
        PanelConfig {
            name: "XPanel".to_string(),
            id: 0x04,
            link: PanelLink::Ethernet,
            brightness: false,
            battery: false,
        },
    ]
}

fn default_sources() -> Vec<SourceConfig> {
    let pairs = |a: u32, b: u32| {
        vec![
            RoutePair { output: 1, input: a },
            RoutePair { output: 2, input: b },
        ]
    };
    vec![
        SourceConfig { name: "PC".to_string(), join: 31, routes: pairs(1, 2) },
        SourceConfig { name: "Laptop".to_string(), join: 32, routes: pairs(3, 4) },
        SourceConfig { name: "Mixed".to_string(), join: 33, routes: pairs(1, 3) },
    ]
}

// Default value functions
fn default_room_name() -> String { "Room".to_string() }
fn default_gateway_ip_id() -> u32 { 0x0f }
fn default_switcher_ip_id() -> u32 { 0x10 }
fn default_switcher_ip() -> String { "192.168.1.10".to_string() }
fn default_panel_link() -> PanelLink { PanelLink::Ethernet }
fn default_power_toggle_join() -> u32 { 10 }
fn default_awake_join() -> u32 { 51 }
fn default_asleep_join() -> u32 { 50 }
fn default_rf_weak_join() -> u32 { 1 }
fn default_charge_state_join() -> u32 { 2 }
fn default_clock_time_join() -> u32 { 1 }
fn default_clock_date_join() -> u32 { 2 }
fn default_signal_detect_join() -> u32 { 22 }
fn default_standby_secs() -> u64 { 60 }
fn default_deep_sleep_secs() -> u64 { 900 }
fn default_max_brightness() -> u16 { 60000 }
fn default_min_brightness() -> u16 { 20000 }
