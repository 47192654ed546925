//! Device layer boundary (panels, wireless gateway, matrix switch)
//!
//! The room controller never talks to hardware directly. Panels and the
//! wireless gateway are reached through a [`DeviceLayer`], the matrix switch
//! through a [`MatrixSwitch`]. Inbound notifications arrive as
//! [`DeviceEvent`] values on a channel owned by the caller.
//!
//! Note: all `DeviceLayer` write methods take `&self` and must not block.
//! Implementations queue the write on their transport and return.

pub mod simulated;

pub use simulated::{SimulatedDevices, SimulatedSwitch};

use crate::error::{RegistrationError, RoutingFailure};
use crate::gateway::GatewayChoice;
use crate::signal::{Address, PanelId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Token returned by a successful registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RegistrationId(pub u32);

/// How a panel reaches the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelLink {
    /// Wired or virtual panel, registers directly
    Ethernet,
    /// RF panel, registers through the wireless gateway
    Wireless,
}

/// Optional hardware features of a panel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// LCD brightness and backlight can be controlled
    #[serde(default)]
    pub brightness: bool,
    /// Panel reports AC-line and battery telemetry
    #[serde(default)]
    pub battery: bool,
}

/// Everything needed to register one panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelEndpoint {
    pub id: PanelId,
    pub name: String,
    pub link: PanelLink,
    pub capabilities: Capabilities,
}

/// Panel and gateway transport
pub trait DeviceLayer: Send + Sync {
    /// Attach a panel. Wireless panels receive the resolved gateway.
    fn register_panel(
        &self,
        endpoint: &PanelEndpoint,
        gateway: Option<&GatewayChoice>,
    ) -> Result<RegistrationId, RegistrationError>;

    /// Detach a panel. Unknown ids are ignored.
    fn unregister_panel(&self, panel: PanelId);

    /// Current connectivity of a registered panel
    fn is_online(&self, panel: PanelId) -> bool;

    fn write_boolean(&self, panel: PanelId, address: Address, value: bool) -> Result<(), String>;

    fn write_numeric(&self, panel: PanelId, address: Address, value: u16) -> Result<(), String>;

    fn write_string(&self, panel: PanelId, address: Address, value: &str) -> Result<(), String>;

    /// Set LCD brightness (panels with the brightness capability)
    fn set_brightness(&self, panel: PanelId, level: u16) -> Result<(), String>;

    /// Switch the backlight on or off
    fn set_backlight(&self, panel: PanelId, on: bool) -> Result<(), String>;

    /// Bring the panel UI to the foreground (screensaver off)
    fn restore_ui(&self, panel: PanelId) -> Result<(), String>;

    /// Whether the host controller has a built-in wireless gateway
    fn supports_internal_gateway(&self) -> bool;

    /// Create and register an external wireless gateway
    fn register_external_gateway(&self, transport_id: u32)
        -> Result<RegistrationId, RegistrationError>;
}

/// Video matrix switch
///
/// Note: `route` is atomic per pair from the switch's perspective.
#[async_trait]
pub trait MatrixSwitch: Send + Sync {
    /// Human readable name used in logs
    fn name(&self) -> &str;

    /// Attach the switch at startup
    async fn register(&self) -> Result<RegistrationId, RegistrationError>;

    /// Route `input` to `output`
    async fn route(&self, output: u32, input: u32) -> Result<(), RoutingFailure>;
}

/// Telemetry reported by battery-powered wireless panels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryReading {
    /// Panel is on its charging dock / AC line
    AcLine(bool),
    /// Battery level in percent
    BatteryLevel(u16),
    /// RF link quality in percent
    RfSignal(u16),
}

/// Video sync state of a switch input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSync {
    NoSignal,
    Detected { width: u16, height: u16, fps: u16 },
}

impl VideoSync {
    /// True for any detected format
    pub fn is_detected(&self) -> bool {
        matches!(self, VideoSync::Detected { .. })
    }
}

/// Event reported by a matrix switch input port
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixInputEvent {
    /// Input name changed
    Name(String),
    /// Source sync changed
    Sync(VideoSync),
    /// Any other event, kept for logging
    Other { event_id: u32 },
}

/// Notification from the device layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A boolean input changed on a panel
    SignalChanged {
        panel: PanelId,
        address: Address,
        value: bool,
    },
    /// A panel came online or dropped off
    OnlineStatusChanged { panel: PanelId, online: bool },
    /// Battery/AC/RF telemetry from a panel
    Telemetry {
        panel: PanelId,
        reading: TelemetryReading,
    },
    /// Something happened on a switch input
    MatrixInput { port: u32, event: MatrixInputEvent },
}
