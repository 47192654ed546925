//! Simulated device layer - in-process panels, gateway and switch
//!
//! This is useful for:
//! - Running the controller without hardware (operator console)
//! - Tests that need to read back what every panel is showing
//! - Injecting registration and routing failures

use super::{
    DeviceLayer, MatrixSwitch, PanelEndpoint, PanelLink, RegistrationId,
};
use crate::error::{RegistrationError, RoutingFailure};
use crate::gateway::GatewayChoice;
use crate::signal::{Address, PanelId, SignalValue};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Observable state of one simulated panel
#[derive(Debug, Clone, Default)]
pub struct SimulatedPanel {
    pub online: bool,
    pub values: HashMap<Address, SignalValue>,
    pub brightness: Option<u16>,
    pub backlight: Option<bool>,
    pub ui_restores: u32,
    pub writes: u64,
}

#[derive(Default)]
struct Inner {
    panels: HashMap<PanelId, SimulatedPanel>,
    rejected: HashMap<PanelId, String>,
    failing_writes: HashSet<PanelId>,
}

/// Simulated panel/gateway transport
pub struct SimulatedDevices {
    inner: Mutex<Inner>,
    internal_gateway: bool,
    gateway_failure: Mutex<Option<String>>,
    next_id: AtomicU32,
}

impl SimulatedDevices {
    /// Create a transport; `internal_gateway` says whether the simulated
    /// controller has a built-in RF gateway
    pub fn new(internal_gateway: bool) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            internal_gateway,
            gateway_failure: Mutex::new(None),
            next_id: AtomicU32::new(1),
        }
    }

    /// Make the next registration of `panel` fail with `reason`
    pub fn reject_panel(&self, panel: PanelId, reason: impl Into<String>) {
        self.inner.lock().rejected.insert(panel, reason.into());
    }

    /// Make external gateway registration fail with `reason`
    pub fn fail_gateway(&self, reason: impl Into<String>) {
        *self.gateway_failure.lock() = Some(reason.into());
    }

    /// Make every write to `panel` fail
    pub fn fail_writes(&self, panel: PanelId) {
        self.inner.lock().failing_writes.insert(panel);
    }

    /// Flip a registered panel's connectivity
    pub fn set_online(&self, panel: PanelId, online: bool) {
        let mut inner = self.inner.lock();
        if let Some(state) = inner.panels.get_mut(&panel) {
            state.online = online;
            info!("Simulated panel {} is now {}", panel, if online { "online" } else { "offline" });
        }
    }

    pub fn is_registered(&self, panel: PanelId) -> bool {
        self.inner.lock().panels.contains_key(&panel)
    }

    /// Snapshot of a panel's observable state
    pub fn panel(&self, panel: PanelId) -> Option<SimulatedPanel> {
        self.inner.lock().panels.get(&panel).cloned()
    }

    /// Last value written to `address` on `panel`
    pub fn value(&self, panel: PanelId, address: Address) -> Option<SignalValue> {
        self.inner
            .lock()
            .panels
            .get(&panel)
            .and_then(|p| p.values.get(&address).cloned())
    }

    /// Last boolean written to `address` on `panel` (false if never written)
    pub fn bool_value(&self, panel: PanelId, address: Address) -> bool {
        self.value(panel, address)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn brightness(&self, panel: PanelId) -> Option<u16> {
        self.panel(panel).and_then(|p| p.brightness)
    }

    pub fn backlight(&self, panel: PanelId) -> Option<bool> {
        self.panel(panel).and_then(|p| p.backlight)
    }

    fn with_panel<F>(&self, panel: PanelId, what: &str, f: F) -> Result<(), String>
    where
        F: FnOnce(&mut SimulatedPanel),
    {
        let mut inner = self.inner.lock();
        if inner.failing_writes.contains(&panel) {
            return Err(format!("{} rejected by simulated transport", what));
        }
        let state = inner
            .panels
            .get_mut(&panel)
            .ok_or_else(|| format!("panel {} is not registered", panel))?;
        f(state);
        state.writes += 1;
        Ok(())
    }
}

impl Default for SimulatedDevices {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DeviceLayer for SimulatedDevices {
    fn register_panel(
        &self,
        endpoint: &PanelEndpoint,
        gateway: Option<&GatewayChoice>,
    ) -> Result<RegistrationId, RegistrationError> {
        let mut inner = self.inner.lock();

        if let Some(reason) = inner.rejected.remove(&endpoint.id) {
            return Err(RegistrationError::Rejected {
                device: endpoint.name.clone(),
                reason,
            });
        }

        if endpoint.link == PanelLink::Wireless && gateway.is_none() {
            return Err(RegistrationError::GatewayUnavailable {
                device: endpoint.name.clone(),
            });
        }

        if inner.panels.contains_key(&endpoint.id) {
            return Err(RegistrationError::AlreadyRegistered {
                device: endpoint.name.clone(),
            });
        }

        inner.panels.insert(endpoint.id, SimulatedPanel::default());

        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!("Simulated panel '{}' ({}) registered as {:?}", endpoint.name, endpoint.id, id);
        Ok(id)
    }

    fn unregister_panel(&self, panel: PanelId) {
        self.inner.lock().panels.remove(&panel);
    }

    fn is_online(&self, panel: PanelId) -> bool {
        self.inner
            .lock()
            .panels
            .get(&panel)
            .map(|p| p.online)
            .unwrap_or(false)
    }

    fn write_boolean(&self, panel: PanelId, address: Address, value: bool) -> Result<(), String> {
        debug!("→ {} {} = {}", panel, address, value);
        self.with_panel(panel, "boolean write", |p| {
            p.values.insert(address, SignalValue::Bool(value));
        })
    }

    fn write_numeric(&self, panel: PanelId, address: Address, value: u16) -> Result<(), String> {
        debug!("→ {} {} = {}", panel, address, value);
        self.with_panel(panel, "numeric write", |p| {
            p.values.insert(address, SignalValue::Numeric(value));
        })
    }

    fn write_string(&self, panel: PanelId, address: Address, value: &str) -> Result<(), String> {
        debug!("→ {} {} = {:?}", panel, address, value);
        self.with_panel(panel, "string write", |p| {
            p.values.insert(address, SignalValue::Text(value.to_string()));
        })
    }

    fn set_brightness(&self, panel: PanelId, level: u16) -> Result<(), String> {
        debug!("→ {} brightness = {}", panel, level);
        self.with_panel(panel, "brightness", |p| p.brightness = Some(level))
    }

    fn set_backlight(&self, panel: PanelId, on: bool) -> Result<(), String> {
        debug!("→ {} backlight = {}", panel, if on { "on" } else { "off" });
        self.with_panel(panel, "backlight", |p| p.backlight = Some(on))
    }

    fn restore_ui(&self, panel: PanelId) -> Result<(), String> {
        self.with_panel(panel, "restore ui", |p| p.ui_restores += 1)
    }

    fn supports_internal_gateway(&self) -> bool {
        self.internal_gateway
    }

    fn register_external_gateway(
        &self,
        transport_id: u32,
    ) -> Result<RegistrationId, RegistrationError> {
        if let Some(reason) = self.gateway_failure.lock().clone() {
            return Err(RegistrationError::Rejected {
                device: format!("RF gateway 0x{:02X}", transport_id),
                reason,
            });
        }
        Ok(RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }
}

#[derive(Default)]
struct SwitchState {
    outputs: HashMap<u32, u32>,
    history: Vec<(u32, u32)>,
    failing: HashSet<(u32, u32)>,
    register_failure: Option<String>,
}

/// Simulated video matrix switch
pub struct SimulatedSwitch {
    name: String,
    state: Mutex<SwitchState>,
    delay: Option<Duration>,
}

impl SimulatedSwitch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(SwitchState::default()),
            delay: None,
        }
    }

    /// Make every `route` call take `delay` (exposes interleaving in tests)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make registration fail with `reason`
    pub fn fail_registration(&self, reason: impl Into<String>) {
        self.state.lock().register_failure = Some(reason.into());
    }

    /// Make routing `input` to `output` fail
    pub fn fail_route(&self, output: u32, input: u32) {
        self.state.lock().failing.insert((output, input));
    }

    /// Input currently routed to `output`
    pub fn routed(&self, output: u32) -> Option<u32> {
        self.state.lock().outputs.get(&output).copied()
    }

    /// Every applied (output, input) pair in order
    pub fn history(&self) -> Vec<(u32, u32)> {
        self.state.lock().history.clone()
    }
}

#[async_trait]
impl MatrixSwitch for SimulatedSwitch {
    fn name(&self) -> &str {
        &self.name
    }

    async fn register(&self) -> Result<RegistrationId, RegistrationError> {
        match self.state.lock().register_failure.clone() {
            Some(reason) => Err(RegistrationError::Rejected {
                device: self.name.clone(),
                reason,
            }),
            None => Ok(RegistrationId(0x10)),
        }
    }

    async fn route(&self, output: u32, input: u32) -> Result<(), RoutingFailure> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if state.failing.contains(&(output, input)) {
            return Err(RoutingFailure {
                output,
                input,
                reason: "simulated hardware fault".to_string(),
            });
        }

        state.outputs.insert(output, input);
        state.history.push((output, input));
        info!("🔀 {}: output {} <- input {}", self.name, output, input);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::Capabilities;

    fn endpoint(id: u32, link: PanelLink) -> PanelEndpoint {
        PanelEndpoint {
            id: PanelId(id),
            name: format!("panel-{}", id),
            link,
            capabilities: Capabilities::default(),
        }
    }

    #[test]
    fn test_wireless_panel_needs_gateway() {
        let devices = SimulatedDevices::new(false);
        let err = devices
            .register_panel(&endpoint(3, PanelLink::Wireless), None)
            .unwrap_err();
        assert!(matches!(err, RegistrationError::GatewayUnavailable { .. }));

        let ok = devices.register_panel(
            &endpoint(3, PanelLink::Wireless),
            Some(&GatewayChoice::Internal),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_rejection_is_one_shot() {
        let devices = SimulatedDevices::default();
        devices.reject_panel(PanelId(4), "bad ip-id");

        let err = devices
            .register_panel(&endpoint(4, PanelLink::Ethernet), None)
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::Rejected {
                device: "panel-4".into(),
                reason: "bad ip-id".into()
            }
        );
        assert!(devices
            .register_panel(&endpoint(4, PanelLink::Ethernet), None)
            .is_ok());
    }

    #[test]
    fn test_writes_are_recorded() {
        let devices = SimulatedDevices::default();
        devices
            .register_panel(&endpoint(4, PanelLink::Ethernet), None)
            .unwrap();

        devices
            .write_boolean(PanelId(4), Address::boolean(31), true)
            .unwrap();
        devices.set_brightness(PanelId(4), 100).unwrap();

        assert!(devices.bool_value(PanelId(4), Address::boolean(31)));
        assert_eq!(devices.brightness(PanelId(4)), Some(100));
        assert_eq!(devices.panel(PanelId(4)).unwrap().writes, 2);
    }

    #[tokio::test]
    async fn test_switch_failures_and_history() {
        let switch = SimulatedSwitch::new("HD-MD4X2");
        switch.fail_route(2, 4);

        switch.route(1, 3).await.unwrap();
        assert!(switch.route(2, 4).await.is_err());

        assert_eq!(switch.routed(1), Some(3));
        assert_eq!(switch.routed(2), None);
        assert_eq!(switch.history(), vec![(1, 3)]);
    }
}
