//! Signal bus - feedback fan-out to every registered panel and press dispatch
//!
//! The bus is the only thing that writes feedback to panels. It remembers the
//! last value broadcast to every address so a panel that (re)connects can be
//! brought up to date with [`SignalBus::replay`].

use super::{Address, Edge, InterlockGroup, PanelId, SignalValue};
use crate::devices::{DeviceLayer, PanelEndpoint, PanelLink, RegistrationId};
use crate::error::{RegistrationError, Result, RoomError};
use crate::gateway::GatewayChoice;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Callback invoked for a press or release on a registered panel
pub type SignalHandler = Arc<dyn Fn(PanelId, Address) + Send + Sync>;

/// Book-keeping for one registered panel
struct PanelSlot {
    endpoint: PanelEndpoint,
    registration: RegistrationId,
    /// Last reported value of every boolean input, for edge detection
    inputs: HashMap<Address, bool>,
}

/// Shared feedback/input surface for all panels in the room
pub struct SignalBus {
    devices: Arc<dyn DeviceLayer>,
    panels: DashMap<PanelId, PanelSlot>,
    /// Last broadcast value per feedback address
    feedback: DashMap<Address, SignalValue>,
    /// Shared by broadcasts, exclusive for a replay, so a replay never
    /// writes a value older than one a broadcast already delivered
    fanout: RwLock<()>,
    press_handler: RwLock<Option<SignalHandler>>,
    release_handler: RwLock<Option<SignalHandler>>,
}

impl SignalBus {
    pub fn new(devices: Arc<dyn DeviceLayer>) -> Self {
        Self {
            devices,
            panels: DashMap::new(),
            feedback: DashMap::new(),
            fanout: RwLock::new(()),
            press_handler: RwLock::new(None),
            release_handler: RwLock::new(None),
        }
    }

    /// Device layer the bus writes through
    pub fn devices(&self) -> &Arc<dyn DeviceLayer> {
        &self.devices
    }

    /// Attach a panel to the broadcast set
    ///
    /// Wireless panels need a usable gateway. Failures are returned as-is and
    /// never retried; the panel is then neither written to nor listened to.
    pub fn register(
        &self,
        endpoint: &PanelEndpoint,
        gateway: Option<&GatewayChoice>,
    ) -> std::result::Result<RegistrationId, RegistrationError> {
        if self.panels.contains_key(&endpoint.id) {
            return Err(RegistrationError::AlreadyRegistered {
                device: endpoint.name.clone(),
            });
        }

        let gateway = match endpoint.link {
            PanelLink::Wireless => Some(gateway.ok_or_else(|| {
                RegistrationError::GatewayUnavailable {
                    device: endpoint.name.clone(),
                }
            })?),
            PanelLink::Ethernet => None,
        };

        let registration = self.devices.register_panel(endpoint, gateway)?;

        self.panels.insert(
            endpoint.id,
            PanelSlot {
                endpoint: endpoint.clone(),
                registration,
                inputs: HashMap::new(),
            },
        );

        info!(
            "Registered {}: ID {} ({:?})",
            endpoint.name, endpoint.id, registration
        );
        Ok(registration)
    }

    /// Remove a panel from the broadcast set
    pub fn unregister(&self, panel: PanelId) {
        if let Some((_, slot)) = self.panels.remove(&panel) {
            self.devices.unregister_panel(panel);
            info!("Unregistered {} ({})", slot.endpoint.name, panel);
        }
    }

    pub fn is_registered(&self, panel: PanelId) -> bool {
        self.panels.contains_key(&panel)
    }

    /// Registered panel ids in ascending order
    pub fn registered_panels(&self) -> Vec<PanelId> {
        let mut ids: Vec<PanelId> = self.panels.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    pub fn endpoint(&self, panel: PanelId) -> Option<PanelEndpoint> {
        self.panels.get(&panel).map(|slot| slot.endpoint.clone())
    }

    pub fn registration(&self, panel: PanelId) -> Option<RegistrationId> {
        self.panels.get(&panel).map(|slot| slot.registration)
    }

    /// Last value broadcast to `address`
    pub fn feedback(&self, address: Address) -> Option<SignalValue> {
        self.feedback.get(&address).map(|v| v.value().clone())
    }

    /// Install the single consumer of presses (false → true)
    pub fn on_press(&self, handler: SignalHandler) {
        *self.press_handler.write() = Some(handler);
    }

    /// Install the optional consumer of releases (true → false)
    pub fn on_release(&self, handler: SignalHandler) {
        *self.release_handler.write() = Some(handler);
    }

    /// Write `value` to `address` on every registered, online panel
    pub fn broadcast(&self, address: Address, value: SignalValue) {
        let _fanout = self.fanout.read();
        self.feedback.insert(address, value.clone());

        for panel in self.registered_panels() {
            if !self.devices.is_online(panel) {
                trace!("Skipping offline panel {} for {}", panel, address);
                continue;
            }
            if let Err(e) = self.write(panel, address, &value) {
                warn!("{}", e);
            }
        }
    }

    pub fn broadcast_bool(&self, address: Address, value: bool) {
        self.broadcast(address, SignalValue::Bool(value));
    }

    pub fn broadcast_numeric(&self, address: Address, value: u16) {
        self.broadcast(address, SignalValue::Numeric(value));
    }

    pub fn broadcast_string(&self, address: Address, value: impl Into<String>) {
        self.broadcast(address, SignalValue::Text(value.into()));
    }

    /// Write feedback to a single panel
    ///
    /// Returns false (and writes nothing) when the panel is not registered or
    /// not online.
    pub fn send_to(&self, panel: PanelId, address: Address, value: SignalValue) -> bool {
        if !self.is_registered(panel) || !self.devices.is_online(panel) {
            return false;
        }
        match self.write(panel, address, &value) {
            Ok(()) => true,
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    /// Assert `selected` and clear every other member of `group`, on every panel
    ///
    /// `selected` must be a member of the group; otherwise nothing is written.
    pub fn interlock(&self, group: &InterlockGroup, selected: Address) -> Result<()> {
        if !group.contains(selected) {
            return Err(RoomError::configuration(format!(
                "{} is not a member of interlock group '{}'",
                selected,
                group.name()
            )));
        }

        group.apply(selected, |member, on| self.broadcast_bool(member, on));
        debug!("Interlock '{}' → {}", group.name(), selected);
        Ok(())
    }

    /// Re-send every remembered feedback value to one panel
    ///
    /// Returns the number of values written.
    pub fn replay(&self, panel: PanelId) -> usize {
        if !self.is_registered(panel) || !self.devices.is_online(panel) {
            return 0;
        }

        let _fanout = self.fanout.write();
        let mut entries: Vec<(Address, SignalValue)> = self
            .feedback
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        entries.sort_by_key(|(address, _)| *address);

        let mut written = 0;
        for (address, value) in entries {
            match self.write(panel, address, &value) {
                Ok(()) => written += 1,
                Err(e) => warn!("{}", e),
            }
        }

        debug!("Replayed {} feedback value(s) to {}", written, panel);
        written
    }

    /// Feed a boolean input change from the device layer
    ///
    /// Only transitions count: a `true` after `true` is not a new press.
    /// Inputs from unregistered panels and non-boolean addresses are ignored.
    pub fn handle_signal(&self, panel: PanelId, address: Address, value: bool) -> Option<Edge> {
        if !address.is_boolean() {
            trace!("Ignoring non-boolean input {} from {}", address, panel);
            return None;
        }

        let edge = {
            let Some(mut slot) = self.panels.get_mut(&panel) else {
                debug!("Ignoring {} from unregistered panel {}", address, panel);
                return None;
            };
            let previous = slot.inputs.insert(address, value).unwrap_or(false);
            match (previous, value) {
                (false, true) => Edge::Press,
                (true, false) => Edge::Release,
                _ => return None,
            }
        };

        let handler = match edge {
            Edge::Press => self.press_handler.read().clone(),
            Edge::Release => self.release_handler.read().clone(),
        };
        if let Some(handler) = handler {
            handler(panel, address);
        }

        Some(edge)
    }

    fn write(&self, panel: PanelId, address: Address, value: &SignalValue) -> Result<()> {
        let outcome = match value {
            SignalValue::Bool(b) => self.devices.write_boolean(panel, address, *b),
            SignalValue::Numeric(n) => self.devices.write_numeric(panel, address, *n),
            SignalValue::Text(s) => self.devices.write_string(panel, address, s),
        };

        outcome.map_err(|reason| RoomError::Transport {
            panel: panel.to_string(),
            reason: format!("{} ({})", reason, address),
        })
    }
}
