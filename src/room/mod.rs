//! Room - composition root
//!
//! Builds the gateway, signal bus, source router and one power lifecycle per
//! registered panel, wires panel presses through the dispatch table, and
//! routes device events to the component that owns them.

mod dispatch;

pub use dispatch::{DispatchTable, PanelAction};

#[cfg(test)]
mod tests;

use crate::config::RoomConfig;
use crate::devices::{DeviceEvent, DeviceLayer, MatrixSwitch, PanelLink, RegistrationId};
use crate::error::Result;
use crate::gateway::{GatewaySelector, ResolvedGateway};
use crate::power::{PanelFeedback, PowerActor, PowerHandle, PowerSettings, PowerSnapshot};
use crate::router::{InputStatus, SourceRouter};
use crate::signal::{Address, Edge, PanelId, SignalBus, SignalHandler};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// A panel that could not be attached at startup
#[derive(Debug, Clone, Serialize)]
pub struct FailedPanel {
    pub id: PanelId,
    pub name: String,
    pub reason: String,
}

/// Per-panel line of the status report
#[derive(Debug, Clone, Serialize)]
pub struct PanelStatus {
    pub id: PanelId,
    pub name: String,
    pub link: PanelLink,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<RegistrationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<PowerSnapshot>,
}

/// Operator-facing view of the whole room
#[derive(Debug, Clone, Serialize)]
pub struct RoomStatus {
    pub room: String,
    pub gateway: String,
    pub gateway_available: bool,
    pub switch: String,
    pub switch_registered: bool,
    pub selected_source: Option<String>,
    pub panels: Vec<PanelStatus>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_panels: Vec<FailedPanel>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<u32, InputStatus>,
}

/// The room controller
pub struct Room {
    config: RoomConfig,
    gateway: ResolvedGateway,
    bus: Arc<SignalBus>,
    router: Arc<SourceRouter>,
    lifecycles: Arc<DashMap<PanelId, PowerHandle>>,
    failed: Vec<FailedPanel>,
    /// Routing started by panel presses
    routes: Arc<Mutex<JoinSet<()>>>,
}

impl Room {
    /// Build the room. Registration failures are logged and leave the
    /// affected device out; initialization always completes.
    pub async fn initialize(
        config: RoomConfig,
        devices: Arc<dyn DeviceLayer>,
        switch: Arc<dyn MatrixSwitch>,
    ) -> Self {
        info!("Initializing room '{}'", config.room.name);

        let gateway = GatewaySelector::resolve(devices.as_ref(), &config.gateway);
        let bus = Arc::new(SignalBus::new(devices));
        let lifecycles = Arc::new(DashMap::new());
        let settings = PowerSettings::from(&config.power);
        let mut failed = Vec::new();

        for panel in &config.panels {
            let endpoint = panel.endpoint();
            let gateway_choice = match endpoint.link {
                PanelLink::Wireless => gateway.usable(),
                PanelLink::Ethernet => None,
            };

            match bus.register(&endpoint, gateway_choice) {
                Ok(_) => {
                    let effects = PanelFeedback::new(
                        endpoint.id,
                        endpoint.capabilities,
                        bus.clone(),
                        &config.joins,
                        &config.power,
                    );
                    let handle = PowerActor::spawn(endpoint.id, Arc::new(effects), settings);
                    lifecycles.insert(endpoint.id, handle);
                }
                Err(e) => {
                    error!("❌ Failed to register {} ({}): {}", endpoint.name, endpoint.id, e);
                    failed.push(FailedPanel {
                        id: endpoint.id,
                        name: endpoint.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let router = Arc::new(SourceRouter::new(&config, switch, bus.clone()));
        router.register_switch().await;

        let room = Self {
            config,
            gateway,
            bus,
            router,
            lifecycles,
            failed,
            routes: Arc::new(Mutex::new(JoinSet::new())),
        };
        room.install_handlers();

        info!(
            "✅ Room '{}' ready: {} panel(s), {} source(s)",
            room.config.room.name,
            room.lifecycles.len(),
            room.router.sources().len()
        );
        room
    }

    fn install_handlers(&self) {
        let dispatch = Arc::new(DispatchTable::from_config(&self.config));
        debug!("Dispatch table has {} action(s)", dispatch.len());

        self.bus.on_press(self.edge_handler(Edge::Press, dispatch.clone()));
        self.bus.on_release(self.edge_handler(Edge::Release, dispatch));
    }

    /// Handler for one edge kind
    ///
    /// A press with no mapped action still counts as activity. An unmapped
    /// release restarts the standby window of an awake panel but never
    /// wakes one.
    fn edge_handler(&self, edge: Edge, dispatch: Arc<DispatchTable>) -> SignalHandler {
        let lifecycles = self.lifecycles.clone();
        let router = Arc::downgrade(&self.router);
        let routes = self.routes.clone();

        Arc::new(move |panel, address| {
            let Some(power) = lifecycles.get(&panel).map(|h| h.clone()) else {
                return;
            };

            match dispatch.lookup(edge, address) {
                Some(PanelAction::TogglePower) => power.toggle(),
                Some(PanelAction::SelectSource(name)) => {
                    power.activity();
                    let Some(router) = router.upgrade() else {
                        return;
                    };
                    let name = name.clone();
                    let mut routes = routes.lock();
                    reap_finished(&mut routes);
                    routes.spawn(async move {
                        if let Err(e) = router.select_source(&name).await {
                            warn!("⚠️  {}", e);
                        }
                    });
                }
                None if edge == Edge::Press => {
                    power.activity();
                    debug!("No action for press {} on {}", address, panel);
                }
                None => power.refresh(),
            }
        })
    }

    /// Route one notification from the device layer
    pub async fn handle_event(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::SignalChanged {
                panel,
                address,
                value,
            } => {
                self.bus.handle_signal(panel, address, value);
            }
            DeviceEvent::OnlineStatusChanged { panel, online } => {
                let Some(power) = self.lifecycle(panel) else {
                    debug!("Status change from unregistered panel {}", panel);
                    return;
                };
                if online {
                    self.bus.replay(panel);
                    power.connect();
                } else {
                    power.disconnect();
                }
            }
            DeviceEvent::Telemetry { panel, reading } => match self.lifecycle(panel) {
                Some(power) => power.telemetry(reading),
                None => debug!("Telemetry from unregistered panel {}", panel),
            },
            DeviceEvent::MatrixInput { port, event } => {
                self.router.on_input_event(port, event).await;
            }
        }
    }

    /// Operator source selection
    pub async fn select_source(&self, name: &str) -> Result<()> {
        self.router.select_source(name).await
    }

    /// Operator request to put one panel in standby now
    pub fn sleep(&self, panel: PanelId) -> bool {
        match self.lifecycle(panel) {
            Some(power) => {
                power.sleep();
                true
            }
            None => false,
        }
    }

    /// Wait for routing started by panel presses to finish
    pub async fn settle(&self) {
        loop {
            let mut pending = std::mem::take(&mut *self.routes.lock());
            if pending.is_empty() {
                return;
            }
            while let Some(joined) = pending.join_next().await {
                log_routing_task(joined);
            }
        }
    }

    pub fn lifecycle(&self, panel: PanelId) -> Option<PowerHandle> {
        self.lifecycles.get(&panel).map(|h| h.clone())
    }

    pub fn bus(&self) -> &Arc<SignalBus> {
        &self.bus
    }

    pub fn router(&self) -> &Arc<SourceRouter> {
        &self.router
    }

    pub fn gateway(&self) -> &ResolvedGateway {
        &self.gateway
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn failed_panels(&self) -> &[FailedPanel] {
        &self.failed
    }

    /// Last boolean broadcast to `address`
    pub fn feedback(&self, address: Address) -> Option<bool> {
        self.bus.feedback(address).and_then(|v| v.as_bool())
    }

    pub async fn status(&self) -> RoomStatus {
        let mut panels = Vec::new();
        for id in self.bus.registered_panels() {
            let Some(endpoint) = self.bus.endpoint(id) else {
                continue;
            };
            let power = match self.lifecycle(id) {
                Some(handle) => handle.snapshot().await,
                None => None,
            };
            panels.push(PanelStatus {
                id,
                name: endpoint.name,
                link: endpoint.link,
                online: self.bus.devices().is_online(id),
                registration: self.bus.registration(id),
                power,
            });
        }

        RoomStatus {
            room: self.config.room.name.clone(),
            gateway: self.gateway.choice().to_string(),
            gateway_available: self.gateway.is_available(),
            switch: self.router.switch_name().to_string(),
            switch_registered: self.router.is_switch_registered(),
            selected_source: self.router.selected().map(|s| s.name.clone()),
            panels,
            failed_panels: self.failed.clone(),
            inputs: self.router.input_status(),
        }
    }

    /// Stop every lifecycle, then detach the panels
    pub async fn shutdown(&self) {
        info!("Shutting down room '{}'", self.config.room.name);
        self.settle().await;

        let handles: Vec<PowerHandle> = self.lifecycles.iter().map(|e| e.value().clone()).collect();
        for handle in handles {
            handle.shutdown().await;
            self.lifecycles.remove(&handle.panel());
            self.bus.unregister(handle.panel());
        }
    }
}

/// Drop routing tasks that already completed
fn reap_finished(routes: &mut JoinSet<()>) {
    while let Some(joined) = routes.try_join_next() {
        log_routing_task(joined);
    }
}

fn log_routing_task(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        warn!("⚠️  Routing task failed: {}", e);
    }
}
