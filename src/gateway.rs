//! Wireless gateway selection
//!
//! Resolved once at startup. The internal gateway wins when the controller
//! has one and configuration does not force an external gateway; otherwise
//! an external gateway is registered at the configured transport id.
//! A failed external registration is logged and startup carries on: wireless
//! panels then fail their own registration, wired panels are unaffected.

use crate::config::GatewayConfig;
use crate::devices::{DeviceLayer, RegistrationId};
use crate::error::RegistrationError;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// Which gateway carries wireless panels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GatewayChoice {
    /// Built into the controller, no registration step
    Internal,
    /// External accessory at this transport id
    External(u32),
}

impl fmt::Display for GatewayChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayChoice::Internal => write!(f, "internal RF gateway"),
            GatewayChoice::External(id) => write!(f, "external RF gateway 0x{:02X}", id),
        }
    }
}

/// Outcome of gateway selection, immutable for the rest of the run
#[derive(Debug, Clone)]
pub struct ResolvedGateway {
    choice: GatewayChoice,
    registration: Result<Option<RegistrationId>, RegistrationError>,
}

impl ResolvedGateway {
    pub fn choice(&self) -> GatewayChoice {
        self.choice
    }

    /// Wireless panels can register through this gateway
    pub fn is_available(&self) -> bool {
        self.registration.is_ok()
    }

    /// Why the external gateway could not be registered
    pub fn failure(&self) -> Option<&RegistrationError> {
        self.registration.as_ref().err()
    }

    /// The gateway to hand to wireless panel registration, if usable
    pub fn usable(&self) -> Option<&GatewayChoice> {
        self.is_available().then_some(&self.choice)
    }
}

/// Startup decision procedure for the wireless gateway
pub struct GatewaySelector;

impl GatewaySelector {
    pub fn resolve(devices: &dyn DeviceLayer, config: &GatewayConfig) -> ResolvedGateway {
        if devices.supports_internal_gateway() && !config.force_external {
            info!("Using internal RF gateway");
            return ResolvedGateway {
                choice: GatewayChoice::Internal,
                registration: Ok(None),
            };
        }

        if config.force_external {
            info!("External RF gateway forced by configuration");
        }
        info!("Creating external RF gateway at 0x{:02X}", config.ip_id);

        let choice = GatewayChoice::External(config.ip_id);
        let registration = devices.register_external_gateway(config.ip_id).map(Some);

        match &registration {
            Ok(_) => info!("✅ Registered {}", choice),
            Err(e) => warn!("⚠️  Failed to register {}: {} (wireless panels disabled)", choice, e),
        }

        ResolvedGateway {
            choice,
            registration,
        }
    }
}
