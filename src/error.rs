//! Error taxonomy for the room controller
//!
//! Three failure families exist and each has a fixed propagation policy:
//! - [`RegistrationError`]: a device could not attach. Logged at startup,
//!   the endpoint degrades to a no-op.
//! - [`RoomError::Configuration`]: the request names something that is not
//!   configured. The requesting operation fails, nothing else does.
//! - [`RoutingFailure`]: the switch refused one output/input assignment.
//!   Logged, not retried; interlock feedback still reflects the request.

use thiserror::Error;

/// A device or transport could not be attached
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The device layer refused the registration
    #[error("{device} rejected registration: {reason}")]
    Rejected { device: String, reason: String },

    /// The panel needs a wireless gateway and none is available
    #[error("{device} needs a wireless gateway but none is registered")]
    GatewayUnavailable { device: String },

    /// The same endpoint id was registered twice
    #[error("{device} is already registered")]
    AlreadyRegistered { device: String },
}

/// One output/input assignment the matrix switch did not apply
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("output {output} <- input {input}: {reason}")]
pub struct RoutingFailure {
    pub output: u32,
    pub input: u32,
    pub reason: String,
}

/// Library-wide error type
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("registration failed: {0}")]
    Registration(#[from] RegistrationError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("routing '{source_name}' failed for {} pair(s): {}", .failures.len(), join_failures(.failures))]
    Routing {
        source_name: String,
        failures: Vec<RoutingFailure>,
    },

    #[error("write to panel {panel} failed: {reason}")]
    Transport { panel: String, reason: String },
}

impl RoomError {
    /// Shorthand for a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// True for `RoomError::Configuration`
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

fn join_failures(failures: &[RoutingFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, RoomError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_error_lists_every_pair() {
        let err = RoomError::Routing {
            source_name: "Laptop".to_string(),
            failures: vec![
                RoutingFailure {
                    output: 1,
                    input: 3,
                    reason: "timeout".to_string(),
                },
                RoutingFailure {
                    output: 2,
                    input: 4,
                    reason: "offline".to_string(),
                },
            ],
        };

        let msg = err.to_string();
        assert!(msg.contains("'Laptop'"));
        assert!(msg.contains("2 pair(s)"));
        assert!(msg.contains("output 1 <- input 3: timeout"));
        assert!(msg.contains("output 2 <- input 4: offline"));
    }

    #[test]
    fn test_registration_error_converts() {
        let err: RoomError = RegistrationError::GatewayUnavailable {
            device: "TST-902".to_string(),
        }
        .into();
        assert!(matches!(err, RoomError::Registration(_)));
        assert!(!err.is_configuration());
        assert!(RoomError::configuration("nope").is_configuration());
    }
}
