//! avroom - room controller for AV touch panels and a video matrix switch
//!
//! Keeps any number of panels consistent for one logical source selection,
//! routes sources on the matrix switch, and runs each panel through an
//! Awake → Standby → DeepSleep power lifecycle on inactivity.

pub mod cli;
pub mod config;
pub mod devices;
pub mod error;
pub mod gateway;
pub mod power;
pub mod room;
pub mod router;
pub mod signal;

pub use config::RoomConfig;
pub use error::{RegistrationError, Result, RoomError, RoutingFailure};
pub use room::Room;
