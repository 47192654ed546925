//! Signal surface shared by every panel in the room
//!
//! - `address`: joins, values, panel ids
//! - `bus`: feedback fan-out, replay, press/release dispatch
//! - `interlock`: one-of-N feedback groups

mod address;
mod bus;
mod interlock;

pub use address::{Address, Edge, PanelId, SignalKind, SignalValue};
pub use bus::{SignalBus, SignalHandler};
pub use interlock::InterlockGroup;
