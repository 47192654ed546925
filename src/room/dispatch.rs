//! Press dispatch table

use crate::config::RoomConfig;
use crate::signal::{Address, Edge};
use std::collections::HashMap;

/// What a panel input asks the room to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelAction {
    SelectSource(String),
    TogglePower,
}

/// Maps `(edge, input address)` to a room action
#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    actions: HashMap<(Edge, Address), PanelAction>,
}

impl DispatchTable {
    /// Source joins and the power toggle, all on press
    pub fn from_config(config: &RoomConfig) -> Self {
        let mut table = Self::default();
        for source in &config.sources {
            table.insert(
                Edge::Press,
                source.address(),
                PanelAction::SelectSource(source.name.clone()),
            );
        }
        table.insert(Edge::Press, config.joins.power_toggle(), PanelAction::TogglePower);
        table
    }

    pub fn insert(&mut self, edge: Edge, address: Address, action: PanelAction) {
        self.actions.insert((edge, address), action);
    }

    pub fn lookup(&self, edge: Edge, address: Address) -> Option<&PanelAction> {
        self.actions.get(&(edge, address))
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
