//! Logical source table

use crate::config::{RoutePair, SourceConfig};
use crate::signal::{Address, InterlockGroup};

/// A named input configuration and the matrix pairs it applies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalSource {
    pub name: String,
    /// Interlock member and press input for this source
    pub address: Address,
    pub routes: Vec<RoutePair>,
}

/// Immutable set of sources loaded from configuration
#[derive(Debug, Clone, Default)]
pub struct SourceTable {
    sources: Vec<LogicalSource>,
}

impl SourceTable {
    pub fn from_config(sources: &[SourceConfig]) -> Self {
        Self {
            sources: sources
                .iter()
                .map(|s| LogicalSource {
                    name: s.name.clone(),
                    address: s.address(),
                    routes: s.routes.clone(),
                })
                .collect(),
        }
    }

    /// Case-insensitive lookup by name
    pub fn find(&self, name: &str) -> Option<&LogicalSource> {
        self.sources
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn by_address(&self, address: Address) -> Option<&LogicalSource> {
        self.sources.iter().find(|s| s.address == address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogicalSource> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Interlock group whose members are the source addresses, in order
    pub fn interlock_group(&self, name: &str) -> InterlockGroup {
        InterlockGroup::new(name, self.sources.iter().map(|s| s.address).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoomConfig;

    #[test]
    fn test_lookup_ignores_case_and_whitespace() {
        let table = SourceTable::from_config(&RoomConfig::default().sources);

        assert_eq!(table.len(), 3);
        assert_eq!(table.find("LAPTOP").unwrap().address, Address::boolean(32));
        assert_eq!(table.find(" mixed ").unwrap().routes.len(), 2);
        assert!(table.find("Projector").is_none());
    }

    #[test]
    fn test_interlock_group_follows_table_order() {
        let table = SourceTable::from_config(&RoomConfig::default().sources);
        let group = table.interlock_group("sources");

        assert_eq!(
            group.members(),
            &[Address::boolean(31), Address::boolean(32), Address::boolean(33)]
        );
        assert_eq!(table.by_address(Address::boolean(33)).unwrap().name, "Mixed");
    }
}
