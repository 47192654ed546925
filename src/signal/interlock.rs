//! Interlock groups - at most one member address asserted at a time

use super::Address;
use parking_lot::Mutex;

/// A named, ordered set of boolean feedback addresses
///
/// The selection lock is held for the whole fan-out of an interlock write,
/// so two interlock calls on the same group never interleave.
#[derive(Debug)]
pub struct InterlockGroup {
    name: String,
    members: Vec<Address>,
    selected: Mutex<Option<Address>>,
}

impl InterlockGroup {
    pub fn new(name: impl Into<String>, members: Vec<Address>) -> Self {
        Self {
            name: name.into(),
            members,
            selected: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[Address] {
        &self.members
    }

    pub fn contains(&self, address: Address) -> bool {
        self.members.contains(&address)
    }

    /// Currently asserted member, `None` until the first interlock write
    pub fn selected(&self) -> Option<Address> {
        *self.selected.lock()
    }

    /// Run `write` for every member while holding the selection lock,
    /// then record `selected` as the asserted member
    pub(crate) fn apply<F>(&self, selected: Address, mut write: F)
    where
        F: FnMut(Address, bool),
    {
        let mut current = self.selected.lock();
        for &member in &self.members {
            write(member, member == selected);
        }
        *current = Some(selected);
    }
}
